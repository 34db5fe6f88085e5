// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// A population estimate for one county, keyed by its canonical name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountyPopulationRecord {
    pub county: String,
    pub population: u64,
}

/// One data row of the case and fatality sheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountyCaseRecord {
    pub county: String,
    pub cases: u64,
    pub fatalities: u64,
}

// ******** Output data structures *********

/// A case row joined with the population of its county.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EnrichedCountyRecord {
    pub county: String,
    pub cases: u64,
    pub fatalities: u64,
    pub population: u64,
}

/// The final document. The last element of `counts` is always the
/// statewide total computed from the other rows.
#[derive(PartialEq, Debug, Clone)]
pub struct Report {
    pub date: String,
    pub hospitalizations: Option<u64>,
    pub positivity_rate: Option<f64>,
    pub counts: Vec<EnrichedCountyRecord>,
}

impl Report {
    /// The statewide row.
    pub fn total(&self) -> Option<&EnrichedCountyRecord> {
        self.counts.last()
    }
}

/// Errors raised while building a report.
///
/// `MalformedRow`, `RepeatedCounty` and `UnknownCounty` are recovered when
/// they concern a single row: they are then returned as warnings next to the result instead of
/// aborting the run.
#[derive(PartialEq, Debug, Clone)]
pub enum CountsError {
    /// A sheet, a column or a header row could not be found.
    DataFormat { message: String },
    /// Two reference rows map to the same canonical county name.
    DuplicateKey { county: String },
    /// A county appears on more than one row of the case sheet.
    RepeatedCounty { county: String },
    /// A cell could not be coerced to the expected type.
    /// The location uses the spreadsheet conventions ("row 12", "F3").
    MalformedRow {
        sheet: String,
        location: String,
        reason: String,
    },
    /// A county of the case sheet has no population record.
    UnknownCounty { county: String },
}

impl Error for CountsError {}

impl Display for CountsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountsError::DataFormat { message } => write!(f, "data format error: {}", message),
            CountsError::DuplicateKey { county } => {
                write!(f, "duplicate county in population reference: {}", county)
            }
            CountsError::RepeatedCounty { county } => {
                write!(f, "county listed more than once in the case sheet: {}", county)
            }
            CountsError::MalformedRow {
                sheet,
                location,
                reason,
            } => write!(f, "malformed value at {} in sheet {:?}: {}", location, sheet, reason),
            CountsError::UnknownCounty { county } => {
                write!(f, "no population record for county {:?}", county)
            }
        }
    }
}

pub type CountsResult<T> = Result<T, CountsError>;

// ********* Configuration **********

// The defaults follow the layout of the DSHS "TexasCOVID19CaseCountData.xlsx"
// releases and of the 2020 census redistricting file (tx48s050.csv).

/// A column we need, recognized by any of its header spellings.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnMatcher {
    pub name: String,
    pub synonyms: Vec<String>,
}

impl ColumnMatcher {
    pub fn new(name: &str, synonyms: &[&str]) -> ColumnMatcher {
        ColumnMatcher {
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Case-insensitive comparison, ignoring line breaks and repeated spaces
    /// inside the header text.
    pub fn matches(&self, header: &str) -> bool {
        let h = collapse_whitespace(header).to_lowercase();
        !h.is_empty()
            && self
                .synonyms
                .iter()
                .any(|s| collapse_whitespace(s).to_lowercase() == h)
    }
}

/// A zero-based cell position (row 0, column 0 is A1).
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CellAddress {
    pub row: usize,
    pub column: usize,
}

impl Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut letters: Vec<char> = vec![];
        let mut n = self.column + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        let col: String = letters.iter().rev().collect();
        write!(f, "{}{}", col, self.row + 1)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CaseSheetRules {
    /// Accepted sheet names, in order of preference.
    pub sheet_names: Vec<String>,
    pub county: ColumnMatcher,
    pub cases: ColumnMatcher,
    pub fatalities: ColumnMatcher,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct HospitalizationRules {
    pub sheet_names: Vec<String>,
    pub column: usize,
    /// Text of the label cell sitting right above the value.
    pub label: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RateLocation {
    /// A fixed cell.
    Cell(CellAddress),
    /// The first non-blank cell below the header cell.
    BelowHeader(ColumnMatcher),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PositivityRules {
    pub sheet_names: Vec<String>,
    pub location: RateLocation,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExtractionRules {
    pub case_sheet: CaseSheetRules,
    /// When absent, the hospitalizations are reported as null.
    pub hospitalizations: Option<HospitalizationRules>,
    /// When absent, the positivity rate is reported as null.
    pub positivity_rate: Option<PositivityRules>,
}

fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

impl Default for ExtractionRules {
    fn default() -> Self {
        ExtractionRules {
            case_sheet: CaseSheetRules {
                sheet_names: strings(&["Case and Fatalities_ALL", "Case and Fatalities"]),
                county: ColumnMatcher::new("county", &["County", "County Name"]),
                cases: ColumnMatcher::new("cases", &["Confirmed Cases", "Cases"]),
                fatalities: ColumnMatcher::new("fatalities", &["Fatalities", "Deaths"]),
            },
            hospitalizations: Some(HospitalizationRules {
                sheet_names: strings(&["Hospitalizations", "Hospitalization by Day"]),
                column: 1,
                label: "count".to_string(),
            }),
            positivity_rate: Some(PositivityRules {
                sheet_names: strings(&["Molecular Positivity Rate", "Tests by Day"]),
                location: RateLocation::Cell(CellAddress { row: 2, column: 5 }),
            }),
        }
    }
}

/// How county names are made comparable between the case sheet and the
/// population reference.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NameRules {
    /// Spelling fixes, applied after whitespace normalization.
    pub rewrites: HashMap<String, String>,
    /// Names under which the statewide aggregate may appear.
    pub statewide_labels: Vec<String>,
    /// Name of the synthetic statewide row.
    pub total_name: String,
}

impl Default for NameRules {
    fn default() -> Self {
        let mut rewrites = HashMap::new();
        rewrites.insert("De Witt".to_string(), "DeWitt".to_string());
        NameRules {
            rewrites,
            statewide_labels: strings(&["Total", "State of Texas"]),
            total_name: "Total".to_string(),
        }
    }
}

impl NameRules {
    /// The canonical form of a county name.
    pub fn canonical(&self, raw: &str) -> String {
        let name = collapse_whitespace(raw);
        match self.rewrites.get(&name) {
            Some(fixed) => fixed.clone(),
            None if self.is_statewide(&name) => self.total_name.clone(),
            None => name,
        }
    }

    pub fn is_statewide(&self, name: &str) -> bool {
        let name = collapse_whitespace(name);
        name.eq_ignore_ascii_case(&self.total_name)
            || self
                .statewide_labels
                .iter()
                .any(|l| l.eq_ignore_ascii_case(&name))
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}
