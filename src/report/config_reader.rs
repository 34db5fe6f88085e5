use crate::report::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::HashMap;

pub const DEFAULT_URL: &str = "https://dshs.texas.gov/coronavirus/TexasCOVID19CaseCountData.xlsx";
pub const DEFAULT_WORKBOOK_PATH: &str = "TexasCOVID19CaseCountData.xlsx";
pub const DEFAULT_OUTPUT_PATH: &str = "TexasCOVID19CaseCountData.json";
// 2020 census redistricting data, county level:
// https://demographics.texas.gov/Resources/Decennial/2020/Redistrict/pl94-171/csvdata/totpop/sumlev/tx48s050.zip
pub const DEFAULT_POPULATION_PATH: &str = "tx48s050.csv";
pub const DEFAULT_COUNTY_COLUMN: &str = "BASENAME";
pub const DEFAULT_POPULATION_COLUMN: &str = "POP100";

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    pub url: Option<String>,
    #[serde(rename = "workbookPath")]
    pub workbook_path: Option<String>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
    pub attempts: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationSource {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "countyColumn")]
    pub county_column: Option<String>,
    #[serde(rename = "populationColumn")]
    pub population_column: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseSheetSettings {
    #[serde(rename = "sheetNames")]
    pub sheet_names: Option<Vec<String>>,
    #[serde(rename = "countyHeaders")]
    pub county_headers: Option<Vec<String>>,
    #[serde(rename = "casesHeaders")]
    pub cases_headers: Option<Vec<String>>,
    #[serde(rename = "fatalitiesHeaders")]
    pub fatalities_headers: Option<Vec<String>>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct HospitalizationSettings {
    pub enabled: Option<bool>,
    #[serde(rename = "sheetNames")]
    pub sheet_names: Option<Vec<String>>,
    /// Letters ("B") or a 1-based number.
    pub column: Option<JSValue>,
    pub label: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositivitySettings {
    pub enabled: Option<bool>,
    #[serde(rename = "sheetNames")]
    pub sheet_names: Option<Vec<String>>,
    /// A1-style address of the rate.
    pub cell: Option<String>,
    /// When set, the rate is read below the first header cell with one of
    /// these titles, and `cell` is ignored.
    pub headers: Option<Vec<String>>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    #[serde(default)]
    pub population: PopulationSource,
    #[serde(rename = "caseSheet", default)]
    pub case_sheet: CaseSheetSettings,
    #[serde(default)]
    pub hospitalizations: HospitalizationSettings,
    #[serde(rename = "positivityRate", default)]
    pub positivity_rate: PositivitySettings,
    #[serde(rename = "nameRewrites")]
    pub name_rewrites: Option<HashMap<String, String>>,
    #[serde(rename = "statewideLabels")]
    pub statewide_labels: Option<Vec<String>>,
}

impl ReportConfig {
    pub fn extraction_rules(&self) -> ReportResult<ExtractionRules> {
        let defaults = ExtractionRules::default();

        let cs = &self.case_sheet;
        let case_sheet = CaseSheetRules {
            sheet_names: cs
                .sheet_names
                .clone()
                .unwrap_or(defaults.case_sheet.sheet_names),
            county: matcher_or("county", &cs.county_headers, defaults.case_sheet.county),
            cases: matcher_or("cases", &cs.cases_headers, defaults.case_sheet.cases),
            fatalities: matcher_or(
                "fatalities",
                &cs.fatalities_headers,
                defaults.case_sheet.fatalities,
            ),
        };

        let hs = &self.hospitalizations;
        let hospitalizations = match (hs.enabled, defaults.hospitalizations) {
            (Some(false), _) | (_, None) => None,
            (_, Some(d)) => Some(HospitalizationRules {
                sheet_names: hs.sheet_names.clone().unwrap_or(d.sheet_names),
                column: match &hs.column {
                    Some(c) => read_column_index(c)?,
                    None => d.column,
                },
                label: hs.label.clone().unwrap_or(d.label),
            }),
        };

        let ps = &self.positivity_rate;
        let positivity_rate = match (ps.enabled, defaults.positivity_rate) {
            (Some(false), _) | (_, None) => None,
            (_, Some(d)) => Some(PositivityRules {
                sheet_names: ps.sheet_names.clone().unwrap_or(d.sheet_names),
                location: match (&ps.headers, &ps.cell) {
                    (Some(headers), _) => RateLocation::BelowHeader(ColumnMatcher {
                        name: "positivity rate".to_string(),
                        synonyms: headers.clone(),
                    }),
                    (None, Some(cell)) => RateLocation::Cell(parse_cell_address(cell)?),
                    (None, None) => d.location,
                },
            }),
        };

        Ok(ExtractionRules {
            case_sheet,
            hospitalizations,
            positivity_rate,
        })
    }

    pub fn name_rules(&self) -> NameRules {
        let defaults = NameRules::default();
        NameRules {
            rewrites: self.name_rewrites.clone().unwrap_or(defaults.rewrites),
            statewide_labels: self
                .statewide_labels
                .clone()
                .unwrap_or(defaults.statewide_labels),
            total_name: defaults.total_name,
        }
    }

    pub fn population_columns(&self) -> PopulationColumns {
        PopulationColumns {
            county: self
                .population
                .county_column
                .clone()
                .unwrap_or_else(|| DEFAULT_COUNTY_COLUMN.to_string()),
            population: self
                .population
                .population_column
                .clone()
                .unwrap_or_else(|| DEFAULT_POPULATION_COLUMN.to_string()),
        }
    }
}

fn matcher_or(name: &str, headers: &Option<Vec<String>>, default: ColumnMatcher) -> ColumnMatcher {
    match headers {
        Some(synonyms) => ColumnMatcher {
            name: name.to_string(),
            synonyms: synonyms.clone(),
        },
        None => default,
    }
}

pub fn read_config(path: &str) -> ReportResult<ReportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ReportConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// Reads a reference JSON document.
pub fn read_summary(path: &str) -> ReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Zero-based index of a column given as Excel letters or as a 1-based number.
pub fn read_column_index(x: &JSValue) -> ReportResult<usize> {
    match x {
        JSValue::Number(n) => n
            .as_u64()
            .filter(|n| *n >= 1)
            .map(|n| (n - 1) as usize)
            .context(InvalidAddressSnafu {
                address: n.to_string(),
            }),
        JSValue::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(column_letters_to_index(s))
        }
        JSValue::String(s) => s
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .map(|n| n - 1)
            .context(InvalidAddressSnafu { address: s.clone() }),
        _ => None.context(InvalidAddressSnafu {
            address: x.to_string(),
        }),
    }
}

fn column_letters_to_index(s: &str) -> usize {
    s.to_ascii_uppercase()
        .bytes()
        .fold(0, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
        - 1
}

/// Parses an A1-style address ("F3").
pub fn parse_cell_address(s: &str) -> ReportResult<CellAddress> {
    let t = s.trim();
    let split = t
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(t.len());
    let (letters, digits) = t.split_at(split);
    ensure!(
        !letters.is_empty() && !digits.is_empty(),
        InvalidAddressSnafu { address: s }
    );
    let row = digits
        .parse::<usize>()
        .ok()
        .filter(|r| *r >= 1)
        .context(InvalidAddressSnafu { address: s })?;
    Ok(CellAddress {
        row: row - 1,
        column: column_letters_to_index(letters),
    })
}
