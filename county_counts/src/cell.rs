// The in-memory representation of a workbook and the coercion rules applied
// to its cells.

use chrono::{NaiveDateTime, Timelike};

use crate::config::collapse_whitespace;

/// The content of a spreadsheet cell.
///
/// Readers of actual files convert their own cell types into this one.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Blank,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// A formula error such as `#DIV/0!`.
    Error(String),
}

impl Cell {
    pub fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    /// Empty cells and cells with only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Blank => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Renders the cell the way it would be displayed in a report.
    pub fn display(&self) -> String {
        match self {
            Cell::Blank => "".to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => collapse_whitespace(s),
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(dt) if dt.num_seconds_from_midnight() == 0 => {
                dt.format("%Y-%m-%d").to_string()
            }
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Error(e) => e.clone(),
        }
    }

    /// A non-negative integer count.
    ///
    /// Floats must be integral, text may use thousands separators.
    pub fn to_count(&self) -> Result<u64, String> {
        let x = match self {
            Cell::Blank => return Err("blank cell".to_string()),
            Cell::Int(i) if *i >= 0 => *i as u64,
            Cell::Float(f) => float_to_count(*f)?,
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    return Err("blank cell".to_string());
                }
                match cleaned.parse::<u64>() {
                    Ok(x) => x,
                    Err(_) => match cleaned.parse::<f64>() {
                        Ok(f) => float_to_count(f)?,
                        Err(_) => return Err(format!("not a number: {:?}", s)),
                    },
                }
            }
            _ => return Err(format!("expected a count, found {:?}", self)),
        };
        if x > MAX_COUNT {
            return Err(format!("count too large: {}", x));
        }
        Ok(x)
    }

    /// A fraction in [0, 1].
    ///
    /// Text ending with `%` is read as a percentage, anything else must
    /// already be a fraction.
    pub fn to_fraction(&self) -> Result<f64, String> {
        let x = match self {
            Cell::Float(f) => *f,
            Cell::Int(i) => *i as f64,
            Cell::Text(s) => {
                let t = s.trim();
                if let Some(pct) = t.strip_suffix('%') {
                    pct.trim()
                        .parse::<f64>()
                        .map(|p| p / 100.0)
                        .map_err(|_| format!("not a percentage: {:?}", s))?
                } else {
                    t.parse::<f64>()
                        .map_err(|_| format!("not a percentage or a fraction: {:?}", s))?
                }
            }
            _ => return Err(format!("expected a rate, found {:?}", self)),
        };
        if x.is_finite() && (0.0..=1.0).contains(&x) {
            Ok(x)
        } else {
            Err(format!("rate out of range: {}", x))
        }
    }
}

/// Larger values are typing errors: sums of counts must fit in a `u64`.
pub const MAX_COUNT: u64 = 1 << 40;

fn float_to_count(f: f64) -> Result<u64, String> {
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 {
        Ok(f as u64)
    } else {
        Err(format!("not a whole non-negative number: {}", f))
    }
}

/// A named grid of cells. Rows may have different lengths; missing cells are
/// blank.
#[derive(PartialEq, Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

static BLANK: Cell = Cell::Blank;

impl Sheet {
    pub fn new(name: &str, rows: Vec<Vec<Cell>>) -> Sheet {
        Sheet {
            name: name.to_string(),
            rows,
        }
    }

    pub fn get(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&BLANK)
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .map(|r| r.iter().all(|c| c.is_blank()))
            .unwrap_or(true)
    }
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Workbook {
        Workbook { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// The first sheet present among the candidate names.
    pub fn find_sheet(&self, names: &[String]) -> Option<&Sheet> {
        names.iter().find_map(|n| self.sheet(n))
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn counts_from_mixed_cells() {
        assert_eq!(Cell::Int(12).to_count(), Ok(12));
        assert_eq!(Cell::Float(12.0).to_count(), Ok(12));
        assert_eq!(Cell::text(" 1,234 ").to_count(), Ok(1234));
        assert_eq!(Cell::text("56.0").to_count(), Ok(56));
        assert!(Cell::Float(1.5).to_count().is_err());
        assert!(Cell::Int(-3).to_count().is_err());
        assert!(Cell::text("n/a").to_count().is_err());
        assert!(Cell::Blank.to_count().is_err());
    }

    #[test]
    fn huge_counts_are_rejected() {
        assert_eq!(Cell::Int(MAX_COUNT as i64).to_count(), Ok(MAX_COUNT));
        assert!(Cell::Int(MAX_COUNT as i64 + 1).to_count().is_err());
        assert!(Cell::text("18446744073709551615").to_count().is_err());
        assert!(Cell::Float(18446744073709551616.0).to_count().is_err());
    }

    #[test]
    fn percentages_and_fractions_agree() {
        assert_eq!(Cell::text("8.5%").to_fraction(), Ok(0.085));
        assert_eq!(Cell::Float(0.085).to_fraction(), Ok(0.085));
        assert_eq!(Cell::text("0.085").to_fraction(), Ok(0.085));
        assert_eq!(Cell::text("12 %").to_fraction(), Ok(0.12));
        assert!(Cell::Float(8.5).to_fraction().is_err());
        assert!(Cell::text("high").to_fraction().is_err());
        assert!(Cell::Blank.to_fraction().is_err());
    }

    #[test]
    fn dates_display_without_midnight() {
        let d = NaiveDate::from_ymd_opt(2021, 10, 18).unwrap();
        assert_eq!(
            Cell::DateTime(d.and_hms_opt(0, 0, 0).unwrap()).display(),
            "2021-10-18"
        );
        assert_eq!(
            Cell::DateTime(d.and_hms_opt(15, 30, 0).unwrap()).display(),
            "2021-10-18 15:30:00"
        );
    }

    #[test]
    fn sheet_lookup_by_variants() {
        let wb = Workbook::new(vec![
            Sheet::new("Tests by Day", vec![]),
            Sheet::new("Case and Fatalities", vec![vec![Cell::text("x")]]),
        ]);
        let names = vec![
            "Case and Fatalities_ALL".to_string(),
            "Case and Fatalities".to_string(),
        ];
        let s = wb.find_sheet(&names).unwrap();
        assert_eq!(s.name, "Case and Fatalities");
        assert_eq!(s.get(0, 0), &Cell::text("x"));
        assert_eq!(s.get(5, 5), &Cell::Blank);
        assert!(s.is_blank_row(1));
    }
}
