/*!
Extraction of the case table and of the scalar metrics from a workbook.

The layout of the source workbook changes between releases: the header row
moves down when notes are added above it, the column titles change spelling
and the sheets get renamed. Nothing here relies on a fixed row index for the
case table. The header row is found by scanning for a row in which every
required [ColumnMatcher] recognizes a cell, and the data is read from the row
after it until the first blank row.
*/

use log::{debug, info, warn};

use crate::cell::{Cell, Sheet, Workbook};
use crate::config::*;

/// Everything read from the workbook.
///
/// `warnings` holds the rows that were skipped because they could not be
/// read.
#[derive(PartialEq, Debug, Clone)]
pub struct Extraction {
    pub report_date: String,
    pub case_rows: Vec<CountyCaseRecord>,
    pub hospitalizations: Option<u64>,
    pub positivity_rate: Option<f64>,
    pub warnings: Vec<CountsError>,
}

/// Column positions of the case table.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct HeaderRow {
    pub row: usize,
    pub county: usize,
    pub cases: usize,
    pub fatalities: usize,
}

pub fn extract(workbook: &Workbook, rules: &ExtractionRules) -> CountsResult<Extraction> {
    let case_sheet = find_sheet(workbook, &rules.case_sheet.sheet_names)?;
    info!("extract: reading case sheet {:?}", case_sheet.name);
    let header = locate_header(case_sheet, &rules.case_sheet)?;
    debug!("extract: header {:?}", header);

    let report_date = read_report_date(case_sheet, &header)?;
    let (case_rows, warnings) = read_case_rows(case_sheet, &header);
    info!(
        "extract: {} case rows, {} skipped",
        case_rows.len(),
        warnings.len()
    );

    let hospitalizations = match &rules.hospitalizations {
        Some(r) => Some(read_hospitalizations(workbook, r)?),
        None => None,
    };
    let positivity_rate = match &rules.positivity_rate {
        Some(r) => Some(read_positivity_rate(workbook, r)?),
        None => None,
    };

    Ok(Extraction {
        report_date,
        case_rows,
        hospitalizations,
        positivity_rate,
        warnings,
    })
}

fn find_sheet<'a>(workbook: &'a Workbook, names: &[String]) -> CountsResult<&'a Sheet> {
    workbook
        .find_sheet(names)
        .ok_or_else(|| CountsError::DataFormat {
            message: format!(
                "none of the sheets {:?} is in the workbook (found {:?})",
                names,
                workbook.sheet_names()
            ),
        })
}

fn find_column(row: &[Cell], matcher: &ColumnMatcher) -> Option<usize> {
    row.iter()
        .position(|c| c.as_text().map(|t| matcher.matches(t)).unwrap_or(false))
}

/// Finds the first row holding all the required column titles.
pub fn locate_header(sheet: &Sheet, rules: &CaseSheetRules) -> CountsResult<HeaderRow> {
    for (idx, row) in sheet.rows.iter().enumerate() {
        let county = find_column(row, &rules.county);
        let cases = find_column(row, &rules.cases);
        let fatalities = find_column(row, &rules.fatalities);
        if let (Some(county), Some(cases), Some(fatalities)) = (county, cases, fatalities) {
            return Ok(HeaderRow {
                row: idx,
                county,
                cases,
                fatalities,
            });
        }
    }
    Err(CountsError::DataFormat {
        message: format!(
            "no header row with columns {:?}, {:?} and {:?} in sheet {:?}",
            rules.county.synonyms, rules.cases.synonyms, rules.fatalities.synonyms, sheet.name
        ),
    })
}

/// The title of the case sheet, which carries the publication date.
/// It is the first non-blank cell above the header row.
fn read_report_date(sheet: &Sheet, header: &HeaderRow) -> CountsResult<String> {
    let title = sheet.rows[..header.row]
        .iter()
        .find_map(|row| row.iter().find(|c| !c.is_blank()));
    match title {
        Some(c) => Ok(c.display()),
        None => Err(CountsError::MalformedRow {
            sheet: sheet.name.clone(),
            location: format!("row {}", header.row + 1),
            reason: "no title above the header row to read the report date from".to_string(),
        }),
    }
}

/// Reads the data rows below the header, until the first blank row.
///
/// Rows that cannot be read are skipped and returned as errors.
pub fn read_case_rows(
    sheet: &Sheet,
    header: &HeaderRow,
) -> (Vec<CountyCaseRecord>, Vec<CountsError>) {
    let mut res: Vec<CountyCaseRecord> = Vec::new();
    let mut skipped: Vec<CountsError> = Vec::new();
    for idx in (header.row + 1)..sheet.rows.len() {
        if sheet.is_blank_row(idx) {
            debug!("read_case_rows: blank row {}, end of the table", idx + 1);
            break;
        }
        let county_cell = sheet.get(idx, header.county);
        if county_cell.is_blank() {
            debug!("read_case_rows: no county in row {}", idx + 1);
            continue;
        }
        let county = county_cell.display();
        let cases_cell = sheet.get(idx, header.cases);
        let fatalities_cell = sheet.get(idx, header.fatalities);
        let counts = cases_cell
            .to_count()
            .map_err(|e| format!("cases for {:?}: {}", county, e))
            .and_then(|cases| {
                fatalities_cell
                    .to_count()
                    .map(|fatalities| (cases, fatalities))
                    .map_err(|e| format!("fatalities for {:?}: {}", county, e))
            });
        match counts {
            Ok((cases, fatalities)) => {
                if fatalities > cases {
                    warn!(
                        "read_case_rows: {:?} reports more fatalities ({}) than cases ({})",
                        county, fatalities, cases
                    );
                }
                res.push(CountyCaseRecord {
                    county,
                    cases,
                    fatalities,
                });
            }
            Err(reason) => {
                let err = CountsError::MalformedRow {
                    sheet: sheet.name.clone(),
                    location: format!("row {}", idx + 1),
                    reason,
                };
                warn!("read_case_rows: skipping row: {}", err);
                skipped.push(err);
            }
        }
    }
    (res, skipped)
}

fn read_hospitalizations(workbook: &Workbook, rules: &HospitalizationRules) -> CountsResult<u64> {
    let sheet = find_sheet(workbook, &rules.sheet_names)?;
    let col = rules.column;
    let malformed = |row: usize, reason: String| CountsError::MalformedRow {
        sheet: sheet.name.clone(),
        location: CellAddress { row, column: col }.to_string(),
        reason,
    };

    let label_row = (0..sheet.rows.len()).find(|r| {
        sheet
            .get(*r, col)
            .as_text()
            .map(|t| t.trim().eq_ignore_ascii_case(rules.label.trim()))
            .unwrap_or(false)
    });

    let res = if let Some(label_row) = label_row {
        // The value sits under its label.
        let value_row = ((label_row + 1)..sheet.rows.len())
            .find(|r| !sheet.get(*r, col).is_blank())
            .ok_or_else(|| malformed(label_row, format!("no value below {:?}", rules.label)))?;
        sheet
            .get(value_row, col)
            .to_count()
            .map_err(|e| malformed(value_row, e))?
    } else {
        // A series by day: the last entry is the most recent one.
        (0..sheet.rows.len())
            .rev()
            .find_map(|r| sheet.get(r, col).to_count().ok())
            .ok_or_else(|| malformed(0, "no hospitalization count in the column".to_string()))?
    };
    info!("read_hospitalizations: {} in sheet {:?}", res, sheet.name);
    Ok(res)
}

fn read_positivity_rate(workbook: &Workbook, rules: &PositivityRules) -> CountsResult<f64> {
    let sheet = find_sheet(workbook, &rules.sheet_names)?;
    let address = match &rules.location {
        RateLocation::Cell(address) => *address,
        RateLocation::BelowHeader(matcher) => locate_below_header(sheet, matcher)?,
    };
    let cell = sheet.get(address.row, address.column);
    debug!("read_positivity_rate: {} = {:?}", address, cell);
    cell.to_fraction()
        .map_err(|reason| CountsError::MalformedRow {
            sheet: sheet.name.clone(),
            location: address.to_string(),
            reason,
        })
}

fn locate_below_header(sheet: &Sheet, matcher: &ColumnMatcher) -> CountsResult<CellAddress> {
    for (row, cells) in sheet.rows.iter().enumerate() {
        if let Some(column) = find_column(cells, matcher) {
            return ((row + 1)..sheet.rows.len())
                .find(|r| !sheet.get(*r, column).is_blank())
                .map(|r| CellAddress { row: r, column })
                .ok_or_else(|| CountsError::MalformedRow {
                    sheet: sheet.name.clone(),
                    location: CellAddress { row, column }.to_string(),
                    reason: format!("no value below the {} header", matcher.name),
                });
        }
    }
    Err(CountsError::DataFormat {
        message: format!(
            "no {} header ({:?}) in sheet {:?}",
            matcher.name, matcher.synonyms, sheet.name
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn case_sheet(name: &str, data: Vec<Vec<Cell>>) -> Sheet {
        let mut rows = vec![
            vec![t("Texas COVID-19 Cases and Fatalities by County as of 10/18/2021")],
            vec![],
            vec![
                t("County"),
                t("Confirmed\nCases"),
                t("Probable Cases"),
                t("Fatalities"),
            ],
        ];
        rows.extend(data);
        Sheet::new(name, rows)
    }

    fn scalar_sheets() -> Vec<Sheet> {
        vec![
            Sheet::new(
                "Hospitalizations",
                vec![
                    vec![t("COVID-19 Hospitalizations")],
                    vec![],
                    vec![Cell::Blank, t("Count")],
                    vec![t("Total"), Cell::Float(5432.0)],
                ],
            ),
            Sheet::new(
                "Molecular Positivity Rate",
                vec![
                    vec![t("Positivity")],
                    vec![],
                    vec![
                        Cell::Blank,
                        Cell::Blank,
                        Cell::Blank,
                        Cell::Blank,
                        Cell::Blank,
                        t("8.5%"),
                    ],
                ],
            ),
        ]
    }

    fn workbook(data: Vec<Vec<Cell>>) -> Workbook {
        let mut sheets = vec![case_sheet("Case and Fatalities_ALL", data)];
        sheets.extend(scalar_sheets());
        Workbook::new(sheets)
    }

    #[test]
    fn extracts_everything_from_a_release() {
        let _ = env_logger::builder().is_test(true).try_init();
        let wb = workbook(vec![
            vec![t("Anderson"), Cell::Int(10), Cell::Int(99), Cell::Int(1)],
            vec![t("Andrews"), t("5"), Cell::Int(99), Cell::Float(0.0)],
            vec![],
            vec![t("Note: probable cases are not included")],
        ]);
        let ex = extract(&wb, &ExtractionRules::default()).unwrap();
        assert_eq!(
            ex.report_date,
            "Texas COVID-19 Cases and Fatalities by County as of 10/18/2021"
        );
        assert_eq!(
            ex.case_rows,
            vec![
                CountyCaseRecord {
                    county: "Anderson".to_string(),
                    cases: 10,
                    fatalities: 1
                },
                CountyCaseRecord {
                    county: "Andrews".to_string(),
                    cases: 5,
                    fatalities: 0
                },
            ]
        );
        assert_eq!(ex.hospitalizations, Some(5432));
        assert_eq!(ex.positivity_rate, Some(0.085));
        assert!(ex.warnings.is_empty());
    }

    #[test]
    fn header_is_found_below_notes() {
        let sheet = case_sheet("Case and Fatalities", vec![]);
        let header = locate_header(&sheet, &ExtractionRules::default().case_sheet).unwrap();
        assert_eq!(
            header,
            HeaderRow {
                row: 2,
                county: 0,
                cases: 1,
                fatalities: 3
            }
        );
    }

    #[test]
    fn missing_header_is_a_format_error() {
        let sheet = Sheet::new(
            "Case and Fatalities",
            vec![vec![t("County"), t("Probable Cases"), t("Fatalities")]],
        );
        let res = locate_header(&sheet, &ExtractionRules::default().case_sheet);
        assert!(matches!(res, Err(CountsError::DataFormat { .. })));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let wb = workbook(vec![
            vec![t("Anderson"), t("n/a"), Cell::Blank, Cell::Int(1)],
            vec![t("Andrews"), Cell::Int(5), Cell::Blank, Cell::Int(0)],
            vec![t("Angelina"), Cell::Int(7), Cell::Blank, Cell::Float(1.5)],
        ]);
        let ex = extract(&wb, &ExtractionRules::default()).unwrap();
        let names: Vec<&str> = ex.case_rows.iter().map(|r| r.county.as_str()).collect();
        assert_eq!(names, vec!["Andrews"]);
        assert_eq!(ex.warnings.len(), 2);
        assert!(matches!(
            &ex.warnings[0],
            CountsError::MalformedRow { location, .. } if location == "row 4"
        ));
    }

    #[test]
    fn county_without_counts_is_reported() {
        let wb = workbook(vec![
            vec![t("Anderson"), Cell::Blank, Cell::Blank, Cell::Blank],
            vec![t("Andrews"), Cell::Int(5), Cell::Blank, Cell::Int(0)],
        ]);
        let ex = extract(&wb, &ExtractionRules::default()).unwrap();
        let names: Vec<&str> = ex.case_rows.iter().map(|r| r.county.as_str()).collect();
        assert_eq!(names, vec!["Andrews"]);
        assert_eq!(
            ex.warnings,
            vec![CountsError::MalformedRow {
                sheet: "Case and Fatalities_ALL".to_string(),
                location: "row 4".to_string(),
                reason: "cases for \"Anderson\": blank cell".to_string(),
            }]
        );
    }

    #[test]
    fn oversized_count_is_reported() {
        let wb = workbook(vec![
            vec![t("Anderson"), t("18446744073709551615"), Cell::Blank, Cell::Int(1)],
            vec![t("Andrews"), Cell::Int(5), Cell::Blank, Cell::Int(0)],
        ]);
        let ex = extract(&wb, &ExtractionRules::default()).unwrap();
        assert_eq!(ex.case_rows.len(), 1);
        assert_eq!(ex.warnings.len(), 1);
    }

    #[test]
    fn missing_sheet_is_a_format_error() {
        let wb = Workbook::new(vec![case_sheet("Case and Fatalities", vec![])]);
        let res = extract(&wb, &ExtractionRules::default());
        assert!(matches!(res, Err(CountsError::DataFormat { .. })));
    }

    #[test]
    fn header_in_first_row_has_no_date() {
        let wb = Workbook::new(vec![Sheet::new(
            "Case and Fatalities",
            vec![
                vec![t("County"), t("Cases"), t("Fatalities")],
                vec![t("A"), Cell::Int(1), Cell::Int(0)],
            ],
        )]);
        let rules = ExtractionRules {
            hospitalizations: None,
            positivity_rate: None,
            ..ExtractionRules::default()
        };
        let res = extract(&wb, &rules);
        assert!(matches!(res, Err(CountsError::MalformedRow { .. })));
    }

    #[test]
    fn hospitalizations_by_day_use_the_latest_entry() {
        let mut wb = workbook(vec![]);
        wb.sheets[1] = Sheet::new(
            "Hospitalization by Day",
            vec![
                vec![t("Date"), t("Hospitalizations")],
                vec![t("10/16/2021"), Cell::Int(6100)],
                vec![t("10/17/2021"), Cell::Int(6050)],
                vec![t("10/18/2021"), Cell::Blank],
            ],
        );
        let ex = extract(&wb, &ExtractionRules::default()).unwrap();
        assert_eq!(ex.hospitalizations, Some(6050));
    }

    #[test]
    fn unreadable_positivity_rate_is_fatal() {
        let mut wb = workbook(vec![]);
        wb.sheets[2].rows[2][5] = t("pending");
        let res = extract(&wb, &ExtractionRules::default());
        assert_eq!(
            res,
            Err(CountsError::MalformedRow {
                sheet: "Molecular Positivity Rate".to_string(),
                location: "F3".to_string(),
                reason: "not a percentage or a fraction: \"pending\"".to_string(),
            })
        );
    }

    #[test]
    fn positivity_rate_below_its_header() {
        let mut wb = workbook(vec![]);
        wb.sheets[2] = Sheet::new(
            "Tests by Day",
            vec![
                vec![t("Date"), t("Molecular Tests"), t("Positivity Rate")],
                vec![],
                vec![t("10/18/2021"), Cell::Int(51234), Cell::Float(0.085)],
            ],
        );
        let mut rules = ExtractionRules::default();
        rules.positivity_rate = Some(PositivityRules {
            sheet_names: vec!["Tests by Day".to_string()],
            location: RateLocation::BelowHeader(ColumnMatcher::new(
                "positivity rate",
                &["Positivity Rate"],
            )),
        });
        let ex = extract(&wb, &rules).unwrap();
        assert_eq!(ex.positivity_rate, Some(0.085));
    }
}
