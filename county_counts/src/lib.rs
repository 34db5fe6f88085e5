/*!
County-level case and fatality counts, joined with population estimates.

The Texas Department of State Health Services publishes a workbook with one
row per county. This crate turns it into a [Report]: it finds the case table
and the statewide metrics in the workbook ([extract()]), joins each county
with its population ([PopulationTable]) and appends a statewide total computed
from the joined rows ([assemble()]).

The crate does not perform any I/O. Callers are expected to read the workbook
into a [Workbook] of [Cell]s and the population reference into
`(name, population)` pairs.

```
use county_counts::*;

let names = NameRules::default();
let populations = PopulationTable::from_records(
    vec![("A".to_string(), 100), ("B".to_string(), 200)],
    &names,
)?;
let rows = vec![
    CountyCaseRecord { county: "A".to_string(), cases: 10, fatalities: 1 },
    CountyCaseRecord { county: "B".to_string(), cases: 5, fatalities: 0 },
];
let assembly = assemble(&rows, &populations, &names, Some(42), Some(0.085), "today")?;
let total = assembly.report.total().unwrap();
assert_eq!((total.cases, total.fatalities, total.population), (15, 1, 300));
# Ok::<(), CountsError>(())
```
*/

mod cell;
mod config;
mod extract;
mod reference;

use log::{debug, info, warn};
use std::collections::HashSet;

pub use crate::cell::*;
pub use crate::config::*;
pub use crate::extract::*;
pub use crate::reference::*;

/// The report and the rows that had to be left out of it.
#[derive(PartialEq, Debug, Clone)]
pub struct Assembly {
    pub report: Report,
    pub warnings: Vec<CountsError>,
}

/// Joins the case rows with the populations and appends the statewide total.
///
/// Rows for unknown counties are excluded and reported as warnings. A
/// statewide row present in the case sheet is dropped: the total is always
/// recomputed from the joined counties. A total that does not fit in a `u64`
/// is a [CountsError::DataFormat].
pub fn assemble(
    case_rows: &[CountyCaseRecord],
    populations: &PopulationTable,
    names: &NameRules,
    hospitalizations: Option<u64>,
    positivity_rate: Option<f64>,
    report_date: &str,
) -> CountsResult<Assembly> {
    let mut counts: Vec<EnrichedCountyRecord> = Vec::new();
    let mut warnings: Vec<CountsError> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for row in case_rows.iter() {
        let county = names.canonical(&row.county);
        if names.is_statewide(&county) {
            debug!("assemble: dropping the source total row {:?}", row);
            continue;
        }
        let population = match populations.get(&county) {
            Some(p) => p,
            None => {
                let err = CountsError::UnknownCounty { county };
                warn!("assemble: excluding row: {}", err);
                warnings.push(err);
                continue;
            }
        };
        if !seen.insert(county.clone()) {
            let err = CountsError::RepeatedCounty { county };
            warn!("assemble: excluding row: {}", err);
            warnings.push(err);
            continue;
        }
        counts.push(EnrichedCountyRecord {
            county,
            cases: row.cases,
            fatalities: row.fatalities,
            population,
        });
    }

    if counts.is_empty() {
        warn!("assemble: no county could be joined, the statewide total is zero");
    }
    let total = total_row(&counts, &names.total_name)?;
    if let Some(reference_total) = populations.statewide() {
        if reference_total != total.population {
            info!(
                "assemble: population of the joined counties is {}, the reference states {}",
                total.population, reference_total
            );
        }
    }
    info!(
        "assemble: {} counties, {} cases, {} fatalities",
        counts.len(),
        total.cases,
        total.fatalities
    );
    counts.push(total);

    Ok(Assembly {
        report: Report {
            date: report_date.to_string(),
            hospitalizations,
            positivity_rate,
            counts,
        },
        warnings,
    })
}

fn total_row(counts: &[EnrichedCountyRecord], name: &str) -> CountsResult<EnrichedCountyRecord> {
    let sum = |field: &str, f: fn(&EnrichedCountyRecord) -> u64| -> CountsResult<u64> {
        counts
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(f(r)))
            .ok_or_else(|| CountsError::DataFormat {
                message: format!("the statewide {} do not fit in a 64-bit integer", field),
            })
    };
    Ok(EnrichedCountyRecord {
        county: name.to_string(),
        cases: sum("cases", |r| r.cases)?,
        fatalities: sum("fatalities", |r| r.fatalities)?,
        population: sum("population", |r| r.population)?,
    })
}

/// Runs the extraction and the assembly on a workbook.
///
/// The warnings of both stages are concatenated.
pub fn build_report(
    workbook: &Workbook,
    populations: &PopulationTable,
    rules: &ExtractionRules,
    names: &NameRules,
) -> CountsResult<Assembly> {
    let extraction = extract(workbook, rules)?;
    let mut assembly = assemble(
        &extraction.case_rows,
        populations,
        names,
        extraction.hospitalizations,
        extraction.positivity_rate,
        &extraction.report_date,
    )?;
    let mut warnings = extraction.warnings;
    warnings.append(&mut assembly.warnings);
    assembly.warnings = warnings;
    Ok(assembly)
}
