// Primitives for reading the population reference (CSV).

use std::io::Read;

use csv::Reader;

use crate::report::*;

/// The two columns of the reference that are used. Their names change with
/// each vintage of the estimates (`county`/`jan1_2020_pop_est` for the
/// yearly estimates, `BASENAME`/`POP100` for the 2020 census).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PopulationColumns {
    pub county: String,
    pub population: String,
}

pub fn load_population_reference(
    path: &str,
    columns: &PopulationColumns,
    names: &NameRules,
) -> ReportResult<PopulationTable> {
    info!("Reading population reference {:?}", path);
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    read_population(rdr, columns, names, path)
}

pub fn read_population<R: Read>(
    mut rdr: Reader<R>,
    columns: &PopulationColumns,
    names: &NameRules,
    path: &str,
) -> ReportResult<PopulationTable> {
    let header = rdr
        .headers()
        .context(CsvLineParseSnafu { path, lineno: 1usize })?
        .clone();
    debug!("read_population: header: {:?}", header);
    let county_idx = column_position(&header, &columns.county, path)?;
    let population_idx = column_position(&header, &columns.population, path)?;

    let mut records: Vec<(String, u64)> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let county = line
            .get(county_idx)
            .context(CsvLineTooShortSnafu { path, lineno })?;
        if county.trim().is_empty() {
            continue;
        }
        let raw_population = line
            .get(population_idx)
            .context(CsvLineTooShortSnafu { path, lineno })?;
        let population = Cell::text(raw_population)
            .to_count()
            .map_err(|reason| ReportError::InvalidPopulation {
                path: path.to_string(),
                lineno,
                reason,
            })?;
        records.push((county.to_string(), population));
    }

    let table = PopulationTable::from_records(records, names).context(CountsSnafu {})?;
    info!(
        "Read {} county populations (statewide: {:?})",
        table.len(),
        table.statewide()
    );
    Ok(table)
}

fn column_position(header: &csv::StringRecord, column: &str, path: &str) -> ReportResult<usize> {
    header
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
        .context(MissingColumnSnafu { column, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &str, county: &str, population: &str) -> ReportResult<PopulationTable> {
        let rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());
        read_population(
            rdr,
            &PopulationColumns {
                county: county.to_string(),
                population: population.to_string(),
            },
            &NameRules::default(),
            "test.csv",
        )
    }

    #[test]
    fn census_layout() {
        let data = "\u{feff}SUMLEV,BASENAME,POP100\n050,Anderson,57922\n050,De Witt,19824\n";
        let t = read(data, "BASENAME", "POP100").unwrap();
        assert_eq!(t.get("Anderson"), Some(57922));
        assert_eq!(t.get("DeWitt"), Some(19824));
        assert_eq!(t.statewide(), None);
    }

    #[test]
    fn yearly_estimate_layout() {
        let data = "FIPS,county,jan1_2019_pop_est,jan1_2020_pop_est\n\
                    48,State of Texas,\"28,995,881\",29360759\n\
                    48001,Anderson,58057,58199\n";
        let t = read(data, "county", "jan1_2020_pop_est").unwrap();
        assert_eq!(t.get("Anderson"), Some(58199));
        assert_eq!(t.statewide(), Some(29360759));
        let t = read(data, "county", "jan1_2019_pop_est").unwrap();
        assert_eq!(t.statewide(), Some(28995881));
    }

    #[test]
    fn missing_column() {
        let res = read("county,pop\nA,1\n", "county", "POP100");
        assert!(matches!(
            res,
            Err(ReportError::MissingColumn { column, .. }) if column == "POP100"
        ));
    }

    #[test]
    fn bad_population() {
        let res = read("county,pop\nA,1\nB,many\n", "county", "pop");
        assert!(matches!(
            res,
            Err(ReportError::InvalidPopulation { lineno: 3, .. })
        ));
    }

    #[test]
    fn duplicate_county() {
        let res = read("county,pop\nDe Witt,1\nDeWitt,2\n", "county", "pop");
        assert!(matches!(
            res,
            Err(ReportError::Counts {
                source: CountsError::DuplicateKey { .. }
            })
        ));
    }
}
