use log::debug;
use std::collections::HashMap;

use crate::config::*;

/// County populations indexed by canonical county name.
///
/// The statewide aggregate, if the reference carries one, is kept apart from
/// the counties. There is no way to modify the table once built.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PopulationTable {
    counties: HashMap<String, u64>,
    statewide: Option<u64>,
}

impl PopulationTable {
    /// Builds the table from raw `(county name, population)` pairs.
    ///
    /// Names are canonicalized with the name rules. Blank names are skipped.
    /// Two rows resolving to the same name is an error.
    pub fn from_records<I>(records: I, names: &NameRules) -> CountsResult<PopulationTable>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut counties: HashMap<String, u64> = HashMap::new();
        let mut statewide: Option<u64> = None;
        for (raw_name, population) in records {
            if raw_name.trim().is_empty() {
                debug!("from_records: skipping blank county name");
                continue;
            }
            let county = names.canonical(&raw_name);
            if county == names.total_name {
                if statewide.is_some() {
                    return Err(CountsError::DuplicateKey { county });
                }
                debug!("from_records: statewide population {:?}", population);
                statewide = Some(population);
                continue;
            }
            if counties.insert(county.clone(), population).is_some() {
                return Err(CountsError::DuplicateKey { county });
            }
        }
        if counties.is_empty() {
            return Err(CountsError::DataFormat {
                message: "the population reference does not contain any county".to_string(),
            });
        }
        Ok(PopulationTable {
            counties,
            statewide,
        })
    }

    /// The population of a county, by canonical name.
    pub fn get(&self, county: &str) -> Option<u64> {
        self.counties.get(county).cloned()
    }

    /// The statewide population as stated by the reference itself.
    pub fn statewide(&self) -> Option<u64> {
        self.statewide
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    /// All the county records, sorted by name.
    pub fn records(&self) -> Vec<CountyPopulationRecord> {
        let mut res: Vec<CountyPopulationRecord> = self
            .counties
            .iter()
            .map(|(county, population)| CountyPopulationRecord {
                county: county.clone(),
                population: *population,
            })
            .collect();
        res.sort_by(|a, b| a.county.cmp(&b.county));
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recs(xs: &[(&str, u64)]) -> Vec<(String, u64)> {
        xs.iter().map(|(n, p)| (n.to_string(), *p)).collect()
    }

    #[test]
    fn legacy_spelling_is_rewritten() {
        let t = PopulationTable::from_records(
            recs(&[("De Witt", 20_000), ("Harris", 4_700_000)]),
            &NameRules::default(),
        )
        .unwrap();
        assert_eq!(t.get("DeWitt"), Some(20_000));
        assert_eq!(t.get("De Witt"), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn state_of_texas_becomes_the_statewide_record() {
        let t = PopulationTable::from_records(
            recs(&[("State of Texas", 300), ("A", 100), ("B", 200)]),
            &NameRules::default(),
        )
        .unwrap();
        assert_eq!(t.statewide(), Some(300));
        assert_eq!(t.get("Total"), None);
        assert_eq!(t.len(), 2);
        let names: Vec<String> = t.records().into_iter().map(|r| r.county).collect();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn duplicates_after_normalization_are_rejected() {
        let res = PopulationTable::from_records(
            recs(&[("DeWitt", 1), ("De  Witt", 2)]),
            &NameRules::default(),
        );
        assert_eq!(
            res,
            Err(CountsError::DuplicateKey {
                county: "DeWitt".to_string()
            })
        );
    }

    #[test]
    fn empty_reference_is_a_format_error() {
        let res = PopulationTable::from_records(recs(&[("  ", 5)]), &NameRules::default());
        assert!(matches!(res, Err(CountsError::DataFormat { .. })));
    }
}
