//! Tabular dataset loaded from CSV
//!
//! Columns are typed on load: a column is numeric when every present cell
//! parses as a float, otherwise it is text. Empty cells and the usual NA
//! markers are treated as missing.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Cell contents treated as missing values
const NA_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            Column::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Numeric(v) => v[row].is_none(),
            Column::Text(v) => v[row].is_none(),
        }
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        fn retain<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut row = 0;
            values.retain(|_| {
                let k = keep[row];
                row += 1;
                k
            });
        }
        match self {
            Column::Numeric(v) => retain(v, keep),
            Column::Text(v) => retain(v, keep),
        }
    }

    /// Fill missing cells; returns how many were filled
    fn impute(&mut self) -> usize {
        let missing = self.missing_count();
        if missing == 0 {
            return 0;
        }
        match self {
            Column::Numeric(values) => {
                let Some(fill) = median(values.iter().flatten().copied().collect()) else {
                    return 0;
                };
                values.iter_mut().filter(|c| c.is_none()).for_each(|c| *c = Some(fill));
            }
            Column::Text(values) => {
                let Some(fill) = mode(values.iter().flatten().map(String::as_str)) else {
                    return 0;
                };
                values
                    .iter_mut()
                    .filter(|c| c.is_none())
                    .for_each(|c| *c = Some(fill.clone()));
            }
        }
        missing
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent value; ties go to the lexicographically smallest
fn mode<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

fn parse_cell(raw: &str) -> Option<&str> {
    let cell = raw.trim();
    (!NA_MARKERS.contains(&cell)).then_some(cell)
}

/// Column-oriented table with named columns in file order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Dataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open dataset {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to load dataset {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let names: Vec<String> = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed CSV record {}", line + 2))?;
            for (col, cell) in record.iter().enumerate() {
                raw[col].push(parse_cell(cell).map(str::to_string));
            }
        }

        let columns = raw
            .into_iter()
            .map(|cells| {
                let parsed: Option<Vec<Option<f64>>> = cells
                    .iter()
                    .map(|c| match c {
                        None => Some(None),
                        Some(s) => s.parse::<f64>().ok().map(Some),
                    })
                    .collect();
                match parsed {
                    Some(values) => Column::Numeric(values),
                    None => Column::Text(cells),
                }
            })
            .collect();

        let dataset = Self { names, columns };
        debug!(
            rows = dataset.n_rows(),
            columns = dataset.n_columns(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Fully populated numeric column
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        match self.column(name) {
            None => bail!("Column '{}' not found in dataset", name),
            Some(Column::Text(_)) => bail!("Column '{}' is not numeric", name),
            Some(Column::Numeric(values)) => values
                .iter()
                .enumerate()
                .map(|(row, v)| {
                    (*v).with_context(|| {
                        format!("Column '{}' has a missing value at row {}", name, row)
                    })
                })
                .collect(),
        }
    }

    /// Add a numeric column, replacing one with the same name
    pub fn insert_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if !self.columns.is_empty() && values.len() != self.n_rows() {
            bail!(
                "Column '{}' has {} values but dataset has {} rows",
                name,
                values.len(),
                self.n_rows()
            );
        }
        let column = Column::Numeric(values.into_iter().map(Some).collect());
        match self.position(name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Drop rows where `name` is missing; returns the number dropped
    pub fn drop_missing(&mut self, name: &str) -> Result<usize> {
        let idx = self
            .position(name)
            .with_context(|| format!("Column '{}' not found in dataset", name))?;
        let keep: Vec<bool> = (0..self.n_rows())
            .map(|row| !self.columns[idx].is_missing(row))
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            self.columns.iter_mut().for_each(|c| c.retain_rows(&keep));
        }
        Ok(dropped)
    }

    /// Median-fill numeric columns and mode-fill text columns; returns the
    /// number of cells filled
    pub fn impute(&mut self) -> usize {
        self.columns.iter_mut().map(Column::impute).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CSV: &str = "\
Order,Lot Frontage,Street,SalePrice
1,80,Pave,215000
2,,Grvl,105000
3,NA,Pave,
4,60,,172000
5,70,Grvl,244000
";

    #[test]
    fn test_column_typing_and_missing_markers() {
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(ds.n_rows(), 5);
        assert_eq!(ds.n_columns(), 4);
        assert!(matches!(ds.column("Lot Frontage"), Some(Column::Numeric(_))));
        assert!(matches!(ds.column("Street"), Some(Column::Text(_))));
        assert_eq!(ds.column("Lot Frontage").unwrap().missing_count(), 2);
        assert_eq!(ds.column("Street").unwrap().missing_count(), 1);
    }

    #[test]
    fn test_drop_missing_target() {
        let mut ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(ds.drop_missing("SalePrice").unwrap(), 1);
        assert_eq!(ds.n_rows(), 4);
        assert_eq!(ds.numeric("Order").unwrap(), vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_impute_median_and_mode() {
        let mut ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        ds.drop_missing("SalePrice").unwrap();
        assert_eq!(ds.impute(), 2);

        // present frontage values 80, 60, 70 -> median 70
        assert_eq!(ds.numeric("Lot Frontage").unwrap(), vec![80.0, 70.0, 60.0, 70.0]);
        // Grvl is the most frequent remaining value
        match ds.column("Street").unwrap() {
            Column::Text(v) => assert_eq!(v[2].as_deref(), Some("Grvl")),
            other => panic!("unexpected column {:?}", other),
        }
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn test_numeric_errors() {
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert!(ds.numeric("Missing Column").is_err());
        assert!(ds.numeric("Street").is_err());
        let err = ds.numeric("Lot Frontage").unwrap_err();
        assert!(err.to_string().contains("missing value"));
    }

    #[test]
    fn test_insert_numeric_replaces_or_appends() {
        let mut ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        ds.insert_numeric("Order", vec![9.0; 5]).unwrap();
        ds.insert_numeric("Flag", vec![1.0; 5]).unwrap();
        assert_eq!(ds.n_columns(), 5);
        assert_eq!(ds.numeric("Order").unwrap(), vec![9.0; 5]);
        assert!(ds.insert_numeric("Bad", vec![1.0]).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", CSV).unwrap();
        let ds = Dataset::from_path(file.path()).unwrap();
        assert_eq!(ds.n_rows(), 5);

        let err = Dataset::from_path("/nonexistent/AmesHousing.csv").unwrap_err();
        assert!(err.to_string().contains("Failed to open dataset"));
    }
}
