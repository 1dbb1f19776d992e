use crate::error::{Result, TedanaError};
use crate::metrics::{format_value, MetricsTable};
use crate::types::{component_index, component_label, Classification};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::path::Path;

/// Least-squares cutoff for singular values during orthogonalization
const SVD_EPS: f64 = 1e-12;

/// ICA mixing matrix [timepoints × components] with one label per column
#[derive(Debug, Clone, PartialEq)]
pub struct MixingMatrix {
    labels: Vec<String>,
    data: DMatrix<f64>,
}

impl MixingMatrix {
    pub fn new(labels: Vec<String>, data: DMatrix<f64>) -> Result<Self> {
        if labels.len() != data.ncols() {
            return Err(TedanaError::ComponentMismatch(format!(
                "{} labels for {} mixing columns",
                labels.len(),
                data.ncols()
            )));
        }
        Ok(Self { labels, data })
    }

    /// Build with canonical `ICA_NN` labels.
    pub fn from_matrix(data: DMatrix<f64>) -> Self {
        let labels = (0..data.ncols()).map(component_label).collect();
        Self { labels, data }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn n_timepoints(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_components(&self) -> usize {
        self.data.ncols()
    }

    /// Column position keyed by component index
    fn column_positions(&self) -> Result<BTreeMap<usize, usize>> {
        let mut positions = BTreeMap::new();
        for (col, label) in self.labels.iter().enumerate() {
            let index = component_index(label).ok_or_else(|| {
                TedanaError::ComponentMismatch(format!("invalid mixing column label '{}'", label))
            })?;
            if positions.insert(index, col).is_some() {
                return Err(TedanaError::DuplicateComponent(index));
            }
        }
        Ok(positions)
    }

    /// Every mixing column must map to exactly one table component and vice versa.
    pub fn check_against(&self, table: &MetricsTable) -> Result<()> {
        let positions = self.column_positions()?;
        let not_in_table: Vec<usize> = table.missing_indices(positions.keys());
        if !not_in_table.is_empty() {
            return Err(TedanaError::ComponentMismatch(format!(
                "mixing components {:?} are missing from the component table",
                not_in_table
            )));
        }
        let not_in_mixing: Vec<usize> = table
            .indices()
            .into_iter()
            .filter(|i| !positions.contains_key(i))
            .collect();
        if !not_in_mixing.is_empty() {
            return Err(TedanaError::ComponentMismatch(format!(
                "table components {:?} have no mixing column",
                not_in_mixing
            )));
        }
        Ok(())
    }

    /// Regress the kept (accepted/ignored) time series out of the rejected ones.
    ///
    /// Returns the matrix unchanged when either group is empty.
    pub fn orthogonalize(&self, table: &MetricsTable) -> Result<MixingMatrix> {
        self.check_against(table)?;
        let positions = self.column_positions()?;

        let kept: Vec<usize> = table
            .iter()
            .filter(|c| c.classification.is_kept())
            .map(|c| positions[&c.index])
            .collect();
        let rejected: Vec<usize> = table
            .iter()
            .filter(|c| c.classification == Classification::Rejected)
            .map(|c| positions[&c.index])
            .collect();

        if kept.is_empty() || rejected.is_empty() {
            log::info!("Nothing to orthogonalize: {} kept, {} rejected", kept.len(), rejected.len());
            return Ok(self.clone());
        }

        let n_time = self.n_timepoints();
        let kept_ts = DMatrix::from_fn(n_time, kept.len(), |i, j| self.data[(i, kept[j])]);
        let rejected_ts = DMatrix::from_fn(n_time, rejected.len(), |i, j| self.data[(i, rejected[j])]);

        let betas = kept_ts
            .clone()
            .svd(true, true)
            .solve(&rejected_ts, SVD_EPS)
            .map_err(|e| TedanaError::InvalidParameter(format!("least squares failed: {}", e)))?;
        let residuals = &rejected_ts - &kept_ts * betas;

        let mut data = self.data.clone();
        for (j, &col) in rejected.iter().enumerate() {
            data.set_column(col, &residuals.column(j));
        }

        log::info!(
            "Orthogonalized {} rejected components against {} kept components",
            rejected.len(),
            kept.len()
        );
        Ok(Self {
            labels: self.labels.clone(),
            data,
        })
    }

    pub fn read_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(TedanaError::read_file(path))?;
        let mixing = Self::parse_tsv(&text, path)?;
        log::info!(
            "Loaded mixing matrix {} timepoints × {} components from {}",
            mixing.n_timepoints(),
            mixing.n_components(),
            path.display()
        );
        Ok(mixing)
    }

    /// Parse a TSV mixing matrix; the label header is optional.
    pub fn parse_tsv(text: &str, source: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_reader(text.as_bytes());

        let mut labels: Option<Vec<String>> = None;
        let mut values: Vec<f64> = Vec::new();
        let mut n_rows = 0;
        let mut n_cols = 0;

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(TedanaError::csv_file(source))?;
            let cells: Vec<&str> = record.iter().map(str::trim).collect();
            if row == 0 && cells.iter().any(|c| c.parse::<f64>().is_err()) {
                labels = Some(cells.iter().map(|c| c.to_string()).collect());
                n_cols = cells.len();
                continue;
            }
            if n_cols == 0 {
                n_cols = cells.len();
            }
            for cell in cells {
                let value = cell.parse::<f64>().map_err(|_| TedanaError::TableParse {
                    path: source.to_path_buf(),
                    line: row + 1,
                    message: format!("non-numeric mixing value '{}'", cell),
                })?;
                values.push(value);
            }
            n_rows += 1;
        }

        if n_cols == 0 {
            return Err(TedanaError::TableParse {
                path: source.to_path_buf(),
                line: 1,
                message: "empty mixing matrix".to_string(),
            });
        }

        let data = DMatrix::from_row_slice(n_rows, n_cols, &values);
        match labels {
            Some(labels) => Self::new(labels, data),
            None => Ok(Self::from_matrix(data)),
        }
    }

    pub fn to_tsv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        writer.write_record(&self.labels)?;
        for row in self.data.row_iter() {
            writer.write_record(row.iter().map(|v| format_value(*v)))?;
        }
        writer
            .into_inner()
            .map_err(|e| TedanaError::IoError(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Component;

    fn table_with(classes: &[Classification]) -> MetricsTable {
        let mut table = MetricsTable::new(vec!["kappa".to_string()]);
        for (i, class) in classes.iter().enumerate() {
            let mut c = Component::new(i, component_label(i)).with_metric("kappa", 1.0);
            c.classification = *class;
            table.insert(c).unwrap();
        }
        table
    }

    #[test]
    fn test_parse_with_header() {
        let text = "ICA_00\tICA_01\n1.0\t2.0\n3.0\t4.0\n5.0\t6.0\n";
        let mixing = MixingMatrix::parse_tsv(text, Path::new("m.tsv")).unwrap();
        assert_eq!(mixing.n_timepoints(), 3);
        assert_eq!(mixing.n_components(), 2);
        assert_eq!(mixing.data()[(2, 1)], 6.0);
        assert_eq!(mixing.labels(), &["ICA_00", "ICA_01"]);
    }

    #[test]
    fn test_parse_without_header() {
        let text = "1\t2\t3\n4\t5\t6\n";
        let mixing = MixingMatrix::parse_tsv(text, Path::new("m.tsv")).unwrap();
        assert_eq!(mixing.n_components(), 3);
        assert_eq!(mixing.labels()[2], "ICA_02");
    }

    #[test]
    fn test_write_then_read() {
        let mixing = MixingMatrix::from_matrix(DMatrix::from_row_slice(2, 2, &[0.5, -1.25, 3.0, 4.0]));
        let bytes = mixing.to_tsv_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let reread = MixingMatrix::parse_tsv(&text, Path::new("m.tsv")).unwrap();
        assert_eq!(reread, mixing);
    }

    #[test]
    fn test_check_against_table() {
        let mixing = MixingMatrix::from_matrix(DMatrix::zeros(4, 2));
        let table = table_with(&[Classification::Accepted, Classification::Rejected]);
        assert!(mixing.check_against(&table).is_ok());

        let bigger = table_with(&[
            Classification::Accepted,
            Classification::Rejected,
            Classification::Rejected,
        ]);
        let err = mixing.check_against(&bigger).unwrap_err();
        assert!(err.to_string().contains("[2]"));
    }

    #[test]
    fn test_orthogonalize_removes_kept_signal() {
        // Column 1 is column 0 scaled plus an orthogonal residual.
        let data = DMatrix::from_row_slice(
            4,
            2,
            &[1.0, 2.0 + 1.0, -1.0, -2.0 + 1.0, 1.0, 2.0 - 1.0, -1.0, -2.0 - 1.0],
        );
        let mixing = MixingMatrix::from_matrix(data);
        let table = table_with(&[Classification::Accepted, Classification::Rejected]);

        let orth = mixing.orthogonalize(&table).unwrap();
        let kept = orth.data().column(0).clone_owned();
        let rejected = orth.data().column(1).clone_owned();
        assert_eq!(kept, mixing.data().column(0).clone_owned());
        assert!(kept.dot(&rejected).abs() < 1e-9);
        assert!((rejected[0] - 1.0).abs() < 1e-9);
        assert!((rejected[2] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonalize_noop_without_rejected() {
        let mixing = MixingMatrix::from_matrix(DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]));
        let table = table_with(&[Classification::Accepted, Classification::Ignored]);
        assert_eq!(mixing.orthogonalize(&table).unwrap(), mixing);
    }

    #[test]
    fn test_missing_mixing_names_the_file() {
        let err = MixingMatrix::read_tsv("/nonexistent/desc-ICA_mixing.tsv").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/desc-ICA_mixing.tsv"));
    }
}
