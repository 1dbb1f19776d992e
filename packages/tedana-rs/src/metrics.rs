use crate::error::{Result, TedanaError};
use crate::types::{component_index, Classification, ComponentSet};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const COMPONENT_COLUMN: &str = "Component";
pub const CLASSIFICATION_COLUMN: &str = "classification";
pub const TAGS_COLUMN: &str = "classification_tags";
pub const RATIONALE_COLUMN: &str = "rationale";

const MISSING_VALUE: &str = "n/a";
const RATIONALE_SEPARATOR: &str = ";";
const TAG_SEPARATOR: &str = ",";

/// Well-known metric columns produced by the metric collection step
pub mod names {
    pub const KAPPA: &str = "kappa";
    pub const RHO: &str = "rho";
    pub const VARIANCE_EXPLAINED: &str = "variance explained";
    pub const NORMALIZED_VARIANCE_EXPLAINED: &str = "normalized variance explained";
    pub const COUNTSIG_FT2: &str = "countsigFT2";
    pub const COUNTSIG_FS0: &str = "countsigFS0";
    pub const DICE_FT2: &str = "dice_FT2";
    pub const DICE_FS0: &str = "dice_FS0";
    pub const SIGNAL_NOISE_T: &str = "signal-noise_t";
}

/// Whether a table must already carry classification columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSchema {
    /// Straight out of metric collection; classification starts unclassified.
    Raw,
    /// Output of an earlier classification; `classification` and `rationale` are required.
    Classified,
}

/// One ICA component and its metrics
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub index: usize,
    pub label: String,
    pub metrics: BTreeMap<String, f64>,
    pub classification: Classification,
    pub rationale: Vec<String>,
    pub tags: Vec<String>,
}

impl Component {
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            metrics: BTreeMap::new(),
            classification: Classification::Unclassified,
            rationale: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Set the classification and record why.
    pub fn classify(&mut self, classification: Classification, rationale: &str, tag: Option<&str>) {
        self.classification = classification;
        self.rationale.push(rationale.to_string());
        if let Some(tag) = tag {
            self.add_tag(tag);
        }
    }

    pub fn add_tag(&mut self, tag: &str) {
        if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}

/// Components keyed by their stable index, plus the metric column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsTable {
    columns: Vec<String>,
    components: BTreeMap<usize, Component>,
}

impl MetricsTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            components: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, component: Component) -> Result<()> {
        if self.components.contains_key(&component.index) {
            return Err(TedanaError::DuplicateComponent(component.index));
        }
        for name in component.metrics.keys() {
            if !self.columns.contains(name) {
                self.columns.push(name.clone());
            }
        }
        self.components.insert(component.index, component);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Component> {
        self.components.get_mut(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.components.contains_key(&index)
    }

    /// Components in index order
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components.values_mut()
    }

    pub fn indices(&self) -> ComponentSet {
        self.components.keys().copied().collect()
    }

    pub fn indices_with(&self, classification: Classification) -> ComponentSet {
        self.iter()
            .filter(|c| c.classification == classification)
            .map(|c| c.index)
            .collect()
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.iter().filter(|c| c.classification == classification).count()
    }

    /// Indices from `requested` that are not in the table.
    pub fn missing_indices<'a>(&self, requested: impl IntoIterator<Item = &'a usize>) -> Vec<usize> {
        requested
            .into_iter()
            .filter(|i| !self.contains(**i))
            .copied()
            .collect()
    }

    pub fn read_tsv<P: AsRef<Path>>(path: P, schema: TableSchema) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(TedanaError::read_file(path))?;
        let table = Self::from_reader(file, path, schema)?;
        log::info!("Loaded {} components from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn parse_tsv(text: &str, source: &Path, schema: TableSchema) -> Result<Self> {
        Self::from_reader(text.as_bytes(), source, schema)
    }

    fn from_reader<R: Read>(reader: R, source: &Path, schema: TableSchema) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(TedanaError::csv_file(source))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let position = |name: &str| headers.iter().position(|h| h == name);
        let required = |name: &str| {
            position(name).ok_or_else(|| TedanaError::MissingColumn {
                path: source.to_path_buf(),
                column: name.to_string(),
            })
        };

        let component_col = required(COMPONENT_COLUMN)?;
        let (classification_col, rationale_col) = match schema {
            TableSchema::Raw => (position(CLASSIFICATION_COLUMN), position(RATIONALE_COLUMN)),
            TableSchema::Classified => (
                Some(required(CLASSIFICATION_COLUMN)?),
                Some(required(RATIONALE_COLUMN)?),
            ),
        };
        let tags_col = position(TAGS_COLUMN);

        let text_columns = [Some(component_col), classification_col, rationale_col, tags_col];
        let metric_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !text_columns.contains(&Some(*i)))
            .map(|(i, h)| (i, h.clone()))
            .collect();

        let mut table = MetricsTable::new(metric_columns.iter().map(|(_, h)| h.clone()).collect());

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(TedanaError::csv_file(source))?;
            let line = row + 2;
            let parse_error = |message: String| TedanaError::TableParse {
                path: source.to_path_buf(),
                line,
                message,
            };
            let cell = |i: usize| record.get(i).unwrap_or("").trim();

            let label = cell(component_col);
            let index = component_index(label)
                .ok_or_else(|| parse_error(format!("invalid component label '{}'", label)))?;
            let mut component = Component::new(index, label);

            for (col, name) in &metric_columns {
                let raw = cell(*col);
                let value = if raw.is_empty() || raw.eq_ignore_ascii_case(MISSING_VALUE) {
                    f64::NAN
                } else {
                    raw.parse::<f64>().map_err(|_| {
                        parse_error(format!("column '{}' has non-numeric value '{}'", name, raw))
                    })?
                };
                component.metrics.insert(name.clone(), value);
            }

            if let Some(col) = classification_col {
                component.classification = Classification::parse(cell(col))?;
            }
            if let Some(col) = rationale_col {
                component.rationale = split_list(cell(col), &[';']);
            }
            if let Some(col) = tags_col {
                component.tags = split_list(cell(col), &[',', ';']);
            }

            table.insert(component)?;
        }

        Ok(table)
    }

    /// Serialize to TSV. Identical tables always produce identical bytes.
    pub fn to_tsv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());

        let mut header: Vec<&str> = Vec::with_capacity(self.columns.len() + 4);
        header.push(COMPONENT_COLUMN);
        header.extend(self.columns.iter().map(String::as_str));
        header.extend([CLASSIFICATION_COLUMN, TAGS_COLUMN, RATIONALE_COLUMN]);
        writer.write_record(&header)?;

        for component in self.iter() {
            let mut row: Vec<String> = Vec::with_capacity(header.len());
            row.push(component.label.clone());
            for name in &self.columns {
                row.push(format_value(component.metric(name).unwrap_or(f64::NAN)));
            }
            row.push(component.classification.to_string());
            row.push(component.tags.join(TAG_SEPARATOR));
            row.push(component.rationale.join(RATIONALE_SEPARATOR));
            writer.write_record(&row)?;
        }

        writer
            .into_inner()
            .map_err(|e| TedanaError::IoError(e.into_error()))
    }
}

pub(crate) fn format_value(value: f64) -> String {
    if value.is_nan() {
        MISSING_VALUE.to_string()
    } else {
        value.to_string()
    }
}

fn split_list(raw: &str, separators: &[char]) -> Vec<String> {
    raw.split(|c: char| separators.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIFIED: &str = "Component\tkappa\trho\tvariance explained\tclassification\tclassification_tags\trationale\n\
ICA_00\t45.2\t12.1\t10.5\taccepted\tLikely BOLD\tnode_07\n\
ICA_01\t10.0\t30.5\t5.25\trejected\tUnlikely BOLD\tnode_01\n\
ICA_02\t20.1\tn/a\t1\tignored\t\t\n";

    fn source() -> &'static Path {
        Path::new("test.tsv")
    }

    #[test]
    fn test_parse_classified_table() {
        let table = MetricsTable::parse_tsv(CLASSIFIED, source(), TableSchema::Classified).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns(), &["kappa", "rho", "variance explained"]);

        let first = table.get(0).unwrap();
        assert_eq!(first.label, "ICA_00");
        assert_eq!(first.metric("kappa"), Some(45.2));
        assert_eq!(first.classification, Classification::Accepted);
        assert_eq!(first.rationale, vec!["node_07"]);
        assert_eq!(first.tags, vec!["Likely BOLD"]);

        assert!(table.get(2).unwrap().metric("rho").unwrap().is_nan());
        assert_eq!(table.count(Classification::Rejected), 1);
    }

    #[test]
    fn test_raw_table_defaults_to_unclassified() {
        let raw = "Component\tkappa\trho\nICA_00\t1\t2\nICA_01\t3\t4\n";
        let table = MetricsTable::parse_tsv(raw, source(), TableSchema::Raw).unwrap();
        assert!(table.iter().all(|c| c.classification == Classification::Unclassified));
        assert!(table.iter().all(|c| c.rationale.is_empty()));
    }

    #[test]
    fn test_classified_requires_rationale() {
        let raw = "Component\tkappa\tclassification\nICA_00\t1\taccepted\n";
        let err = MetricsTable::parse_tsv(raw, source(), TableSchema::Classified).unwrap_err();
        match err {
            TedanaError::MissingColumn { column, .. } => assert_eq!(column, "rationale"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let raw = "Component\tkappa\nICA_01\t1\n1\t2\n";
        let err = MetricsTable::parse_tsv(raw, source(), TableSchema::Raw).unwrap_err();
        assert!(matches!(err, TedanaError::DuplicateComponent(1)));
    }

    #[test]
    fn test_non_numeric_metric_reports_line() {
        let raw = "Component\tkappa\nICA_00\t1\nICA_01\tabc\n";
        let err = MetricsTable::parse_tsv(raw, source(), TableSchema::Raw).unwrap_err();
        match err {
            TedanaError::TableParse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("abc"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read_preserves_table() {
        let table = MetricsTable::parse_tsv(CLASSIFIED, source(), TableSchema::Classified).unwrap();
        let bytes = table.to_tsv_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("Component\tkappa\trho\tvariance explained\tclassification"));
        assert!(text.contains("n/a"));

        let reread = MetricsTable::parse_tsv(&text, source(), TableSchema::Classified).unwrap();
        assert_eq!(reread.to_tsv_bytes().unwrap(), bytes);
        assert_eq!(reread.indices(), table.indices());
    }

    #[test]
    fn test_rows_written_in_index_order() {
        let mut table = MetricsTable::new(vec!["kappa".to_string()]);
        table.insert(Component::new(2, "ICA_02").with_metric("kappa", 1.0)).unwrap();
        table.insert(Component::new(0, "ICA_00").with_metric("kappa", 2.0)).unwrap();
        let text = String::from_utf8(table.to_tsv_bytes().unwrap()).unwrap();
        let labels: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split('\t').next().unwrap())
            .collect();
        assert_eq!(labels, vec!["ICA_00", "ICA_02"]);
    }

    #[test]
    fn test_missing_table_names_the_file() {
        let err = MetricsTable::read_tsv("/nonexistent/desc-tedana_metrics.tsv", TableSchema::Raw)
            .unwrap_err();
        assert!(matches!(err, TedanaError::ReadFile { .. }));
        assert!(err.to_string().contains("/nonexistent/desc-tedana_metrics.tsv"));
    }
}
