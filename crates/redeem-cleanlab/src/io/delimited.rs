//! Delimited (CSV/TSV) reader for labelled feature tables.
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::Array2;

/// Features and class indices read from a delimited file.
#[derive(Debug, Clone)]
pub struct LabeledData {
    pub x: Array2<f64>,
    pub y: Vec<usize>,
    /// Original label text of each class index.
    pub class_names: Vec<String>,
    pub feature_names: Vec<String>,
}

impl LabeledData {
    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }
}

/// Configuration for reading delimited feature tables.
#[derive(Debug, Clone)]
pub struct DelimitedReaderConfig {
    /// Column holding the class label.
    pub label_column: String,
    pub delimiter: u8,
    /// Optional list of feature columns to load (in order).
    /// When `None`, every column except the label and `ignore_columns` is a feature.
    pub feature_columns: Option<Vec<String>>,
    /// Columns to skip when auto-selecting features.
    pub ignore_columns: Vec<String>,
}

impl Default for DelimitedReaderConfig {
    fn default() -> Self {
        Self {
            label_column: "label".to_string(),
            delimiter: b',',
            feature_columns: None,
            ignore_columns: vec!["id".to_string()],
        }
    }
}

/// Field delimiter implied by the file extension: tab for `.tsv`, comma otherwise.
pub fn delimiter_for_path<P: AsRef<Path>>(path: P) -> u8 {
    match path
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

/// Read a CSV or TSV file whose `label_column` holds the class. The delimiter
/// follows the file extension.
pub fn read_labeled_csv<P: AsRef<Path>>(path: P, label_column: &str) -> Result<LabeledData> {
    let config = DelimitedReaderConfig {
        label_column: label_column.to_string(),
        delimiter: delimiter_for_path(&path),
        ..DelimitedReaderConfig::default()
    };
    read_labeled_with_config(path, &config)
}

/// Read a delimited file using a custom configuration.
///
/// Labels that are all non-negative integers are used as class indices
/// directly. Anything else is mapped to indices in order of first appearance.
pub fn read_labeled_with_config<P: AsRef<Path>>(
    path: P,
    config: &DelimitedReaderConfig,
) -> Result<LabeledData> {
    let reader = reader_builder(config)
        .from_path(&path)
        .with_context(|| format!("Failed to open data file: {}", path.as_ref().display()))?;
    read_records(reader, config, &path.as_ref().display().to_string())
}

/// Read a delimited table from any byte source, e.g. an embedded dataset.
pub fn read_labeled_from_reader<R: Read>(
    rdr: R,
    config: &DelimitedReaderConfig,
) -> Result<LabeledData> {
    read_records(reader_builder(config).from_reader(rdr), config, "reader")
}

fn reader_builder(config: &DelimitedReaderConfig) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(config.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All);
    builder
}

fn read_records<R: Read>(
    mut reader: csv::Reader<R>,
    config: &DelimitedReaderConfig,
    source: &str,
) -> Result<LabeledData> {
    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .clone();

    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;
    let feature_indices = resolve_feature_indices(&headers, config, label_idx)?;
    if feature_indices.is_empty() {
        return Err(anyhow!("No feature columns detected in header"));
    }

    let mut features = Vec::new();
    let mut raw_labels = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?;
        raw_labels.push(label.to_string());

        for &idx in &feature_indices {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing feature value at row {}", row_idx + 1))?;
            let parsed = value.parse::<f64>().with_context(|| {
                format!(
                    "Invalid feature '{}' at row {}",
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1
                )
            })?;
            features.push(parsed);
        }
    }
    if raw_labels.is_empty() {
        return Err(anyhow!("No data rows in {}", source));
    }

    let (y, class_names) = encode_labels(&raw_labels);
    let n_samples = y.len();
    let n_features = feature_indices.len();
    let x = Array2::from_shape_vec((n_samples, n_features), features)
        .context("Failed to build feature matrix")?;

    let feature_names = feature_indices
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();

    log::debug!(
        "Read {} rows, {} features and {} classes from {}",
        n_samples,
        n_features,
        class_names.len(),
        source
    );
    Ok(LabeledData {
        x,
        y,
        class_names,
        feature_names,
    })
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

fn resolve_feature_indices(
    headers: &StringRecord,
    config: &DelimitedReaderConfig,
    label_idx: usize,
) -> Result<Vec<usize>> {
    if let Some(names) = &config.feature_columns {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = find_column(headers, name)
                .ok_or_else(|| anyhow!("Missing feature column '{}'", name))?;
            indices.push(idx);
        }
        return Ok(indices);
    }

    let ignore: HashSet<String> = config
        .ignore_columns
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();

    Ok(headers
        .iter()
        .enumerate()
        .filter(|&(idx, header)| idx != label_idx && !ignore.contains(&header.to_ascii_lowercase()))
        .map(|(idx, _)| idx)
        .collect())
}

fn encode_labels(raw: &[String]) -> (Vec<usize>, Vec<String>) {
    let numeric: Option<Vec<usize>> = raw.iter().map(|l| l.parse::<usize>().ok()).collect();
    if let Some(y) = numeric {
        let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
        return (y, (0..n_classes).map(|c| c.to_string()).collect());
    }

    let mut map: HashMap<&str, usize> = HashMap::new();
    let mut class_names = Vec::new();
    let y: Vec<usize> = raw
        .iter()
        .map(|label| {
            *map.entry(label.as_str()).or_insert_with(|| {
                class_names.push(label.clone());
                class_names.len() - 1
            })
        })
        .collect();
    (y, class_names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_labels_by_first_appearance() {
        let raw: Vec<String> = ["setosa", "virginica", "setosa", "versicolor"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (y, names) = encode_labels(&raw);
        assert_eq!(y, vec![0, 1, 0, 2]);
        assert_eq!(names, vec!["setosa", "virginica", "versicolor"]);
    }

    #[test]
    fn test_numeric_labels_are_kept() {
        let raw: Vec<String> = ["2", "0", "2"].iter().map(|s| s.to_string()).collect();
        let (y, names) = encode_labels(&raw);
        assert_eq!(y, vec![2, 0, 2]);
        assert_eq!(names.len(), 3);
    }
}
