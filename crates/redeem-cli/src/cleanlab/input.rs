use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use redeem_cleanlab::config::{CleanlabConfig, ModelConfig, ModelType, PruneMethod};

/// Settings for the noisy-label demo and grid sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// CSV/TSV with numeric features and a label column. The bundled Iris
    /// table is used when unset.
    pub data_file: Option<PathBuf>,
    pub label_column: String,
    pub test_fraction: f64,
    pub seed: u64,
    /// `noise_matrix[i][j] = P(noisy = i | true = j)`
    pub noise_matrix: Vec<Vec<f64>>,
    pub model: ModelConfig,
    pub cleanlab: CleanlabConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            data_file: None,
            label_column: String::from("species"),
            test_fraction: 0.2,
            seed: 42,
            noise_matrix: vec![
                vec![0.5, 0.0, 0.0],
                vec![0.5, 1.0, 0.5],
                vec![0.0, 0.0, 0.5],
            ],
            model: ModelConfig::default(),
            cleanlab: CleanlabConfig::default().with_seed(42),
        }
    }
}

impl DemoConfig {
    /// Load the JSON config at `config_path` (defaults when absent) and apply
    /// command line overrides.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => load_demo_config(path)?,
            None => DemoConfig::default(),
        };

        if let Some(data_file) = matches.get_one::<String>("data") {
            validate_tsv_or_csv_file(data_file)?;
            config.data_file = Some(PathBuf::from(data_file));
        } else if let Some(data_file) = &config.data_file {
            validate_tsv_or_csv_file(&data_file.to_string_lossy())?;
        }

        if let Some(label_column) = matches.get_one::<String>("label_column") {
            config.label_column = label_column.clone();
        }

        if let Some(&seed) = matches.get_one::<u64>("seed") {
            config.seed = seed;
            config.cleanlab.seed = Some(seed);
        }

        if let Some(model_type) = matches.get_one::<String>("model_type") {
            config.model.model_type = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
        }

        if let Some(prune_method) = matches.get_one::<String>("prune_method") {
            config.cleanlab.prune_method =
                PruneMethod::from_str(prune_method).map_err(anyhow::Error::msg)?;
        }

        if matches.get_flag("converge") {
            config.cleanlab.converge_latent_estimates = true;
        }

        if let Some(&n_folds) = matches.get_one::<usize>("folds") {
            config.cleanlab.n_folds = n_folds;
        }

        if let Some(&parallelism) = matches.get_one::<usize>("threads") {
            config.cleanlab.parallelism = parallelism;
        }

        config.cleanlab.validate()?;
        Ok(config)
    }

    pub fn noise_matrix(&self) -> Result<Array2<f64>> {
        let k = self.noise_matrix.len();
        if self.noise_matrix.iter().any(|row| row.len() != k) {
            anyhow::bail!("noise_matrix must be square, got {} rows", k);
        }
        let flat: Vec<f64> = self.noise_matrix.iter().flatten().copied().collect();
        Array2::from_shape_vec((k, k), flat).context("Failed to build noise matrix")
    }
}

/// Load a demo configuration from a JSON file.
pub fn load_demo_config<P: AsRef<Path>>(path: P) -> Result<DemoConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: DemoConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

pub fn validate_tsv_or_csv_file(path: &str) -> Result<()> {
    let pb = PathBuf::from(path);

    let ext = pb.extension().and_then(|s| s.to_str()).map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") => {}
        _ => anyhow::bail!("File must have a .tsv or .csv extension: {}", path),
    }

    if !pb.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_noise_matrix_is_column_stochastic() {
        let q = DemoConfig::default().noise_matrix().unwrap();
        for col in q.columns() {
            assert!((col.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"seed": 7, "cleanlab": {{"prune_method": "both"}}, "noise_matrix": [[1.0, 0.0], [0.0, 1.0]]}}"#
        )
        .unwrap();
        let config = load_demo_config(file.path()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.cleanlab.prune_method, PruneMethod::Both);
        assert_eq!(config.label_column, "species");
        assert_eq!(config.noise_matrix().unwrap().dim(), (2, 2));
    }

    #[test]
    fn test_ragged_noise_matrix() {
        let config = DemoConfig {
            noise_matrix: vec![vec![1.0], vec![0.0, 1.0]],
            ..DemoConfig::default()
        };
        assert!(config.noise_matrix().is_err());
    }
}
