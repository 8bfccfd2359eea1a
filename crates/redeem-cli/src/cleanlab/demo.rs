//! Learning with noisy labels, end to end: inject noise into a labelled
//! table, then compare plain training with confident learning.
use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use redeem_cleanlab::data_handling::train_test_split;
use redeem_cleanlab::grid::{run_grid, GridScore, ParameterGrid};
use redeem_cleanlab::io::{read_labeled_csv, read_labeled_from_reader, DelimitedReaderConfig, LabeledData};
use redeem_cleanlab::latent_algebra::compute_inv_noise_matrix;
use redeem_cleanlab::math::value_counts;
use redeem_cleanlab::models::factory::build_model;
use redeem_cleanlab::noise_generation::generate_noisy_labels;
use redeem_cleanlab::stats::{accuracy_score, empirical_noise_matrix, fraction_mislabeled};
use redeem_cleanlab::{FitOptions, NoisyLabelLearner};

use crate::cleanlab::input::DemoConfig;

const IRIS_CSV: &str = include_str!("../../data/iris.csv");

/// Train/test split with noisy training labels.
#[derive(Debug, Clone)]
pub struct NoisySplit {
    pub x_train: Array2<f64>,
    pub y_train: Vec<usize>,
    pub noisy_train: Vec<usize>,
    pub x_test: Array2<f64>,
    pub y_test: Vec<usize>,
    pub class_names: Vec<String>,
}

/// Accuracy of one demo step on the held-out split.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoResult {
    pub label: String,
    pub accuracy: f64,
}

pub fn load_data(config: &DemoConfig) -> Result<LabeledData> {
    match &config.data_file {
        Some(path) => read_labeled_csv(path, &config.label_column),
        None => {
            let reader_config = DelimitedReaderConfig {
                label_column: config.label_column.clone(),
                ..DelimitedReaderConfig::default()
            };
            read_labeled_from_reader(IRIS_CSV.as_bytes(), &reader_config)
                .context("Failed to read the bundled Iris table")
        }
    }
}

/// Split the data and corrupt the training labels with the configured noise matrix.
pub fn prepare(config: &DemoConfig, rng: &mut StdRng) -> Result<NoisySplit> {
    let data = load_data(config)?;
    let noise_matrix = config.noise_matrix()?;
    if noise_matrix.nrows() < data.n_classes() {
        anyhow::bail!(
            "noise matrix covers {} classes but the data has {}",
            noise_matrix.nrows(),
            data.n_classes()
        );
    }

    let (train, test) = train_test_split(data.y.len(), config.test_fraction, rng)?;
    let x_train = data.x.select(Axis(0), &train);
    let y_train: Vec<usize> = train.iter().map(|&i| data.y[i]).collect();
    let x_test = data.x.select(Axis(0), &test);
    let y_test: Vec<usize> = test.iter().map(|&i| data.y[i]).collect();

    let noisy_train = generate_noisy_labels(&y_train, &noise_matrix, rng)?;
    log::info!(
        "{} training / {} test examples, {:.1}% of training labels flipped",
        y_train.len(),
        y_test.len(),
        100.0 * fraction_mislabeled(&y_train, &noisy_train)?
    );
    log::debug!(
        "Realised noise matrix:\n{:.3}",
        empirical_noise_matrix(&y_train, &noisy_train, noise_matrix.nrows())?
    );

    Ok(NoisySplit {
        x_train,
        y_train,
        noisy_train,
        x_test,
        y_test,
        class_names: data.class_names,
    })
}

/// Baselines without confident learning, then the learner with the noise
/// matrix given, with both matrices given and with nothing given.
pub fn run_demo(config: &DemoConfig) -> Result<Vec<DemoResult>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let split = prepare(config, &mut rng)?;
    let noise_matrix = config.noise_matrix()?;
    let mut results = Vec::new();

    let mut clf = build_model(config.model.clone());
    clf.fit(&split.x_train, &split.y_train, None)?;
    let accuracy = accuracy_score(&split.y_test, &clf.predict(&split.x_test)?)?;
    results.push(report("WITHOUT confident learning, NO noise", accuracy));

    let mut clf = build_model(config.model.clone());
    clf.fit(&split.x_train, &split.noisy_train, None)?;
    let accuracy = accuracy_score(&split.y_test, &clf.predict(&split.x_test)?)?;
    results.push(report("WITHOUT confident learning, with noise", accuracy));

    println!();
    println!("Now we show improvement using confident learning to characterize the noise");
    println!("and learn on the data that is (with high confidence) labeled correctly.");
    println!();

    let mut learner =
        NoisyLabelLearner::from_model_config(config.model.clone(), config.cleanlab.clone());
    learner.fit(
        &split.x_train,
        &split.noisy_train,
        FitOptions::default().with_noise_matrix(noise_matrix.clone()),
    )?;
    let accuracy = learner.score(&split.x_test, &split.y_test)?;
    results.push(report("WITH confident learning (noise matrix given)", accuracy));

    let counts = value_counts(&split.y_train, noise_matrix.nrows());
    let py = Array1::from_iter(counts.iter().map(|&c| c as f64 / split.y_train.len() as f64));
    let (inverse_noise_matrix, _) = compute_inv_noise_matrix(&noise_matrix, &py)?;
    learner.fit(
        &split.x_train,
        &split.noisy_train,
        FitOptions::default()
            .with_noise_matrix(noise_matrix.clone())
            .with_inverse_noise_matrix(inverse_noise_matrix),
    )?;
    let accuracy = learner.score(&split.x_test, &split.y_test)?;
    results.push(report(
        "WITH confident learning (noise / inverse noise matrix given)",
        accuracy,
    ));

    let mut learner =
        NoisyLabelLearner::from_model_config(config.model.clone(), config.cleanlab.clone());
    let estimates = learner.fit(&split.x_train, &split.noisy_train, FitOptions::default())?;
    log::info!("Estimated noise matrix:\n{:.3}", estimates.noise_matrix);
    log::info!(
        "Pruned {} of {} training examples",
        estimates.num_pruned,
        split.noisy_train.len()
    );
    let accuracy = learner.score(&split.x_test, &split.y_test)?;
    results.push(report("WITH confident learning noise not given", accuracy));

    Ok(results)
}

/// Sweep prune_method x converge_latent_estimates on the noisy split and
/// print the settings from best to worst.
pub fn run_grid_demo(config: &DemoConfig) -> Result<Vec<GridScore>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let split = prepare(config, &mut rng)?;
    let model = build_model(config.model.clone());

    let scores = run_grid(
        &ParameterGrid::default(),
        model.as_ref(),
        &config.cleanlab,
        &split.x_train,
        &split.noisy_train,
        &split.x_test,
        &split.y_test,
        &FitOptions::default(),
    )?;

    for score in &scores {
        println!(
            "Param settings: {{prune_method: {}, converge_latent_estimates: {}}}",
            score.point.prune_method, score.point.converge_latent_estimates
        );
        println!(
            "Test accuracy (using confident learning):\t{:.2}\n",
            score.accuracy
        );
    }
    Ok(scores)
}

fn report(label: &str, accuracy: f64) -> DemoResult {
    println!("{}, test accuracy: {:.2}", label, accuracy);
    DemoResult {
        label: label.to_string(),
        accuracy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_iris_loads() {
        let data = load_data(&DemoConfig::default()).unwrap();
        assert_eq!(data.x.dim(), (150, 4));
        assert_eq!(data.class_names, vec!["setosa", "versicolor", "virginica"]);
        assert_eq!(value_counts(&data.y, 3), vec![50, 50, 50]);
    }

    #[test]
    fn test_load_data_reads_tsv() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        writeln!(file, "a\tb\tspecies").unwrap();
        writeln!(file, "5.1\t3.5\tsetosa").unwrap();
        writeln!(file, "6.3\t3.3\tvirginica").unwrap();
        file.flush().unwrap();

        let config = DemoConfig {
            data_file: Some(file.path().to_path_buf()),
            ..DemoConfig::default()
        };
        let data = load_data(&config).unwrap();
        assert_eq!(data.x.dim(), (2, 2));
        assert_eq!(data.class_names, vec!["setosa", "virginica"]);
    }

    #[test]
    fn test_prepare_splits_and_corrupts() {
        let config = DemoConfig::default();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let split = prepare(&config, &mut rng).unwrap();
        assert_eq!(split.x_train.nrows(), 120);
        assert_eq!(split.x_test.nrows(), 30);
        assert_eq!(split.noisy_train.len(), split.y_train.len());
        // Class 1 is never flipped by the default noise matrix.
        for (&y, &s) in split.y_train.iter().zip(split.noisy_train.iter()) {
            if y == 1 {
                assert_eq!(s, 1);
            }
        }
    }

    #[test]
    fn test_run_demo_reports_every_step() {
        let results = run_demo(&DemoConfig::default()).unwrap();
        assert_eq!(results.len(), 5);
        // A clean logistic regression separates Iris well.
        assert!(results[0].accuracy >= 0.8);
        for result in &results {
            assert!((0.0..=1.0).contains(&result.accuracy));
        }
    }
}
