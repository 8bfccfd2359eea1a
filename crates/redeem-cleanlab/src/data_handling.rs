//! Index bookkeeping for cross-validation folds and hold-out splits.
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{CleanlabError, Result};
use crate::math::value_counts;

/// One cross-validation split, as sorted row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Create stratified folds for cross-validation.
///
/// The examples of each class are shuffled and dealt round-robin over the
/// folds, carrying the deal position from one class to the next so fold sizes
/// differ by at most one.
///
/// # Arguments
///
/// * `labels` - Labels to stratify on
/// * `n_classes` - Number of classes K
/// * `n_folds` - The number of folds to create
/// * `rng` - Random source for the shuffles
///
/// # Errors
///
/// `EmptyPartition` when there are fewer examples than folds, or when a class
/// has a single example and would be missing from one fold's training split.
pub fn stratified_k_fold<R: Rng + ?Sized>(
    labels: &[usize],
    n_classes: usize,
    n_folds: usize,
    rng: &mut R,
) -> Result<Vec<Fold>> {
    if n_folds < 2 {
        return Err(CleanlabError::InvalidConfig(format!(
            "n_folds must be at least 2, got {}",
            n_folds
        )));
    }
    let n_samples = labels.len();
    if n_samples < n_folds {
        return Err(CleanlabError::EmptyPartition(format!(
            "{} examples cannot fill {} folds",
            n_samples, n_folds
        )));
    }
    let counts = value_counts(labels, n_classes);
    if let Some(class) = counts.iter().position(|&c| c == 1) {
        return Err(CleanlabError::EmptyPartition(format!(
            "class {} has a single example, so one fold would train without it",
            class
        )));
    }

    let mut assignment = vec![0usize; n_samples];
    let mut slot = 0usize;
    for class in 0..n_classes {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| if l == class { Some(i) } else { None })
            .collect();
        members.shuffle(rng);
        for idx in members {
            assignment[idx] = slot % n_folds;
            slot += 1;
        }
    }

    let folds: Vec<Fold> = (0..n_folds)
        .map(|f| {
            let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                (0..n_samples).partition(|&i| assignment[i] == f);
            Fold {
                train_indices,
                test_indices,
            }
        })
        .collect();

    for (f, fold) in folds.iter().enumerate() {
        log::trace!(
            "Fold {} with {} training and {} testing examples",
            f,
            fold.train_indices.len(),
            fold.test_indices.len()
        );
        if fold.train_indices.is_empty() || fold.test_indices.is_empty() {
            return Err(CleanlabError::EmptyPartition(format!("fold {} is empty", f)));
        }
    }
    Ok(folds)
}

/// Shuffle `0..n_samples` and split off `test_fraction` of it as a hold-out set.
///
/// Returns `(train_indices, test_indices)`, each sorted.
pub fn train_test_split<R: Rng + ?Sized>(
    n_samples: usize,
    test_fraction: f64,
    rng: &mut R,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(CleanlabError::InvalidConfig(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let n_test = ((n_samples as f64) * test_fraction).round() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(CleanlabError::EmptyPartition(format!(
            "cannot split {} examples with test fraction {}",
            n_samples, test_fraction
        )));
    }
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(rng);
    let mut test = indices[..n_test].to_vec();
    let mut train = indices[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_stratified_folds_partition_every_example() {
        let labels: Vec<usize> = (0..23).map(|i| i % 3).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let folds = stratified_k_fold(&labels, 3, 5, &mut rng).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen = vec![0usize; labels.len()];
        for fold in &folds {
            assert_eq!(fold.train_indices.len() + fold.test_indices.len(), labels.len());
            assert!(fold.test_indices.len() == 4 || fold.test_indices.len() == 5);
            for &i in &fold.test_indices {
                seen[i] += 1;
                assert!(!fold.train_indices.contains(&i));
            }
            // Every class appears in every training split.
            for class in 0..3 {
                assert!(fold.train_indices.iter().any(|&i| labels[i] == class));
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_folds_are_reproducible_for_a_seed() {
        let labels: Vec<usize> = (0..30).map(|i| i % 2).collect();
        let a = stratified_k_fold(&labels, 2, 3, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = stratified_k_fold(&labels, 2, 3, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_singleton_class_is_rejected() {
        let labels = vec![0, 0, 0, 1];
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            stratified_k_fold(&labels, 2, 2, &mut rng),
            Err(CleanlabError::EmptyPartition(_))
        ));
    }

    #[test]
    fn test_train_test_split_sizes() {
        let mut rng = StdRng::seed_from_u64(3);
        let (train, test) = train_test_split(150, 0.2, &mut rng).unwrap();
        assert_eq!(test.len(), 30);
        assert_eq!(train.len(), 120);
        assert!(train_test_split(10, 1.0, &mut rng).is_err());
    }
}
