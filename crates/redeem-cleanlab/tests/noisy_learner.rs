use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use redeem_cleanlab::latent_algebra::compute_inv_noise_matrix;
use redeem_cleanlab::models::logistic::LogisticRegression;
use redeem_cleanlab::models::ClassifierModel;
use redeem_cleanlab::noise_generation::generate_noisy_labels;
use redeem_cleanlab::stats::accuracy_score;
use redeem_cleanlab::{CleanlabConfig, CleanlabError, FitOptions, NoisyLabelLearner, PruneMethod};

/// Two classes on either side of a gap along the first feature.
fn two_class_data(rng: &mut StdRng, n_per_class: usize) -> (Array2<f64>, Vec<usize>) {
    let mut rows = Vec::with_capacity(n_per_class * 4);
    let mut labels = Vec::with_capacity(n_per_class * 2);
    for i in 0..n_per_class * 2 {
        let class = i % 2;
        let center = if class == 0 { -1.75 } else { 1.75 };
        rows.push(center + rng.gen_range(-1.25..1.25));
        rows.push(rng.gen_range(-1.0..1.0));
        labels.push(class);
    }
    (
        Array2::from_shape_vec((n_per_class * 2, 2), rows).unwrap(),
        labels,
    )
}

#[test]
fn test_cleaning_does_not_lose_to_baseline() {
    let mut rng = StdRng::seed_from_u64(42);
    let (x_train, y_train) = two_class_data(&mut rng, 100);
    let (x_test, y_test) = two_class_data(&mut rng, 100);

    // Off-diagonal mass only on the (true 1 -> noisy 0) pair.
    let noise_matrix = array![[1.0, 0.4], [0.0, 0.6]];
    let noisy = generate_noisy_labels(&y_train, &noise_matrix, &mut rng).unwrap();

    let mut baseline = LogisticRegression::default();
    baseline.fit(&x_train, &noisy, None).unwrap();
    let baseline_acc = accuracy_score(&y_test, &baseline.predict(&x_test).unwrap()).unwrap();

    let config = CleanlabConfig::default().with_seed(42);
    let mut learner = NoisyLabelLearner::new(Box::new(LogisticRegression::default()), config);
    learner.fit(&x_train, &noisy, FitOptions::default()).unwrap();
    let cleaned_acc = learner.score(&x_test, &y_test).unwrap();

    assert!(
        cleaned_acc + 1e-9 >= baseline_acc,
        "cleaned {} < baseline {}",
        cleaned_acc,
        baseline_acc
    );
}

#[test]
fn test_fit_twice_gives_identical_predictions() {
    let mut rng = StdRng::seed_from_u64(1);
    let (x, y) = two_class_data(&mut rng, 40);
    let noisy = generate_noisy_labels(&y, &array![[0.8, 0.1], [0.2, 0.9]], &mut rng).unwrap();

    for method in PruneMethod::ALL {
        let config = CleanlabConfig::default()
            .with_seed(7)
            .with_prune_method(method)
            .with_converge_latent_estimates(true);
        let mut learner = NoisyLabelLearner::new(Box::new(LogisticRegression::default()), config);
        learner.fit(&x, &noisy, FitOptions::default()).unwrap();
        let first = learner.predict(&x).unwrap();
        learner.fit(&x, &noisy, FitOptions::default()).unwrap();
        assert_eq!(first, learner.predict(&x).unwrap(), "{}", method);
    }
}

#[test]
fn test_parallel_folds_match_serial() {
    let mut rng = StdRng::seed_from_u64(9);
    let (x, y) = two_class_data(&mut rng, 30);

    let serial = CleanlabConfig::default().with_seed(3);
    let parallel = CleanlabConfig {
        parallelism: 4,
        ..serial.clone()
    };
    let mut a = NoisyLabelLearner::new(Box::new(LogisticRegression::default()), serial);
    let mut b = NoisyLabelLearner::new(Box::new(LogisticRegression::default()), parallel);
    let ea = a.fit(&x, &y, FitOptions::default()).unwrap().pred_probs.clone();
    let eb = b.fit(&x, &y, FitOptions::default()).unwrap().pred_probs.clone();
    assert_eq!(ea, eb);
}

struct CountingModel {
    inner: LogisticRegression,
    fits: Arc<AtomicUsize>,
}

impl ClassifierModel for CountingModel {
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        sample_weight: Option<&[f64]>,
    ) -> redeem_cleanlab::Result<()> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        self.inner.fit(x, y, sample_weight)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> redeem_cleanlab::Result<Array2<f64>> {
        self.inner.predict_proba(x)
    }

    fn fresh(&self) -> Box<dyn ClassifierModel> {
        Box::new(CountingModel {
            inner: LogisticRegression::default(),
            fits: self.fits.clone(),
        })
    }
}

#[test]
fn test_supplied_matrices_skip_cross_validation() {
    let mut rng = StdRng::seed_from_u64(4);
    let (x, y) = two_class_data(&mut rng, 30);
    let noise_matrix = array![[0.9, 0.2], [0.1, 0.8]];
    let noisy = generate_noisy_labels(&y, &noise_matrix, &mut rng).unwrap();
    let (inverse, _) = compute_inv_noise_matrix(&noise_matrix, &array![0.5, 0.5]).unwrap();
    let pred_probs = Array2::from_shape_fn((60, 2), |(n, k)| if noisy[n] == k { 0.7 } else { 0.3 });

    let fits = Arc::new(AtomicUsize::new(0));
    let model = CountingModel {
        inner: LogisticRegression::default(),
        fits: fits.clone(),
    };
    let mut learner = NoisyLabelLearner::new(Box::new(model), CleanlabConfig::default().with_seed(0));
    let options = FitOptions::default()
        .with_noise_matrix(noise_matrix.clone())
        .with_inverse_noise_matrix(inverse.clone())
        .with_pred_probs(pred_probs);
    let estimates = learner.fit(&x, &noisy, options).unwrap();

    // Only the final fit on the pruned data.
    assert_eq!(fits.load(Ordering::SeqCst), 1);
    assert_eq!(estimates.noise_matrix, noise_matrix);
    assert_eq!(estimates.inverse_noise_matrix, inverse);
    assert!(estimates.confident_joint.is_none());
}

#[test]
fn test_non_stochastic_inverse_is_rejected() {
    let mut rng = StdRng::seed_from_u64(4);
    let (x, y) = two_class_data(&mut rng, 10);
    let mut learner =
        NoisyLabelLearner::new(Box::new(LogisticRegression::default()), CleanlabConfig::default());
    let err = learner
        .fit(
            &x,
            &y,
            FitOptions::default().with_inverse_noise_matrix(array![[0.7, 0.7], [0.0, 1.0]]),
        )
        .unwrap_err();
    assert!(matches!(err, CleanlabError::InvalidNoiseMatrix(_)));
}
