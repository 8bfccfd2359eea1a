use ndarray::{array, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use redeem_cleanlab::confident_joint::compute_confident_joint;
use redeem_cleanlab::latent_algebra::{compute_inv_noise_matrix, compute_noise_matrix_from_inverse};
use redeem_cleanlab::math::value_counts;
use redeem_cleanlab::noise_generation::{generate_noise_matrix_from_trace, generate_noisy_labels};
use redeem_cleanlab::pruning::{find_label_issues, PruneOptions};
use redeem_cleanlab::PruneMethod;

fn random_probs(rng: &mut StdRng, n: usize, k: usize) -> Array2<f64> {
    let mut probs = Array2::from_shape_fn((n, k), |_| rng.gen::<f64>() + 1e-3);
    for mut row in probs.rows_mut() {
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    probs
}

#[test]
fn test_forward_inverse_round_trip() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut cases = vec![
        (
            array![[0.5, 0.0, 0.0], [0.5, 1.0, 0.5], [0.0, 0.0, 0.5]],
            array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
        ),
        (array![[0.9, 0.2], [0.1, 0.8]], array![0.7, 0.3]),
    ];
    for k in 2..6 {
        let py = Array1::from_shape_fn(k, |_| rng.gen::<f64>() + 0.05);
        let py = &py / py.sum();
        let q = generate_noise_matrix_from_trace(k, 0.8 * k as f64, None, false, &mut rng).unwrap();
        cases.push((q, py));
    }

    for (q, py) in cases {
        let (inverse, ps) = compute_inv_noise_matrix(&q, &py).unwrap();
        let (q_back, py_back) = compute_noise_matrix_from_inverse(&inverse, &ps).unwrap();
        for (a, b) in q.iter().zip(q_back.iter()) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
        for (a, b) in py.iter().zip(py_back.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}

#[test]
fn test_confident_joint_sums_to_n() {
    let mut rng = StdRng::seed_from_u64(3);
    for &(n, k) in &[(10usize, 2usize), (57, 3), (200, 5)] {
        let probs = random_probs(&mut rng, n, k);
        let labels: Vec<usize> = (0..n).map(|i| i % k).collect();
        let cj = compute_confident_joint(&labels, &probs, k).unwrap();
        assert!((cj.counts.sum() - n as f64).abs() < 1e-9);
        assert!((cj.py.sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_pruning_never_empties_a_present_class() {
    let mut rng = StdRng::seed_from_u64(5);
    for trial in 0..10 {
        let k = 3;
        let n = 30;
        let labels: Vec<usize> = (0..n).map(|_| rng.gen_range(0..k)).collect();
        // Probabilities that mostly disagree with the labels.
        let probs = Array2::from_shape_fn((n, k), |(row, col)| {
            if col == (labels[row] + 1) % k {
                0.9
            } else {
                0.05
            }
        });
        let cj = compute_confident_joint(&labels, &probs, k).unwrap();
        let present = value_counts(&labels, k);
        for method in PruneMethod::ALL {
            let options = PruneOptions {
                prune_method: method,
                ..PruneOptions::default()
            };
            let keep = find_label_issues(&labels, &probs, &cj.counts, &options).unwrap();
            for class in 0..k {
                if present[class] == 0 {
                    continue;
                }
                let kept = labels
                    .iter()
                    .zip(keep.iter())
                    .filter(|(&l, &kp)| l == class && kp)
                    .count();
                assert!(kept >= 1, "trial {} {} emptied class {}", trial, method, class);
            }
        }
    }
}

#[test]
fn test_identity_noise_leaves_labels_untouched() {
    let true_labels = vec![0, 0, 1, 1, 2, 2];
    let mut rng = StdRng::seed_from_u64(42);
    let noisy = generate_noisy_labels(&true_labels, &Array2::eye(3), &mut rng).unwrap();
    assert_eq!(noisy, true_labels);
}
