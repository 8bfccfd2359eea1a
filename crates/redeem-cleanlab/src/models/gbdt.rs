use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::error::{CleanlabError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Gradient Boosting Decision Tree (GBDT) classifier, one binary booster per
/// class (one-vs-rest) with outputs normalised into class probabilities.
pub struct GBDTClassifier {
    models: Vec<GBDT>,
    params: ModelConfig,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GBDTClassifier {
            models: Vec::new(),
            params,
        }
    }

    fn booster_config(&self, feature_size: usize) -> Result<Config> {
        match &self.params.model_type {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                debug,
                training_optimization_level,
                loss_type,
            } => {
                let mut config = Config::new();

                config.set_feature_size(feature_size);
                config.set_shrinkage(self.params.learning_rate);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);
                Ok(config)
            }
            other => Err(CleanlabError::Model(format!(
                "Expected ModelType::GBDT params, got {}",
                other.name()
            ))),
        }
    }

    fn to_data(x: &Array2<f64>, labels: Option<&[f32]>, weights: Option<&[f64]>) -> DataVec {
        let mut data = DataVec::new();
        for (i, row) in x.rows().into_iter().enumerate() {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            let weight = weights.map(|w| w[i] as f32).unwrap_or(1.0);
            let label = labels.map(|l| l[i]).unwrap_or(0.0);
            data.push(Data::new_training_data(features, weight, label, None));
        }
        data
    }
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], sample_weight: Option<&[f64]>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(CleanlabError::EmptyPartition(
                "cannot fit on zero examples".to_string(),
            ));
        }
        if y.len() != x.nrows() {
            return Err(CleanlabError::shape(
                format!("y length = {}", x.nrows()),
                format!("y length = {}", y.len()),
            ));
        }
        if let Some(w) = sample_weight {
            if w.len() != x.nrows() {
                return Err(CleanlabError::shape(
                    format!("sample_weight length = {}", x.nrows()),
                    format!("sample_weight length = {}", w.len()),
                ));
            }
        }

        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let config = self.booster_config(x.ncols())?;

        let mut models = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            // LogLikelyhood expects labels in {-1, 1}
            let binary: Vec<f32> = y
                .iter()
                .map(|&label| if label == class { 1.0 } else { -1.0 })
                .collect();
            let mut train_x = Self::to_data(x, Some(&binary), sample_weight);
            let mut booster = GBDT::new(&config);
            booster.fit(&mut train_x);
            models.push(booster);
        }
        log::trace!("Fitted {} one-vs-rest boosters", models.len());

        self.models = models;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.models.is_empty() {
            return Err(CleanlabError::NotFitted);
        }
        let test_x = Self::to_data(x, None, None);
        let n_classes = self.models.len();
        let mut probs = Array2::<f64>::zeros((x.nrows(), n_classes));
        for (class, booster) in self.models.iter().enumerate() {
            let scores = booster.predict(&test_x);
            for (row, &score) in scores.iter().enumerate() {
                probs[[row, class]] = (score as f64).max(0.0);
            }
        }
        for mut row in probs.rows_mut() {
            let total = row.sum();
            if total > 0.0 {
                row.mapv_inplace(|v| v / total);
            } else {
                row.fill(1.0 / n_classes as f64);
            }
        }
        Ok(probs)
    }

    fn supports_sample_weight(&self) -> bool {
        true
    }

    fn fresh(&self) -> Box<dyn ClassifierModel> {
        Box::new(GBDTClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}
