//! Bagged ensemble of depth-limited CART trees.
//!
//! Each tree sees a bootstrap sample of the training rows and considers
//! `floor(sqrt(n_features))` randomly chosen features per split. The forest
//! predicts the argmax of the mean leaf distribution (ties go to the lowest
//! class id). Everything is driven from one seeded `StdRng`, so a fixed seed
//! reproduces the same forest.

pub mod tree;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use modelserve_core::{ModelServeError, Prediction, Predictor};

use crate::error::{Result, TrainError};

pub use tree::{DecisionTree, Node};
use tree::TreeLimits;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[u32], n_classes: usize, params: ForestParams) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TrainError::Model(format!(
                "cannot fit on {} rows with {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|r| r.len() != n_features) {
            return Err(TrainError::Model("rows must share a non-zero feature count".into()));
        }
        if y.iter().any(|l| *l as usize >= n_classes) {
            return Err(TrainError::Model("label out of range".into()));
        }
        if params.n_estimators == 0 || params.max_depth == 0 {
            return Err(TrainError::Model("n_estimators and max_depth must be positive".into()));
        }

        let limits = TreeLimits {
            max_depth: params.max_depth,
            max_features: ((n_features as f64).sqrt().floor() as usize).max(1),
            n_classes,
        };

        let n = x.len();
        let mut seeds = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(seeds.gen());
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, sample, limits, &mut rng)
            })
            .collect();

        tracing::debug!(
            trees = params.n_estimators,
            max_depth = params.max_depth,
            max_features = limits.max_features,
            rows = n,
            "forest fitted"
        );

        Ok(Self { params, n_features, n_classes, trees })
    }

    /// Check a forest loaded from outside `fit` before it is used to predict.
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(TrainError::Model("forest has no trees".into()));
        }
        if self.n_features == 0 || self.n_classes == 0 {
            return Err(TrainError::Model("forest has no features or classes".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|e| TrainError::Model(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean of the per-tree leaf distributions.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (a, p) in acc.iter_mut().zip(tree.leaf_distribution(row)) {
                *a += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        acc.iter_mut().for_each(|a| *a /= n);
        acc
    }

    pub fn predict_row(&self, row: &[f64]) -> Prediction {
        let proba = self.predict_proba(row);
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        best as Prediction
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<Prediction> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}

impl Predictor for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn predict(&self, instances: &[Vec<f64>]) -> modelserve_core::Result<Vec<Prediction>> {
        if let Some(row) = instances.iter().find(|r| r.len() != self.n_features) {
            return Err(ModelServeError::Inference(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(self.predict_batch(instances))
    }
}

/// Fraction of predictions equal to the true labels.
pub fn accuracy_score(y_true: &[u32], y_pred: &[u32]) -> Result<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return Err(TrainError::Model(format!(
            "accuracy needs equal non-empty inputs ({} vs {})",
            y_true.len(),
            y_pred.len()
        )));
    }
    let hits = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    Ok(hits as f64 / y_true.len() as f64)
}
