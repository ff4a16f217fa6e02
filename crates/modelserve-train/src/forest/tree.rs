//! CART classification tree (Gini impurity, depth-limited).

use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Flat node arena; index 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        /// Class probabilities at this leaf.
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left.
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeLimits {
    pub max_depth: usize,
    pub max_features: usize,
    pub n_classes: usize,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `sample` (duplicates allowed).
    pub(crate) fn fit(
        x: &[Vec<f64>],
        y: &[u32],
        sample: Vec<usize>,
        limits: TreeLimits,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, sample, 0, limits, rng);
        tree
    }

    /// Class distribution of the leaf `row` falls into.
    pub fn leaf_distribution(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split { feature, threshold, left, right } => {
                    let v = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Arena sanity: non-empty, children point forward and in range,
    /// features exist, leaves carry one probability per class.
    pub(crate) fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty node arena".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "leaf {idx} has {} classes, expected {n_classes}",
                            distribution.len()
                        ));
                    }
                }
                Node::Split { feature, left, right, .. } => {
                    if *feature >= n_features {
                        return Err(format!("node {idx} splits on unknown feature {feature}"));
                    }
                    // Children are always pushed after their parent, which also
                    // rules out cycles.
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[u32],
        mut sample: Vec<usize>,
        depth: usize,
        limits: TreeLimits,
        rng: &mut StdRng,
    ) -> usize {
        let counts = class_counts(y, &sample, limits.n_classes);
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { distribution: normalize(&counts) });

        let pure = counts.iter().filter(|c| **c > 0).count() <= 1;
        if depth >= limits.max_depth || sample.len() < 2 || pure {
            return node_idx;
        }

        let Some(best) = best_split(x, y, &mut sample, limits, rng) else {
            return node_idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| x[i][best.feature] <= best.threshold);

        let left_idx = self.grow(x, y, left, depth + 1, limits, rng);
        let right_idx = self.grow(x, y, right, depth + 1, limits, rng);
        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_idx,
            right: right_idx,
        };
        node_idx
    }
}

fn class_counts(y: &[u32], sample: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in sample {
        counts[y[i] as usize] += 1;
    }
    counts
}

fn normalize(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|c| *c as f64 / total as f64).collect()
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|c| (*c as f64 / t).powi(2)).sum::<f64>()
}

/// Lowest weighted child impurity over a random subset of features.
fn best_split(
    x: &[Vec<f64>],
    y: &[u32],
    sample: &mut [usize],
    limits: TreeLimits,
    rng: &mut StdRng,
) -> Option<Candidate> {
    let n_features = x.first().map(Vec::len).unwrap_or(0);
    if n_features == 0 {
        return None;
    }
    let k = limits.max_features.clamp(1, n_features);
    let n = sample.len();
    let total = class_counts(y, sample, limits.n_classes);

    let mut best: Option<Candidate> = None;
    for feature in index::sample(rng, n_features, k).into_iter() {
        sample.sort_by(|a, b| x[*a][feature].total_cmp(&x[*b][feature]));

        let mut left = vec![0usize; limits.n_classes];
        for pos in 0..n - 1 {
            left[y[sample[pos]] as usize] += 1;

            let here = x[sample[pos]][feature];
            let next = x[sample[pos + 1]][feature];
            if here == next {
                continue;
            }

            let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
            let n_left = pos + 1;
            let n_right = n - n_left;
            let impurity = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / n as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                best = Some(Candidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    impurity,
                });
            }
        }
    }
    best
}
