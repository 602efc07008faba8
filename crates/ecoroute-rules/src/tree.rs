//! Depth-bounded CART classifier over the feature schema.
//!
//! Nodes live in a flat arena indexed by node id; both growing the tree and
//! extracting rules use an explicit work stack, so neither recurses.
//! Splits minimise class-weighted Gini impurity, with weights balanced so
//! both outcome classes carry equal total weight.

use ecoroute_core::{Decision, FEATURE_COUNT, FeatureName};

use crate::bundle::{Condition, Operator, Rule};
use crate::error::{Result, RuleError};

/// Stop criteria for tree growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

/// One cleaned, labelled training row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub features: [f64; FEATURE_COUNT],
    /// True when offloading was better.
    pub cloud: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: FeatureName,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        cloud: usize,
        total: usize,
    },
}

impl Node {
    fn placeholder() -> Self {
        Node::Leaf { cloud: 0, total: 0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: FeatureName,
    threshold: f64,
}

/// A fitted tree. Node 0 is the root.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

fn gini(weights: [f64; 2]) -> f64 {
    let total = weights[0] + weights[1];
    if total <= 0.0 {
        return 0.0;
    }
    let p0 = weights[0] / total;
    let p1 = weights[1] / total;
    1.0 - p0 * p0 - p1 * p1
}

/// Weighted impurity of a node: total weight times Gini.
fn weighted_impurity(weights: [f64; 2]) -> f64 {
    (weights[0] + weights[1]) * gini(weights)
}

fn best_split(
    samples: &[Sample],
    indices: &[usize],
    class_weights: [f64; 2],
    min_samples_leaf: usize,
) -> Option<Split> {
    let mut totals = [0.0; 2];
    for &i in indices {
        let class = samples[i].cloud as usize;
        totals[class] += class_weights[class];
    }

    let mut best_score = weighted_impurity(totals);
    let mut best = None;
    let mut order = indices.to_vec();

    for feature in FeatureName::ALL {
        let column = feature.index();
        order.sort_by(|&a, &b| samples[a].features[column].total_cmp(&samples[b].features[column]));

        let mut left = [0.0; 2];
        for pos in 0..order.len().saturating_sub(1) {
            let class = samples[order[pos]].cloud as usize;
            left[class] += class_weights[class];

            let left_count = pos + 1;
            let right_count = order.len() - left_count;
            if left_count < min_samples_leaf || right_count < min_samples_leaf {
                continue;
            }

            let lower = samples[order[pos]].features[column];
            let upper = samples[order[pos + 1]].features[column];
            if lower == upper {
                continue;
            }

            let right = [totals[0] - left[0], totals[1] - left[1]];
            let score = weighted_impurity(left) + weighted_impurity(right);
            if score < best_score - 1e-12 {
                // Adjacent floats can round the midpoint up to `upper`.
                let mid = lower + (upper - lower) / 2.0;
                let threshold = if mid >= upper { lower } else { mid };
                best_score = score;
                best = Some(Split { feature, threshold });
            }
        }
    }

    best
}

impl DecisionTree {
    /// Grow a tree from labelled samples.
    pub fn fit(samples: &[Sample], params: TreeParams) -> Result<Self> {
        if samples.is_empty() {
            return Err(RuleError::Training("no samples to fit".into()));
        }

        let n = samples.len() as f64;
        let cloud_total = samples.iter().filter(|s| s.cloud).count() as f64;
        let local_total = n - cloud_total;
        let class_weights = [
            if local_total > 0.0 { n / (2.0 * local_total) } else { 0.0 },
            if cloud_total > 0.0 { n / (2.0 * cloud_total) } else { 0.0 },
        ];

        let mut nodes = vec![Node::placeholder()];
        let mut pending = vec![(0usize, (0..samples.len()).collect::<Vec<_>>(), 0usize)];

        while let Some((id, indices, depth)) = pending.pop() {
            let total = indices.len();
            let cloud = indices.iter().filter(|&&i| samples[i].cloud).count();
            let pure = cloud == 0 || cloud == total;

            let split = if depth < params.max_depth && !pure {
                best_split(samples, &indices, class_weights, params.min_samples_leaf)
            } else {
                None
            };

            match split {
                None => nodes[id] = Node::Leaf { cloud, total },
                Some(Split { feature, threshold }) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
                        .into_iter()
                        .partition(|&i| samples[i].features[feature.index()] <= threshold);

                    let left = nodes.len();
                    nodes.push(Node::placeholder());
                    let right = nodes.len();
                    nodes.push(Node::placeholder());
                    nodes[id] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };

                    pending.push((right, right_rows, depth + 1));
                    pending.push((left, left_rows, depth + 1));
                }
            }
        }

        Ok(Self { nodes })
    }

    /// Decision of the leaf the vector falls into.
    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Decision {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if features[feature.index()] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { cloud, total } => return leaf_decision(*cloud, *total).0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Flatten into rules, one per leaf, in left-first depth-first order.
    ///
    /// The left child of a split adds `feature <= threshold`, the right child
    /// adds `feature > threshold`.
    pub fn to_rules(&self) -> Vec<Rule> {
        let mut rules = Vec::with_capacity(self.leaf_count());
        let mut stack = vec![(0usize, Vec::<Condition>::new())];

        while let Some((id, path)) = stack.pop() {
            match &self.nodes[id] {
                Node::Leaf { cloud, total } => {
                    let (decision, probability) = leaf_decision(*cloud, *total);
                    rules.push(Rule {
                        conditions: path,
                        decision,
                        probability,
                        sample_count: *total,
                    });
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let mut right_path = path.clone();
                    right_path.push(Condition::new(*feature, Operator::GreaterThan, *threshold));
                    let mut left_path = path;
                    left_path.push(Condition::new(*feature, Operator::LessOrEqual, *threshold));

                    stack.push((*right, right_path));
                    stack.push((*left, left_path));
                }
            }
        }

        rules
    }
}

/// Leaf probability is the raw share of Cloud samples; Cloud wins ties.
fn leaf_decision(cloud: usize, total: usize) -> (Decision, f64) {
    let probability = if total > 0 {
        cloud as f64 / total as f64
    } else {
        0.0
    };
    (Decision::from_offload(probability >= 0.5), probability)
}
