//! Random forest regression built on the `linfa` fitting traits.
//!
//! Each tree is a CART regression tree grown on a bootstrap sample, choosing
//! splits that minimise the summed squared error of the two children. The
//! forest predicts the mean of its trees.

use linfa::traits::{Fit, PredictInplace};
use linfa::{DatasetBase, Error};
use ndarray::{Array1, ArrayBase, ArrayView1, Data, Ix2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Hyperparameters of a [`RandomForest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    n_trees: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        RandomForestParams {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

impl RandomForestParams {
    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

struct TreeBuilder<'a, D: Data<Elem = f64>> {
    x: &'a ArrayBase<D, Ix2>,
    y: &'a Array1<f64>,
    params: &'a RandomForestParams,
    nodes: Vec<Node>,
}

impl<D: Data<Elem = f64>> TreeBuilder<'_, D> {
    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let mean = sum / n;

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        let pure = samples.iter().all(|&i| self.y[i] == self.y[samples[0]]);
        if samples.len() < self.params.min_samples_split || depth_reached || pure {
            return self.leaf(mean);
        }

        let Some((feature, threshold)) = self.best_split(samples) else {
            return self.leaf(mean);
        };

        samples.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
        let cut = samples.partition_point(|&i| self.x[[i, feature]] <= threshold);

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf(mean));
        let (left_samples, right_samples) = samples.split_at_mut(cut);
        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn leaf(&mut self, value: f64) -> usize {
        self.nodes.push(Node::Leaf(value));
        self.nodes.len() - 1
    }

    /// Lowest-SSE split over all features, or `None` if every feature is
    /// constant across `samples`.
    fn best_split(&self, samples: &[usize]) -> Option<(usize, f64)> {
        let total_sum: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = samples.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let n = samples.len();

        let mut best: Option<(f64, usize, f64)> = None;
        let mut order = samples.to_vec();
        for feature in 0..self.x.ncols() {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for k in 1..n {
                let prev = order[k - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                let (lo, hi) = (self.x[[prev, feature]], self.x[[order[k], feature]]);
                if lo == hi {
                    continue;
                }
                let (nl, nr) = (k as f64, (n - k) as f64);
                let right_sum = total_sum - left_sum;
                let sse = (left_sq - left_sum * left_sum / nl)
                    + (total_sq - left_sq - right_sum * right_sum / nr);
                if best.is_none_or(|(b, _, _)| sse < b) {
                    best = Some((sse, feature, (lo + hi) / 2.0));
                }
            }
        }
        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

/// A fitted forest of regression trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn params() -> RandomForestParams {
        RandomForestParams::default()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }
}

impl<D: Data<Elem = f64>> Fit<ArrayBase<D, Ix2>, Array1<f64>, Error> for RandomForestParams {
    type Object = RandomForest;

    fn fit(&self, dataset: &DatasetBase<ArrayBase<D, Ix2>, Array1<f64>>) -> Result<RandomForest, Error> {
        if self.n_trees == 0 {
            return Err(Error::Parameters("n_trees must be at least 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(Error::Parameters("min_samples_split must be at least 2".into()));
        }

        let x = dataset.records();
        let y = dataset.targets();
        let n = x.nrows();
        if n == 0 {
            return Err(Error::NotEnoughSamples);
        }
        if y.len() != n {
            return Err(Error::Parameters(format!(
                "{n} samples but {} targets",
                y.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let trees = (0..self.n_trees)
            .map(|_| {
                let mut samples: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    params: self,
                    nodes: Vec::new(),
                };
                builder.grow(&mut samples, 0);
                RegressionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(RandomForest {
            trees,
            n_features: x.ncols(),
        })
    }
}

impl<D: Data<Elem = f64>> PredictInplace<ArrayBase<D, Ix2>, Array1<f64>> for RandomForest {
    fn predict_inplace<'a>(&'a self, x: &'a ArrayBase<D, Ix2>, y: &mut Array1<f64>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        for (row, target) in x.rows().into_iter().zip(y.iter_mut()) {
            *target = self.predict_row(row);
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::prelude::*;
    use ndarray::{Array2, array};

    #[test]
    fn fits_step_function() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 1.0 } else { 5.0 });
        let forest = RandomForest::params()
            .n_trees(25)
            .fit(&Dataset::new(x, y))
            .unwrap();

        let pred = forest.predict(&array![[2.0], [17.0]]);
        assert!((pred[0] - 1.0).abs() < 1.0, "{pred}");
        assert!((pred[1] - 5.0).abs() < 1.0, "{pred}");
        assert_eq!(forest.n_trees(), 25);
    }

    #[test]
    fn same_seed_same_forest() {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(12, |i| (i * i) as f64);
        let data = Dataset::new(x, y);
        let query = array![[3.5, 7.0]];

        let a = RandomForest::params().seed(7).fit(&data).unwrap().predict(&query);
        let b = RandomForest::params().seed(7).fit(&data).unwrap().predict(&query);
        assert_eq!(a, b);
    }

    #[test]
    fn constant_features_make_single_leaf_trees() {
        let x = Array2::from_elem((4, 3), 1.0);
        let y = array![1.0, 2.0, 3.0, 4.0];
        let forest = RandomForest::params().n_trees(5).fit(&Dataset::new(x, y)).unwrap();
        assert!(forest.trees.iter().all(|t| t.nodes.len() == 1));
    }

    #[test]
    fn depth_limit_caps_tree_growth() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(16, |i| i as f64);
        let forest = RandomForest::params()
            .n_trees(3)
            .max_depth(Some(0))
            .fit(&Dataset::new(x, y))
            .unwrap();
        assert!(forest.trees.iter().all(|t| t.nodes.len() == 1));
        assert_eq!(forest.n_features(), 1);
    }

    #[test]
    fn rejects_bad_params() {
        let data = Dataset::new(Array2::zeros((2, 1)), array![0.0, 1.0]);
        assert!(RandomForest::params().n_trees(0).fit(&data).is_err());
        assert!(RandomForest::params().min_samples_split(1).fit(&data).is_err());
    }
}
