//! Least-squares linear regression that tolerates rank-deficient data.
//!
//! The fit centres the records and targets, then solves the normal equations
//! through `linfa-linear` on the records stacked over `sqrt(lambda) * I`. A
//! tiny `lambda`, scaled to the data, keeps the system positive definite when
//! a column never varies or there are fewer rows than features. On full-rank
//! data the result matches ordinary least squares to within rounding.

use crate::error::FitnessError;
use linfa::traits::{Fit, PredictInplace};
use linfa::{Dataset, DatasetBase};
use linfa_linear::LinearRegression;
use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix2};
use serde::{Deserialize, Serialize};

/// Hyperparameters of a [`LinearRegressor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressorParams {
    ridge: f64,
}

impl Default for LinearRegressorParams {
    fn default() -> Self {
        LinearRegressorParams { ridge: 1e-6 }
    }
}

impl LinearRegressorParams {
    /// Ridge penalty relative to the mean squared column norm of the
    /// centred records.
    pub fn ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }
}

/// A fitted hyperplane `y = x · coefficients + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearRegressor {
    pub fn params() -> LinearRegressorParams {
        LinearRegressorParams::default()
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl<D: Data<Elem = f64>> Fit<ArrayBase<D, Ix2>, Array1<f64>, FitnessError>
    for LinearRegressorParams
{
    type Object = LinearRegressor;

    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, Array1<f64>>,
    ) -> Result<LinearRegressor, FitnessError> {
        if !(self.ridge > 0.0 && self.ridge.is_finite()) {
            return Err(linfa::Error::Parameters(format!(
                "ridge must be positive, got {}",
                self.ridge
            ))
            .into());
        }

        let x = dataset.records();
        let y = dataset.targets();
        let (n, p) = x.dim();
        if n == 0 {
            return Err(linfa::Error::NotEnoughSamples.into());
        }
        if y.len() != n {
            return Err(linfa::Error::Parameters(format!(
                "{n} samples but {} targets",
                y.len()
            ))
            .into());
        }

        let x_offset = x.mean_axis(Axis(0)).ok_or(linfa::Error::NotEnoughSamples)?;
        let y_offset = y.mean().ok_or(linfa::Error::NotEnoughSamples)?;
        let centered = x - &x_offset;

        let scale = centered.mapv(|v| v * v).sum() / p.max(1) as f64;
        let lambda = self.ridge * scale.max(1.0);

        let mut records = Array2::zeros((n + p, p));
        records.slice_mut(s![..n, ..]).assign(&centered);
        for j in 0..p {
            records[[n + j, j]] = lambda.sqrt();
        }
        let mut targets = Array1::zeros(n + p);
        targets.slice_mut(s![..n]).assign(&(y - y_offset));

        let fitted = LinearRegression::new()
            .with_intercept(false)
            .fit(&Dataset::new(records, targets))?;
        let coefficients = fitted.params().to_owned();
        let intercept = y_offset - x_offset.dot(&coefficients);

        Ok(LinearRegressor {
            coefficients,
            intercept,
        })
    }
}

impl<D: Data<Elem = f64>> PredictInplace<ArrayBase<D, Ix2>, Array1<f64>> for LinearRegressor {
    fn predict_inplace<'a>(&'a self, x: &'a ArrayBase<D, Ix2>, y: &mut Array1<f64>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        y.assign(&(x.dot(&self.coefficients) + self.intercept));
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::prelude::*;
    use ndarray::array;

    #[test]
    fn recovers_exact_plane() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0], [4.0, 3.0], [5.0, 8.0]];
        let y = x.map_axis(Axis(1), |r| 3.0 * r[0] - 2.0 * r[1] + 7.0);
        let model = LinearRegressor::params().fit(&Dataset::new(x, y)).unwrap();

        assert!((model.coefficients()[0] - 3.0).abs() < 1e-3);
        assert!((model.coefficients()[1] + 2.0).abs() < 1e-3);
        assert!((model.intercept() - 7.0).abs() < 1e-2);
    }

    #[test]
    fn fits_constant_column_and_fewer_rows_than_features() {
        // Second column never varies; two rows for three features.
        let x = array![[25.0, 37.0, 1.0], [40.0, 37.0, 3.0]];
        let y = array![200.0, 320.0];
        let model = LinearRegressor::params().fit(&Dataset::new(x.clone(), y.clone())).unwrap();

        let pred = model.predict(&x);
        assert!((pred[0] - 200.0).abs() < 1.0, "{pred}");
        assert!((pred[1] - 320.0).abs() < 1.0, "{pred}");
        assert!(model.coefficients()[1].abs() < 1e-6);
    }

    #[test]
    fn identical_rows_predict_the_mean() {
        let x = Array2::from_elem((3, 2), 5.0);
        let y = array![1.0, 2.0, 3.0];
        let model = LinearRegressor::params().fit(&Dataset::new(x.clone(), y)).unwrap();
        assert!((model.predict(&x)[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_ridge() {
        let data = Dataset::new(array![[1.0], [2.0]], array![1.0, 2.0]);
        assert!(LinearRegressor::params().ridge(0.0).fit(&data).is_err());
    }
}
