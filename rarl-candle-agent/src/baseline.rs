//! Linear feature baseline.
use log::warn;
use ndarray::{Array1, Array2, Axis};
use rarl_core::{Baseline, Trajectory};

const OBS_CLIP: f64 = 10.0;
const INIT_REG_COEFF: f64 = 1e-5;
const N_REG_TRIALS: usize = 5;

/// Least squares regression of returns on features of observations and time steps.
///
/// The features of step `t` are the observation clipped to `[-10, 10]`, its
/// elementwise square, `t / 100` up to the third power and a constant. The
/// ridge coefficient starts at `1e-5` and is multiplied by 10 until the normal
/// equations are solvable. When they never are, predictions are the mean return
/// of the batch.
#[derive(Debug, Clone, Default)]
pub struct LinearFeatureBaseline {
    coeffs: Option<Array1<f64>>,
    mean_return: f64,
}

impl LinearFeatureBaseline {
    /// A baseline predicting zeros until it is fitted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Coefficients of the regression, if fitted.
    pub fn coeffs(&self) -> Option<&Array1<f64>> {
        self.coeffs.as_ref()
    }

    fn features(path: &Trajectory) -> Array2<f64> {
        let n = path.len();
        let obs_dim = path.observations.first().map_or(0, |o| o.len());
        let mut x = Array2::<f64>::zeros((n, 2 * obs_dim + 4));
        for (t, obs) in path.observations.iter().enumerate() {
            let mut row = x.row_mut(t);
            for (i, o) in obs.iter().enumerate() {
                let o = (*o as f64).clamp(-OBS_CLIP, OBS_CLIP);
                row[i] = o;
                row[obs_dim + i] = o * o;
            }
            let al = t as f64 / 100.0;
            row[2 * obs_dim] = al;
            row[2 * obs_dim + 1] = al * al;
            row[2 * obs_dim + 2] = al * al * al;
            row[2 * obs_dim + 3] = 1.0;
        }
        x
    }
}

/// Solves `a x = b` for a symmetric positive definite `a` by Cholesky decomposition.
///
/// Returns `None` if `a` is not numerically positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let d = a[[i, i]] - sum;
                if d.is_nan() || d <= 0.0 || d.is_infinite() {
                    return None;
                }
                l[[i, j]] = d.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution l y = b, then backward substitution l^T x = y
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[[i, k]] * y[k]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

impl Baseline for LinearFeatureBaseline {
    fn fit(&mut self, paths: &[Trajectory], returns: &[Vec<f32>]) {
        let n_samples: usize = paths.iter().map(|p| p.len()).sum();
        if n_samples == 0 {
            self.coeffs = None;
            self.mean_return = 0.0;
            return;
        }

        let blocks: Vec<_> = paths.iter().map(Self::features).collect();
        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        let y: Array1<f64> = returns.iter().flatten().map(|r| *r as f64).collect();
        self.mean_return = y.mean().unwrap_or(0.0);

        let x = match ndarray::concatenate(Axis(0), &views) {
            Ok(x) if x.nrows() == y.len() => x,
            _ => {
                warn!("Features and returns are not aligned, fall back to the mean return");
                self.coeffs = None;
                return;
            }
        };

        let xtx = x.t().dot(&x);
        let xty = x.t().dot(&y);
        let n = xtx.nrows();
        let mut reg = INIT_REG_COEFF;
        for _ in 0..N_REG_TRIALS {
            let mut a = xtx.clone();
            a.diag_mut().mapv_inplace(|d| d + reg);
            if let Some(coeffs) = cholesky_solve(&a, &xty) {
                self.coeffs = Some(coeffs);
                return;
            }
            reg *= 10.0;
        }

        warn!(
            "Normal equations of {} features are singular, fall back to the mean return",
            n
        );
        self.coeffs = None;
    }

    fn predict(&self, path: &Trajectory) -> Vec<f32> {
        match &self.coeffs {
            Some(coeffs) => {
                let x = Self::features(path);
                if x.ncols() != coeffs.len() {
                    return vec![self.mean_return as f32; path.len()];
                }
                x.dot(coeffs).iter().map(|v| *v as f32).collect()
            }
            None => vec![self.mean_return as f32; path.len()],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::s;
    use rarl_core::Role;

    fn first_column(x: &Array2<f64>) -> Array1<f64> {
        x.slice(s![.., 0]).to_owned()
    }

    fn path(obs: &[f32], rewards: &[f32]) -> Trajectory {
        let mut p = Trajectory::new(Role::Protagonist);
        for (o, r) in obs.iter().zip(rewards.iter()) {
            p.push(vec![*o], vec![0.0], vec![0.0], *r);
        }
        p
    }

    #[test]
    fn test_predicts_zeros_before_fit() {
        let p = path(&[1.0, 2.0], &[1.0, 1.0]);
        assert_eq!(LinearFeatureBaseline::new().predict(&p), vec![0.0, 0.0]);
    }

    #[test]
    fn test_fits_returns_linear_in_features() {
        // Returns are 2 * obs + 1, reproducible by the features
        let obs: Vec<f32> = (0..20).map(|i| (i as f32) * 0.1 - 1.0).collect();
        let ret: Vec<f32> = obs.iter().map(|o| 2.0 * o + 1.0).collect();
        let p = path(&obs, &ret);

        let mut baseline = LinearFeatureBaseline::new();
        baseline.fit(&[p.clone()], &[ret.clone()]);
        assert!(baseline.coeffs().is_some());
        for (pred, r) in baseline.predict(&p).iter().zip(ret.iter()) {
            assert!((pred - r).abs() < 1e-2, "{} vs {}", pred, r);
        }
    }

    #[test]
    fn test_clips_observations() {
        let p = path(&[100.0, -100.0], &[0.0, 0.0]);
        let x = LinearFeatureBaseline::features(&p);
        assert_eq!(first_column(&x).to_vec(), vec![10.0, -10.0]);
        assert_eq!(x[[0, 1]], 100.0);
        assert_eq!(x.ncols(), 6);
    }

    #[test]
    fn test_empty_batch_predicts_zeros() {
        let mut baseline = LinearFeatureBaseline::new();
        baseline.fit(&[], &[]);
        assert!(baseline.coeffs().is_none());
        assert!(baseline.predict(&path(&[0.0], &[0.0]))[0] == 0.0);
    }

    #[test]
    fn test_degenerate_fit_falls_back_to_mean_return() {
        // A NaN feature makes every ridge trial fail
        let p = path(&[f32::NAN, 1.0], &[0.0, 0.0]);
        let mut baseline = LinearFeatureBaseline::new();
        baseline.fit(&[p.clone()], &[vec![2.0, 4.0]]);
        assert!(baseline.coeffs().is_none());
        assert_eq!(baseline.predict(&p), vec![3.0, 3.0]);
        assert_eq!(baseline.predict(&path(&[0.5], &[0.0])), vec![3.0]);
    }

    #[test]
    fn test_cholesky_rejects_indefinite_matrix() {
        let a = ndarray::arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        let b = ndarray::arr1(&[1.0, 1.0]);
        assert!(cholesky_solve(&a, &b).is_none());

        let a = ndarray::arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let x = cholesky_solve(&a, &b).unwrap();
        assert!((4.0 * x[0] + 2.0 * x[1] - 1.0).abs() < 1e-12);
        assert!((2.0 * x[0] + 3.0 * x[1] - 1.0).abs() < 1e-12);
    }
}
