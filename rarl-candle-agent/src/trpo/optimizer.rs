//! Conjugate gradient optimizer with a KL constraint.
use super::TrpoConfig;
use crate::util::{dot, flat_grad, flat_params, norm, set_flat_params};
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarMap;
use log::{debug, warn};

/// Solves `A x = b` with the conjugate gradient method, where `A` is given as
/// the function `f_ax` computing matrix-vector products.
pub fn conjugate_gradient<F>(
    mut f_ax: F,
    b: &[f64],
    cg_iters: usize,
    residual_tol: f64,
) -> Result<Vec<f64>>
where
    F: FnMut(&[f64]) -> Result<Vec<f64>>,
{
    let mut p = b.to_vec();
    let mut r = b.to_vec();
    let mut x = vec![0f64; b.len()];
    let mut rdotr = dot(&r, &r);

    for _ in 0..cg_iters {
        if rdotr < residual_tol {
            break;
        }
        let z = f_ax(&p)?;
        let v = rdotr / dot(&p, &z);
        x.iter_mut().zip(p.iter()).for_each(|(x, p)| *x += v * p);
        r.iter_mut().zip(z.iter()).for_each(|(r, z)| *r -= v * z);
        let newrdotr = dot(&r, &r);
        let mu = newrdotr / rdotr;
        p.iter_mut().zip(r.iter()).for_each(|(p, r)| *p = r + mu * *p);
        rdotr = newrdotr;
    }

    Ok(x)
}

/// Outcome of [`ConjugateGradientOptimizer::optimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeResult {
    /// Loss at the parameters before the update.
    pub loss_before: f64,

    /// Loss at the parameters after the update.
    pub loss_after: f64,

    /// Constraint value at the parameters after the update.
    pub mean_kl: f64,

    /// The number of shrinks of the step in the line search.
    pub n_backtracks: usize,

    /// `true` if a step was taken, `false` if the parameters were restored.
    pub accepted: bool,
}

/// Minimizes a loss subject to `constraint <= step_size`.
///
/// The search direction is the natural gradient, obtained with conjugate
/// gradient on Fisher-vector products. These products are central finite
/// differences of the gradient of the constraint. The full step is scaled to
/// the boundary of the quadratic approximation of the trust region and shrunk
/// geometrically until the loss improves and the constraint holds. If no step
/// qualifies the parameters are left unchanged.
#[derive(Debug, Clone)]
pub struct ConjugateGradientOptimizer {
    step_size: f64,
    cg_iters: usize,
    cg_damping: f64,
    residual_tol: f64,
    backtrack_ratio: f64,
    max_backtracks: usize,
    fd_eps: f64,
}

impl ConjugateGradientOptimizer {
    /// Constructs the optimizer from the configuration of TRPO.
    pub fn new(config: &TrpoConfig) -> Self {
        Self {
            step_size: config.step_size,
            cg_iters: config.cg_iters,
            cg_damping: config.cg_damping,
            residual_tol: config.residual_tol,
            backtrack_ratio: config.backtrack_ratio,
            max_backtracks: config.max_backtracks,
            fd_eps: config.fd_eps,
        }
    }

    fn grad<F>(varmap: &VarMap, f: &F) -> Result<(f64, Vec<f64>)>
    where
        F: Fn() -> Result<Tensor>,
    {
        let value = f()?;
        let grads = value.backward()?;
        Ok((value.to_scalar::<f64>()?, flat_grad(varmap, &grads)?))
    }

    fn fisher_vector_product<K>(
        &self,
        varmap: &VarMap,
        kl_fn: &K,
        params: &[f64],
        v: &[f64],
    ) -> Result<Vec<f64>>
    where
        K: Fn() -> Result<Tensor>,
    {
        let eps = self.fd_eps / (norm(v) + 1e-8);
        let shifted = |sign: f64| -> Vec<f64> {
            params
                .iter()
                .zip(v.iter())
                .map(|(p, v)| p + sign * eps * v)
                .collect()
        };

        set_flat_params(varmap, &shifted(1.0))?;
        let (_, grad_plus) = Self::grad(varmap, kl_fn)?;
        set_flat_params(varmap, &shifted(-1.0))?;
        let (_, grad_minus) = Self::grad(varmap, kl_fn)?;
        set_flat_params(varmap, params)?;

        Ok(grad_plus
            .iter()
            .zip(grad_minus.iter())
            .zip(v.iter())
            .map(|((gp, gm), v)| (gp - gm) / (2.0 * eps) + self.cg_damping * v)
            .collect())
    }

    fn evaluate<L, K>(loss_fn: &L, kl_fn: &K) -> Result<(f64, f64)>
    where
        L: Fn() -> Result<Tensor>,
        K: Fn() -> Result<Tensor>,
    {
        let loss = loss_fn()?.to_scalar::<f64>()?;
        let kl = kl_fn()?.to_scalar::<f64>()?;
        Ok((loss, kl))
    }

    /// Performs one constrained update of the variables in `varmap`.
    ///
    /// `loss_fn` and `kl_fn` must compute scalar tensors from the current values
    /// of the variables.
    pub fn optimize<L, K>(&self, varmap: &VarMap, loss_fn: L, kl_fn: K) -> Result<OptimizeResult>
    where
        L: Fn() -> Result<Tensor>,
        K: Fn() -> Result<Tensor>,
    {
        let params = flat_params(varmap)?;
        let (loss_before, grad) = Self::grad(varmap, &loss_fn)?;
        let rejected = |n_backtracks: usize| OptimizeResult {
            loss_before,
            loss_after: loss_before,
            mean_kl: 0.0,
            n_backtracks,
            accepted: false,
        };

        if grad.iter().any(|g| !g.is_finite()) {
            warn!("Gradient of the loss is not finite, skip the update");
            return Ok(rejected(0));
        }
        if norm(&grad) == 0.0 {
            debug!("Gradient of the loss is zero, skip the update");
            return Ok(rejected(0));
        }

        let direction = conjugate_gradient(
            |v| self.fisher_vector_product(varmap, &kl_fn, &params, v),
            &grad,
            self.cg_iters,
            self.residual_tol,
        )?;
        let hx = self.fisher_vector_product(varmap, &kl_fn, &params, &direction)?;
        let scale = (2.0 * self.step_size / (dot(&direction, &hx) + 1e-8)).sqrt();
        let full_step: Vec<f64> = direction.iter().map(|d| scale * d).collect();
        if !scale.is_finite() || full_step.iter().any(|s| !s.is_finite()) {
            warn!("Search direction is not finite, skip the update");
            return Ok(rejected(0));
        }

        let mut ratio = 1.0;
        for n_backtracks in 0..self.max_backtracks {
            let candidate: Vec<f64> = params
                .iter()
                .zip(full_step.iter())
                .map(|(p, s)| p - ratio * s)
                .collect();
            set_flat_params(varmap, &candidate)?;
            let (loss, kl) = Self::evaluate(&loss_fn, &kl_fn)?;

            if loss.is_finite() && kl.is_finite() && loss < loss_before && kl <= self.step_size {
                debug!(
                    "Line search accepted a step after {} backtracks: loss {} -> {}, kl {}",
                    n_backtracks, loss_before, loss, kl
                );
                return Ok(OptimizeResult {
                    loss_before,
                    loss_after: loss,
                    mean_kl: kl,
                    n_backtracks,
                    accepted: true,
                });
            }
            ratio *= self.backtrack_ratio;
        }

        warn!(
            "Line search found no step improving the loss within the trust region, \
             parameters are restored"
        );
        set_flat_params(varmap, &params)?;
        Ok(rejected(self.max_backtracks))
    }
}
