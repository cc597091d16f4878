//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::VarMap;
use rand::Rng;
use rarl_core::error::RarlError;
use std::collections::HashMap;

fn sorted_vars(varmap: &VarMap) -> Result<Vec<(String, Var)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|e| RarlError::LockPoisoned(e.to_string()))?;
    let mut vars: Vec<_> = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

/// The number of scalar parameters in a [`VarMap`].
pub fn n_params(varmap: &VarMap) -> Result<usize> {
    Ok(sorted_vars(varmap)?
        .iter()
        .map(|(_, v)| v.as_tensor().elem_count())
        .sum())
}

/// Concatenates all variables into a flat vector.
///
/// Variables are ordered by their names.
pub fn flat_params(varmap: &VarMap) -> Result<Vec<f64>> {
    let mut params = vec![];
    for (_, var) in sorted_vars(varmap)? {
        let t = var.as_tensor().flatten_all()?.to_dtype(candle_core::DType::F64)?;
        params.extend(t.to_vec1::<f64>()?);
    }
    Ok(params)
}

/// Overwrites all variables with a flat vector in the order of [`flat_params`].
pub fn set_flat_params(varmap: &VarMap, params: &[f64]) -> Result<()> {
    let vars = sorted_vars(varmap)?;
    let n: usize = vars.iter().map(|(_, v)| v.as_tensor().elem_count()).sum();
    if n != params.len() {
        return Err(RarlError::DimensionMismatch {
            what: "flat parameters".into(),
            expected: n,
            actual: params.len(),
        }
        .into());
    }

    let mut offset = 0;
    for (_, var) in vars {
        let t = var.as_tensor();
        let len = t.elem_count();
        let src = Tensor::from_slice(&params[offset..offset + len], t.shape().clone(), t.device())?
            .to_dtype(t.dtype())?;
        var.set(&src)?;
        offset += len;
    }
    Ok(())
}

/// Concatenates the gradients of all variables into a flat vector.
///
/// Variables not reached by the backward pass get zero gradients.
pub fn flat_grad(varmap: &VarMap, grads: &GradStore) -> Result<Vec<f64>> {
    let mut flat = vec![];
    for (_, var) in sorted_vars(varmap)? {
        match grads.get(var.as_tensor()) {
            Some(g) => {
                let g = g.flatten_all()?.to_dtype(candle_core::DType::F64)?;
                flat.extend(g.to_vec1::<f64>()?);
            }
            None => flat.extend(std::iter::repeat(0f64).take(var.as_tensor().elem_count())),
        }
    }
    Ok(flat)
}

/// Copies the values of the variables of `src` into the variables of `dest` of the same names.
pub fn copy_vars(dest: &VarMap, src: &VarMap) -> Result<()> {
    let src: HashMap<_, _> = sorted_vars(src)?.into_iter().collect();
    for (k, v_dest) in sorted_vars(dest)? {
        let v_src = src
            .get(&k)
            .ok_or_else(|| anyhow!("Variable {} is not found in the source", k))?;
        v_dest.set(v_src.as_tensor())?;
    }
    Ok(())
}

/// Initializes the weights of linear layers, variables named `*.weight`, with
/// Glorot uniform values, and their biases with zeros.
///
/// Other variables are left as they are. Variables are visited in the order of
/// their names, so the result only depends on the state of `rng`.
pub fn glorot_init<R: Rng>(varmap: &VarMap, rng: &mut R) -> Result<()> {
    for (k, var) in sorted_vars(varmap)? {
        let t = var.as_tensor();
        let values: Vec<f64> = if k.ends_with(".weight") {
            let (fan_out, fan_in) = t.dims2()?;
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            (0..t.elem_count())
                .map(|_| rng.gen_range(-limit..limit))
                .collect()
        } else if k.ends_with(".bias") {
            vec![0f64; t.elem_count()]
        } else {
            continue;
        };
        let src = Tensor::from_vec(values, t.shape().clone(), t.device())?.to_dtype(t.dtype())?;
        var.set(&src)?;
    }
    Ok(())
}

/// Samples from the standard normal distribution with the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Inner product.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

/// Euclidean norm.
pub fn norm(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::Init;
    use rand::{rngs::StdRng, SeedableRng};

    fn varmap() -> Result<VarMap> {
        let vm = VarMap::new();
        vm.get((2, 3), "ln0.weight", Init::Const(1.0), DType::F64, &Device::Cpu)?;
        vm.get(2, "ln0.bias", Init::Const(1.0), DType::F64, &Device::Cpu)?;
        vm.get((1, 2), "log_std", Init::Const(0.5), DType::F64, &Device::Cpu)?;
        Ok(vm)
    }

    #[test]
    fn test_flat_params() -> Result<()> {
        let vm = varmap()?;
        assert_eq!(n_params(&vm)?, 10);

        // Sorted by names: ln0.bias, ln0.weight, log_std
        let params: Vec<f64> = (0..10).map(|i| i as f64).collect();
        set_flat_params(&vm, &params)?;
        assert_eq!(flat_params(&vm)?, params);
        assert!(set_flat_params(&vm, &params[1..]).is_err());
        Ok(())
    }

    #[test]
    fn test_glorot_init_is_seeded() -> Result<()> {
        let vm1 = varmap()?;
        let vm2 = varmap()?;
        glorot_init(&vm1, &mut StdRng::seed_from_u64(1))?;
        glorot_init(&vm2, &mut StdRng::seed_from_u64(1))?;

        let p = flat_params(&vm1)?;
        assert_eq!(p, flat_params(&vm2)?);
        assert_eq!(&p[0..2], &[0.0, 0.0]);
        assert!(p[2..8].iter().all(|w| w.abs() < (6.0f64 / 5.0).sqrt()));
        assert_eq!(&p[8..], &[0.5, 0.5]);
        Ok(())
    }

    #[test]
    fn test_copy_vars() -> Result<()> {
        let src = varmap()?;
        let dest = varmap()?;
        glorot_init(&src, &mut StdRng::seed_from_u64(3))?;
        copy_vars(&dest, &src)?;
        assert_eq!(flat_params(&dest)?, flat_params(&src)?);
        Ok(())
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(0);
        let xs: Vec<f64> = (0..20000).map(|_| standard_normal(&mut rng)).collect();
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }
}
