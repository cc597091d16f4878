//! Configuration of [InvertedPendulumAdv](super::InvertedPendulumAdv).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
/// Configurations of [`InvertedPendulumAdv`](super::InvertedPendulumAdv).
pub struct InvertedPendulumAdvConfig {
    /// Gravitational acceleration.
    pub gravity: f64,

    /// Mass of the cart.
    pub cart_mass: f64,

    /// Mass of the pole.
    pub pole_mass: f64,

    /// Half length of the pole.
    pub pole_half_length: f64,

    /// Integration time step.
    pub dt: f64,

    /// Bound of the force the protagonist applies to the cart.
    pub pro_bound: f32,

    /// Bound of each component of the force the adversary applies to the tip of the pole.
    pub adv_bound: f32,

    /// Episodes terminate when the angle of the pole exceeds this value.
    pub theta_threshold: f64,

    /// Episodes terminate when the position of the cart exceeds this value.
    pub x_threshold: f64,

    /// Initial states are drawn uniformly from `[-init_noise, init_noise]`.
    pub init_noise: f64,

    /// Episodes are truncated after this number of steps.
    pub max_steps: usize,
}

impl Default for InvertedPendulumAdvConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            cart_mass: 1.0,
            pole_mass: 0.1,
            pole_half_length: 0.5,
            dt: 0.02,
            pro_bound: 10.0,
            adv_bound: 1.0,
            theta_threshold: 0.2,
            x_threshold: 2.4,
            init_noise: 0.01,
            max_steps: 1000,
        }
    }
}

impl InvertedPendulumAdvConfig {
    /// Sets the bound of the protagonist's force.
    pub fn pro_bound(mut self, v: f32) -> Self {
        self.pro_bound = v;
        self
    }

    /// Sets the bound of the adversary's force.
    pub fn adv_bound(mut self, v: f32) -> Self {
        self.adv_bound = v;
        self
    }

    /// Sets the termination angle.
    pub fn theta_threshold(mut self, v: f64) -> Self {
        self.theta_threshold = v;
        self
    }

    /// Sets the noise of initial states.
    pub fn init_noise(mut self, v: f64) -> Self {
        self.init_noise = v;
        self
    }

    /// Sets the maximum number of steps.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Constructs [`InvertedPendulumAdvConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`InvertedPendulumAdvConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
