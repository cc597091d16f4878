mod config;
use anyhow::Result;
pub use config::InvertedPendulumAdvConfig;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rarl_core::{
    error::RarlError, record::Record, BoxSpace, Composition, Env, EnvSpec, Step,
};

const PRO_DIM: usize = 1;
const ADV_DIM: usize = 2;

/// Inverted pendulum on a cart with an adversarial force at the tip of the pole.
///
/// The observation is `[x, theta, x_dot, theta_dot]`, where `theta` is the angle of
/// the pole from the upright position. The reward is 1 for every step, so the
/// return is the number of steps the pole stays up. Episodes terminate when
/// `|theta|` exceeds `theta_threshold` or the cart leaves `[-x_threshold, x_threshold]`.
pub struct InvertedPendulumAdv {
    config: InvertedPendulumAdvConfig,
    rng: StdRng,
    state: [f64; 4],
    t: usize,
}

impl InvertedPendulumAdv {
    /// The current state `[x, theta, x_dot, theta_dot]`.
    pub fn state(&self) -> [f64; 4] {
        self.state
    }

    fn obs(&self) -> Vec<f32> {
        self.state.iter().map(|v| *v as f32).collect()
    }

    fn init_state<R: Rng>(&mut self, rng: &mut R) -> Vec<f32> {
        let noise = self.config.init_noise;
        for v in self.state.iter_mut() {
            *v = if noise > 0.0 {
                rng.gen_range(-noise..noise)
            } else {
                0.0
            };
        }
        self.t = 0;
        self.obs()
    }

    /// Accelerations `(x_ddot, theta_ddot)` given the cart force and the tip force.
    fn accelerations(&self, u: f64, fx: f64, fy: f64) -> (f64, f64) {
        let c = &self.config;
        let (m_cart, m, l, g) = (c.cart_mass, c.pole_mass, c.pole_half_length, c.gravity);
        let [_, theta, _, theta_dot] = self.state;
        let (sin, cos) = theta.sin_cos();
        let tip = 2.0 * l;

        // Mass matrix of the generalized coordinates (x, theta)
        let m11 = m_cart + m;
        let m12 = m * l * cos;
        let m22 = 4.0 / 3.0 * m * l * l;

        let f1 = u + fx + m * l * theta_dot * theta_dot * sin;
        let f2 = tip * (fx * cos - fy * sin) + m * g * l * sin;

        let det = m11 * m22 - m12 * m12;
        ((f1 * m22 - m12 * f2) / det, (m11 * f2 - m12 * f1) / det)
    }
}

impl Env for InvertedPendulumAdv {
    type Config = InvertedPendulumAdvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.max_steps == 0 {
            return Err(RarlError::InvalidConfig("max_steps must be positive".into()).into());
        }
        Ok(Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed as u64),
            state: [0.0; 4],
            t: 0,
        })
    }

    fn spec(&self) -> EnvSpec {
        EnvSpec {
            observation_space: BoxSpace::unbounded(4),
            pro_action_space: BoxSpace::symmetric(PRO_DIM, self.config.pro_bound),
            adv_action_space: BoxSpace::symmetric(ADV_DIM, self.config.adv_bound),
            action_dim: PRO_DIM + ADV_DIM,
            composition: Composition::Concat,
        }
    }

    fn step(&mut self, a: &[f32]) -> Result<(Step, Record)> {
        if a.len() != PRO_DIM + ADV_DIM {
            return Err(RarlError::DimensionMismatch {
                what: "action of the environment".into(),
                expected: PRO_DIM + ADV_DIM,
                actual: a.len(),
            }
            .into());
        }
        let pro_bound = self.config.pro_bound;
        let adv_bound = self.config.adv_bound;
        let u = a[0].clamp(-pro_bound, pro_bound) as f64;
        let fx = a[1].clamp(-adv_bound, adv_bound) as f64;
        let fy = a[2].clamp(-adv_bound, adv_bound) as f64;

        let (x_acc, theta_acc) = self.accelerations(u, fx, fy);
        let dt = self.config.dt;
        let [x, theta, x_dot, theta_dot] = self.state;
        self.state = [
            x + dt * x_dot,
            theta + dt * theta_dot,
            x_dot + dt * x_acc,
            theta_dot + dt * theta_acc,
        ];
        self.t += 1;

        let [x, theta, _, _] = self.state;
        let is_terminated = self.state.iter().any(|v| !v.is_finite())
            || theta.abs() > self.config.theta_threshold
            || x.abs() > self.config.x_threshold;
        let is_truncated = !is_terminated && self.t >= self.config.max_steps;
        if is_terminated {
            trace!("Pole fell at step {}", self.t);
        }

        let step = Step::new(self.obs(), 1.0, is_terminated, is_truncated);
        Ok((step, Record::empty()))
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        let mut rng = StdRng::from_rng(&mut self.rng)?;
        Ok(self.init_state(&mut rng))
    }

    /// Resets to an initial state determined by `ix` alone, so that evaluations
    /// with the same episode indices start from the same states.
    fn reset_with_index(&mut self, ix: usize) -> Result<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(ix as u64);
        Ok(self.init_state(&mut rng))
    }
}
