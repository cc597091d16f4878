use anyhow::Result;
use clap::Parser;
use log::info;
use rarl::build_trpo;
use rarl_async_sampler::{ActorManager, ActorManagerConfig};
use rarl_candle_agent::TrpoConfig;
use rarl_core::{
    record::BufferedRecorder, Experiment, ExperimentConfig, ProTrainingAdversary, Role,
    SERIES_KEYS,
};
use rarl_pendulum_env::{InvertedPendulumAdv, InvertedPendulumAdvConfig};

/// Robust adversarial RL on the inverted pendulum with an adversarial tip force
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file of the experiment configuration
    #[arg(long)]
    config: Option<String>,

    /// YAML file of the configuration of TRPO
    #[arg(long)]
    trpo_config: Option<String>,

    /// YAML file of the configuration of the environment
    #[arg(long)]
    env_config: Option<String>,

    /// The number of independent runs
    #[arg(long)]
    n_exps: Option<usize>,

    /// The number of global iterations of each run
    #[arg(long)]
    n_itr: Option<usize>,

    /// The number of rollout workers
    #[arg(long)]
    n_workers: Option<usize>,

    /// Directory where the evaluation series are written
    #[arg(long)]
    summary_dir: Option<String>,

    /// Train the protagonist against the zero adversary
    #[arg(long, default_value_t = false)]
    zero_adv_training: bool,
}

fn experiment_config(args: &Args) -> Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default().n_exps(5),
    };
    if let Some(v) = args.n_exps {
        config.n_exps = v;
    }
    if let Some(v) = args.n_itr {
        config.trainer.n_itr = v;
    }
    if let Some(v) = args.n_workers {
        config.n_workers = v;
    }
    if let Some(v) = &args.summary_dir {
        config.summary_dir = Some(v.clone());
    }
    if args.zero_adv_training {
        config.trainer.pro_training_adversary = ProTrainingAdversary::Zero;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = experiment_config(&args)?;
    let trpo_config = match &args.trpo_config {
        Some(path) => TrpoConfig::load(path)?,
        None => TrpoConfig::default(),
    };
    let env_config = match &args.env_config {
        Some(path) => InvertedPendulumAdvConfig::load(path)?,
        None => InvertedPendulumAdvConfig::default(),
    };
    info!("{:?}", config);

    let experiment = Experiment::<InvertedPendulumAdv>::build(config, env_config.clone());
    let mut summary = experiment.summary()?;
    let mut recorder = BufferedRecorder::new();

    experiment.run(
        |spec, seed| build_trpo(Role::Protagonist, spec, &trpo_config, seed),
        |spec, seed| build_trpo(Role::Adversary, spec, &trpo_config, seed),
        |seed| {
            let config = ActorManagerConfig::default().seed(seed as i64);
            Ok(ActorManager::<InvertedPendulumAdv>::build(&config, &env_config))
        },
        &mut summary,
        &mut recorder,
    )?;

    let accepted = recorder.scalars("accepted");
    let kls = recorder.scalars("mean_kl");
    if !accepted.is_empty() {
        info!(
            "{} updates, {:.1}% accepted by the line search, mean kl {:.5}",
            accepted.len(),
            100.0 * accepted.iter().sum::<f32>() / accepted.len() as f32,
            kls.iter().sum::<f32>() / kls.len().max(1) as f32,
        );
    }

    for key in SERIES_KEYS {
        if let (Some(mean), Some(std)) = (summary.mean(key), summary.std(key)) {
            info!(
                "{}: {:.1} +/- {:.1} after training ({:.1} before)",
                key,
                mean.last().copied().unwrap_or_default(),
                std.last().copied().unwrap_or_default(),
                mean.first().copied().unwrap_or_default(),
            );
        }
    }

    Ok(())
}
