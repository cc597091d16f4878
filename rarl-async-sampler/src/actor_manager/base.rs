use crate::{
    actor_stats_fmt, Actor, ActorManagerConfig, ActorMessage, ActorReply, ActorStat, RolloutJob,
};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use rarl_core::{error::RarlError, Env, RolloutRequest, SamplerPool, Trajectory};
use std::{marker::PhantomData, thread::JoinHandle};

/// Channels and thread of an actor.
struct ActorHandle {
    sender: Sender<ActorMessage>,
    receiver: Receiver<ActorReply>,
    thread: JoinHandle<ActorStat>,
}

enum PoolState {
    Idle,
    Active(Vec<ActorHandle>),
    ShutDown,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages [`Actor`]s running in their own threads.
///
/// A [`RolloutRequest`] is split evenly across the actors. Every actor gets
/// its own snapshots of the two policies, reseeded with `request.seed + 2 * id`
/// for the protagonist and `request.seed + 2 * id + 1` for the adversary, and
/// collects whole trajectories until its share of timesteps is reached. The
/// trajectories are returned in the order of actor ids, so a request is
/// reproducible for fixed seeds.
///
/// ```mermaid
/// graph LR
///     M[ActorManager] -->|RolloutJob| A0[Actor 0]
///     M -->|RolloutJob| A1[Actor 1]
///     A0 -->|Trajectories| M
///     A1 -->|Trajectories| M
/// ```
///
/// An actor that panics is detected when its channels disconnect, which fails
/// the request with [`RarlError::WorkerCrashed`].
pub struct ActorManager<E: Env> {
    config: ActorManagerConfig,
    env_config: E::Config,
    state: PoolState,
    phantom: PhantomData<E>,
}

impl<E> ActorManager<E>
where
    E: Env + 'static,
    E::Config: Send + 'static,
{
    /// Builds a [`ActorManager`]. Threads are spawned on [`SamplerPool::initialize`].
    pub fn build(config: &ActorManagerConfig, env_config: &E::Config) -> Self {
        Self {
            config: config.clone(),
            env_config: env_config.clone(),
            state: PoolState::Idle,
            phantom: PhantomData,
        }
    }

    /// The number of running actors.
    pub fn n_actors(&self) -> usize {
        match &self.state {
            PoolState::Active(actors) => actors.len(),
            _ => 0,
        }
    }

    fn spawn(&self, id: usize) -> Result<ActorHandle> {
        let (job_s, job_r) = unbounded();
        let (reply_s, reply_r) = unbounded();
        let actor = Actor::<E>::build(
            id,
            self.env_config.clone(),
            self.config.seed.wrapping_add(id as i64),
            job_r,
            reply_s,
        );
        let thread = std::thread::Builder::new()
            .name(format!("rarl-actor-{}", id))
            .spawn(move || actor.run())?;

        Ok(ActorHandle {
            sender: job_s,
            receiver: reply_r,
            thread,
        })
    }

    /// Splits `batch_size` timesteps evenly into `n` shares.
    fn shares(batch_size: usize, n: usize) -> Vec<usize> {
        let base = batch_size / n;
        let rem = batch_size % n;
        (0..n).map(|i| base + usize::from(i < rem)).collect()
    }
}

impl<E> SamplerPool for ActorManager<E>
where
    E: Env + 'static,
    E::Config: Send + 'static,
{
    fn initialize(&mut self, n_workers: usize) -> Result<()> {
        match self.state {
            PoolState::ShutDown => return Err(RarlError::SamplerShutDown.into()),
            PoolState::Active(_) => return Ok(()),
            PoolState::Idle => {}
        }

        let n = self.config.n_actors.unwrap_or(n_workers);
        if n == 0 {
            let msg = "the number of actors must be positive".to_string();
            return Err(RarlError::InvalidConfig(msg).into());
        }
        let actors = (0..n).map(|id| self.spawn(id)).collect::<Result<Vec<_>>>()?;
        info!("Started {} actors", n);
        self.state = PoolState::Active(actors);
        Ok(())
    }

    fn sample_paths(&mut self, request: RolloutRequest) -> Result<Vec<Trajectory>> {
        let actors = match &self.state {
            PoolState::Active(actors) => actors,
            PoolState::Idle => return Err(RarlError::SamplerNotInitialized.into()),
            PoolState::ShutDown => return Err(RarlError::SamplerShutDown.into()),
        };

        let shares = Self::shares(request.batch_size, actors.len());
        let mut n_sent = 0;
        let mut first_error = None;
        for (id, (actor, share)) in actors.iter().zip(shares.iter()).enumerate() {
            // Actors with an empty share sit this request out
            if *share == 0 {
                continue;
            }
            let seed = request.seed.wrapping_add(2 * id as u64);
            let mut protagonist = request.protagonist.snapshot()?;
            let mut adversary = request.adversary.snapshot()?;
            protagonist.reseed(seed);
            adversary.reseed(seed.wrapping_add(1));
            let job = RolloutJob {
                role: request.role,
                protagonist,
                adversary,
                batch_size: *share,
                max_path_length: request.max_path_length,
            };
            if actor.sender.send(ActorMessage::Rollout(job)).is_err() {
                first_error.get_or_insert(RarlError::WorkerCrashed(id));
                break;
            }
            n_sent += 1;
        }

        // Every job sent gets a reply, so replies are drained even after a failure
        let mut paths = vec![];
        let sent = actors
            .iter()
            .zip(shares.iter())
            .enumerate()
            .filter(|(_, (_, share))| **share > 0)
            .take(n_sent);
        for (id, (actor, _)) in sent {
            match actor.receiver.recv() {
                Ok(ActorReply::Paths(p, _)) => paths.extend(p),
                Ok(ActorReply::Failed(message)) => {
                    first_error.get_or_insert(RarlError::WorkerFailed { id, message });
                }
                Err(_) => {
                    first_error.get_or_insert(RarlError::WorkerCrashed(id));
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(paths),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        let actors = match std::mem::replace(&mut self.state, PoolState::ShutDown) {
            PoolState::Active(actors) => actors,
            _ => return Ok(()),
        };

        for actor in actors.iter() {
            // A crashed actor has already hung up
            let _ = actor.sender.send(ActorMessage::Stop);
        }

        let mut stats = vec![];
        let mut crashed = None;
        for (id, actor) in actors.into_iter().enumerate() {
            drop(actor.sender);
            match actor.thread.join() {
                Ok(stat) => stats.push(stat),
                Err(_) => {
                    warn!("Actor {} panicked", id);
                    crashed.get_or_insert(id);
                    stats.push(ActorStat::default());
                }
            }
        }
        info!("Stopped actors\n{}", actor_stats_fmt(&stats));

        match crashed {
            Some(id) => Err(RarlError::WorkerCrashed(id).into()),
            None => Ok(()),
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.state, PoolState::Active(_))
    }
}

impl<E: Env> Drop for ActorManager<E> {
    fn drop(&mut self) {
        if let PoolState::Active(actors) = std::mem::replace(&mut self.state, PoolState::ShutDown) {
            for actor in actors.iter() {
                let _ = actor.sender.send(ActorMessage::Stop);
            }
            for (id, actor) in actors.into_iter().enumerate() {
                drop(actor.sender);
                if actor.thread.join().is_err() {
                    warn!("Actor {} panicked", id);
                }
            }
        }
    }
}
