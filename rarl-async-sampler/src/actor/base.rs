use crate::{ActorMessage, ActorReply, ActorStat, RolloutJob};
use crossbeam_channel::{Receiver, Sender};
use log::{info, trace, warn};
use rarl_core::{collect, Env};
use std::time::Instant;

/// Runs rollouts of the protagonist and the adversary in an [`Env`].
///
/// The environment is built in the thread running [`Actor::run`] and is never
/// shared. Jobs arrive through a channel from the
/// [`ActorManager`](crate::ActorManager) and every job gets exactly one reply.
pub struct Actor<E: Env> {
    id: usize,
    env_config: E::Config,
    env_seed: i64,
    receiver: Receiver<ActorMessage>,
    sender: Sender<ActorReply>,
}

impl<E: Env> Actor<E> {
    /// Constructs an actor.
    pub fn build(
        id: usize,
        env_config: E::Config,
        env_seed: i64,
        receiver: Receiver<ActorMessage>,
        sender: Sender<ActorReply>,
    ) -> Self {
        Self {
            id,
            env_config,
            env_seed,
            receiver,
            sender,
        }
    }

    fn rollout(&self, env: &mut E, job: RolloutJob) -> ActorReply {
        let RolloutJob {
            role,
            mut protagonist,
            mut adversary,
            batch_size,
            max_path_length,
        } = job;

        let start = Instant::now();
        let result = collect(
            env,
            protagonist.as_mut(),
            adversary.as_mut(),
            role,
            batch_size,
            max_path_length,
        );

        match result {
            Ok(paths) => {
                let stat = ActorStat {
                    env_steps: paths.iter().map(|p| p.len()).sum(),
                    n_paths: paths.len(),
                    duration: start.elapsed(),
                };
                trace!("Actor {} collected {} steps", self.id, stat.env_steps);
                ActorReply::Paths(paths, stat)
            }
            Err(e) => ActorReply::Failed(e.to_string()),
        }
    }

    /// Serves rollout jobs until [`ActorMessage::Stop`] arrives or the manager hangs up.
    ///
    /// Returns the stats accumulated over all jobs.
    pub fn run(self) -> ActorStat {
        let mut env = match E::build(&self.env_config, self.env_seed) {
            Ok(env) => Some(env),
            Err(e) => {
                warn!("Actor {} failed to build its environment: {}", self.id, e);
                None
            }
        };
        let mut total = ActorStat::default();

        while let Ok(msg) = self.receiver.recv() {
            let job = match msg {
                ActorMessage::Rollout(job) => job,
                ActorMessage::Stop => break,
            };
            let reply = match env.as_mut() {
                Some(env) => self.rollout(env, job),
                None => ActorReply::Failed("environment is not available".into()),
            };
            if let ActorReply::Paths(_, stat) = &reply {
                total.merge(stat);
            }
            if self.sender.send(reply).is_err() {
                break;
            }
        }

        info!("Stopped actor {}", self.id);
        total
    }
}
