use std::time::Duration;

/// Stats of the rollouts in each [Actor](crate::Actor).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActorStat {
    /// The number of steps for interaction between the players and env.
    pub env_steps: usize,

    /// The number of trajectories.
    pub n_paths: usize,

    /// Time spent in rollouts.
    pub duration: Duration,
}

impl ActorStat {
    /// Adds the stats of another job.
    pub fn merge(&mut self, other: &ActorStat) {
        self.env_steps += other.env_steps;
        self.n_paths += other.n_paths;
        self.duration += other.duration;
    }
}

/// Returns a formatted string of the set of [ActorStat] for reporting.
pub fn actor_stats_fmt(stats: &[ActorStat]) -> String {
    let mut s = "actor id, steps, paths, duration [sec], steps per sec\n".to_string();
    for (i, stat) in stats.iter().enumerate() {
        let n = stat.env_steps;
        let d = stat.duration.as_secs_f32();
        let p = if d > 0.0 { (n as f32) / d } else { 0.0 };
        s += format!("{}, {}, {}, {}, {}\n", i, n, stat.n_paths, d, p).as_str();
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_merge_and_format() {
        let mut stat = ActorStat::default();
        stat.merge(&ActorStat {
            env_steps: 10,
            n_paths: 2,
            duration: Duration::from_secs(2),
        });
        stat.merge(&ActorStat {
            env_steps: 5,
            n_paths: 1,
            duration: Duration::from_secs(1),
        });
        assert_eq!(stat.env_steps, 15);
        assert_eq!(stat.n_paths, 3);

        let s = actor_stats_fmt(&[stat]);
        assert_eq!(s.lines().nth(1), Some("0, 15, 3, 3, 5"));
    }
}
