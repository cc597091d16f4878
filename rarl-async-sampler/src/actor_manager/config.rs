use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [ActorManager](super::ActorManager).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActorManagerConfig {
    /// Number of actors.
    ///
    /// If `None`, the number of workers requested on initialization is used.
    pub n_actors: Option<usize>,

    /// Base seed of the environments. Actor `i` builds its environment with `seed + i`.
    pub seed: i64,
}

impl Default for ActorManagerConfig {
    fn default() -> Self {
        Self {
            n_actors: None,
            seed: 0,
        }
    }
}

impl ActorManagerConfig {
    /// Sets the number of actors.
    pub fn n_actors(mut self, v: usize) -> Self {
        self.n_actors = Some(v);
        self
    }

    /// Sets the base seed of the environments.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`ActorManagerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorManagerConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_actor_manager_config() -> Result<()> {
        let config = ActorManagerConfig::default().n_actors(4).seed(10);
        let dir = TempDir::new("actor_manager_config")?;
        let path = dir.path().join("actor_manager.yaml");
        config.save(&path)?;
        assert_eq!(config, ActorManagerConfig::load(&path)?);
        Ok(())
    }
}
