//! Aggregation of evaluation series over repeated training runs.
use crate::{error::RarlError, TrainingRun};
use anyhow::Result;
use csv::WriterBuilder;
use log::info;
use serde::Serialize;
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

/// Names of the evaluation series.
pub const SERIES_KEYS: [&str; 3] = ["const_test_rew", "rand_test_rew", "adv_test_rew"];

#[derive(Debug, Serialize)]
struct SummaryRow {
    itr: usize,
    const_test_rew_mean: f32,
    const_test_rew_std: f32,
    rand_test_rew_mean: f32,
    rand_test_rew_std: f32,
    adv_test_rew_mean: f32,
    adv_test_rew_std: f32,
}

/// Evaluation series of completed training runs.
///
/// All runs must have the same number of evaluation checkpoints. If a directory
/// is given, every pushed run is appended to `<series>.csv`, one row per run,
/// and `summary.csv` is rewritten with the mean and standard deviation curves,
/// so completed runs survive a failure of a later one.
#[derive(Debug, Default)]
pub struct ExperimentSummary {
    runs: Vec<TrainingRun>,
    dir: Option<PathBuf>,
}

impl ExperimentSummary {
    /// An in-memory summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// A summary persisting runs in the given directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            runs: vec![],
            dir: Some(dir.as_ref().to_path_buf()),
        })
    }

    /// Adds a completed run.
    pub fn push(&mut self, run: TrainingRun) -> Result<()> {
        let n = run.n_checkpoints();
        if run.rand_test_rew.len() != n || run.adv_test_rew.len() != n {
            return Err(RarlError::InvalidConfig(
                "evaluation series of a run differ in length".into(),
            )
            .into());
        }
        if let Some(first) = self.runs.first() {
            if first.n_checkpoints() != n {
                return Err(RarlError::DimensionMismatch {
                    what: "evaluation checkpoints".into(),
                    expected: first.n_checkpoints(),
                    actual: n,
                }
                .into());
            }
        }

        if let Some(dir) = &self.dir {
            for key in SERIES_KEYS {
                Self::append_series(&dir.join(format!("{}.csv", key)), &run, key)?;
            }
        }
        self.runs.push(run);
        if let Some(dir) = self.dir.clone() {
            self.write_csv(dir.join("summary.csv"))?;
        }
        Ok(())
    }

    fn append_series(path: &Path, run: &TrainingRun, key: &str) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
        if let Some(series) = run.series(key) {
            wtr.serialize(series)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Completed runs.
    pub fn runs(&self) -> &[TrainingRun] {
        &self.runs
    }

    /// The number of completed runs.
    pub fn n_runs(&self) -> usize {
        self.runs.len()
    }

    /// The number of evaluation checkpoints, zero if no run has completed.
    pub fn n_checkpoints(&self) -> usize {
        self.runs.first().map(|r| r.n_checkpoints()).unwrap_or(0)
    }

    /// Per-checkpoint mean of an evaluation series over the runs.
    pub fn mean(&self, key: &str) -> Option<Vec<f32>> {
        let stacked = self.stacked(key)?;
        let n = stacked.len() as f32;
        Some(
            (0..self.n_checkpoints())
                .map(|t| stacked.iter().map(|s| s[t]).sum::<f32>() / n)
                .collect(),
        )
    }

    /// Per-checkpoint population standard deviation of an evaluation series over the runs.
    pub fn std(&self, key: &str) -> Option<Vec<f32>> {
        let stacked = self.stacked(key)?;
        let mean = self.mean(key)?;
        let n = stacked.len() as f32;
        Some(
            mean.iter()
                .enumerate()
                .map(|(t, m)| {
                    let var = stacked.iter().map(|s| (s[t] - m).powi(2)).sum::<f32>() / n;
                    var.sqrt()
                })
                .collect(),
        )
    }

    fn stacked(&self, key: &str) -> Option<Vec<&[f32]>> {
        if self.runs.is_empty() {
            return None;
        }
        self.runs.iter().map(|r| r.series(key)).collect()
    }

    /// Writes the mean and standard deviation curves.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_path(path.as_ref())?;
        let curves: Vec<_> = SERIES_KEYS
            .iter()
            .map(|k| (self.mean(k).unwrap_or_default(), self.std(k).unwrap_or_default()))
            .collect();

        for itr in 0..self.n_checkpoints() {
            wtr.serialize(SummaryRow {
                itr,
                const_test_rew_mean: curves[0].0[itr],
                const_test_rew_std: curves[0].1[itr],
                rand_test_rew_mean: curves[1].0[itr],
                rand_test_rew_std: curves[1].1[itr],
                adv_test_rew_mean: curves[2].0[itr],
                adv_test_rew_std: curves[2].1[itr],
            })?;
        }
        wtr.flush()?;
        info!("Wrote summary of {} runs to {:?}", self.n_runs(), path.as_ref());
        Ok(())
    }
}
