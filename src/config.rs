use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, StagehandError};
use crate::index::{default_calibration, default_datasets, CalTable, DatasetSpec};

/// Directories each stage reads from and writes to. Background and
/// calibration processing keep separate trees so their outputs never mix.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageDirs {
    pub skim: PathBuf,
    pub wave: PathBuf,
    pub split: PathBuf,
    pub lat: PathBuf,
    pub panda: PathBuf,
    pub cal_skim: PathBuf,
    pub cal_wave: PathBuf,
    pub cal_split: PathBuf,
    pub cal_lat: PathBuf,
}

impl Default for StageDirs {
    fn default() -> Self {
        Self {
            skim: PathBuf::from("data/skim"),
            wave: PathBuf::from("data/waves"),
            split: PathBuf::from("data/split"),
            lat: PathBuf::from("data/lat"),
            panda: PathBuf::from("data/pandas"),
            cal_skim: PathBuf::from("data/cal/skim"),
            cal_wave: PathBuf::from("data/cal/waves"),
            cal_split: PathBuf::from("data/cal/split"),
            cal_lat: PathBuf::from("data/cal/lat"),
        }
    }
}

/// External analysis binaries invoked by the emitted commands. The
/// coordinator never inspects their output; it only builds the
/// invocations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub skim: String,
    pub wave: String,
    pub split: String,
    pub cut: String,
    pub lat: String,
    pub convert: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            skim: "./skim_mjd_data".to_string(),
            wave: "./wave-skim".to_string(),
            split: "./split-skim".to_string(),
            cut: "./write-cut".to_string(),
            lat: "./lat.py".to_string(),
            convert: "python3 ./ROOTtoPandas.py".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Prepended to every submitted command, e.g. "sbatch slurm-job.sh".
    pub submit_prefix: String,
    /// Persistent admission queue, one command per line.
    pub queue_path: PathBuf,
    /// Shell command that reports the operator's scheduler occupancy. The
    /// configured string must filter to the operator's own line; the
    /// default does so with `$USER`.
    pub status_cmd: String,
    /// Running-job cap for the admission budget.
    pub max_running: u32,
    /// Pending-job cap; at or above this, nothing is admitted.
    pub max_pending: u32,
    /// Max runs taken per calibration (key, index) to bound job fan-out.
    pub cal_run_limit: usize,
    /// Wave files below this size (bytes) are copied instead of split.
    pub split_copy_threshold: u64,
    pub dirs: StageDirs,
    pub tools: ToolPaths,
    pub datasets: Vec<DatasetSpec>,
    pub calibration: CalTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            submit_prefix: "sbatch slurm-job.sh".to_string(),
            queue_path: PathBuf::from("job.queue"),
            status_cmd: "slusers | grep $USER".to_string(),
            max_running: 15,
            max_pending: 200,
            cal_run_limit: 10,
            split_copy_threshold: 45_000_000,
            dirs: StageDirs::default(),
            tools: ToolPaths::default(),
            datasets: default_datasets(),
            calibration: default_calibration(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file. Absent keys fall back to their defaults, so a
    /// sparse config overriding only the caps or directories is fine.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| StagehandError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| StagehandError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
