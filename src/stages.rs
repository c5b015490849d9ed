use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::error::{Result, StagehandError};
use crate::index::RangeIndex;
use crate::resolver;
use crate::stamp::{sibling_pattern, Axis, FileStamp};
use crate::submit::Dispatcher;

/// Which work units a stage invocation covers. The three addressing modes
/// are mutually exclusive; `All` expands to every configured dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    Dataset(u32),
    SubRange(u32, u32),
    Run(u32, u32),
}

/// One background work unit after selection expansion.
#[derive(Debug, Clone, Copy)]
enum Unit {
    Sub(u32, u32),
    Run(u32, u32),
}

/// Enumerates the work units of each pipeline stage and emits one command
/// per unit through the dispatcher. Per-unit failures (an unmapped run, a
/// missing input file, a failed immediate submission) are logged and the
/// remaining units continue; queue I/O errors propagate.
pub struct StageDriver<'a> {
    config: &'a PipelineConfig,
    index: &'a RangeIndex,
    dispatch: &'a mut Dispatcher,
}

impl<'a> StageDriver<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        index: &'a RangeIndex,
        dispatch: &'a mut Dispatcher,
    ) -> Self {
        Self {
            config,
            index,
            dispatch,
        }
    }

    fn emit(&mut self, inner: String) -> Result<()> {
        match self.dispatch.dispatch(&inner) {
            Err(StagehandError::SubmitFailed { command, status }) => {
                tracing::warn!(%command, %status, "submit failed, continuing with remaining units");
                Ok(())
            }
            other => other,
        }
    }

    /// Expand a background selection into concrete units.
    fn bg_units(&self, selection: Selection) -> Result<Vec<Unit>> {
        let mut units = Vec::new();
        match selection {
            Selection::All => {
                for ds in self.index.dataset_ids() {
                    for sub in 0..self.index.sub_range_count(ds)? {
                        units.push(Unit::Sub(ds, sub));
                    }
                }
            }
            Selection::Dataset(ds) => {
                for sub in 0..self.index.sub_range_count(ds)? {
                    units.push(Unit::Sub(ds, sub));
                }
            }
            Selection::SubRange(ds, sub) => units.push(Unit::Sub(ds, sub)),
            Selection::Run(ds, run) => units.push(Unit::Run(ds, run)),
        }
        Ok(units)
    }

    /// Resolve calibration runs to (dataset, run) pairs, skipping runs no
    /// dataset interval covers.
    fn cal_units(&self, runs: &[u32]) -> Vec<(u32, u32)> {
        runs.iter()
            .filter_map(|&run| match self.index.dataset_of(run) {
                Ok(ds) => Some((ds, run)),
                Err(err) => {
                    tracing::warn!(run, error = %err, "skipping unit");
                    None
                }
            })
            .collect()
    }

    /// Skim stage: one job per sub-range over raw detector data, or one
    /// per run in run/calibration mode.
    pub fn skim(&mut self, selection: Selection, cal: Option<&[u32]>) -> Result<()> {
        match cal {
            Some(runs) => {
                for &run in runs {
                    let inner = format!(
                        "{} -f {} -n -l -t 0.7 {}",
                        self.config.tools.skim,
                        run,
                        self.config.dirs.cal_skim.display()
                    );
                    self.emit(inner)?;
                }
            }
            None => {
                for unit in self.bg_units(selection)? {
                    let inner = match unit {
                        Unit::Sub(ds, sub) => format!(
                            "{} {} {} -n -l -t 0.7 {}",
                            self.config.tools.skim,
                            ds,
                            sub,
                            self.config.dirs.skim.display()
                        ),
                        Unit::Run(_, run) => format!(
                            "{} -f {} -n -l -t 0.7 {}",
                            self.config.tools.skim,
                            run,
                            self.config.dirs.skim.display()
                        ),
                    };
                    self.emit(inner)?;
                }
            }
        }
        Ok(())
    }

    /// Wave-extraction stage over skim output.
    pub fn wave(&mut self, selection: Selection, cal: Option<&[u32]>) -> Result<()> {
        match cal {
            Some(runs) => {
                for (ds, run) in self.cal_units(runs) {
                    let inner = format!(
                        "{} -n -c -f {} {} -p {} {}",
                        self.config.tools.wave,
                        ds,
                        run,
                        self.config.dirs.cal_skim.display(),
                        self.config.dirs.cal_wave.display()
                    );
                    self.emit(inner)?;
                }
            }
            None => {
                for unit in self.bg_units(selection)? {
                    let inner = match unit {
                        Unit::Sub(ds, sub) => format!(
                            "{} -n -r {} {} -p {} {}",
                            self.config.tools.wave,
                            ds,
                            sub,
                            self.config.dirs.skim.display(),
                            self.config.dirs.wave.display()
                        ),
                        Unit::Run(ds, run) => format!(
                            "{} -n -f {} {} -p {} {}",
                            self.config.tools.wave,
                            ds,
                            run,
                            self.config.dirs.skim.display(),
                            self.config.dirs.wave.display()
                        ),
                    };
                    self.emit(inner)?;
                }
            }
        }
        Ok(())
    }

    /// Split stage: wave files below the copy threshold go straight into
    /// the split directory; larger ones get a split job. A missing wave
    /// file skips that unit only.
    pub fn split(&mut self, selection: Selection, cal: Option<&[u32]>) -> Result<()> {
        let dirs = &self.config.dirs;
        let units: Vec<(PathBuf, PathBuf, u32, Axis)> = match cal {
            Some(runs) => self
                .cal_units(runs)
                .into_iter()
                .map(|(ds, run)| {
                    (dirs.cal_wave.clone(), dirs.cal_split.clone(), ds, Axis::Run(run))
                })
                .collect(),
            None => self
                .bg_units(selection)?
                .into_iter()
                .map(|unit| match unit {
                    Unit::Sub(ds, sub) => {
                        (dirs.wave.clone(), dirs.split.clone(), ds, Axis::Sub(sub))
                    }
                    Unit::Run(ds, run) => {
                        (dirs.wave.clone(), dirs.split.clone(), ds, Axis::Run(run))
                    }
                })
                .collect(),
        };
        for (in_dir, out_dir, ds, axis) in units {
            self.split_one(&in_dir, &out_dir, ds, axis)?;
        }
        Ok(())
    }

    fn split_one(&mut self, in_dir: &Path, out_dir: &Path, dataset: u32, axis: Axis) -> Result<()> {
        let stamp = FileStamp::new(dataset, axis, 0);
        let in_path = in_dir.join(stamp.file_name("waveSkim"));
        let meta = match fs::metadata(&in_path) {
            Ok(meta) => meta,
            Err(_) => {
                let err = StagehandError::MissingInput(in_path.clone());
                tracing::warn!(error = %err, "skipping unit");
                return Ok(());
            }
        };
        let out_path = out_dir.join(stamp.file_name("splitSkim"));
        if meta.len() < self.config.split_copy_threshold {
            fs::copy(&in_path, &out_path)?;
            tracing::info!(
                from = %in_path.display(),
                to = %out_path.display(),
                "below split threshold, copied without a job"
            );
            return Ok(());
        }
        self.emit(format!(
            "{} {} {}",
            self.config.tools.split,
            in_path.display(),
            out_path.display()
        ))
    }

    /// Cut-annotation stage: the cut of the first split file (in sorted
    /// key order) is applied to every other file of the selection. Finding
    /// one file or none is fatal, there is nothing to annotate from.
    pub fn cut(&mut self, selection: Selection, cal: Option<&[u32]>) -> Result<()> {
        let dirs = &self.config.dirs;
        let mut merged: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut patterns: Vec<String> = Vec::new();
        let probes: Vec<(PathBuf, u32, Axis)> = match cal {
            Some(runs) => self
                .cal_units(runs)
                .into_iter()
                .map(|(ds, run)| (dirs.cal_split.clone(), ds, Axis::Run(run)))
                .collect(),
            None => self
                .bg_units(selection)?
                .into_iter()
                .map(|unit| match unit {
                    Unit::Sub(ds, sub) => (dirs.split.clone(), ds, Axis::Sub(sub)),
                    Unit::Run(ds, run) => (dirs.split.clone(), ds, Axis::Run(run)),
                })
                .collect(),
        };
        for (dir, ds, axis) in probes {
            let pattern = dir
                .join(sibling_pattern("splitSkim", ds, axis))
                .to_string_lossy()
                .into_owned();
            merged.extend(resolver::list_by_unique_key(&pattern, axis.value(), ds));
            patterns.push(pattern);
        }
        if merged.len() <= 1 {
            return Err(StagehandError::EmptyResultSet {
                pattern: patterns.join(" "),
                found: merged.len(),
            });
        }
        let targets = merged.len() - 1;
        let mut files = merged.into_values();
        // The guard above leaves at least two files.
        if let Some(source) = files.next() {
            tracing::info!(source = %source.display(), targets, "annotating cut");
            for target in files {
                let inner = format!(
                    "{} {} {}",
                    self.config.tools.cut,
                    source.display(),
                    target.display()
                );
                self.emit(inner)?;
            }
        }
        Ok(())
    }

    /// Analysis stage: one job per split part, keyed outputs in the
    /// analysis directory.
    pub fn lat(&mut self, selection: Selection, cal: Option<&[u32]>) -> Result<()> {
        let dirs = &self.config.dirs;
        let units: Vec<(PathBuf, PathBuf, u32, Axis)> = match cal {
            Some(runs) => self
                .cal_units(runs)
                .into_iter()
                .map(|(ds, run)| (dirs.cal_split.clone(), dirs.cal_lat.clone(), ds, Axis::Run(run)))
                .collect(),
            None => self
                .bg_units(selection)?
                .into_iter()
                .map(|unit| match unit {
                    Unit::Sub(ds, sub) => {
                        (dirs.split.clone(), dirs.lat.clone(), ds, Axis::Sub(sub))
                    }
                    Unit::Run(ds, run) => {
                        (dirs.split.clone(), dirs.lat.clone(), ds, Axis::Run(run))
                    }
                })
                .collect(),
        };
        for (in_dir, out_dir, ds, axis) in units {
            let pattern = in_dir
                .join(sibling_pattern("splitSkim", ds, axis))
                .to_string_lossy()
                .into_owned();
            let files = resolver::list_by_key(&pattern, axis.value());
            if files.is_empty() {
                tracing::warn!(%pattern, "no split files, skipping unit");
                continue;
            }
            let mode_flag = match axis {
                Axis::Sub(_) => "-r",
                Axis::Run(_) => "-f",
            };
            for (&key, in_file) in &files {
                let out_name = FileStamp::new(ds, axis, key).file_name_keyed("latSkim");
                let inner = format!(
                    "{} -b {} {} {} -p {} {}",
                    self.config.tools.lat,
                    mode_flag,
                    ds,
                    axis.value(),
                    in_file.display(),
                    out_dir.join(out_name).display()
                );
                self.emit(inner)?;
            }
        }
        Ok(())
    }

    /// Conversion stage: wave output to dataframe files.
    pub fn convert(&mut self, selection: Selection, cal: Option<&[u32]>) -> Result<()> {
        match cal {
            Some(runs) => {
                for (ds, run) in self.cal_units(runs) {
                    let inner = format!(
                        "{} -f {} {} -p -d {} {}",
                        self.config.tools.convert,
                        ds,
                        run,
                        self.config.dirs.cal_wave.display(),
                        self.config.dirs.panda.display()
                    );
                    self.emit(inner)?;
                }
            }
            None => {
                for unit in self.bg_units(selection)? {
                    let inner = match unit {
                        Unit::Sub(ds, sub) => format!(
                            "{} -ws {} {} -p -d {} {}",
                            self.config.tools.convert,
                            ds,
                            sub,
                            self.config.dirs.wave.display(),
                            self.config.dirs.panda.display()
                        ),
                        Unit::Run(ds, run) => format!(
                            "{} -f {} {} -p -d {} {}",
                            self.config.tools.convert,
                            ds,
                            run,
                            self.config.dirs.wave.display(),
                            self.config.dirs.panda.display()
                        ),
                    };
                    self.emit(inner)?;
                }
            }
        }
        Ok(())
    }
}
