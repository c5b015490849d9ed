use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::{Result, StagehandError};

/// One dataset in the run-range table: a contiguous run interval plus the
/// number of sub-ranges its files are partitioned into.
///
/// Intervals of distinct datasets must not overlap; their union need not be
/// contiguous (dataset 4 lives in the module-2 run-number space).
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSpec {
    pub id: u32,
    pub sub_ranges: u32,
    pub run_lo: u32,
    pub run_hi: u32,
}

/// Calibration table: key (one per dataset and detector module, e.g.
/// "ds1_m1") to its per-index run lists.
pub type CalTable = BTreeMap<String, Vec<Vec<u32>>>;

pub fn default_datasets() -> Vec<DatasetSpec> {
    let table = [
        (0, 77, 2580, 6963),
        (1, 52, 9422, 14502),
        (2, 8, 14699, 15892),
        (3, 25, 16797, 17980),
        (4, 23, 60000802, 60001888),
        (5, 113, 18623, 25671),
    ];
    table
        .into_iter()
        .map(|(id, sub_ranges, run_lo, run_hi)| DatasetSpec {
            id,
            sub_ranges,
            run_lo,
            run_hi,
        })
        .collect()
}

pub fn default_calibration() -> CalTable {
    let mut table = CalTable::new();
    table.insert(
        "ds0_m1".to_string(),
        vec![vec![2931, 2932, 2933], vec![5889, 5890, 5891, 5892]],
    );
    table.insert(
        "ds1_m1".to_string(),
        vec![vec![9455, 9456, 9457], vec![12521, 12522]],
    );
    table.insert("ds2_m1".to_string(), vec![vec![14773, 14774]]);
    table.insert("ds3_m1".to_string(), vec![vec![16836, 16837, 16838]]);
    table.insert("ds4_m2".to_string(), vec![vec![60000842, 60000843]]);
    table.insert("ds5_m1".to_string(), vec![vec![18744, 18745, 18746]]);
    table.insert("ds5_m2".to_string(), vec![vec![19043, 19044]]);
    table
}

/// Static addressing tables for the pipeline: which dataset owns a run,
/// how many sub-ranges a dataset has, and which runs are designated for
/// calibration.
#[derive(Debug, Clone)]
pub struct RangeIndex {
    datasets: Vec<DatasetSpec>,
    calibration: CalTable,
}

impl RangeIndex {
    pub fn new(datasets: Vec<DatasetSpec>, calibration: CalTable) -> Self {
        Self {
            datasets,
            calibration,
        }
    }

    /// Resolve a run number to its owning dataset.
    pub fn dataset_of(&self, run: u32) -> Result<u32> {
        self.datasets
            .iter()
            .find(|ds| ds.run_lo <= run && run <= ds.run_hi)
            .map(|ds| ds.id)
            .ok_or(StagehandError::UnmappedRun(run))
    }

    /// Number of sub-ranges in a dataset (highest index + 1).
    pub fn sub_range_count(&self, dataset: u32) -> Result<u32> {
        self.datasets
            .iter()
            .find(|ds| ds.id == dataset)
            .map(|ds| ds.sub_ranges)
            .ok_or(StagehandError::UnknownDataset(dataset))
    }

    /// Dataset ids in table order, for whole-pipeline (mega) iteration.
    pub fn dataset_ids(&self) -> Vec<u32> {
        self.datasets.iter().map(|ds| ds.id).collect()
    }

    /// Calibration keys for one dataset, or every dataset's keys when none
    /// is given (mega mode).
    pub fn cal_keys(&self, dataset: Option<u32>) -> Vec<String> {
        match dataset {
            Some(ds) => {
                let prefix = format!("ds{}_", ds);
                self.calibration
                    .keys()
                    .filter(|key| key.starts_with(&prefix))
                    .cloned()
                    .collect()
            }
            None => self.calibration.keys().cloned().collect(),
        }
    }

    pub fn cal_index_count(&self, key: &str) -> usize {
        self.calibration.get(key).map_or(0, |lists| lists.len())
    }

    /// Runs for one calibration (key, index), truncated to `limit`. An
    /// unknown key or index yields an empty list so one missing
    /// calibration entry cannot abort a batch.
    pub fn cal_runs(&self, key: &str, idx: usize, limit: usize) -> Vec<u32> {
        self.calibration
            .get(key)
            .and_then(|lists| lists.get(idx))
            .map(|runs| runs.iter().take(limit).copied().collect())
            .unwrap_or_default()
    }

    /// Build the calibration run list for a stage invocation.
    ///
    /// An explicit run bypasses the tables entirely. With a calibration
    /// index, only that index of each key is taken; otherwise every index
    /// is unioned. With no dataset, every dataset's keys contribute (mega
    /// mode). The result is deduplicated and sorted.
    pub fn calibration_list(
        &self,
        dataset: Option<u32>,
        cal_idx: Option<u32>,
        run: Option<u32>,
        limit: usize,
    ) -> Vec<u32> {
        if let Some(run) = run {
            return vec![run];
        }
        let mut runs = BTreeSet::new();
        for key in self.cal_keys(dataset) {
            match cal_idx {
                Some(idx) => {
                    runs.extend(self.cal_runs(&key, idx as usize, limit));
                }
                None => {
                    for idx in 0..self.cal_index_count(&key) {
                        runs.extend(self.cal_runs(&key, idx, limit));
                    }
                }
            }
        }
        runs.into_iter().collect()
    }
}
