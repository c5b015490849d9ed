use clap::Args;

use crate::error::StagehandError;
use crate::index::RangeIndex;
use crate::stages::Selection;

// =============================================================================
// Target Arguments
// =============================================================================

#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Whole dataset
    #[arg(long, value_name = "DS", conflicts_with_all = ["sub", "run", "all"])]
    pub ds: Option<u32>,

    /// One (dataset, sub-range); with --cal the second value is a calibration index
    #[arg(long, num_args = 2, value_names = ["DS", "SUB"], conflicts_with_all = ["run", "all"])]
    pub sub: Option<Vec<u32>>,

    /// One (dataset, run)
    #[arg(long, num_args = 2, value_names = ["DS", "RUN"], conflicts_with = "all")]
    pub run: Option<Vec<u32>>,

    /// Every configured dataset in sequence
    #[arg(long)]
    pub all: bool,

    /// Calibration mode: derive the run set from the calibration tables
    #[arg(long)]
    pub cal: bool,
}

impl TargetArgs {
    /// Turn the flags into a selection plus an optional calibration run
    /// list. Incomplete or ambiguous combinations are reported errors,
    /// never silent no-ops.
    pub fn resolve(
        &self,
        index: &RangeIndex,
        cal_run_limit: usize,
    ) -> Result<(Selection, Option<Vec<u32>>), StagehandError> {
        let pair = |v: &Option<Vec<u32>>| v.as_ref().map(|v| (v[0], v[1]));
        let selection = if self.all {
            Some(Selection::All)
        } else if let Some(ds) = self.ds {
            Some(Selection::Dataset(ds))
        } else if let Some((ds, sub)) = pair(&self.sub) {
            Some(Selection::SubRange(ds, sub))
        } else if let Some((ds, run)) = pair(&self.run) {
            Some(Selection::Run(ds, run))
        } else {
            None
        };

        if self.cal {
            let dataset = self
                .ds
                .or_else(|| pair(&self.sub).map(|(ds, _)| ds))
                .or_else(|| pair(&self.run).map(|(ds, _)| ds));
            let cal_idx = pair(&self.sub).map(|(_, idx)| idx);
            let run = pair(&self.run).map(|(_, run)| run);
            let runs = index.calibration_list(dataset, cal_idx, run, cal_run_limit);
            if runs.is_empty() {
                tracing::warn!("calibration selection resolved to no runs");
            }
            return Ok((selection.unwrap_or(Selection::All), Some(runs)));
        }

        selection
            .map(|s| (s, None))
            .ok_or_else(|| {
                StagehandError::InvalidSelection(
                    "one of --ds, --sub, --run, --all is required (or --cal)".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::index::DatasetSpec;

    fn index() -> RangeIndex {
        let datasets = vec![
            DatasetSpec { id: 1, sub_ranges: 3, run_lo: 100, run_hi: 199 },
            DatasetSpec { id: 2, sub_ranges: 2, run_lo: 300, run_hi: 399 },
        ];
        let mut cal = BTreeMap::new();
        cal.insert("ds1_m1".to_string(), vec![vec![150, 151], vec![160]]);
        cal.insert("ds2_m1".to_string(), vec![vec![350]]);
        RangeIndex::new(datasets, cal)
    }

    #[test]
    fn no_target_flags_is_a_reported_error() {
        let args = TargetArgs::default();
        let err = args.resolve(&index(), 10).unwrap_err();
        assert!(matches!(err, StagehandError::InvalidSelection(_)));
    }

    #[test]
    fn cal_alone_selects_every_calibration_run() {
        let args = TargetArgs { cal: true, ..TargetArgs::default() };
        let (selection, runs) = args.resolve(&index(), 10).unwrap();
        assert_eq!(selection, Selection::All);
        assert_eq!(runs.unwrap(), vec![150, 151, 160, 350]);
    }

    #[test]
    fn sub_with_cal_names_a_calibration_index() {
        let args = TargetArgs {
            sub: Some(vec![1, 1]),
            cal: true,
            ..TargetArgs::default()
        };
        let (_, runs) = args.resolve(&index(), 10).unwrap();
        assert_eq!(runs.unwrap(), vec![160]);
    }

    #[test]
    fn run_with_cal_bypasses_the_tables() {
        let args = TargetArgs {
            run: Some(vec![1, 4242]),
            cal: true,
            ..TargetArgs::default()
        };
        let (selection, runs) = args.resolve(&index(), 10).unwrap();
        assert_eq!(selection, Selection::Run(1, 4242));
        assert_eq!(runs.unwrap(), vec![4242]);
    }
}
