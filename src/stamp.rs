use std::sync::LazyLock;

use regex::Regex;

/// Second addressing integer of a pipeline filename: a sub-range index in
/// background mode, or a run number (the `run` marker) in calibration and
/// single-run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Sub(u32),
    Run(u32),
}

impl Axis {
    pub fn value(self) -> u32 {
        match self {
            Axis::Sub(v) | Axis::Run(v) => v,
        }
    }
}

/// The pipeline filename template, formalized as one parse/format pair.
///
/// Every stage boundary names its files
/// `{stem}DS{dataset}_{sub}[_{key}].root` on the sub-range axis or
/// `{stem}DS{dataset}_run{run}[_{key}].root` on the run axis. Key 0 is the
/// primary file and is written without a suffix; split output adds `_{key}`
/// for the extra parts. This template is the interop contract with the
/// analysis binaries and must not drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub dataset: u32,
    pub axis: Axis,
    pub key: u32,
}

static STAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9]*DS(\d+)_(run)?(\d+)(?:_(\d+))?\.root$")
        .expect("stamp pattern is valid")
});

impl FileStamp {
    pub fn new(dataset: u32, axis: Axis, key: u32) -> Self {
        Self { dataset, axis, key }
    }

    fn axis_text(&self) -> String {
        match self.axis {
            Axis::Sub(sub) => sub.to_string(),
            Axis::Run(run) => format!("run{}", run),
        }
    }

    /// Canonical file name: the key suffix is omitted for the primary
    /// (key 0) file.
    pub fn file_name(&self, stem: &str) -> String {
        if self.key == 0 {
            format!("{}DS{}_{}.root", stem, self.dataset, self.axis_text())
        } else {
            self.file_name_keyed(stem)
        }
    }

    /// File name with the key always spelled out, `_0` included. The
    /// analysis stage names its outputs this way.
    pub fn file_name_keyed(&self, stem: &str) -> String {
        format!(
            "{}DS{}_{}_{}.root",
            stem,
            self.dataset,
            self.axis_text(),
            self.key
        )
    }

    /// Parse a file name (no directory components) against the template.
    /// Returns `None` for anything that does not match it exactly.
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = STAMP_RE.captures(file_name)?;
        let dataset = caps.get(1)?.as_str().parse().ok()?;
        let value: u32 = caps.get(3)?.as_str().parse().ok()?;
        let axis = if caps.get(2).is_some() {
            Axis::Run(value)
        } else {
            Axis::Sub(value)
        };
        let key = match caps.get(4) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self { dataset, axis, key })
    }
}

/// Glob pattern covering the primary file and every keyed sibling of one
/// (stem, dataset, axis), e.g. `splitSkimDS1_2*.root`.
pub fn sibling_pattern(stem: &str, dataset: u32, axis: Axis) -> String {
    let stamp = FileStamp::new(dataset, axis, 0);
    format!("{}DS{}_{}*.root", stem, dataset, stamp.axis_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_axis_and_key() {
        let stamps = [
            FileStamp::new(1, Axis::Sub(2), 0),
            FileStamp::new(1, Axis::Sub(2), 7),
            FileStamp::new(5, Axis::Run(21341), 0),
            FileStamp::new(5, Axis::Run(21341), 12),
        ];
        for stamp in stamps {
            let name = stamp.file_name("waveSkim");
            assert_eq!(FileStamp::parse(&name), Some(stamp), "{}", name);
        }
    }

    #[test]
    fn keyed_form_parses_back_to_key_zero() {
        let stamp = FileStamp::new(3, Axis::Sub(4), 0);
        let name = stamp.file_name_keyed("latSkim");
        assert_eq!(name, "latSkimDS3_4_0.root");
        assert_eq!(FileStamp::parse(&name), Some(stamp));
    }

    #[test]
    fn primary_file_has_no_key_suffix() {
        let stamp = FileStamp::new(0, Axis::Run(2931), 0);
        assert_eq!(stamp.file_name("splitSkim"), "splitSkimDS0_run2931.root");
    }

    #[test]
    fn rejects_names_off_template() {
        assert_eq!(FileStamp::parse("waveSkimDS1_2.txt"), None);
        assert_eq!(FileStamp::parse("DS1_2.root"), None);
        assert_eq!(FileStamp::parse("notes.root"), None);
        assert_eq!(FileStamp::parse("waveSkimDS1.root"), None);
    }

    #[test]
    fn sibling_pattern_covers_keyed_parts() {
        assert_eq!(sibling_pattern("splitSkim", 1, Axis::Sub(2)), "splitSkimDS1_2*.root");
        assert_eq!(
            sibling_pattern("splitSkim", 4, Axis::Run(60000842)),
            "splitSkimDS4_run60000842*.root"
        );
    }
}
