use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::stamp::FileStamp;

/// Match a file name against a shell-style pattern (`*` and `?`).
pub fn glob_match(pattern: &str, input: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let input: Vec<char> = input.chars().collect();
    match_at(&pattern, 0, &input, 0)
}

fn match_at(pattern: &[char], pi: usize, input: &[char], si: usize) -> bool {
    if pi == pattern.len() {
        return si == input.len();
    }
    match pattern[pi] {
        '*' => (si..=input.len()).any(|k| match_at(pattern, pi + 1, input, k)),
        '?' => si < input.len() && match_at(pattern, pi + 1, input, si + 1),
        c => si < input.len() && input[si] == c && match_at(pattern, pi + 1, input, si + 1),
    }
}

/// Expand a `dir/name-pattern` glob into the matching paths, sorted by
/// file name. A missing directory yields no matches, not an error.
pub fn glob_files(pattern: &str) -> Vec<PathBuf> {
    let path = Path::new(pattern);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let Some(name_pattern) = path.file_name().and_then(|n| n.to_str()) else {
        return Vec::new();
    };
    let dir = dir.unwrap_or_else(|| Path::new("."));
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| glob_match(name_pattern, name))
        .collect();
    names.sort();
    names.into_iter().map(|name| dir.join(name)).collect()
}

/// Map FileKey -> path for the glob matches whose second embedded integer
/// equals `sub_or_run`. The first integer (the dataset id in the name) is
/// never filtered on here. A match with no key suffix is the primary file,
/// key 0. Later matches overwrite earlier ones sharing a key; the split
/// stage produces at most one file per key, so this cannot drop data.
pub fn list_by_key(pattern: &str, sub_or_run: u32) -> BTreeMap<u32, PathBuf> {
    stamped_files(pattern, sub_or_run)
        .map(|(stamp, path)| (stamp.key, path))
        .collect()
}

/// Like [`list_by_key`] but keyed by the composite `DS{ds}_{sub}_{key}`
/// string. Required whenever matches from several sub-ranges or runs are
/// merged into one mapping, where bare FileKeys would collide.
pub fn list_by_unique_key(
    pattern: &str,
    sub_or_run: u32,
    dataset: u32,
) -> BTreeMap<String, PathBuf> {
    stamped_files(pattern, sub_or_run)
        .map(|(stamp, path)| {
            let key = format!("DS{}_{}_{}", dataset, sub_or_run, stamp.key);
            (key, path)
        })
        .collect()
}

fn stamped_files(
    pattern: &str,
    sub_or_run: u32,
) -> impl Iterator<Item = (FileStamp, PathBuf)> + '_ {
    glob_files(pattern).into_iter().filter_map(move |path| {
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(FileStamp::parse)?;
        (stamp.axis.value() == sub_or_run).then_some((stamp, path))
    })
}
