use std::fs;
use std::path::Path;

use stagehand::resolver::{list_by_key, list_by_unique_key};
use tempfile::TempDir;

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"x").unwrap();
}

fn split_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "splitSkimDS1_2.root");
    touch(dir.path(), "splitSkimDS1_2_1.root");
    touch(dir.path(), "splitSkimDS1_2_2.root");
    touch(dir.path(), "splitSkimDS1_5.root");
    touch(dir.path(), "notes.txt");
    dir
}

#[test]
fn second_integer_filters_the_listing() {
    let dir = split_fixture();
    let pattern = dir.path().join("splitSkimDS1_2*.root");
    let files = list_by_key(pattern.to_str().unwrap(), 2);

    assert_eq!(files.len(), 3);
    assert!(files[&0].ends_with("splitSkimDS1_2.root"));
    assert!(files[&1].ends_with("splitSkimDS1_2_1.root"));
    assert!(files[&2].ends_with("splitSkimDS1_2_2.root"));
    // The sub-range 5 file never shows up for sub-range 2.
    assert!(!files.values().any(|p| p.ends_with("splitSkimDS1_5.root")));
}

#[test]
fn primary_file_gets_key_zero() {
    let dir = split_fixture();
    let pattern = dir.path().join("splitSkimDS1_5*.root");
    let files = list_by_key(pattern.to_str().unwrap(), 5);

    assert_eq!(files.len(), 1);
    assert!(files[&0].ends_with("splitSkimDS1_5.root"));
}

#[test]
fn unique_keys_encode_dataset_and_sub_range() {
    let dir = split_fixture();
    let pattern = dir.path().join("splitSkimDS1_2*.root");
    let files = list_by_unique_key(pattern.to_str().unwrap(), 2, 1);

    let keys: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["DS1_2_0", "DS1_2_1", "DS1_2_2"]);
}

#[test]
fn run_axis_names_resolve_too() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "splitSkimDS4_run60000842.root");
    touch(dir.path(), "splitSkimDS4_run60000842_3.root");

    let pattern = dir.path().join("splitSkimDS4_run60000842*.root");
    let files = list_by_key(pattern.to_str().unwrap(), 60000842);

    assert_eq!(files.len(), 2);
    assert!(files.contains_key(&0));
    assert!(files.contains_key(&3));
}

#[test]
fn zero_matches_is_an_empty_mapping() {
    let dir = TempDir::new().unwrap();
    let pattern = dir.path().join("splitSkimDS9_9*.root");
    assert!(list_by_key(pattern.to_str().unwrap(), 9).is_empty());
}
