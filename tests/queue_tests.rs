
use std::fs;

use stagehand::error::StagehandError;
use stagehand::queue::JobQueue;
use tempfile::TempDir;
use test_harness::{recorded, recording, FailingSubmitter};

fn queue_in(dir: &TempDir) -> JobQueue {
    JobQueue::new(dir.path().join("job.queue"))
}

#[test]
fn enqueue_suppresses_exact_duplicates() {
    let dir = TempDir::new().unwrap();
    let queue = queue_in(&dir);

    assert!(queue.enqueue("sbatch slurm-job.sh './skim 1 0'").unwrap());
    assert!(!queue.enqueue("sbatch slurm-job.sh './skim 1 0'").unwrap());
    assert!(queue.enqueue("sbatch slurm-job.sh './skim 1 1'").unwrap());

    assert_eq!(
        queue.entries().unwrap(),
        vec![
            "sbatch slurm-job.sh './skim 1 0'",
            "sbatch slurm-job.sh './skim 1 1'",
        ]
    );
}

#[test]
fn newline_in_command_is_rejected() {
    let dir = TempDir::new().unwrap();
    let queue = queue_in(&dir);

    let err = queue.enqueue("echo a\necho b").unwrap_err();
    assert!(matches!(err, StagehandError::CommandNotQueueable(_)));
    assert!(queue.entries().unwrap().is_empty());
}

#[test]
fn drain_submits_prefix_in_fifo_order() {
    let dir = TempDir::new().unwrap();
    let queue = queue_in(&dir);
    for i in 0..5 {
        queue.enqueue(&format!("job {}", i)).unwrap();
    }

    let (mut submitter, log) = recording();
    let report = queue.drain(2, &mut submitter).unwrap();

    assert_eq!(report.submitted, vec!["job 0", "job 1"]);
    assert_eq!(report.remaining, 3);
    assert_eq!(recorded(&log), vec!["job 0", "job 1"]);
    assert_eq!(queue.entries().unwrap(), vec!["job 2", "job 3", "job 4"]);
}

#[test]
fn drain_zero_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let queue = queue_in(&dir);
    queue.enqueue("job a").unwrap();
    queue.enqueue("job b").unwrap();
    let before = fs::read_to_string(dir.path().join("job.queue")).unwrap();

    let (mut submitter, log) = recording();
    let report = queue.drain(0, &mut submitter).unwrap();

    assert!(report.submitted.is_empty());
    assert_eq!(report.remaining, 2);
    assert!(recorded(&log).is_empty());
    let after = fs::read_to_string(dir.path().join("job.queue")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn full_drain_leaves_an_empty_queue() {
    let dir = TempDir::new().unwrap();
    let queue = queue_in(&dir);
    let jobs: Vec<String> = (0..4).map(|i| format!("job {}", i)).collect();
    for job in &jobs {
        queue.enqueue(job).unwrap();
    }

    let (mut submitter, log) = recording();
    let report = queue.drain(jobs.len(), &mut submitter).unwrap();

    assert_eq!(report.submitted, jobs);
    assert_eq!(report.remaining, 0);
    assert_eq!(recorded(&log), jobs);
    assert!(queue.entries().unwrap().is_empty());
}

#[test]
fn drain_limit_beyond_length_drains_all() {
    let dir = TempDir::new().unwrap();
    let queue = queue_in(&dir);
    queue.enqueue("only job").unwrap();

    let (mut submitter, _log) = recording();
    let report = queue.drain(100, &mut submitter).unwrap();

    assert_eq!(report.submitted, vec!["only job"]);
    assert!(queue.entries().unwrap().is_empty());
}

#[test]
fn submit_failure_keeps_failed_entry_and_remainder() {
    let dir = TempDir::new().unwrap();
    let queue = queue_in(&dir);
    for i in 0..4 {
        queue.enqueue(&format!("job {}", i)).unwrap();
    }

    let (_, log) = recording();
    let mut submitter = FailingSubmitter::new(1, log.clone());
    let err = queue.drain(3, &mut submitter).unwrap_err();

    assert!(matches!(err, StagehandError::SubmitFailed { .. }));
    // job 0 went out; job 1 failed and stays at the head, order intact.
    assert_eq!(recorded(&log), vec!["job 0"]);
    assert_eq!(
        queue.entries().unwrap(),
        vec!["job 1", "job 2", "job 3"]
    );
}
