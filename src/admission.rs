use std::process::Command;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::queue::{DrainReport, JobQueue};
use crate::submit::Submitter;

/// Occupancy snapshot for the current operator, as reported by the
/// scheduler status collaborator. Only the job counts feed the admission
/// budget; the cpu counts ride along for the status report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub running_jobs: u32,
    pub running_cpus: u32,
    pub pending_jobs: u32,
    pub pending_cpus: u32,
}

impl SchedulerStatus {
    /// Parse the status line: whitespace-separated fields in the order
    /// `Rjob Rcpu Rcpu*h PDjob PDcpu …`. Anything short or non-numeric is
    /// `None`; the caller decides the fallback.
    pub fn parse(raw: &str) -> Option<Self> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() < 5 {
            return None;
        }
        Some(Self {
            running_jobs: fields[0].parse().ok()?,
            running_cpus: fields[1].parse().ok()?,
            pending_jobs: fields[3].parse().ok()?,
            pending_cpus: fields[4].parse().ok()?,
        })
    }
}

/// How many queued commands may be submitted right now.
///
/// Room under the running cap, clamped to the queue length, and zero
/// outright once the pending cap is reached.
pub fn budget(
    running: u32,
    pending: u32,
    max_running: u32,
    max_pending: u32,
    queue_len: usize,
) -> usize {
    if pending >= max_pending || running >= max_running {
        return 0;
    }
    ((max_running - running) as usize).min(queue_len)
}

/// Gates queue drainage against live cluster occupancy. Meant to run on a
/// periodic external trigger (cron); each invocation performs one status
/// query, one budget computation, and at most one drain.
pub struct AdmissionController<'a> {
    config: &'a PipelineConfig,
}

impl<'a> AdmissionController<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Query the status collaborator. A failed or unparseable query is
    /// treated as zero occupancy: attempting a submission beats
    /// deadlocking the queue on a flaky status source.
    pub fn query(&self) -> SchedulerStatus {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.config.status_cmd)
            .output();
        match output {
            Ok(out) => {
                let raw = String::from_utf8_lossy(&out.stdout);
                match SchedulerStatus::parse(&raw) {
                    Some(status) => status,
                    None => {
                        tracing::warn!(
                            status_cmd = %self.config.status_cmd,
                            raw = %raw.trim(),
                            "unparseable scheduler status, assuming zero occupancy"
                        );
                        SchedulerStatus::default()
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    status_cmd = %self.config.status_cmd,
                    error = %err,
                    "scheduler status query failed, assuming zero occupancy"
                );
                SchedulerStatus::default()
            }
        }
    }

    /// One admission cycle: compute the budget and drain up to it.
    pub fn cycle(&self, queue: &JobQueue, submitter: &mut dyn Submitter) -> Result<DrainReport> {
        tracing::info!(
            at = %chrono::Local::now().format("%X %x"),
            queue = %queue.path().display(),
            "admission cycle"
        );
        let status = self.query();
        let queued = queue.entries()?.len();
        let allowed = budget(
            status.running_jobs,
            status.pending_jobs,
            self.config.max_running,
            self.config.max_pending,
            queued,
        );
        tracing::info!(
            running = status.running_jobs,
            max_running = self.config.max_running,
            pending = status.pending_jobs,
            max_pending = self.config.max_pending,
            queued,
            admitting = allowed,
            "occupancy"
        );
        queue.drain(allowed, submitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_running_cap_admits_nothing() {
        assert_eq!(budget(15, 0, 15, 200, 10), 0);
    }

    #[test]
    fn short_queue_limits_the_budget() {
        assert_eq!(budget(5, 0, 15, 200, 3), 3);
    }

    #[test]
    fn pending_cap_overrides_running_headroom() {
        assert_eq!(budget(5, 250, 15, 200, 10), 0);
    }

    #[test]
    fn headroom_bounds_a_long_queue() {
        assert_eq!(budget(5, 0, 15, 200, 100), 10);
    }

    #[test]
    fn parses_the_five_field_status_line() {
        let status = SchedulerStatus::parse("12 96 1024 7 56 wisecg:mjd:shared").unwrap();
        assert_eq!(
            status,
            SchedulerStatus {
                running_jobs: 12,
                running_cpus: 96,
                pending_jobs: 7,
                pending_cpus: 56,
            }
        );
    }

    #[test]
    fn short_or_garbled_status_is_none() {
        assert_eq!(SchedulerStatus::parse(""), None);
        assert_eq!(SchedulerStatus::parse("3 17"), None);
        assert_eq!(SchedulerStatus::parse("x y z a b"), None);
    }
}
