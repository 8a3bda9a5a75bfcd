//! CPU admission gate
//!
//! Soft backpressure applied before a worker leases new work. It is not
//! enforced during a running job; the segment encoder has its own
//! parallelism cap.

use std::time::Duration;
use sysinfo::System;

/// Interval between the two refreshes of a sample; sysinfo needs a delta
/// window to compute usage.
const SAMPLE_WINDOW: Duration = Duration::from_millis(200);

/// Samples host CPU usage and compares it against the configured ceiling.
///
/// Reuses a single `System` so sysinfo's internal counters accumulate
/// between calls; each worker loop owns its own gate.
pub struct CpuGate {
    system: System,
    max_cpu_usage: f32,
}

impl CpuGate {
    pub fn new(max_cpu_usage: f32) -> Self {
        let mut system = System::new();
        // Seed the counters so the first real sample has a baseline
        system.refresh_cpu_usage();
        Self {
            system,
            max_cpu_usage,
        }
    }

    /// Sample current usage; returns `(admit, usage_percent)`.
    pub async fn check(&mut self) -> (bool, f32) {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(SAMPLE_WINDOW).await;
        self.system.refresh_cpu_usage();

        let per_core: Vec<f32> = self.system.cpus().iter().map(|c| c.cpu_usage()).collect();
        let usage = if per_core.is_empty() {
            0.0
        } else {
            per_core.iter().copied().sum::<f32>() / per_core.len() as f32
        };

        (admits(usage, self.max_cpu_usage), usage)
    }
}

/// The admission decision itself: a job is admitted only when sampled usage
/// does not exceed the ceiling.
fn admits(usage: f32, max_cpu_usage: f32) -> bool {
    usage <= max_cpu_usage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_decision() {
        assert!(admits(10.0, 50.0));
        assert!(admits(50.0, 50.0));
        assert!(!admits(50.1, 50.0));
        // A zero ceiling refuses any measurable load
        assert!(!admits(0.1, 0.0));
    }

    #[tokio::test]
    async fn test_sample_reports_plausible_usage() {
        let mut gate = CpuGate::new(100.0);
        let (admit, usage) = gate.check().await;
        assert!(admit, "nothing exceeds a 100% ceiling");
        assert!((0.0..=100.0).contains(&usage));
    }
}
