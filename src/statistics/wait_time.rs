//! How long admitted subjects waited in line

use crate::types::AdmissionWaitSummary;
use std::time::Duration;

/// Admission waits folded into a count, a total and the extremes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdmissionWaitStats {
    pub sample_count: u64,
    total: Duration,
    shortest: Option<Duration>,
    longest: Duration,
}

impl AdmissionWaitStats {
    pub fn add_sample(&mut self, waited: Duration) {
        self.sample_count += 1;
        self.total = self.total.saturating_add(waited);
        self.shortest = Some(self.shortest.map_or(waited, |shortest| shortest.min(waited)));
        self.longest = self.longest.max(waited);
    }

    pub fn mean(&self) -> Duration {
        if self.sample_count == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total.as_secs_f64() / self.sample_count as f64)
    }

    pub fn min(&self) -> Duration {
        self.shortest.unwrap_or_default()
    }

    pub fn max(&self) -> Duration {
        self.longest
    }

    pub fn summary(&self) -> AdmissionWaitSummary {
        AdmissionWaitSummary {
            samples: self.sample_count,
            mean_seconds: self.mean().as_secs_f64(),
            min_seconds: self.min().as_secs_f64(),
            max_seconds: self.max().as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_samples_reads_as_zero() {
        let stats = AdmissionWaitStats::default();
        let summary = stats.summary();
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.mean_seconds, 0.0);
        assert_eq!(summary.min_seconds, 0.0);
        assert_eq!(summary.max_seconds, 0.0);
    }

    #[test]
    fn test_instant_admission_counts_as_shortest() {
        let mut stats = AdmissionWaitStats::default();
        stats.add_sample(Duration::from_secs(30));
        stats.add_sample(Duration::ZERO);
        stats.add_sample(Duration::from_secs(30));

        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.min(), Duration::ZERO);
        assert_eq!(stats.max(), Duration::from_secs(30));
        assert_eq!(stats.summary().mean_seconds, 20.0);
    }
}
