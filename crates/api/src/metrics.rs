use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use assess::CoverageSummary;

pub struct Metrics {
    // Requests
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Operations
    uploads: AtomicUsize,
    analyses: AtomicUsize,
    chats: AtomicUsize,
    generations: AtomicUsize,

    // Per-control outcomes
    controls_assessed: AtomicUsize,
    controls_failed: AtomicUsize,
    controls_not_applicable: AtomicUsize,
    chunks_indexed: AtomicUsize,

    // Timing (in microseconds)
    total_analysis_time_us: AtomicU64,
    total_chat_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            analyses: AtomicUsize::new(0),
            chats: AtomicUsize::new(0),
            generations: AtomicUsize::new(0),
            controls_assessed: AtomicUsize::new(0),
            controls_failed: AtomicUsize::new(0),
            controls_not_applicable: AtomicUsize::new(0),
            chunks_indexed: AtomicUsize::new(0),
            total_analysis_time_us: AtomicU64::new(0),
            total_chat_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_upload(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index(&self, chunks: usize) {
        self.chunks_indexed.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_analysis(&self, duration: Duration, summary: &CoverageSummary) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
        self.total_analysis_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        // Not-applicable controls are counted separately; they never reach the model.
        let assessed = summary.covered + summary.partially_covered + summary.not_covered;
        self.controls_assessed.fetch_add(assessed, Ordering::Relaxed);
        self.controls_failed.fetch_add(summary.failed, Ordering::Relaxed);
        self.controls_not_applicable
            .fetch_add(summary.not_applicable, Ordering::Relaxed);
    }

    pub fn record_chat(&self, duration: Duration) {
        self.chats.fetch_add(1, Ordering::Relaxed);
        self.total_chat_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_generation(&self) {
        self.generations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            analyses: self.analyses.load(Ordering::Relaxed),
            chats: self.chats.load(Ordering::Relaxed),
            generations: self.generations.load(Ordering::Relaxed),
            controls_assessed: self.controls_assessed.load(Ordering::Relaxed),
            controls_failed: self.controls_failed.load(Ordering::Relaxed),
            controls_not_applicable: self.controls_not_applicable.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            avg_analysis_time_ms: avg_time_ms(&self.total_analysis_time_us, &self.analyses),
            avg_chat_time_ms: avg_time_ms(&self.total_chat_time_us, &self.chats),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = count.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 {
        total / cnt / 1000.0
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub uploads: usize,
    pub analyses: usize,
    pub chats: usize,
    pub generations: usize,
    pub controls_assessed: usize,
    pub controls_failed: usize,
    pub controls_not_applicable: usize,
    pub chunks_indexed: usize,
    pub avg_analysis_time_ms: f64,
    pub avg_chat_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_counters_follow_summary() {
        let metrics = Metrics::new();
        let summary = CoverageSummary {
            covered: 3,
            partially_covered: 1,
            not_covered: 2,
            not_applicable: 4,
            failed: 1,
        };
        metrics.record_analysis(Duration::from_millis(20), &summary);
        metrics.record_analysis(Duration::from_millis(40), &summary);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.analyses, 2);
        assert_eq!(snapshot.controls_assessed, 12);
        assert_eq!(snapshot.controls_failed, 2);
        assert_eq!(snapshot.controls_not_applicable, 8);
        assert!((snapshot.avg_analysis_time_ms - 30.0).abs() < 0.01);
    }

    #[test]
    fn averages_are_zero_without_samples() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.avg_chat_time_ms, 0.0);
        assert_eq!(snapshot.total_requests, 0);
    }

    #[test]
    fn requests_split_by_outcome() {
        let metrics = Metrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_request(true);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
    }
}
