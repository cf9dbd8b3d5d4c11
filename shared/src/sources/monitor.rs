//! Event-loop lag and utilization sampling
//!
//! A background task sleeps for a fixed interval and records how late it woke
//! up. The overshoot is the lag; the share of the wake-up period spent
//! overshooting is used as the utilization estimate.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::messages::{EventLoopLag, EventLoopUtilization};

/// Smoothing factor for the utilization moving average
const UTILIZATION_ALPHA: f64 = 0.2;

#[derive(Debug, Default)]
struct LoopStats {
    current_ms: f64,
    total_ms: f64,
    max_ms: f64,
    samples: u64,
    utilization: f64,
}

#[derive(Clone)]
pub struct EventLoopMonitor {
    stats: Arc<Mutex<LoopStats>>,
    interval: Duration,
}

impl EventLoopMonitor {
    /// Create a monitor without starting the sampler
    pub fn new(interval: Duration) -> Self {
        Self {
            stats: Arc::new(Mutex::new(LoopStats::default())),
            interval,
        }
    }

    /// Create a monitor and start sampling on the current runtime
    pub fn spawn(interval: Duration) -> (Self, JoinHandle<()>) {
        let monitor = Self::new(interval);
        let sampler = monitor.clone();

        let handle = tokio::spawn(async move {
            loop {
                let started = Instant::now();
                tokio::time::sleep(sampler.interval).await;
                sampler.record(started.elapsed());
            }
        });

        (monitor, handle)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record one wake-up that took `elapsed` for a sleep of `interval`
    pub fn record(&self, elapsed: Duration) {
        let lag = elapsed.saturating_sub(self.interval);
        let lag_ms = lag.as_secs_f64() * 1000.0;
        let busy_share = if elapsed.is_zero() {
            0.0
        } else {
            (lag.as_secs_f64() / elapsed.as_secs_f64()).clamp(0.0, 1.0)
        };

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.current_ms = lag_ms;
        stats.total_ms += lag_ms;
        stats.max_ms = stats.max_ms.max(lag_ms);
        stats.utilization = if stats.samples == 0 {
            busy_share
        } else {
            UTILIZATION_ALPHA * busy_share + (1.0 - UTILIZATION_ALPHA) * stats.utilization
        };
        stats.samples += 1;
    }

    pub fn lag(&self) -> EventLoopLag {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        EventLoopLag {
            current_ms: stats.current_ms,
            mean_ms: if stats.samples == 0 {
                0.0
            } else {
                stats.total_ms / stats.samples as f64
            },
            max_ms: stats.max_ms,
            samples: stats.samples,
        }
    }

    pub fn utilization(&self) -> EventLoopUtilization {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        EventLoopUtilization {
            utilization: stats.utilization,
            window_ms: self.interval.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_lag() {
        let monitor = EventLoopMonitor::new(Duration::from_millis(100));

        monitor.record(Duration::from_millis(110));
        monitor.record(Duration::from_millis(130));
        monitor.record(Duration::from_millis(100));

        let lag = monitor.lag();
        assert_eq!(lag.samples, 3);
        assert!((lag.current_ms - 0.0).abs() < 1e-9);
        assert!((lag.max_ms - 30.0).abs() < 1e-6);
        assert!((lag.mean_ms - 40.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_utilization_stays_in_range() {
        let monitor = EventLoopMonitor::new(Duration::from_millis(10));
        assert_eq!(monitor.utilization().utilization, 0.0);

        monitor.record(Duration::from_millis(20));
        let first = monitor.utilization().utilization;
        assert!((first - 0.5).abs() < 1e-9);

        for _ in 0..50 {
            monitor.record(Duration::from_millis(10));
        }
        let settled = monitor.utilization();
        assert!(settled.utilization < first);
        assert!(settled.utilization >= 0.0);
        assert_eq!(settled.window_ms, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_records_in_background() {
        let (monitor, handle) = EventLoopMonitor::spawn(Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(260)).await;
        assert!(monitor.lag().samples >= 4);

        handle.abort();
    }
}
