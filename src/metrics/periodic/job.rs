use super::MetricCollector;
use tokio::time::Interval;
use tracing::error;

// A collector and the interval it runs on.
pub struct PeriodicJob<T> {
    collector: T,
    interval: Interval,
}

impl<T: MetricCollector + Send + Sync + 'static> PeriodicJob<T> {
    /// Spawns a task running the collector on every tick.
    pub fn launch_task(collector: T, interval: Interval) {
        tokio::spawn(async move {
            let mut job = Self { collector, interval };
            loop {
                job.interval.tick().await;
                if let Err(err) = job.collector.collect().await {
                    error!(
                        target: "relay::metrics",
                        %err,
                        collector = ?job.collector,
                        "Failed to collect metrics"
                    );
                }
            }
        });
    }
}
