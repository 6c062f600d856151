//! Progress reporting.
//!
//! Every long-running operation pushes a completion percentage in `[0, 100]`
//! through a [`ProgressSink`]. Sinks are passive: there is no backpressure and
//! an operation works the same whether or not a sink is supplied.

use tokio::sync::mpsc::UnboundedSender;

/// Receiver of completion percentages.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Lets a caller drain progress from a channel instead of a callback.
/// A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink(pub UnboundedSender<f64>);

impl ProgressSink for ChannelSink {
    fn report(&self, percent: f64) {
        let _ = self.0.send(percent);
    }
}

/// Convert completed/total bytes into a percentage clamped to `[0, 100]`.
///
/// A zero total means there is nothing left to do, so it reads as 100.
///
/// ```
/// use sitm_transfer::progress::percentage;
///
/// assert_eq!(percentage(512, 1024), 50.0);
/// assert_eq!(percentage(0, 0), 100.0);
/// assert_eq!(percentage(4096, 1024), 100.0);
/// ```
pub fn percentage(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (completed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Forwards reports to an optional sink while keeping them non-decreasing.
///
/// Values below the last reported one are dropped, values outside
/// `[0, 100]` are clamped, and [`finish`](Self::finish) emits the closing 100.
pub struct ProgressTracker<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: Option<f64>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink, last: None }
    }

    /// Tracker that discards every report.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn report(&mut self, percent: f64) {
        if percent.is_nan() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        if matches!(self.last, Some(last) if percent < last) {
            return;
        }
        self.last = Some(percent);
        if let Some(sink) = self.sink {
            sink.report(percent);
        }
    }

    pub fn report_bytes(&mut self, completed: u64, total: u64) {
        self.report(percentage(completed, total));
    }

    pub fn finish(&mut self) {
        self.report(100.0);
    }

    /// Last value forwarded, if any.
    pub fn last(&self) -> Option<f64> {
        self.last
    }
}
