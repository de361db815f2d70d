// WHY: large documents convert line by line with a bounded number of progress
// notifications, yielding to the scheduler after each one so progress delivery
// and other pipelines are not starved

use crate::dictionary::{DictPair, DictionaryOverlay};
use crate::table::BaseConvert;
use std::sync::Arc;
use tracing::debug;

/// Default upper bound on notifications per document
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 100;

/// Snapshot handed to the progress callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineProgress {
    /// Fraction of lines converted, 0.0..=1.0
    pub percent: f64,
    pub current_line: usize,
    pub total_lines: usize,
}

/// Lines between notifications so that at most `max_notifications` are sent
pub fn notification_interval(total_lines: usize, max_notifications: usize) -> usize {
    total_lines.div_ceil(max_notifications.max(1)).max(1)
}

/// Line-oriented converter around a base conversion function
#[derive(Clone)]
pub struct ProgressiveConverter {
    base: Arc<BaseConvert>,
    max_notifications: usize,
}

impl ProgressiveConverter {
    pub fn new(base: Arc<BaseConvert>) -> Self {
        Self {
            base,
            max_notifications: DEFAULT_MAX_NOTIFICATIONS,
        }
    }

    pub fn with_max_notifications(mut self, max_notifications: usize) -> Self {
        self.max_notifications = max_notifications.max(1);
        self
    }

    /// The base function, shared with callers that convert other strings the same way
    pub fn base(&self) -> &Arc<BaseConvert> {
        &self.base
    }

    /// Convert `text` line by line, reporting progress through `on_progress`.
    /// The final notification always carries `percent == 1.0`.
    pub async fn convert<F>(&self, text: &str, pairs: &[DictPair], mut on_progress: F) -> String
    where
        F: FnMut(LineProgress),
    {
        if text.is_empty() {
            on_progress(LineProgress {
                percent: 1.0,
                current_line: 0,
                total_lines: 0,
            });
            return String::new();
        }

        let overlay = DictionaryOverlay::new(pairs);
        let lines: Vec<&str> = text.split('\n').collect();
        let total_lines = lines.len();
        let interval = notification_interval(total_lines, self.max_notifications);
        debug!(
            total_lines,
            interval,
            pairs = overlay.len(),
            "Starting progressive conversion"
        );

        let mut converted = Vec::with_capacity(total_lines);
        for (i, line) in lines.iter().enumerate() {
            converted.push(overlay.apply(line, self.base.as_ref()));

            let current_line = i + 1;
            if current_line % interval == 0 || current_line == total_lines {
                on_progress(LineProgress {
                    percent: current_line as f64 / total_lines as f64,
                    current_line,
                    total_lines,
                });
                tokio::task::yield_now().await;
            }
        }

        converted.join("\n")
    }
}
