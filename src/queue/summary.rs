use crate::utils::{format_duration, format_file_size};
use chrono::{DateTime, Local};
use std::path::PathBuf;

/// Aggregate result of one batch
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Jobs scheduled when the batch started
    pub total: usize,
    /// Jobs that reached a terminal state
    pub processed: usize,
    pub done: usize,
    pub errors: usize,
    pub stopped: usize,
    /// Whether a stop was requested
    pub cancelled: bool,
    /// Committed outputs with their size when readable
    pub outputs: Vec<(PathBuf, Option<u64>)>,
}

impl BatchSummary {
    pub fn new(started_at: DateTime<Local>, total: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            total,
            processed: 0,
            done: 0,
            errors: 0,
            stopped: 0,
            cancelled: false,
            outputs: Vec::new(),
        }
    }

    pub fn record_output(&mut self, output: PathBuf) {
        let size = std::fs::metadata(&output).ok().map(|m| m.len());
        self.outputs.push((output, size));
    }

    pub fn total_output_size(&self) -> u64 {
        self.outputs.iter().filter_map(|(_, size)| *size).sum()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Human-readable report, one line per fact
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "{} {}/{} processed: {} done, {} failed, {} stopped",
                if self.cancelled { "Stopped," } else { "Finished," },
                self.processed,
                self.total,
                self.done,
                self.errors,
                self.stopped
            ),
            format!(
                "Started {}, finished {} ({})",
                self.started_at.format("%Y-%m-%d %H:%M:%S"),
                self.finished_at.format("%H:%M:%S"),
                format_duration(self.elapsed())
            ),
        ];

        for (path, size) in &self.outputs {
            let size = size.map(format_file_size).unwrap_or_else(|| "?".to_string());
            lines.push(format!("  {} [{}]", path.display(), size));
        }
        if !self.outputs.is_empty() {
            lines.push(format!(
                "Total output: {}",
                format_file_size(self.total_output_size())
            ));
        }
        lines
    }
}
