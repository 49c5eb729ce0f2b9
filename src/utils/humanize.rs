use humansize::{DECIMAL, format_size};
use std::time::Duration;

/// Format a byte count as a human-readable size
pub fn format_file_size(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a duration as HH:MM:SS or MM:SS
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
