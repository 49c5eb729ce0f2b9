use crate::error::AppError;
use std::path::Path;
use std::process::{Command, Stdio};

/// Get media duration in seconds via ffprobe
pub fn probe_duration(ffprobe: &Path, input: &Path) -> Result<f64, AppError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| AppError::Probe(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(AppError::Probe(format!(
            "ffprobe failed for {}: {}",
            input.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        AppError::Probe(format!("Could not read duration of {}", input.display()))
    })
}

/// Parse ffprobe's bare duration output, rejecting non-positive values
pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5530.048000\n"), Some(5530.048));
        assert_eq!(parse_duration("\n  12.5  \n"), Some(12.5));
    }

    #[test]
    fn test_parse_duration_rejects_unusable_values() {
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration("0.000000"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_missing_ffprobe_is_a_probe_error() {
        let result = probe_duration(Path::new("/nonexistent/dubmix-ffprobe"), Path::new("a.mp4"));
        assert!(matches!(result, Err(AppError::Probe(_))));
    }
}
