//! Streaming progress inference from encoder diagnostic output.
//!
//! ffmpeg reports elapsed encode time as `time=HH:MM:SS.cs` tokens on its
//! stderr. The monitor reads that stream line by line while the child runs
//! (a dedicated reader per process, so OS pipe buffering can never deadlock
//! the child), converts the tokens to seconds and drives a bounded progress
//! bar. The token format is unstable: a line without one is simply skipped.

use indicatif::{ProgressBar, ProgressStyle};
use regex_lite::Regex;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;

use crate::cancel::CancelToken;

const LOG_TAIL_LINES: usize = 24;

/// Result of monitoring one child process to completion.
#[derive(Debug)]
pub struct MonitorOutcome {
    pub status: ExitStatus,
    /// Last diagnostic lines, kept for error reporting.
    pub log_tail: Vec<String>,
}

/// Extracts an elapsed-time token from one diagnostic line, in seconds.
pub fn parse_time_token(line: &str, re: &Regex) -> Option<f64> {
    let caps = re.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    let fraction = caps
        .get(4)
        .and_then(|m| format!("0.{}", m.as_str()).parse::<f64>().ok())
        .unwrap_or(0.0);
    Some(hours * 3600.0 + minutes * 60.0 + seconds + fraction)
}

/// Awaits `child` while streaming its stderr.
///
/// Advances a monotonically non-decreasing position clamped to
/// `[0, total_duration]`. With an unknown or zero duration no bar is
/// rendered but the stream is still drained and the process waited on.
/// Cancellation kills the child; the reader unblocks on the resulting EOF.
/// Non-zero exit is reported in the outcome, never as an error.
pub async fn monitor(
    child: &mut Child,
    total_duration: Option<f64>,
    cancel: &CancelToken,
    render: bool,
    label: &str,
) -> std::io::Result<MonitorOutcome> {
    let stderr = child.stderr.take().ok_or_else(|| {
        std::io::Error::other("child process was spawned without piped stderr")
    })?;
    let mut lines = BufReader::new(stderr).lines();

    let time_regex = Regex::new(r"time=(\d+):(\d{2}):(\d{2})(?:\.(\d+))?").ok();
    let total = total_duration.filter(|t| *t > 0.0);
    let bar = match (render, total) {
        (true, Some(t)) => {
            let bar = ProgressBar::new((t * 100.0) as u64);
            bar.set_style(
                ProgressStyle::with_template("{msg:20!} [{bar:40}] {percent:>3}%")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message(label.to_string());
            Some(bar)
        }
        _ => None,
    };

    let mut position = 0.0f64;
    let mut log_tail: Vec<String> = Vec::new();
    let mut kill_sent = false;

    loop {
        let line = if kill_sent {
            lines.next_line().await?
        } else {
            tokio::select! {
                line = lines.next_line() => line?,
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    kill_sent = true;
                    continue;
                }
            }
        };

        let Some(line) = line else { break };

        if let Some(ref re) = time_regex {
            if let Some(seconds) = parse_time_token(&line, re) {
                let clamped = match total {
                    Some(t) => seconds.min(t),
                    None => seconds,
                };
                if clamped > position {
                    position = clamped;
                    if let Some(ref bar) = bar {
                        bar.set_position((position * 100.0) as u64);
                    }
                }
                continue;
            }
        }

        if log_tail.len() == LOG_TAIL_LINES {
            log_tail.remove(0);
        }
        log_tail.push(line);
    }

    let status = child.wait().await?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    Ok(MonitorOutcome { status, log_tail })
}

/// Decorative spinner for waits with no native progress signal, e.g.
/// metadata scans. Shares nothing with the main flow beyond its stop call;
/// omitting it entirely does not affect correctness.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(message: String, enabled: bool) -> Self {
        let bar = enabled.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_message(message);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Self { bar }
    }

    pub fn stop(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_re() -> Regex {
        Regex::new(r"time=(\d+):(\d{2}):(\d{2})(?:\.(\d+))?").unwrap()
    }

    #[test]
    fn test_parse_typical_stats_line() {
        let line = "frame=  123 fps= 30 q=28.0 size=    1024KiB time=00:01:23.45 bitrate= 100.9kbits/s speed=1.01x";
        let seconds = parse_time_token(line, &time_re()).unwrap();
        assert!((seconds - 83.45).abs() < 1e-9);
    }

    #[test]
    fn test_parse_hours() {
        let seconds = parse_time_token("time=01:02:03.5", &time_re()).unwrap();
        assert!((seconds - 3723.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_without_fraction() {
        let seconds = parse_time_token("time=00:00:10", &time_re()).unwrap();
        assert_eq!(seconds, 10.0);
    }

    #[test]
    fn test_line_without_token() {
        assert!(parse_time_token("Press [q] to stop", &time_re()).is_none());
        assert!(parse_time_token("time=N/A", &time_re()).is_none());
    }

    #[tokio::test]
    async fn test_monitor_waits_out_child_and_reports_status() {
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "echo 'time=00:00:01.00' >&2; echo oops >&2; exit 3"])
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap();
        let outcome = monitor(&mut child, Some(2.0), &CancelToken::never(), false, "test")
            .await
            .unwrap();
        assert_eq!(outcome.status.code(), Some(3));
        assert_eq!(outcome.log_tail, vec!["oops".to_string()]);
    }

    #[tokio::test]
    async fn test_monitor_cancellation_kills_child() {
        let (handle, token) = crate::cancel::channel();
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "sleep 30"])
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap();
        handle.cancel();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            monitor(&mut child, None, &token, false, "test"),
        )
        .await
        .expect("monitor must unblock on cancellation")
        .unwrap();
        assert!(!outcome.status.success());
    }
}
