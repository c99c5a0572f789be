//! Per-activity progress heartbeat
//!
//! While an activity runs, a background task rewrites one console status line
//! on a fixed interval. The task is owned by a `Heartbeat` handle and must be
//! stopped (and joined) before the next activity starts.

use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::console::{RunLog, RUN_LOG_FILE};

static COMPLETED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Completed in (\d+)h (\d+)m (\d+)s").unwrap());

/// Parse the last `Completed in {h}h {m}m {s}s` line of a run log
pub fn parse_baseline(text: &str) -> Option<Duration> {
    let caps = COMPLETED_REGEX.captures_iter(text).last()?;
    let h: u64 = caps[1].parse().ok()?;
    let m: u64 = caps[2].parse().ok()?;
    let s: u64 = caps[3].parse().ok()?;
    Some(Duration::from_secs(h * 3600 + m * 60 + s))
}

/// Expected run length from `<golden_dir>/run.txt`; `None` disables the ETA
pub fn load_baseline(golden_dir: &Path) -> Option<Duration> {
    let path = golden_dir.join(RUN_LOG_FILE);
    let text = std::fs::read_to_string(&path).ok()?;
    let baseline = parse_baseline(&text);
    debug!("Baseline from {}: {:?}", path.display(), baseline);
    baseline
}

/// `{h}h {m}m {s}s`, the format `parse_baseline` reads back
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn format_mm_ss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn progress_line(
    activity: &str,
    activity_elapsed: Duration,
    run_elapsed: Duration,
    baseline: Option<Duration>,
) -> String {
    let head = format!("⏱ {} {}", format_mm_ss(activity_elapsed), activity);
    match baseline {
        None => format!("{} (run {})", head, format_hms(run_elapsed)),
        Some(expected) if run_elapsed <= expected => format!(
            "{} (run {} of ~{}, about {} left)",
            head,
            format_hms(run_elapsed),
            format_hms(expected),
            format_hms(expected - run_elapsed)
        ),
        Some(expected) => format!(
            "{} (run {}, {} over baseline {})",
            head,
            format_hms(run_elapsed),
            format_hms(run_elapsed - expected),
            format_hms(expected)
        ),
    }
}

/// Handle to a running heartbeat task
pub struct Heartbeat {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<u32>,
}

impl Heartbeat {
    pub fn start(
        log: Arc<RunLog>,
        activity: String,
        period: Duration,
        run_started: Instant,
        baseline: Option<Duration>,
    ) -> Self {
        let (stop, mut stop_rx) = oneshot::channel::<()>();
        let activity_started = Instant::now();

        let handle = tokio::spawn(async move {
            let mut ticks = 0u32;
            let mut interval = tokio::time::interval_at(activity_started + period, period);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        ticks += 1;
                        log.status(&progress_line(
                            &activity,
                            activity_started.elapsed(),
                            run_started.elapsed(),
                            baseline,
                        ));
                    }
                }
            }
            ticks
        });

        Self { stop, handle }
    }

    /// Stop the task and wait until it has exited; returns the ticks emitted
    pub async fn stop(self) -> u32 {
        let _ = self.stop.send(());
        match self.handle.await {
            Ok(ticks) => ticks,
            Err(e) => {
                warn!("Heartbeat task failed: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::console::SharedBuffer;

    #[test]
    fn test_parse_baseline() {
        let text = "Starting run\n✓ 01:00 R01\n\nCompleted in 1h 2m 3s\n";
        assert_eq!(parse_baseline(text), Some(Duration::from_secs(3723)));
        assert_eq!(parse_baseline("no summary"), None);
    }

    #[test]
    fn test_parse_baseline_takes_last() {
        let text = "Completed in 0h 0m 5s\nCompleted in 0h 10m 0s\n";
        assert_eq!(parse_baseline(text), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_load_baseline_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_baseline(dir.path()), None);
        std::fs::write(dir.path().join("run.txt"), "Completed in 2h 0m 0s").unwrap();
        assert_eq!(load_baseline(dir.path()), Some(Duration::from_secs(7200)));
    }

    #[test]
    fn test_format_round_trips_through_parse() {
        let d = Duration::from_secs(2 * 3600 + 5 * 60 + 9);
        assert_eq!(format_hms(d), "2h 5m 9s");
        assert_eq!(parse_baseline(&format!("Completed in {}", format_hms(d))), Some(d));
    }

    #[test]
    fn test_progress_line() {
        let line = progress_line("R03", Duration::from_secs(75), Duration::from_secs(600), None);
        assert_eq!(line, "⏱ 01:15 R03 (run 0h 10m 0s)");

        let line = progress_line(
            "R03",
            Duration::from_secs(75),
            Duration::from_secs(600),
            Some(Duration::from_secs(3600)),
        );
        assert!(line.contains("about 0h 50m 0s left"));

        let line = progress_line(
            "R03",
            Duration::from_secs(75),
            Duration::from_secs(4000),
            Some(Duration::from_secs(3600)),
        );
        assert!(line.contains("0h 6m 40s over baseline"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_ticks_until_stopped() {
        let console = SharedBuffer::new();
        let log = Arc::new(RunLog::new(Box::new(console.clone()), None));

        let heartbeat = Heartbeat::start(
            log.clone(),
            "R03".to_string(),
            Duration::from_secs(15),
            Instant::now(),
            None,
        );
        tokio::time::sleep(Duration::from_secs(46)).await;
        let ticks = heartbeat.stop().await;
        assert_eq!(ticks, 3);

        let before = console.contents();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(console.contents(), before);
        assert!(before.contains("⏱ 00:45 R03"));
    }
}
