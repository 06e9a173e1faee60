//! Recorded landmark streams
//!
//! One JSON [`PoseFrame`] per line, in either accepted shape. Blank lines
//! and `#` comments are skipped; malformed lines are logged and skipped so
//! one bad frame does not end a workout.

use anyhow::{Context, Result};
use formcoach_core::PoseFrame;
use log::warn;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Parse one line; `Ok(None)` for lines that carry no frame
pub fn parse_line(line: &str) -> Result<Option<PoseFrame>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

/// Open a file, or stdin for `None` / `-`
pub async fn open(input: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match input {
        Some(path) if path != Path::new("-") => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open frame file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

/// Feed frames into `frames` at `fps`. Returns the number of frames sent,
/// stopping early if the receiver goes away.
pub async fn pump<R>(reader: R, fps: u32, frames: mpsc::Sender<PoseFrame>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let period = Duration::from_secs(1) / fps.max(1);
    let mut pacing = interval(period);
    pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read frame stream")? {
        line_no += 1;
        let frame = match parse_line(&line) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping frame on line {}: {}", line_no, e);
                continue;
            }
        };

        pacing.tick().await;
        if frames.send(frame).await.is_err() {
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcoach_core::Joint;

    const STREAM: &str = r#"
# recorded side-on
{"landmarks":[]}
{"joints":{"right_shoulder":{"x":0.3,"y":0.4},"right_elbow":{"x":0.3,"y":0.6}}}
not json
{"joints":{}}
"#;

    #[test]
    fn test_parse_line() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# note").unwrap().is_none());
        assert!(parse_line("{oops").is_err());

        let frame = parse_line(r#"{"joints":{"right_elbow":{"x":0.5,"y":0.5}}}"#)
            .unwrap()
            .unwrap();
        assert!(frame.get(Joint::RightElbow).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_skips_bad_lines() {
        let (tx, mut rx) = mpsc::channel(8);
        let sent = pump(STREAM.as_bytes(), 30, tx).await.unwrap();
        assert_eq!(sent, 3);

        let mut received = Vec::new();
        while let Some(frame) = rx.recv().await {
            received.push(frame);
        }
        assert_eq!(received.len(), 3);
        assert!(received[0].is_empty());
        assert_eq!(received[1].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sent = pump(STREAM.as_bytes(), 30, tx).await.unwrap();
        assert_eq!(sent, 0);
    }
}
