//! JSON-lines event log player for replaying recorded producer streams.
//!
//! Each non-empty line holds one entry:
//!
//! ```text
//! {"t_ms": 1200, "event": {"type": "beacon", "id": "C3:00:00:1C:6B:72", "rssi": -67}}
//! ```
//!
//! Lines starting with `#` are comments.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MargaError, Result};
use crate::navigation::SensorEvent;

/// One timestamped event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the start of the recording
    pub t_ms: u64,
    pub event: SensorEvent,
}

/// Event log player.
///
/// Supports immediate playback (as fast as possible) and real-time playback
/// with a speed multiplier.
pub struct EventLog {
    entries: Vec<LogEntry>,
    cursor: usize,
    playback_start: Option<Instant>,
    first_entry_ms: Option<u64>,
    playback_speed: f32,
}

impl EventLog {
    /// Open and parse a log file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let log = Self::from_reader(BufReader::new(file))?;
        debug!(
            "Loaded {} events from {}",
            log.len(),
            path.as_ref().display()
        );
        Ok(log)
    }

    /// Parse a log from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(trimmed).map_err(|e| {
                MargaError::InvalidFormat(format!("event log line {}: {}", i + 1, e))
            })?;
            entries.push(entry);
        }
        Ok(Self::from_entries(entries))
    }

    /// Wrap already-parsed entries.
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries,
            cursor: 0,
            playback_start: None,
            first_entry_ms: None,
            playback_speed: 0.0, // Default: no timing
        }
    }

    /// Write entries as JSON lines.
    pub fn write<W: Write>(entries: &[LogEntry], writer: &mut W) -> Result<()> {
        for entry in entries {
            serde_json::to_writer(&mut *writer, entry)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Set playback speed.
    ///
    /// - 0.0 = as fast as possible (no timing)
    /// - 1.0 = real-time
    /// - 2.0 = 2x speed
    pub fn set_speed(&mut self, speed: f32) {
        self.playback_speed = speed;
    }

    pub fn speed(&self) -> f32 {
        self.playback_speed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recording duration
    pub fn duration(&self) -> Duration {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => {
                Duration::from_millis(last.t_ms.saturating_sub(first.t_ms))
            }
            _ => Duration::ZERO,
        }
    }

    /// Entries returned so far
    pub fn entries_read(&self) -> usize {
        self.cursor
    }

    /// Next entry without any timing delay.
    pub fn next_immediate(&mut self) -> Option<LogEntry> {
        let entry = self.entries.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(entry)
    }

    /// Reset to the first entry.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.playback_start = None;
        self.first_entry_ms = None;
    }

    /// Block until `t_ms` is due under the current playback speed.
    fn wait_for_timing(&mut self, t_ms: u64) {
        let (start, first_ms) = match (self.playback_start, self.first_entry_ms) {
            (Some(start), Some(first_ms)) => (start, first_ms),
            _ => {
                self.playback_start = Some(Instant::now());
                self.first_entry_ms = Some(t_ms);
                return;
            }
        };

        let offset_ms = t_ms.saturating_sub(first_ms);
        let target = Duration::from_secs_f64(offset_ms as f64 / 1000.0 / self.playback_speed as f64);
        let elapsed = start.elapsed();
        if target > elapsed {
            std::thread::sleep(target - elapsed);
        }
    }
}

/// Iterates with timing when a playback speed is set.
impl Iterator for EventLog {
    type Item = LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.next_immediate()?;
        if self.playback_speed > 0.0 {
            self.wait_for_timing(entry.t_ms);
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::BeaconId;

    const LOG: &str = r#"
# sample walk
{"t_ms": 0, "event": {"type": "heading", "degrees": 90}}
{"t_ms": 100, "event": {"type": "beacon", "id": "b1", "rssi": -61.5}}

{"t_ms": 250, "event": {"type": "speed", "speed": 0.4}}
"#;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let log = EventLog::from_reader(LOG.as_bytes()).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.duration(), Duration::from_millis(250));

        let events: Vec<SensorEvent> = log.map(|e| e.event).collect();
        assert_eq!(
            events[1],
            SensorEvent::Beacon {
                id: BeaconId::new("b1"),
                rssi: -61.5
            }
        );
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let text = "{\"t_ms\": 0, \"event\": {\"type\": \"speed\", \"speed\": 1}}\nnot json\n";
        match EventLog::from_reader(text.as_bytes()) {
            Err(MargaError::InvalidFormat(msg)) => assert!(msg.contains("line 2"), "{}", msg),
            other => panic!("expected format error, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_write_then_read() {
        let entries = vec![
            LogEntry {
                t_ms: 5,
                event: SensorEvent::Speed { speed: 0.5 },
            },
            LogEntry {
                t_ms: 10,
                event: SensorEvent::ClearDestination,
            },
        ];
        let mut buf = Vec::new();
        EventLog::write(&entries, &mut buf).unwrap();

        let mut log = EventLog::from_reader(buf.as_slice()).unwrap();
        assert_eq!(log.next_immediate(), Some(entries[0].clone()));
        assert_eq!(log.entries_read(), 1);
        log.rewind();
        let all: Vec<LogEntry> = log.collect();
        assert_eq!(all, entries);
    }

    #[test]
    fn test_realtime_playback_waits() {
        let entries = vec![
            LogEntry {
                t_ms: 1000,
                event: SensorEvent::Speed { speed: 0.0 },
            },
            LogEntry {
                t_ms: 1060,
                event: SensorEvent::Speed { speed: 0.0 },
            },
        ];
        let mut log = EventLog::from_entries(entries);
        log.set_speed(1.0);

        let start = Instant::now();
        assert_eq!(log.by_ref().count(), 2);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
