//! Event sink: the only channel through which pipeline stages report progress and problems.
//!
//! Stages receive a `&dyn EventSink` and never look at what happens to an event afterwards;
//! a sink cannot fail and cannot influence control flow. `TracingSink` forwards to `tracing`
//! with structured fields, `NullSink` drops everything and `MemorySink` keeps events for tests.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::pipeline::RunSummary;
use crate::relocate::MoveStrategy;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        })
    }
}

/// Everything a run can report.
#[derive(Debug, Clone)]
pub enum Event {
    /// Free-form progress line for a pipeline stage.
    Stage { stage: &'static str, message: String },
    /// A directory entry could not be read while scanning; it was skipped.
    ScanEntrySkipped { root: PathBuf, error: String },
    /// The size of a candidate could not be determined; it takes no part in detection.
    SizeProbeFailed { path: PathBuf, error: String },
    /// Hashing a candidate failed; it takes no part in detection.
    HashFailed { path: PathBuf, error: String },
    /// A source file was picked for relocation.
    DuplicateSelected { path: PathBuf, reason: String },
    /// A move attempt failed and will be retried after `delay`.
    MoveRetry {
        path: PathBuf,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        error: String,
    },
    Moved {
        src: PathBuf,
        dest: PathBuf,
        strategy: MoveStrategy,
    },
    /// Dry-run report of a move that was not performed.
    WouldMove { src: PathBuf, dest: PathBuf },
    MoveFailed { path: PathBuf, error: String },
    Summary(RunSummary),
}

impl Event {
    pub fn level(&self) -> Level {
        match self {
            Event::Stage { .. }
            | Event::DuplicateSelected { .. }
            | Event::Moved { .. }
            | Event::WouldMove { .. }
            | Event::Summary(_) => Level::Info,
            Event::ScanEntrySkipped { .. } | Event::MoveRetry { .. } => Level::Warning,
            Event::SizeProbeFailed { .. } | Event::HashFailed { .. } | Event::MoveFailed { .. } => {
                Level::Error
            }
        }
    }

    /// Source path the event is about, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Event::SizeProbeFailed { path, .. }
            | Event::HashFailed { path, .. }
            | Event::DuplicateSelected { path, .. }
            | Event::MoveRetry { path, .. }
            | Event::MoveFailed { path, .. } => Some(path),
            Event::Moved { src, .. } | Event::WouldMove { src, .. } => Some(src),
            Event::ScanEntrySkipped { root, .. } => Some(root),
            Event::Stage { .. } | Event::Summary(_) => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Stage { stage, message } => write!(f, "[{stage}] {message}"),
            Event::ScanEntrySkipped { root, error } => {
                write!(f, "Skipped unreadable entry under {}: {error}", root.display())
            }
            Event::SizeProbeFailed { path, error } => {
                write!(f, "Error getting size of {}: {error}", path.display())
            }
            Event::HashFailed { path, error } => {
                write!(f, "Error hashing {}: {error}", path.display())
            }
            Event::DuplicateSelected { path, reason } => {
                write!(f, "Duplicate {} ({reason})", path.display())
            }
            Event::MoveRetry {
                path,
                attempt,
                max_attempts,
                delay,
                error,
            } => write!(
                f,
                "Retry {attempt}/{max_attempts} in {}ms: {} ({error})",
                delay.as_millis(),
                path.display()
            ),
            Event::Moved {
                src,
                dest,
                strategy,
            } => match strategy {
                MoveStrategy::Rename => {
                    write!(f, "Moved: {} -> {}", src.display(), dest.display())
                }
                MoveStrategy::CopyDelete => {
                    write!(f, "Moved (cross-fs): {} -> {}", src.display(), dest.display())
                }
            },
            Event::WouldMove { src, dest } => {
                write!(f, "[Dry Run] Would move: {} -> {}", src.display(), dest.display())
            }
            Event::MoveFailed { path, error } => {
                write!(f, "Failed to move {}: {error}", path.display())
            }
            Event::Summary(s) => write!(
                f,
                "found {} reference / {} source files, hashed {}, duplicates {}, moved {}, simulated {}, failed {}",
                s.reference_files,
                s.source_files,
                s.hashed,
                s.duplicates,
                s.moved,
                s.simulated,
                s.move_failures
            ),
        }
    }
}

/// Receiver of pipeline events. Implementations must not block for long or panic.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Forwards events to `tracing`, keeping paths and counters as structured fields.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::Stage { stage, message } => info!(stage, "{message}"),
            Event::ScanEntrySkipped { root, error } => {
                warn!(root = %root.display(), %error, "Skipped unreadable entry")
            }
            Event::SizeProbeFailed { path, error } => {
                error!(path = %path.display(), %error, op = "size", "Error getting file size")
            }
            Event::HashFailed { path, error } => {
                error!(path = %path.display(), %error, op = "hash", "Error hashing file")
            }
            Event::DuplicateSelected { path, reason } => {
                info!(path = %path.display(), %reason, "Duplicate selected")
            }
            Event::MoveRetry {
                path,
                attempt,
                max_attempts,
                delay,
                error,
            } => warn!(
                path = %path.display(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                %error,
                "Retrying move"
            ),
            Event::Moved {
                src,
                dest,
                strategy,
            } => info!(src = %src.display(), dest = %dest.display(), strategy = ?strategy, "Moved"),
            Event::WouldMove { src, dest } => {
                info!(src = %src.display(), dest = %dest.display(), "dry-run: would move file")
            }
            Event::MoveFailed { path, error } => {
                error!(path = %path.display(), %error, op = "move", "Failed to move")
            }
            Event::Summary(s) => info!(
                reference_files = s.reference_files,
                source_files = s.source_files,
                hashed = s.hashed,
                probe_failures = s.probe_failures,
                duplicates = s.duplicates,
                moved = s.moved,
                simulated = s.simulated,
                move_failures = s.move_failures,
                "Deduplication finished"
            ),
        }
    }
}

/// Keeps a copy of every event in arrival order.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count_level(&self, level: Level) -> usize {
        self.events().iter().filter(|e| e.level() == level).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        match self.events.lock() {
            Ok(mut g) => g.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_severity() {
        let e = Event::HashFailed {
            path: "x.mp3".into(),
            error: "boom".into(),
        };
        assert_eq!(e.level(), Level::Error);
        let w = Event::MoveRetry {
            path: "x.mp3".into(),
            attempt: 1,
            max_attempts: 3,
            delay: Duration::from_millis(10),
            error: "busy".into(),
        };
        assert_eq!(w.level(), Level::Warning);
        assert!(w.to_string().contains("Retry 1/3"));
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(&Event::Stage {
            stage: "scan",
            message: "one".into(),
        });
        sink.emit(&Event::MoveFailed {
            path: "a.wav".into(),
            error: "gone".into(),
        });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Stage { .. }));
        assert_eq!(sink.count_level(Level::Error), 1);
    }
}
