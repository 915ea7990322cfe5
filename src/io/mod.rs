//! Recorded event logs.

mod replay;

pub use replay::{EventLog, LogEntry};
