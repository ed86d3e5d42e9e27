//! Fault types and reporting for the real-time runner.
//!
//! Frame processing itself never fails; these faults describe what happened
//! around it (capture errors, dropped or late frames).

use std::fmt;
use std::time::Duration;

/// Something that went wrong while feeding or running the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameFault {
    /// The audio source returned an error; capture continues.
    Capture(String),
    /// The processing queue was full and the frame was dropped.
    QueueFull { sequence: u64 },
    /// The frame waited longer than allowed and was dropped unprocessed.
    Stale { sequence: u64, age: Duration },
    /// Processing took longer than the frame's real-time budget.
    Overrun {
        sequence: u64,
        elapsed: Duration,
        budget: Duration,
    },
    /// The source failed in a way capture cannot recover from.
    Fatal(String),
}

impl FrameFault {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameFault::Fatal(_))
    }
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFault::Capture(msg) => write!(f, "Capture error: {}", msg),
            FrameFault::QueueFull { sequence } => {
                write!(f, "Frame {} dropped: processing queue full", sequence)
            }
            FrameFault::Stale { sequence, age } => write!(
                f,
                "Frame {} dropped: {:.1}ms old",
                sequence,
                age.as_secs_f64() * 1000.0
            ),
            FrameFault::Overrun {
                sequence,
                elapsed,
                budget,
            } => write!(
                f,
                "Frame {} overran: {:.1}ms of {:.1}ms budget",
                sequence,
                elapsed.as_secs_f64() * 1000.0,
                budget.as_secs_f64() * 1000.0
            ),
            FrameFault::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for FrameFault {}

/// Trait for reporting runner faults.
pub trait FaultReporter: Send + Sync {
    /// Reports a fault raised by the named runner thread.
    fn report(&self, thread: &str, fault: &FrameFault);
}

/// Reporter that forwards faults to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl FaultReporter for LogReporter {
    fn report(&self, thread: &str, fault: &FrameFault) {
        match fault {
            FrameFault::Fatal(_) | FrameFault::Capture(_) => {
                tracing::error!(thread, "{}", fault)
            }
            FrameFault::QueueFull { .. } | FrameFault::Overrun { .. } => {
                tracing::warn!(thread, "{}", fault)
            }
            FrameFault::Stale { .. } => tracing::debug!(thread, "{}", fault),
        }
    }
}
