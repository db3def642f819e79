//! Progress reporting: user-facing events and shared transfer counters.
//!
//! The manager and its worker tasks push [`ProgressEvent`]s over an unbounded
//! channel; the frontend decides how to render them. Byte and file counters
//! live in a single [`ProgressState`] shared across all tasks via atomics, so
//! a progress bar can poll a consistent snapshot at any time.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tokio::sync::mpsc;

/// Severity of a progress event, used by the frontend to pick styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    /// Routine status line.
    Info,
    /// Detail only shown in verbose mode.
    Verbose,
    /// Something went wrong but the run continues.
    Warning,
    /// A release or asset failed.
    Error,
    /// A release or asset finished successfully.
    Success,
}

/// A single user-facing status message emitted during a run.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Human-readable message.
    pub message: String,
    /// Severity for display purposes.
    pub level: ProgressLevel,
}

impl ProgressEvent {
    /// Creates an info-level event.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: ProgressLevel::Info,
        }
    }

    /// Creates a verbose-level event.
    pub fn verbose(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: ProgressLevel::Verbose,
        }
    }

    /// Creates a warning-level event.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: ProgressLevel::Warning,
        }
    }

    /// Creates an error-level event.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: ProgressLevel::Error,
        }
    }

    /// Creates a success-level event.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: ProgressLevel::Success,
        }
    }
}

pub(crate) type EventSender = mpsc::UnboundedSender<ProgressEvent>;

/// Receiving half of the progress event channel, handed to the frontend.
pub type EventReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Shared transfer counters, updated concurrently by worker tasks.
///
/// Expected totals are set once during initialization; received counters grow
/// monotonically as chunks land. Skipped files count as completed without
/// contributing received bytes, so the byte counters track actual transfer
/// volume rather than catalog size.
#[derive(Debug, Default)]
pub struct ProgressState {
    bytes_received: AtomicU64,
    bytes_expected: AtomicU64,
    files_completed: AtomicU32,
    files_expected: AtomicU32,
}

impl ProgressState {
    /// Creates a zeroed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `n` bytes received from the network.
    pub fn add_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::SeqCst);
    }

    /// Adds `n` bytes to the expected total.
    pub fn add_expected_bytes(&self, n: u64) {
        self.bytes_expected.fetch_add(n, Ordering::SeqCst);
    }

    /// Marks one file as completed (transferred or skipped).
    pub fn add_completed_file(&self) {
        self.files_completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Adds one file to the expected total.
    pub fn add_expected_file(&self) {
        self.files_expected.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_received: self.bytes_received.load(Ordering::SeqCst),
            bytes_expected: self.bytes_expected.load(Ordering::SeqCst),
            files_completed: self.files_completed.load(Ordering::SeqCst),
            files_expected: self.files_expected.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of the transfer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes received so far.
    pub bytes_received: u64,
    /// Total bytes expected across all transfers.
    pub bytes_expected: u64,
    /// Files finished (transferred or skipped).
    pub files_completed: u32,
    /// Total files expected.
    pub files_expected: u32,
}
