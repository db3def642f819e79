//! Download orchestration: manager, retry policy, and progress reporting.

mod manager;
mod progress;
mod retry;

pub use manager::{DownloadManager, ManagerError, TransferJob};
pub use progress::{
    EventReceiver, ProgressEvent, ProgressLevel, ProgressSnapshot, ProgressState,
};
pub use retry::{RetryError, RetryPolicy, retry_with_backoff};
