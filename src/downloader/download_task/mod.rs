//! Download task execution -- the lifecycle of one user's task.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state and status/notice helpers
//! - [`orchestration`] - Top-level task lifecycle over the requested kinds
//! - [`fetch`] - Preflight, engine run on a blocking worker, size gate and retry
//! - [`finalization`] - Terminal status, final notice and cleanup

mod context;
mod fetch;
mod finalization;
mod orchestration;


pub(crate) use context::DownloadTaskContext;
pub(crate) use orchestration::run_download_task;
