//! Cross-platform plumbing: clock, spawning, persistence, formatting.

pub mod device;
pub mod format;
pub mod platform;
pub mod storage;
pub mod timing;
