//! Utility functions and helpers for llm-router.
//!
//! This module provides cross-cutting concerns: structured logging, an
//! injectable clock, atomic file replacement, and per-path write locks.
//!
//! # Submodules
//!
//! - `clock`: Wall and manual time sources.
//! - `logging`: Tracing initialization and URL credential redaction.
//! - `path_lock`: Process-wide locks keyed by file path.
//! - `persist`: Temp-file-and-rename whole-document writes.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod clock;
pub mod logging;
pub mod path_lock;
pub mod persist;
