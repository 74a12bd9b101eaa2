// llm-router - cached, accounted LLM calls
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod metrics;
pub mod router;
pub mod scoring;
pub mod usage;
pub mod utils;

pub use error::{ErrorKind, Result, RouterError};
