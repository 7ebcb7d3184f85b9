#![forbid(unsafe_code)]

pub mod config;
pub mod enrichment;
pub mod errors;
pub mod health;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod slack;
pub mod tracker;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
