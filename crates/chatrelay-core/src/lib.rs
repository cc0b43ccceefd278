//! # chatrelay-core
//!
//! Core crate for the chat relay. Contains the configuration schemas and
//! the unified error system shared by the realtime engine and the HTTP
//! layer.
//!
//! This crate has **no** internal dependencies on other chatrelay crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
