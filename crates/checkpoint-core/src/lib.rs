//! # checkpoint-core
//!
//! Core types and utilities for working with the Check Point management API.
//!
//! This crate holds everything that does not need a network connection: the
//! error taxonomy, the decoder that turns raw `(status, body)` pairs into
//! typed outcomes, wire types, and configuration.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and conversions
//! - [`decode`] - Response classification across API generations
//! - [`types`] - Wire types such as the dual-format timestamp
//! - [`uuid`] - Strongly-typed UUID wrappers for management objects
//! - [`config`] - Connection configuration
//! - [`client`] - HTTP client tuning

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod types;
pub mod uuid;

pub use decode::decode_response;
pub use error::{Error, Result};
