//! Lot Ledger - track material lots through a fixed processing pipeline
//!
//! This library provides the core functionality for Lot Ledger, including:
//! - The ordered stage model and per-stage field catalogue
//! - Data models for companies, dealers, users and lots
//! - Database operations and migrations
//! - Repository layer for data access
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use lotledger::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repo;
pub mod utils;
