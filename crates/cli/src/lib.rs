//! `shelfmark` command-line tool, library half.
//!
//! Exposes the argument definitions and handlers for integration testing.
//! The binary entrypoint lives in `main.rs`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod output;
