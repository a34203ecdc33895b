//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `git2site` command-line tool.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and calls into the
//!   `git2site` library to do the work.

pub mod generate;
pub mod status;
