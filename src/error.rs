//! # Error Handling
//!
//! This module defines the centralized error type for the `git2site`
//! library. It uses the `thiserror` library to create an `Error` enum that
//! covers the failures which can abort a generation run or a single
//! repository operation.
//!
//! Most problems found while reading author content are *not* errors: a
//! repository or content variant that fails validation is skipped and a
//! warning is logged, so one broken author cannot take the whole site down.
//! The variants here are reserved for the cases the caller has to hear about:
//!
//! - A directory that is not a working copy (`NotARepository`).
//! - Failing `git` invocations.
//! - Unreadable or unwritable staleness checkpoints.
//! - Invalid site configuration.
//! - Front matter that cannot be parsed.
//! - A missing output root.
//! - Template rendering failures.
//! - I/O, YAML, URL, regex and directory-walk errors wrapped from their crates.

use thiserror::Error;

/// Main error type for git2site operations
#[derive(Error, Debug)]
pub enum Error {
    /// The path given to `SourceRepository::open` is not a working copy.
    #[error("Not a repository: {path}")]
    NotARepository { path: String },

    /// An error occurred while executing a Git command.
    #[error("Git command failed in {path}: {command} - {stderr}")]
    GitCommand {
        command: String,
        path: String,
        stderr: String,
    },

    /// The `<repo>.status` sidecar could not be read, parsed or written.
    #[error("Checkpoint error for {path}: {message}")]
    Checkpoint { path: String, message: String },

    /// The site configuration is invalid.
    ///
    /// This error includes the specific issue and optionally a hint about
    /// how to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A markdown document has a malformed front matter header.
    #[error("Front matter error in {path}: {message}")]
    FrontMatter { path: String, message: String },

    /// The configured output root does not exist.
    #[error("Output root '{path}' is missing. Create it with correct permissions first.")]
    OutputRootMissing { path: String },

    /// The renderer failed to produce output for a model.
    #[error("Render error for model '{model}': {message}")]
    Render { model: String, message: String },

    /// An error occurred with a filesystem operation on the output tree.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A directory traversal error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
