//! Error taxonomy for the lint kernel.
//!
//! The core never surfaces transient problems as errors: rule failures are
//! trapped by the dispatcher and fix failures become skipped fixes. The only
//! failures that propagate upward are a total parse failure, an oversize
//! source, and configuration errors (which prevent the core from running at
//! all).

use std::path::PathBuf;

use thiserror::Error;

/// Rule code used for the file-level violation emitted on parse failure.
pub const PARSE_ERROR_CODE: &str = "parse/invalid-syntax";

/// Errors produced by the lint kernel.
#[derive(Debug, Error)]
pub enum Error {
    /// The source is syntactically invalid. Reported as a single file-level
    /// error violation; the rest of the pipeline is skipped.
    #[error("invalid syntax{}: {message}", fmt_line(.line))]
    Parse {
        message: String,
        /// 1-based line number, when known.
        line: Option<usize>,
    },

    /// The source exceeds the parser's size cap.
    #[error("source is {size} bytes, exceeding the {limit} byte limit")]
    Oversize { size: usize, limit: usize },

    /// Configuration could not be read or failed validation. The driver
    /// reports this; the core is not invoked.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn parse(message: impl Into<String>, line: Option<usize>) -> Self {
        Error::Parse {
            message: message.into(),
            line,
        }
    }
}

/// Configuration errors carry enough context to point at the offending file
/// and, for rule options, the rule code.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {message}")]
    Toml { path: PathBuf, message: String },

    #[error("unknown rule code {code:?} in configuration")]
    UnknownRule { code: String },

    #[error("invalid options for rule {code:?}: {message}")]
    InvalidOptions { code: String, message: String },
}

fn fmt_line(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" on line {n}"),
        None => String::new(),
    }
}
