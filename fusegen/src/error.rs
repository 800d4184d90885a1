// Licensed under the Apache-2.0 license

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or transforming fuse data.
///
/// Out-of-range field values and per-record lookup misses are deliberately
/// not represented here; they are diagnostics, reported through `log` and the
/// per-operation statistics, and never abort an invocation.
#[derive(Error, Debug)]
pub enum FusegenError {
    /// A required input file could not be opened or read.
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required output file could not be created or written.
    #[error("unable to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request cannot be satisfied by the loaded data (e.g. no DLUT
    /// region matches the requested instance/group, or an input list came
    /// back empty).
    #[error("{0}")]
    MissingInput(String),

    /// The fuse catalog document is structurally invalid.
    #[error("catalog format error: {0}")]
    Catalog(String),

    /// A patch file line does not match the expected field layout.
    #[error("malformed patch line {line}: {reason}")]
    Patch { line: usize, reason: String },

    /// A numeric literal could not be converted to an integer.
    #[error("cannot parse value {literal:?}: {source}")]
    Value {
        literal: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Result type for fusegen operations.
pub type FusegenResult<T> = std::result::Result<T, FusegenError>;
