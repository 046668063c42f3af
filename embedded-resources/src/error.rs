// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {std::path::PathBuf, thiserror::Error};

/// Error type for this crate.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("output target {path} is unavailable: {source}")]
    OutputTargetUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to read resource {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error compressing resource {path}: {source}")]
    CompressionFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("resource {path} is {size} bytes; size header is limited to 32 bits")]
    ResourceTooLarge { path: PathBuf, size: u64 },

    #[error("logical name '{name}' used by both {first} and {second}")]
    DuplicateLogicalName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("resource {path} has an empty logical name")]
    EmptyLogicalName { path: PathBuf },

    #[error("'{namespace}' is not a valid {format} namespace")]
    InvalidNamespace {
        namespace: String,
        format: &'static str,
    },

    #[error("error writing bundle: {0}")]
    Emit(#[from] std::io::Error),

    #[error("malformed framed payload: {0}")]
    MalformedFramedPayload(&'static str),

    #[error("framed payload advertises {expected} bytes but decompressed to {actual}")]
    FramedSizeMismatch { expected: u32, actual: usize },

    #[error("unable to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest line {line}: {message}")]
    ManifestSyntax { line: usize, message: &'static str },
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, PackError>;
