//! # Error Types
//!
//! Errors raised while building a decoder backend or loading a symbol image.
//!
//! Decoding operations themselves never return these: a failed lookup is a
//! plain `false`. Errors only exist at the construction and loading seams,
//! where the façade absorbs them into a [`DecoderStatus`] and falls back to
//! the null decoder.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::status::DecoderStatus;

/// Main error type for backend construction and image loading
///
/// ## Error Categories
///
/// 1. **File errors**: FileNotFound, FileInvalid, ImageTooLarge, Io
/// 2. **Environment errors**: ModuleMap, Unsupported, Disabled
/// 3. **Construction errors**: ConstructionPanicked
#[derive(Error, Debug)]
pub enum DecoderError
{
    /// The symbol file for a module does not exist
    #[error("Symbol file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The symbol file exists but is not a parsable object file
    #[error("Invalid symbol file {}: {reason}", path.display())]
    FileInvalid
    {
        /// Path of the offending file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// The symbol file is larger than the configured limit
    ///
    /// Loading is refused up front instead of reading the whole file into
    /// memory. See `DecoderConfig::max_image_bytes`.
    #[error("Symbol file {} is too large: {size} bytes (limit {limit})", path.display())]
    ImageTooLarge
    {
        /// Path of the offending file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// The loaded-module list of the process could not be read
    ///
    /// On Linux this is `/proc/self/maps`.
    #[error("Module map unavailable: {0}")]
    ModuleMap(String),

    /// No decoder backend exists for the current platform
    #[error("No decoder backend available on this platform")]
    Unsupported,

    /// Decoding was switched off by configuration
    #[error("Native decoding disabled by configuration")]
    Disabled,

    /// The backend factory panicked while building a decoder
    #[error("Decoder construction panicked")]
    ConstructionPanicked,

    /// I/O error while reading a symbol file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DecoderError
{
    /// Status a slot reports after this error downgraded it to the null decoder.
    pub fn status(&self) -> DecoderStatus
    {
        match self {
            DecoderError::FileNotFound(_) => DecoderStatus::FileNotFound,
            DecoderError::FileInvalid { .. } => DecoderStatus::FileInvalid,
            DecoderError::ImageTooLarge { .. } => DecoderStatus::OutOfMemory,
            DecoderError::ModuleMap(_) | DecoderError::ConstructionPanicked => DecoderStatus::HelperInitError,
            DecoderError::Unsupported | DecoderError::Disabled => DecoderStatus::NotAvailable,
            DecoderError::Io(err) => match err.kind() {
                io::ErrorKind::NotFound => DecoderStatus::FileNotFound,
                io::ErrorKind::OutOfMemory => DecoderStatus::OutOfMemory,
                _ => DecoderStatus::FileInvalid,
            },
        }
    }
}

/// Convenience type alias for `Result<T, DecoderError>`
///
/// ```rust
/// use symdecode_core::error::DecoderResult;
/// fn foo() -> DecoderResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type DecoderResult<T> = std::result::Result<T, DecoderError>;
