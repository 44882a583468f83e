//! # Decoder Configuration
//!
//! Knobs for backend construction and slot provisioning.
//!
//! ## Environment Variables
//!
//! - `SYMDECODE_DISABLE`: any truthy value (`1`, `true`, `yes`, `on`) turns
//!   native decoding off; both slots resolve to the null decoder.
//! - `SYMDECODE_LAZY_ERROR_HANDLER`: truthy value skips eager provisioning of
//!   the error-handler decoder. Emergency calls then report nothing until
//!   `DecoderContext::provision_error_handler` is called explicitly.
//! - `SYMDECODE_MAX_IMAGE_BYTES`: refuse to load symbol files larger than this.
//! - `SYMDECODE_NO_LINE_INFO`: truthy value skips building line tables for the
//!   error-handler decoder.

use std::env;

/// Default upper bound for a single symbol file (1 GiB).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 1 << 30;

/// Configuration for decoder construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig
{
    /// Build platform backends at all.
    pub enabled: bool,
    /// Provision the error-handler slot as soon as the façade starts.
    pub eager_error_handler: bool,
    /// Largest symbol file the backend will read.
    pub max_image_bytes: u64,
    /// Build line tables for pinned images up front.
    pub preload_line_info: bool,
}

impl Default for DecoderConfig
{
    fn default() -> Self
    {
        Self {
            enabled: true,
            eager_error_handler: true,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            preload_line_info: true,
        }
    }
}

impl DecoderConfig
{
    /// Read configuration from `SYMDECODE_*` environment variables, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        let mut config = Self::default();
        if lookup("SYMDECODE_DISABLE").is_some_and(|v| is_truthy(&v)) {
            config.enabled = false;
        }
        if lookup("SYMDECODE_LAZY_ERROR_HANDLER").is_some_and(|v| is_truthy(&v)) {
            config.eager_error_handler = false;
        }
        if lookup("SYMDECODE_NO_LINE_INFO").is_some_and(|v| is_truthy(&v)) {
            config.preload_line_info = false;
        }
        if let Some(limit) = lookup("SYMDECODE_MAX_IMAGE_BYTES").and_then(|v| v.trim().parse::<u64>().ok()) {
            config.max_image_bytes = limit;
        }
        config
    }

    /// Configuration with native decoding switched off.
    #[must_use]
    pub fn disabled() -> Self
    {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Same configuration with eager error-handler provisioning set to `eager`.
    #[must_use]
    pub fn with_eager_error_handler(mut self, eager: bool) -> Self
    {
        self.eager_error_handler = eager;
        self
    }
}

fn is_truthy(value: &str) -> bool
{
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
