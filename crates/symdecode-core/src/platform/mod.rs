//! # Platform Backends
//!
//! Concrete decoders and the factory the façade uses to build them.
//!
//! - **Linux**: [`elf::ElfDecoder`], driven by `/proc/self/maps`, the `object`
//!   crate for symbol tables and `addr2line`/`gimli` for line info
//! - **Other platforms**: no backend yet; the factory reports `Unsupported`
//!   and the façade falls back to the null decoder

pub mod elf;

use std::sync::Arc;

use tracing::debug;

use crate::config::DecoderConfig;
use crate::context::DecoderFactory;
use crate::decoder::{DecoderRole, SymbolDecoder};
use crate::error::{DecoderError, DecoderResult};
use elf::ElfDecoder;

/// Builds the native backend for the current platform.
#[derive(Debug, Clone, Default)]
pub struct PlatformDecoderFactory
{
    config: DecoderConfig,
}

impl PlatformDecoderFactory
{
    /// Factory using `config` for every backend it builds.
    pub fn new(config: DecoderConfig) -> Self
    {
        Self { config }
    }
}

impl DecoderFactory for PlatformDecoderFactory
{
    fn create(&self, role: DecoderRole) -> DecoderResult<Arc<dyn SymbolDecoder>>
    {
        if !self.config.enabled {
            return Err(DecoderError::Disabled);
        }
        debug!(%role, "building platform decoder");
        Ok(Arc::new(ElfDecoder::new(role, &self.config)?))
    }
}
