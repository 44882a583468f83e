//! The do-nothing decoder.

use std::path::Path;

use crate::decoder::SymbolDecoder;
use crate::status::DecoderStatus;
use crate::types::Address;

/// Decoder used when no real backend exists.
///
/// Every operation returns `false` and leaves output buffers untouched; the
/// status is always [`DecoderStatus::NotAvailable`]. Construction is free and
/// infallible, so it is always safe to fall back to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullDecoder;

/// Process-wide null decoder shared by both façade slots.
pub static NULL_DECODER: NullDecoder = NullDecoder;

impl SymbolDecoder for NullDecoder
{
    fn decode(
        &self,
        _pc: Address,
        _buf: &mut [u8],
        _offset: &mut u64,
        _module_path: Option<&Path>,
        _demangle: bool,
    ) -> bool
    {
        false
    }

    fn decode_with_base(&self, _pc: Address, _buf: &mut [u8], _offset: &mut u64, _base: Address) -> bool
    {
        false
    }

    fn demangle(&self, _symbol: &str, _buf: &mut [u8]) -> bool
    {
        false
    }

    fn status(&self) -> DecoderStatus
    {
        DecoderStatus::NotAvailable
    }

    fn name(&self) -> &'static str
    {
        "null"
    }
}
