//! Common module for library exports

pub use crate::buffer::{read_cstr, write_cstr, CBuf};
pub use crate::config::DecoderConfig;
pub use crate::context::{DecoderContext, DecoderFactory, DecoderHandle};
pub use crate::decoder::{DecoderRole, SymbolDecoder};
pub use crate::error::{DecoderError, DecoderResult};
pub use crate::null::{NullDecoder, NULL_DECODER};
pub use crate::status::DecoderStatus;
pub use crate::types::address::Address;
