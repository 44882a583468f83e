//! # symdecode-core
//!
//! Native address symbolication for diagnostics and crash reporting.
//!
//! This crate turns instruction addresses in the running process into function
//! names, offsets, and source locations:
//! - Decode an address to `symbol+offset`
//! - Demangle Rust and C++ linkage names
//! - Look up source file and line from DWARF
//! - Dump decoder state for diagnostics
//!
//! ## Two paths
//!
//! Ordinary callers use a shared decoder built on first demand behind a mutex.
//! Fatal-error handlers use a separate decoder prepared in advance and read
//! without locks, so a crash while another thread holds the shared lock can
//! still be symbolicated.
//!
//! ## Platform Support
//!
//! - **Linux**: ELF symbol tables plus DWARF line info (`object`, `addr2line`)
//! - **Elsewhere**: the null decoder; every lookup reports "no information"
//!
//! ## Example
//!
//! ```rust
//! use symdecode_core::{global, Address};
//!
//! let mut buf = [0u8; 128];
//! let mut offset = 0;
//! if global::decode(Address::new(0x1000), &mut buf, &mut offset, None, true) {
//!     println!("{}+{offset:#x}", symdecode_core::buffer::read_cstr(&buf));
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod context;
pub mod decoder;
pub mod error;
pub mod global;
pub mod null;
pub mod platform;
pub mod prelude;
pub mod status;
pub mod symbols;
pub mod types;

pub use config::DecoderConfig;
pub use context::{DecoderContext, DecoderFactory, DecoderHandle, MAX_ERROR_HANDLER_GENERATIONS};
pub use decoder::{DecoderRole, SymbolDecoder};
// Re-export commonly used types
pub use error::{DecoderError, DecoderResult};
pub use null::{NullDecoder, NULL_DECODER};
pub use platform::PlatformDecoderFactory;
pub use status::{is_error, DecoderStatus};
pub use types::{Address, SymbolLanguage};
