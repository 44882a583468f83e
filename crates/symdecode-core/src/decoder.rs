//! # Decoder Trait
//!
//! The capability contract every symbolication backend implements.
//!
//! Callers normally go through [`DecoderContext`](crate::context::DecoderContext)
//! or the process-wide functions in [`global`](crate::global); they never pick
//! a backend themselves. Backends are:
//!
//! - [`NullDecoder`](crate::null::NullDecoder): decodes nothing, always available
//! - [`ElfDecoder`](crate::platform::elf::ElfDecoder): symbol tables and DWARF
//!   line info of the modules mapped into this process
//!
//! ## Totality
//!
//! Every method returns a plain `bool` (or a status) and must not panic.
//! These methods run inside crash reporting, where a second fault is fatal.
//! `false` means "no information", never "something went wrong that the
//! caller should escalate".
//!
//! ## Output buffers
//!
//! Names and file names are written into caller-owned byte slices as
//! NUL-terminated text, truncated to fit (see [`crate::buffer`]). On failure a
//! method leaves nothing in the buffer beyond what it has NUL-terminated.

use std::fmt;
use std::path::Path;

use crate::status::DecoderStatus;
use crate::types::Address;

/// Which façade slot a backend is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderRole
{
    /// The lock-protected instance used by ordinary diagnostic code.
    Shared,
    /// The instance used from fatal-error and signal-handler context.
    ///
    /// Backends built for this role must do all loading up front. Once
    /// constructed they may not lock, load files, or build lazy state.
    ErrorHandler,
}

impl fmt::Display for DecoderRole
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            DecoderRole::Shared => f.write_str("shared"),
            DecoderRole::ErrorHandler => f.write_str("error-handler"),
        }
    }
}

/// Native address decoder
///
/// Any type providing these operations can sit in a façade slot.
pub trait SymbolDecoder: Send + Sync
{
    /// Decode `pc` to the name of the enclosing function and the byte offset
    /// from its start.
    ///
    /// ## Parameters
    ///
    /// - `pc`: instruction address in this process
    /// - `buf`: receives the NUL-terminated (possibly truncated) name
    /// - `offset`: receives `pc - function_start` on success
    /// - `module_path`: restrict the search to this module; if the module is
    ///   not mapped, `pc` is treated as an address inside the file itself
    /// - `demangle`: demangle the linkage name before writing it
    ///
    /// Returns `false` if nothing was found. `offset` is unspecified then.
    ///
    /// Backends built for [`DecoderRole::ErrorHandler`] cannot open files
    /// after construction. They only search the modules they loaded up front,
    /// so an unmapped `module_path` is never read as a file address there and
    /// the call returns `false`.
    fn decode(
        &self,
        pc: Address,
        buf: &mut [u8],
        offset: &mut u64,
        module_path: Option<&Path>,
        demangle: bool,
    ) -> bool;

    /// Decode `pc` inside the module loaded at `base`.
    ///
    /// Used when the caller already knows which module contains `pc`. The
    /// name is written as found in the symbol table, without demangling.
    fn decode_with_base(&self, pc: Address, buf: &mut [u8], offset: &mut u64, base: Address) -> bool;

    /// Demangle a raw linkage name into `buf`.
    ///
    /// Returns `false` if `symbol` is not mangled or the backend cannot
    /// demangle it.
    fn demangle(&self, symbol: &str, buf: &mut [u8]) -> bool;

    /// Look up the source file and line for `pc`.
    ///
    /// With `is_pc_after_call`, `pc` is a return address and the location of
    /// the call instruction itself is reported (see [`source_lookup_address`]).
    ///
    /// The default implementation has no debug info and returns `false`.
    fn get_source_info(&self, _pc: Address, _filename: &mut [u8], _line: &mut u32, _is_pc_after_call: bool) -> bool
    {
        false
    }

    /// Current backend status.
    fn status(&self) -> DecoderStatus;

    /// `true` if [`status`](Self::status) is an error.
    fn has_error(&self) -> bool
    {
        self.status().is_error()
    }

    /// Short backend identifier for diagnostic dumps.
    fn name(&self) -> &'static str
    {
        "unknown"
    }
}

/// Address to use for a line lookup.
///
/// A return address points at the instruction after the call, which may
/// already belong to the next source line. Stepping back one byte lands inside
/// the call instruction on every supported architecture.
pub fn source_lookup_address(pc: Address, is_pc_after_call: bool) -> Address
{
    if is_pc_after_call {
        pc.saturating_sub(1)
    } else {
        pc
    }
}
