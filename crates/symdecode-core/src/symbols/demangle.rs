//! Symbol demangling utilities.
//!
//! This module demangles linkage names and detects their language. It handles
//! Rust, C++, and C symbols.
//!
//! ## Symbol Mangling
//!
//! - **Rust**: v0 mangling (`_R...`) or legacy mangling (`_ZN...E`), via
//!   `rustc-demangle`
//! - **C++**: Itanium ABI mangling (`_Z...`), via `cpp_demangle`
//! - **C**: unmangled
//!
//! ## Allocation
//!
//! [`demangle_rust_into`] formats straight into the caller's buffer and does
//! not touch the heap, so it is usable from the emergency path.
//! [`demangle_into`] picks a demangler from [`detect_language`]; for C++ names
//! that is `cpp_demangle`, which builds a `String`.

use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};

use cpp_demangle::{DemangleOptions, Symbol as CppSymbol};
use rustc_demangle::try_demangle;

use crate::buffer::{write_cstr, CBuf};
use crate::types::SymbolLanguage;

/// Guess the language of a raw linkage name from its mangling prefix.
///
/// Legacy Rust names share the `_ZN` prefix with C++ nested names, so a name
/// is only classed as Rust if `rustc-demangle` accepts it.
pub fn detect_language(raw: &str) -> SymbolLanguage
{
    if raw.starts_with("_R") || (raw.starts_with("_ZN") && try_demangle(raw).is_ok()) {
        SymbolLanguage::Rust
    } else if raw.starts_with("_Z") || raw.starts_with("__Z") {
        SymbolLanguage::Cpp
    } else {
        SymbolLanguage::C
    }
}

/// Demangle a Rust symbol into `buf` without allocating.
///
/// Hashes are dropped (`{:#}` format). Returns `false` if `symbol` is not a
/// Rust symbol or `buf` is empty; `buf` is untouched in that case.
pub fn demangle_rust_into(symbol: &str, buf: &mut [u8]) -> bool
{
    let Ok(demangled) = try_demangle(symbol) else {
        return false;
    };
    let Some(mut out) = CBuf::new(buf) else {
        return false;
    };
    if write!(out, "{demangled:#}").is_err() {
        // rustc-demangle reports malformed input through fmt::Error
        out.finish();
        return false;
    }
    out.finish();
    true
}

/// Demangle a C++ symbol into an owned string.
///
/// `cpp_demangle` recurses over untrusted input, so a panic inside it is
/// caught and reported as "not demangled".
pub fn demangle_cpp(symbol: &str) -> Option<String>
{
    if !(symbol.starts_with("_Z") || symbol.starts_with("__Z")) {
        return None;
    }
    panic::catch_unwind(AssertUnwindSafe(|| {
        CppSymbol::new(symbol)
            .ok()
            .and_then(|sym| sym.demangle(&DemangleOptions::default()).ok())
    }))
    .ok()
    .flatten()
}

/// Demangle any supported symbol into `buf`.
///
/// Returns `false` if `symbol` is not mangled in a recognised scheme or `buf`
/// is empty.
pub fn demangle_into(symbol: &str, buf: &mut [u8]) -> bool
{
    if buf.is_empty() {
        return false;
    }
    match detect_language(symbol) {
        SymbolLanguage::Rust => demangle_rust_into(symbol, buf),
        SymbolLanguage::Cpp => demangle_cpp(symbol).is_some_and(|text| write_cstr(buf, &text)),
        SymbolLanguage::C => false,
    }
}
