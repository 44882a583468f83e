//! # Process-wide Façade
//!
//! One [`DecoderContext`] per process, backed by the platform decoder and
//! configured from the environment.
//!
//! Ordinary functions initialise the context on first use. The `emergency_*`
//! functions never do: before [`initialize`] (or any ordinary call) they just
//! return `false`. Crash handlers should therefore call [`initialize`] while
//! the process is still healthy.

use std::io;
use std::path::Path;

use once_cell::sync::OnceCell;

use crate::config::DecoderConfig;
use crate::context::DecoderContext;
use crate::types::Address;

static GLOBAL: OnceCell<DecoderContext> = OnceCell::new();

/// The process-wide context, created on first call.
///
/// Also provisions the error-handler decoder unless
/// `SYMDECODE_LAZY_ERROR_HANDLER` is set.
pub fn initialize() -> &'static DecoderContext
{
    GLOBAL.get_or_init(|| {
        let config = DecoderConfig::from_env();
        let ctx = DecoderContext::from_config(&config);
        if config.eager_error_handler {
            ctx.provision_error_handler();
        }
        ctx
    })
}

/// The process-wide context, if it already exists.
pub fn context() -> Option<&'static DecoderContext>
{
    GLOBAL.get()
}

/// See [`DecoderContext::decode`].
pub fn decode(pc: Address, buf: &mut [u8], offset: &mut u64, module_path: Option<&Path>, demangle: bool) -> bool
{
    initialize().decode(pc, buf, offset, module_path, demangle)
}

/// See [`DecoderContext::decode_demangled`].
pub fn decode_demangled(pc: Address, buf: &mut [u8], offset: &mut u64, demangle: bool) -> bool
{
    initialize().decode_demangled(pc, buf, offset, demangle)
}

/// See [`DecoderContext::decode_with_base`].
pub fn decode_with_base(pc: Address, buf: &mut [u8], offset: &mut u64, base: Address) -> bool
{
    initialize().decode_with_base(pc, buf, offset, base)
}

/// See [`DecoderContext::demangle`].
pub fn demangle(symbol: &str, buf: &mut [u8]) -> bool
{
    initialize().demangle(symbol, buf)
}

/// See [`DecoderContext::get_source_info`].
pub fn get_source_info(pc: Address, filename: &mut [u8], line: &mut u32, is_pc_after_call: bool) -> bool
{
    initialize().get_source_info(pc, filename, line, is_pc_after_call)
}

/// See [`DecoderContext::print_state_on`].
///
/// ## Errors
///
/// Only errors from `out`.
pub fn print_state_on(out: &mut dyn io::Write) -> io::Result<()>
{
    match GLOBAL.get() {
        Some(ctx) => ctx.print_state_on(out),
        None => writeln!(out, "Decoder state: <not initialized>"),
    }
}

/// See [`DecoderContext::before_checkpoint`]. Does nothing before
/// initialisation.
pub fn before_checkpoint()
{
    if let Some(ctx) = GLOBAL.get() {
        ctx.before_checkpoint();
    }
}

/// See [`DecoderContext::emergency_decode`].
pub fn emergency_decode(pc: Address, buf: &mut [u8], offset: &mut u64, module_path: Option<&Path>, demangle: bool)
    -> bool
{
    GLOBAL
        .get()
        .is_some_and(|ctx| ctx.emergency_decode(pc, buf, offset, module_path, demangle))
}

/// See [`DecoderContext::emergency_decode_with_base`].
pub fn emergency_decode_with_base(pc: Address, buf: &mut [u8], offset: &mut u64, base: Address) -> bool
{
    GLOBAL
        .get()
        .is_some_and(|ctx| ctx.emergency_decode_with_base(pc, buf, offset, base))
}

/// See [`DecoderContext::emergency_get_source_info`].
pub fn emergency_get_source_info(pc: Address, filename: &mut [u8], line: &mut u32, is_pc_after_call: bool) -> bool
{
    GLOBAL
        .get()
        .is_some_and(|ctx| ctx.emergency_get_source_info(pc, filename, line, is_pc_after_call))
}
