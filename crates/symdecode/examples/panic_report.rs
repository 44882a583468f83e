//! Example: symbolize from a panic hook through the emergency path
//!
//! The hook runs in fatal-error context, so it only uses the `emergency_*`
//! functions. They need the decoder to be initialized beforehand, which
//! `main` does while the process is healthy.
//!
//! Run with `RUST_LOG=debug` to see decoder construction.

use std::io::Write;
use std::panic;

use symdecode_core::buffer::read_cstr;
use symdecode_core::{global, Address};
use symdecode_utils::init_logging;

#[inline(never)]
fn parse_config() -> u32
{
    std::hint::black_box(7)
}

#[inline(never)]
fn apply_config(value: u32) -> u32
{
    if value > 5 {
        panic!("config value {value} out of range");
    }
    value
}

fn report(label: &str, pc: Address)
{
    // stack buffers only
    let mut name = [0u8; 256];
    let mut offset = 0;
    let mut file = [0u8; 512];
    let mut line = 0;

    let stderr = std::io::stderr();
    let mut err = stderr.lock();
    if global::emergency_decode(pc, &mut name, &mut offset, None, true) {
        let _ = write!(err, "  {label}: {}+{offset:#x}", read_cstr(&name));
    } else {
        let _ = write!(err, "  {label}: {pc} ??");
    }
    if global::emergency_get_source_info(pc, &mut file, &mut line, false) {
        let _ = write!(err, " at {}:{line}", read_cstr(&file));
    }
    let _ = writeln!(err);
}

fn main()
{
    let _guard = init_logging().expect("Failed to initialize logging");

    // Provision both decoders before anything can go wrong
    global::initialize();

    panic::set_hook(Box::new(|info| {
        eprintln!("fatal: {info}");
        report("parse_config", Address::new(parse_config as fn() -> u32 as usize as u64));
        report("apply_config", Address::new(apply_config as fn(u32) -> u32 as usize as u64));
        let _ = global::print_state_on(&mut std::io::stderr());
    }));

    let value = parse_config();
    symdecode_utils::info!(value, "applying configuration");
    apply_config(value);
}
