//! Tests for the null decoder and contexts without a backend

use std::path::Path;
use std::sync::Arc;

use symdecode_core::{
    Address, DecoderContext, DecoderError, DecoderResult, DecoderRole, DecoderStatus, NullDecoder, SymbolDecoder,
};

fn no_backend(_role: DecoderRole) -> DecoderResult<Arc<dyn SymbolDecoder>>
{
    Err(DecoderError::Unsupported)
}

#[test]
fn test_every_operation_reports_nothing()
{
    let decoder = NullDecoder;
    let mut buf = [0x55u8; 16];
    let mut offset = 7;
    let mut line = 9;

    assert!(!decoder.decode(Address::new(0x1000), &mut buf, &mut offset, None, true));
    assert!(!decoder.decode(Address::new(0x1000), &mut buf, &mut offset, Some(Path::new("/bin/true")), false));
    assert!(!decoder.decode_with_base(Address::new(0x1000), &mut buf, &mut offset, Address::new(0x400000)));
    assert!(!decoder.demangle("_Z3fooi", &mut buf));
    assert!(!decoder.get_source_info(Address::new(0x1000), &mut buf, &mut line, true));

    assert!(buf.iter().all(|&b| b == 0x55));
    assert_eq!(offset, 7);
    assert_eq!(line, 9);
    assert_eq!(decoder.status(), DecoderStatus::NotAvailable);
    assert!(!decoder.has_error());
    assert_eq!(decoder.name(), "null");
}

#[test]
fn test_decode_deadbeef_without_backend()
{
    let ctx = DecoderContext::with_factory(no_backend);
    let mut buf = [0u8; 64];
    let mut offset = 0;

    assert!(!ctx.decode(Address::new(0xDEAD_BEEF), &mut buf, &mut offset, None, true));
    assert!(!ctx.decode_demangled(Address::new(0xDEAD_BEEF), &mut buf, &mut offset, false));

    let shared = ctx.shared_instance();
    assert!(shared.is_null());
    assert_eq!(shared.status(), DecoderStatus::NotAvailable);
}

#[test]
fn test_demangle_on_null_backend_fails()
{
    let ctx = DecoderContext::with_factory(no_backend);
    let mut buf = [0u8; 64];
    assert!(!ctx.demangle("_Z3fooi", &mut buf));
    assert_eq!(buf[0], 0);
}

#[test]
fn test_zero_length_buffers_fail()
{
    let ctx = DecoderContext::with_factory(no_backend);
    let mut offset = 0;
    let mut line = 0;
    assert!(!ctx.decode(Address::new(1), &mut [], &mut offset, None, true));
    assert!(!ctx.get_source_info(Address::new(1), &mut [], &mut line, false));
}
