//! Tests for decoder context lifecycle and dispatch

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use symdecode_core::buffer::{read_cstr, write_cstr};
use symdecode_core::decoder::source_lookup_address;
use symdecode_core::symbols::demangle::demangle_into;
use symdecode_core::{
    Address, DecoderConfig, DecoderContext, DecoderError, DecoderResult, DecoderRole, DecoderStatus, SymbolDecoder,
};

/// Knows one function, `_Z3fooi` at 0x1000..0x1100, and one source line per
/// address: `foo.cc:<addr - 0x1000>`.
struct FakeDecoder
{
    role: DecoderRole,
    status: DecoderStatus,
}

impl FakeDecoder
{
    const START: u64 = 0x1000;
    const END: u64 = 0x1100;

    fn new(role: DecoderRole) -> Self
    {
        Self {
            role,
            status: DecoderStatus::NoError,
        }
    }
}

impl SymbolDecoder for FakeDecoder
{
    fn decode(&self, pc: Address, buf: &mut [u8], offset: &mut u64, _module_path: Option<&Path>, demangle: bool)
        -> bool
    {
        if !(Self::START..Self::END).contains(&pc.value()) {
            return false;
        }
        let written = if demangle {
            demangle_into("_Z3fooi", buf)
        } else {
            write_cstr(buf, "_Z3fooi")
        };
        if written {
            *offset = pc.value() - Self::START;
        }
        written
    }

    fn decode_with_base(&self, pc: Address, buf: &mut [u8], offset: &mut u64, base: Address) -> bool
    {
        self.decode(pc - base.value() + Self::START, buf, offset, None, false)
    }

    fn demangle(&self, symbol: &str, buf: &mut [u8]) -> bool
    {
        demangle_into(symbol, buf)
    }

    fn get_source_info(&self, pc: Address, filename: &mut [u8], line: &mut u32, is_pc_after_call: bool) -> bool
    {
        let lookup = source_lookup_address(pc, is_pc_after_call).value();
        if !(Self::START..Self::END).contains(&lookup) || !write_cstr(filename, "foo.cc") {
            return false;
        }
        *line = u32::try_from(lookup - Self::START).unwrap_or(u32::MAX);
        true
    }

    fn status(&self) -> DecoderStatus
    {
        self.status
    }

    fn name(&self) -> &'static str
    {
        match self.role {
            DecoderRole::Shared => "fake",
            DecoderRole::ErrorHandler => "fake-pinned",
        }
    }
}

fn counting_context(config: &DecoderConfig) -> (DecoderContext, Arc<AtomicUsize>, Arc<AtomicUsize>)
{
    let shared = Arc::new(AtomicUsize::new(0));
    let pinned = Arc::new(AtomicUsize::new(0));
    let (s, p) = (Arc::clone(&shared), Arc::clone(&pinned));
    let ctx = DecoderContext::new(
        move |role: DecoderRole| -> DecoderResult<Arc<dyn SymbolDecoder>> {
            match role {
                DecoderRole::Shared => s.fetch_add(1, Ordering::SeqCst),
                DecoderRole::ErrorHandler => p.fetch_add(1, Ordering::SeqCst),
            };
            Ok(Arc::new(FakeDecoder::new(role)))
        },
        config,
    );
    (ctx, shared, pinned)
}

fn lazy() -> DecoderConfig
{
    DecoderConfig::default().with_eager_error_handler(false)
}

#[test]
fn test_shared_instance_is_idempotent()
{
    let (ctx, shared, _) = counting_context(&lazy());
    let first = ctx.shared_instance();
    let second = ctx.shared_instance();
    assert!(first.same_instance(&second));
    assert_eq!(shared.load(Ordering::SeqCst), 1);
}

#[test]
fn test_checkpoint_forces_reconstruction()
{
    let (ctx, shared, pinned) = counting_context(&DecoderConfig::default());
    let before = ctx.shared_instance();
    assert!(ctx.is_error_handler_provisioned());
    assert_eq!(pinned.load(Ordering::SeqCst), 1);

    ctx.before_checkpoint();
    assert!(!ctx.is_error_handler_provisioned());
    assert_eq!(ctx.error_handler_instance().name(), "null");

    let after = ctx.shared_instance();
    assert!(!before.same_instance(&after));
    assert_eq!(shared.load(Ordering::SeqCst), 2);
    assert_eq!(pinned.load(Ordering::SeqCst), 2);
}

#[test]
fn test_racing_first_use_constructs_once()
{
    const THREADS: usize = 16;

    let (ctx, shared, _) = counting_context(&lazy());
    let ctx = Arc::new(ctx);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ctx.shared_instance()
            })
        })
        .collect();

    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(shared.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|i| i.same_instance(&instances[0])));
}

#[test]
fn test_failing_factory_downgrades_to_null()
{
    let ctx = DecoderContext::with_factory(|_role: DecoderRole| -> DecoderResult<Arc<dyn SymbolDecoder>> {
        Err(DecoderError::FileNotFound("/gone".into()))
    });
    let handle = ctx.shared_instance();
    assert!(handle.is_null());

    let mut out = Vec::new();
    ctx.print_state_on(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("construction file_not_found"), "{text}");
}

#[test]
fn test_panicking_factory_downgrades_to_null()
{
    let ctx = DecoderContext::with_factory(|_role: DecoderRole| -> DecoderResult<Arc<dyn SymbolDecoder>> {
        panic!("backend exploded")
    });
    let mut buf = [0u8; 32];
    let mut offset = 0;
    assert!(!ctx.decode(Address::new(0x1000), &mut buf, &mut offset, None, true));
    assert!(ctx.shared_instance().is_null());
    assert_eq!(ctx.error_handler_instance().name(), "null");

    let mut out = Vec::new();
    ctx.print_state_on(&mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("construction helper_init_error"));
}

#[test]
fn test_backend_with_error_status_is_replaced()
{
    let ctx = DecoderContext::new(
        |role: DecoderRole| -> DecoderResult<Arc<dyn SymbolDecoder>> {
            Ok(Arc::new(FakeDecoder {
                role,
                status: DecoderStatus::FileInvalid,
            }))
        },
        &lazy(),
    );
    assert!(ctx.shared_instance().is_null());
}

#[test]
fn test_decode_and_demangle_through_context()
{
    let (ctx, _, _) = counting_context(&lazy());
    let mut buf = [0u8; 64];
    let mut offset = 0;

    assert!(ctx.decode(Address::new(0x1010), &mut buf, &mut offset, None, true));
    assert_eq!(read_cstr(&buf), "foo(int)");
    assert_eq!(offset, 0x10);

    assert!(ctx.decode_demangled(Address::new(0x1020), &mut buf, &mut offset, false));
    assert_eq!(read_cstr(&buf), "_Z3fooi");
    assert_eq!(offset, 0x20);

    assert!(ctx.decode_with_base(Address::new(0x7000_0008), &mut buf, &mut offset, Address::new(0x7000_0000)));
    assert_eq!(offset, 8);

    assert!(ctx.demangle("_Z3fooi", &mut buf));
    assert_eq!(read_cstr(&buf), "foo(int)");
    assert!(!ctx.demangle("plain_c_name", &mut buf));

    assert!(!ctx.decode(Address::new(0x2000), &mut buf, &mut offset, None, true));
}

#[test]
fn test_source_info_after_call_steps_back()
{
    let (ctx, _, _) = counting_context(&lazy());
    let mut file = [0u8; 32];
    let mut line = 0;

    assert!(ctx.get_source_info(Address::new(0x1005), &mut file, &mut line, false));
    assert_eq!(read_cstr(&file), "foo.cc");
    assert_eq!(line, 5);

    assert!(ctx.get_source_info(Address::new(0x1005), &mut file, &mut line, true));
    assert_eq!(line, 4);
}

#[test]
fn test_truncated_output_stays_terminated()
{
    let (ctx, _, _) = counting_context(&lazy());
    let mut buf = [0xFFu8; 4];
    let mut offset = 0;

    assert!(ctx.decode(Address::new(0x1000), &mut buf, &mut offset, None, true));
    assert_eq!(&buf, b"foo\0");

    let mut one = [0xFFu8; 1];
    assert!(ctx.decode(Address::new(0x1000), &mut one, &mut offset, None, false));
    assert_eq!(one, [0]);
}

#[test]
fn test_emergency_path_uses_provisioned_backend()
{
    let (ctx, shared, pinned) = counting_context(&lazy());
    let mut buf = [0u8; 64];
    let mut offset = 0;
    let mut line = 0;

    assert!(!ctx.emergency_decode(Address::new(0x1000), &mut buf, &mut offset, None, true));
    assert_eq!(pinned.load(Ordering::SeqCst), 0);

    ctx.provision_error_handler();
    ctx.provision_error_handler();
    assert_eq!(pinned.load(Ordering::SeqCst), 1);
    assert_eq!(shared.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.error_handler_instance().name(), "fake-pinned");

    assert!(ctx.emergency_decode(Address::new(0x1004), &mut buf, &mut offset, None, true));
    assert_eq!(read_cstr(&buf), "foo(int)");
    assert_eq!(offset, 4);
    assert!(ctx.emergency_decode_with_base(Address::new(0x10), &mut buf, &mut offset, Address::ZERO));
    assert!(ctx.emergency_get_source_info(Address::new(0x1010), &mut buf, &mut line, true));
    assert_eq!(line, 0xF);
}

#[test]
fn test_handle_outlives_checkpoint()
{
    let (ctx, _, _) = counting_context(&lazy());
    let handle = ctx.shared_instance();
    ctx.before_checkpoint();

    let mut buf = [0u8; 64];
    let mut offset = 0;
    assert!(handle.decode(Address::new(0x1001), &mut buf, &mut offset, None, false));
    assert_eq!(offset, 1);
}

#[test]
fn test_retired_error_handler_outlives_checkpoint()
{
    let (ctx, _, pinned) = counting_context(&lazy());
    ctx.provision_error_handler();
    let retired = ctx.error_handler_instance();
    ctx.before_checkpoint();
    ctx.provision_error_handler();
    assert_eq!(pinned.load(Ordering::SeqCst), 2);

    let mut buf = [0u8; 64];
    let mut offset = 0;
    assert!(retired.decode(Address::new(0x1002), &mut buf, &mut offset, None, true));
    assert_eq!(read_cstr(&buf), "foo(int)");
    assert_eq!(offset, 2);
}

#[test]
fn test_slow_construction_blocks_other_callers_until_ready()
{
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let ctx = Arc::new(DecoderContext::new(
        move |role: DecoderRole| -> DecoderResult<Arc<dyn SymbolDecoder>> {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(Arc::new(FakeDecoder::new(role)))
        },
        &lazy(),
    ));

    let other = {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || ctx.shared_instance())
    };
    let mine = ctx.shared_instance();
    let theirs = other.join().unwrap();

    assert!(mine.same_instance(&theirs));
    assert!(!mine.is_null());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
