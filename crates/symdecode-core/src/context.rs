//! # Decoder Context
//!
//! Owns the two decoder slots and decides which one serves a call.
//!
//! ## Slots
//!
//! - **shared**: built on first demand while holding the shared mutex, so at
//!   most one construction runs and nobody sees a half-built backend. Callers
//!   hold the mutex only long enough to clone a [`DecoderHandle`]; the decode
//!   itself runs unlocked.
//! - **error handler**: built from ordinary context by
//!   [`DecoderContext::provision_error_handler`]. Each provisioning fills a
//!   fresh write-once cell in a fixed table and publishes its index with one
//!   atomic store. Reading it back is two atomic loads and a borrow: no lock,
//!   no allocation, no reference count. The `emergency_*` methods never
//!   construct anything: an unprovisioned slot answers with the null decoder.
//!
//! Superseded error-handler backends stay in their cells until the context
//! itself is dropped, so a reset can never free a backend that an emergency
//! caller is still using. At most [`MAX_ERROR_HANDLER_GENERATIONS`] backends
//! are provisioned over the life of a context.
//!
//! Both slots fall back to [`NULL_DECODER`] when construction fails, panics, or
//! produces a backend that already reports an error.
//!
//! ## Lock order
//!
//! `provision` before `shared`. Nothing holds `shared` while taking
//! `provision`.

use std::fmt;
use std::io;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::DecoderConfig;
use crate::decoder::{DecoderRole, SymbolDecoder};
use crate::error::{DecoderError, DecoderResult};
use crate::null::NULL_DECODER;
use crate::platform::PlatformDecoderFactory;
use crate::status::DecoderStatus;
use crate::types::Address;

/// Error-handler backends a context can provision before the emergency path
/// stays on the null decoder for good.
pub const MAX_ERROR_HANDLER_GENERATIONS: usize = 64;

/// Builds backends for the façade slots.
///
/// Closures of the right shape are factories too, which keeps tests short:
///
/// ```rust
/// use std::sync::Arc;
/// use symdecode_core::{DecoderContext, DecoderError, DecoderRole, DecoderResult, SymbolDecoder};
///
/// let ctx = DecoderContext::with_factory(|_role: DecoderRole| -> DecoderResult<Arc<dyn SymbolDecoder>> {
///     Err(DecoderError::Unsupported)
/// });
/// assert!(ctx.shared_instance().is_null());
/// ```
pub trait DecoderFactory: Send + Sync
{
    /// Build a backend for `role`.
    ///
    /// ## Errors
    ///
    /// Any error; the slot falls back to the null decoder with the error's
    /// status recorded.
    fn create(&self, role: DecoderRole) -> DecoderResult<Arc<dyn SymbolDecoder>>;
}

impl<F> DecoderFactory for F
where
    F: Fn(DecoderRole) -> DecoderResult<Arc<dyn SymbolDecoder>> + Send + Sync,
{
    fn create(&self, role: DecoderRole) -> DecoderResult<Arc<dyn SymbolDecoder>>
    {
        self(role)
    }
}

/// Reference to the backend installed in the shared slot.
///
/// Cloning bumps a reference count and never allocates. A handle keeps its
/// backend alive even if the slot is reset while the call is in flight.
#[derive(Clone)]
pub enum DecoderHandle
{
    /// The process-wide null decoder.
    Null,
    /// A real backend.
    Backend(Arc<dyn SymbolDecoder>),
}

impl DecoderHandle
{
    /// `true` for the null decoder.
    pub fn is_null(&self) -> bool
    {
        matches!(self, DecoderHandle::Null)
    }

    /// `true` if both handles refer to the same backend instance.
    pub fn same_instance(&self, other: &DecoderHandle) -> bool
    {
        match (self, other) {
            (DecoderHandle::Null, DecoderHandle::Null) => true,
            (DecoderHandle::Backend(a), DecoderHandle::Backend(b)) => {
                std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
            }
            _ => false,
        }
    }
}

impl Deref for DecoderHandle
{
    type Target = dyn SymbolDecoder;

    fn deref(&self) -> &Self::Target
    {
        match self {
            DecoderHandle::Null => &NULL_DECODER,
            DecoderHandle::Backend(backend) => backend.as_ref(),
        }
    }
}

impl fmt::Debug for DecoderHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("DecoderHandle")
            .field("backend", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

enum SharedSlot
{
    Uninitialized,
    Ready
    {
        handle: DecoderHandle,
        construction: DecoderStatus,
    },
}

struct Provisioned
{
    handle: DecoderHandle,
    construction: DecoderStatus,
}

/// Process-scoped decoder state: both slots and the lock guarding `shared`.
///
/// Most programs use the global instance in [`crate::global`]; tests and
/// embedders can build their own with an injected [`DecoderFactory`].
pub struct DecoderContext
{
    factory: Box<dyn DecoderFactory>,
    eager_error_handler: bool,
    shared: Mutex<SharedSlot>,
    /// Next unused generation; also serialises provisioning.
    provision: Mutex<usize>,
    error_handlers: Box<[OnceCell<Provisioned>]>,
    /// Generation number of the live error handler, `0` for none.
    current_error_handler: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T>
{
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run a backend call, turning a panic into "no information".
fn guarded(call: impl FnOnce() -> bool) -> bool
{
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or(false)
}

impl DecoderContext
{
    /// Context using `factory` with the given configuration.
    ///
    /// Nothing is constructed yet.
    pub fn new(factory: impl DecoderFactory + 'static, config: &DecoderConfig) -> Self
    {
        Self {
            factory: Box::new(factory),
            eager_error_handler: config.eager_error_handler,
            shared: Mutex::new(SharedSlot::Uninitialized),
            provision: Mutex::new(0),
            error_handlers: (0..MAX_ERROR_HANDLER_GENERATIONS).map(|_| OnceCell::new()).collect(),
            current_error_handler: AtomicUsize::new(0),
        }
    }

    /// Context using `factory` with default configuration.
    pub fn with_factory(factory: impl DecoderFactory + 'static) -> Self
    {
        Self::new(factory, &DecoderConfig::default())
    }

    /// Context backed by the platform decoder.
    pub fn from_config(config: &DecoderConfig) -> Self
    {
        Self::new(PlatformDecoderFactory::new(config.clone()), config)
    }

    fn construct(&self, role: DecoderRole) -> (DecoderHandle, DecoderStatus)
    {
        debug!(%role, "constructing decoder");
        let outcome: DecoderResult<Arc<dyn SymbolDecoder>> =
            panic::catch_unwind(AssertUnwindSafe(|| self.factory.create(role)))
                .unwrap_or(Err(DecoderError::ConstructionPanicked));

        match outcome {
            Ok(backend) if backend.has_error() => {
                let status = backend.status();
                warn!(%role, backend = backend.name(), %status, "decoder constructed with error; using null decoder");
                (DecoderHandle::Null, status)
            }
            Ok(backend) => {
                let status = backend.status();
                debug!(%role, backend = backend.name(), %status, "decoder ready");
                (DecoderHandle::Backend(backend), status)
            }
            Err(err) => {
                let status = err.status();
                if status.is_error() {
                    warn!(%role, error = %err, "decoder construction failed; using null decoder");
                } else {
                    debug!(%role, error = %err, "no native decoder; using null decoder");
                }
                (DecoderHandle::Null, status)
            }
        }
    }

    /// Handle to the shared backend, constructing it on first demand.
    ///
    /// Blocks while another thread is constructing. Repeated calls return the
    /// same instance until [`before_checkpoint`](Self::before_checkpoint).
    /// With eager provisioning configured, also re-provisions an empty
    /// error-handler slot.
    pub fn shared_instance(&self) -> DecoderHandle
    {
        let handle = {
            let mut slot = lock(&self.shared);
            match &*slot {
                SharedSlot::Ready { handle, .. } => handle.clone(),
                SharedSlot::Uninitialized => {
                    let (handle, construction) = self.construct(DecoderRole::Shared);
                    *slot = SharedSlot::Ready {
                        handle: handle.clone(),
                        construction,
                    };
                    handle
                }
            }
        };

        if self.eager_error_handler && !self.is_error_handler_provisioned() {
            self.provision_error_handler();
        }
        handle
    }

    /// Build the error-handler backend if the slot is empty.
    ///
    /// Must be called from ordinary context: construction may allocate, read
    /// files and take locks. Idempotent.
    ///
    /// Once [`MAX_ERROR_HANDLER_GENERATIONS`] backends have been provisioned,
    /// further calls leave the slot empty.
    pub fn provision_error_handler(&self)
    {
        let mut next = lock(&self.provision);
        if self.is_error_handler_provisioned() {
            return;
        }
        let Some(cell) = self.error_handlers.get(*next) else {
            warn!(
                generations = MAX_ERROR_HANDLER_GENERATIONS,
                "error-handler generations exhausted; emergency path stays on the null decoder"
            );
            return;
        };

        let (handle, construction) = self.construct(DecoderRole::ErrorHandler);
        // cells past `next` have never been filled
        if cell.set(Provisioned { handle, construction }).is_err() {
            return;
        }
        *next += 1;
        self.current_error_handler.store(*next, Ordering::Release);
    }

    /// `true` once the error-handler slot holds a backend (possibly null).
    pub fn is_error_handler_provisioned(&self) -> bool
    {
        self.provisioned().is_some()
    }

    fn provisioned(&self) -> Option<&Provisioned>
    {
        let generation = self.current_error_handler.load(Ordering::Acquire);
        self.error_handlers.get(generation.checked_sub(1)?)?.get()
    }

    /// The error-handler backend.
    ///
    /// Lock-free and allocation-free, and it touches no reference count;
    /// safe in a signal handler. Returns the null decoder if the slot has not
    /// been provisioned. The backend stays valid for as long as the context,
    /// even across [`before_checkpoint`](Self::before_checkpoint).
    pub fn error_handler_instance(&self) -> &dyn SymbolDecoder
    {
        match self.provisioned() {
            Some(provisioned) => &*provisioned.handle,
            None => &NULL_DECODER,
        }
    }

    /// Forget cached backends before the process image changes underneath.
    ///
    /// Both slots go back to empty and are rebuilt on the next ordinary
    /// demand. Calls already in flight finish on the old backend; the old
    /// error-handler backend is retired, not freed.
    pub fn before_checkpoint(&self)
    {
        let provisioned = lock(&self.provision);
        *lock(&self.shared) = SharedSlot::Uninitialized;
        self.current_error_handler.store(0, Ordering::Release);
        info!(retired_error_handlers = *provisioned, "decoder state reset before checkpoint");
    }

    /// Decode `pc` through the shared backend. See [`SymbolDecoder::decode`].
    pub fn decode(&self, pc: Address, buf: &mut [u8], offset: &mut u64, module_path: Option<&Path>, demangle: bool)
        -> bool
    {
        let decoder = self.shared_instance();
        guarded(|| decoder.decode(pc, buf, offset, module_path, demangle))
    }

    /// [`decode`](Self::decode) without a module path.
    pub fn decode_demangled(&self, pc: Address, buf: &mut [u8], offset: &mut u64, demangle: bool) -> bool
    {
        self.decode(pc, buf, offset, None, demangle)
    }

    /// Decode `pc` relative to the module loaded at `base`.
    pub fn decode_with_base(&self, pc: Address, buf: &mut [u8], offset: &mut u64, base: Address) -> bool
    {
        let decoder = self.shared_instance();
        guarded(|| decoder.decode_with_base(pc, buf, offset, base))
    }

    /// Demangle `symbol` through the shared backend.
    pub fn demangle(&self, symbol: &str, buf: &mut [u8]) -> bool
    {
        let decoder = self.shared_instance();
        guarded(|| decoder.demangle(symbol, buf))
    }

    /// Source file and line for `pc` through the shared backend.
    pub fn get_source_info(&self, pc: Address, filename: &mut [u8], line: &mut u32, is_pc_after_call: bool) -> bool
    {
        let decoder = self.shared_instance();
        guarded(|| decoder.get_source_info(pc, filename, line, is_pc_after_call))
    }

    /// Emergency-path [`decode`](Self::decode).
    pub fn emergency_decode(
        &self,
        pc: Address,
        buf: &mut [u8],
        offset: &mut u64,
        module_path: Option<&Path>,
        demangle: bool,
    ) -> bool
    {
        let decoder = self.error_handler_instance();
        guarded(|| decoder.decode(pc, buf, offset, module_path, demangle))
    }

    /// Emergency-path [`decode_with_base`](Self::decode_with_base).
    pub fn emergency_decode_with_base(&self, pc: Address, buf: &mut [u8], offset: &mut u64, base: Address) -> bool
    {
        let decoder = self.error_handler_instance();
        guarded(|| decoder.decode_with_base(pc, buf, offset, base))
    }

    /// Emergency-path [`get_source_info`](Self::get_source_info).
    pub fn emergency_get_source_info(
        &self,
        pc: Address,
        filename: &mut [u8],
        line: &mut u32,
        is_pc_after_call: bool,
    ) -> bool
    {
        let decoder = self.error_handler_instance();
        guarded(|| decoder.get_source_info(pc, filename, line, is_pc_after_call))
    }

    /// Write the state of both slots to `out`.
    ///
    /// Never blocks: if the shared lock is held (possibly by the thread that
    /// is printing a crash report), the shared slot is reported as locked.
    ///
    /// ## Errors
    ///
    /// Only errors from `out`.
    pub fn print_state_on(&self, out: &mut dyn io::Write) -> io::Result<()>
    {
        writeln!(out, "Decoder state:")?;
        match self.shared.try_lock() {
            Ok(slot) => Self::print_shared(&slot, out)?,
            Err(TryLockError::Poisoned(poisoned)) => Self::print_shared(&poisoned.into_inner(), out)?,
            Err(TryLockError::WouldBlock) => writeln!(out, "  shared: <locked>")?,
        }

        match self.provisioned() {
            Some(Provisioned { handle, construction }) => writeln!(
                out,
                "  error handler: {} (status {}, construction {})",
                handle.name(),
                handle.status(),
                construction
            )?,
            None => writeln!(out, "  error handler: <not provisioned>")?,
        }
        Ok(())
    }

    fn print_shared(slot: &SharedSlot, out: &mut dyn io::Write) -> io::Result<()>
    {
        match slot {
            SharedSlot::Uninitialized => writeln!(out, "  shared: <uninitialized>"),
            SharedSlot::Ready { handle, construction } => writeln!(
                out,
                "  shared: {} (status {}, construction {})",
                handle.name(),
                handle.status(),
                construction
            ),
        }
    }

    /// Hold the shared lock until the guard is dropped.
    #[cfg(test)]
    fn hold_shared_lock(&self) -> MutexGuard<'_, SharedSlot>
    {
        lock(&self.shared)
    }
}

impl Default for DecoderContext
{
    fn default() -> Self
    {
        Self::from_config(&DecoderConfig::default())
    }
}
