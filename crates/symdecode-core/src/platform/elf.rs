//! # ELF Decoder
//!
//! Decodes addresses in this process from the symbol tables and DWARF line
//! info of the mapped modules.
//!
//! ## Roles
//!
//! The same type serves both façade slots, but its state is laid out
//! differently per [`DecoderRole`]:
//!
//! - **Shared**: the module map and an image cache sit behind `RwLock`s.
//!   Images are loaded on first use, line tables are built on first lookup,
//!   and the module map is re-read when an address falls outside it, at most
//!   once per [`MODULE_REFRESH_INTERVAL`]. Failed loads are cached too, so a
//!   broken module costs one attempt per mapping. A refresh drops cache
//!   entries for modules that are no longer mapped.
//! - **ErrorHandler**: every module image is loaded (and its line table built)
//!   during construction. Afterwards the decoder only reads immutable data:
//!   no locks, no file access, no lazy initialisation. Demangling is limited
//!   to the non-allocating Rust demangler.
//!
//! Modules whose file was deleted after mapping are never opened: the path
//! may name a different file by now.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::buffer::write_cstr;
use crate::config::DecoderConfig;
use crate::decoder::{source_lookup_address, DecoderRole, SymbolDecoder};
use crate::error::{DecoderError, DecoderResult};
use crate::status::DecoderStatus;
use crate::symbols::demangle::{demangle_into, demangle_rust_into, detect_language};
use crate::symbols::{ModuleDescriptor, ModuleMap, SymbolImage};
use crate::types::{Address, SymbolLanguage};

/// Minimum time between two re-reads of the module map on lookup misses.
pub const MODULE_REFRESH_INTERVAL: Duration = Duration::from_millis(250);

type ImageKey = (PathBuf, Option<Address>);

struct SharedState
{
    modules: RwLock<ModuleMap>,
    /// `None` records a load that failed or was skipped.
    images: RwLock<HashMap<ImageKey, Option<Arc<SymbolImage>>>>,
    refreshed: Mutex<Instant>,
}

impl SharedState
{
    fn new(modules: ModuleMap) -> Self
    {
        Self {
            modules: RwLock::new(modules),
            images: RwLock::new(HashMap::new()),
            refreshed: Mutex::new(Instant::now()),
        }
    }

    fn refresh_due(&self) -> bool
    {
        let mut refreshed = self.refreshed.lock().unwrap_or_else(PoisonError::into_inner);
        if refreshed.elapsed() < MODULE_REFRESH_INTERVAL {
            return false;
        }
        *refreshed = Instant::now();
        true
    }
}

enum Backing
{
    Shared(SharedState),
    Pinned
    {
        modules: ModuleMap,
        images: Vec<SymbolImage>,
    },
}

/// How a lookup picks its module.
#[derive(Debug, Clone, Copy)]
enum Target<'a>
{
    Containing(Address),
    Base(Address),
    Path(&'a Path),
}

impl Target<'_>
{
    fn find(self, map: &ModuleMap) -> Option<&ModuleDescriptor>
    {
        match self {
            Target::Containing(pc) => map.containing(pc),
            Target::Base(base) => map.by_base(base),
            Target::Path(path) => map.by_path(path),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T>
{
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T>
{
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Symbol-table and DWARF backed decoder for ELF processes.
pub struct ElfDecoder
{
    role: DecoderRole,
    status: AtomicI32,
    max_image_bytes: u64,
    backing: Backing,
}

impl ElfDecoder
{
    /// Build a decoder over the modules currently mapped into the process.
    ///
    /// ## Errors
    ///
    /// - `ModuleMap` / `Unsupported`: the module map cannot be read here
    /// - for [`DecoderRole::ErrorHandler`], the last image error if no module
    ///   image could be loaded at all
    pub fn new(role: DecoderRole, config: &DecoderConfig) -> DecoderResult<Self>
    {
        Self::with_modules(role, ModuleMap::current()?, config)
    }

    /// Build a decoder over an explicit module map.
    ///
    /// ## Errors
    ///
    /// See [`ElfDecoder::new`]. An empty map is a `ModuleMap` error.
    pub fn with_modules(role: DecoderRole, modules: ModuleMap, config: &DecoderConfig) -> DecoderResult<Self>
    {
        if modules.is_empty() {
            return Err(DecoderError::ModuleMap("no executable file mappings".to_string()));
        }

        let backing = match role {
            DecoderRole::Shared => Backing::Shared(SharedState::new(modules)),
            DecoderRole::ErrorHandler => {
                let mut images = Vec::with_capacity(modules.len());
                let mut last_error = None;
                for module in modules.modules() {
                    if module.deleted {
                        debug!(path = %module.path.display(), "skipping deleted module for error handler");
                        continue;
                    }
                    match SymbolImage::load(&module.path, Some(module.base), config.max_image_bytes) {
                        Ok(image) => {
                            if config.preload_line_info {
                                image.prepare_line_info();
                            }
                            images.push(image);
                        }
                        Err(err) => {
                            debug!(path = %module.path.display(), error = %err, "skipping module for error handler");
                            last_error = Some(err);
                        }
                    }
                }
                if images.is_empty() {
                    return Err(last_error.unwrap_or(DecoderError::ModuleMap("no loadable modules".to_string())));
                }
                debug!(modules = images.len(), "pinned module images for error handler");
                Backing::Pinned { modules, images }
            }
        };

        Ok(Self {
            role,
            status: AtomicI32::new(DecoderStatus::NoError.code()),
            max_image_bytes: config.max_image_bytes,
            backing,
        })
    }

    fn record(&self, status: DecoderStatus)
    {
        if status.is_error() {
            self.status.store(status.code(), Ordering::Relaxed);
        }
    }

    fn with_image<R>(&self, target: Target<'_>, f: impl FnOnce(&SymbolImage) -> Option<R>) -> Option<R>
    {
        match &self.backing {
            Backing::Pinned { modules, images } => {
                let path: &Path = match target {
                    Target::Path(path) => path,
                    _ => &target.find(modules)?.path,
                };
                let image = images.iter().find(|image| image.path() == path)?;
                f(image)
            }
            Backing::Shared(shared) => {
                let image = self.shared_image(shared, target)?;
                f(&image)
            }
        }
    }

    fn shared_image(&self, shared: &SharedState, target: Target<'_>) -> Option<Arc<SymbolImage>>
    {
        let (key, deleted): (ImageKey, bool) = match Self::shared_module(shared, target) {
            Some(module) => ((module.path, Some(module.base)), module.deleted),
            None => match target {
                Target::Path(path) => ((path.to_path_buf(), None), false),
                _ => return None,
            },
        };

        if let Some(cached) = read(&shared.images).get(&key) {
            return cached.clone();
        }

        let loaded = if deleted {
            debug!(path = %key.0.display(), "module file was deleted; not loading");
            None
        } else {
            match SymbolImage::load(&key.0, key.1, self.max_image_bytes) {
                Ok(image) => {
                    debug!(path = %key.0.display(), symbols = image.symbol_count(), "loaded symbol image");
                    Some(Arc::new(image))
                }
                Err(err) => {
                    debug!(path = %key.0.display(), error = %err, "failed to load symbol image");
                    self.record(err.status());
                    None
                }
            }
        };
        write(&shared.images).entry(key).or_insert(loaded).clone()
    }

    fn shared_module(shared: &SharedState, target: Target<'_>) -> Option<ModuleDescriptor>
    {
        if let Some(module) = target.find(&read(&shared.modules)) {
            return Some(module.clone());
        }
        if !shared.refresh_due() {
            return None;
        }

        // the process may have mapped new modules since the last snapshot
        let fresh = ModuleMap::current().ok()?;
        let found = target.find(&fresh).cloned();
        write(&shared.images).retain(|(path, base), _| {
            base.map_or(true, |base| fresh.by_base(base).is_some_and(|module| module.path == *path))
        });
        debug!(modules = fresh.len(), "refreshed module map");
        *write(&shared.modules) = fresh;
        found
    }

    /// Loaded and negative entries in the shared image cache.
    #[cfg(test)]
    fn cached_images(&self) -> (usize, usize)
    {
        match &self.backing {
            Backing::Shared(shared) => {
                let images = read(&shared.images);
                let loaded = images.values().filter(|image| image.is_some()).count();
                (loaded, images.len() - loaded)
            }
            Backing::Pinned { images, .. } => (images.len(), 0),
        }
    }

    fn demangle_name(&self, symbol: &str, buf: &mut [u8]) -> bool
    {
        match (self.role, detect_language(symbol)) {
            (_, language) if !language.is_mangled() => false,
            (DecoderRole::Shared, _) => demangle_into(symbol, buf),
            (DecoderRole::ErrorHandler, SymbolLanguage::Rust) => demangle_rust_into(symbol, buf),
            // cpp_demangle allocates
            (DecoderRole::ErrorHandler, _) => false,
        }
    }

    fn write_name(&self, name: &str, buf: &mut [u8], demangle: bool) -> bool
    {
        (demangle && self.demangle_name(name, buf)) || write_cstr(buf, name)
    }

    fn resolve(&self, pc: Address, buf: &mut [u8], offset: &mut u64, target: Target<'_>, demangle: bool) -> bool
    {
        if buf.is_empty() {
            return false;
        }
        let found = self.with_image(target, |image| {
            let (name, off) = image.lookup(image.file_address(pc)?)?;
            self.write_name(name, buf, demangle).then_some(off)
        });
        match found {
            Some(off) => {
                *offset = off;
                true
            }
            None => false,
        }
    }
}

impl SymbolDecoder for ElfDecoder
{
    fn decode(
        &self,
        pc: Address,
        buf: &mut [u8],
        offset: &mut u64,
        module_path: Option<&Path>,
        demangle: bool,
    ) -> bool
    {
        let target = module_path.map_or(Target::Containing(pc), Target::Path);
        self.resolve(pc, buf, offset, target, demangle)
    }

    fn decode_with_base(&self, pc: Address, buf: &mut [u8], offset: &mut u64, base: Address) -> bool
    {
        self.resolve(pc, buf, offset, Target::Base(base), false)
    }

    fn demangle(&self, symbol: &str, buf: &mut [u8]) -> bool
    {
        self.demangle_name(symbol, buf)
    }

    fn get_source_info(&self, pc: Address, filename: &mut [u8], line: &mut u32, is_pc_after_call: bool) -> bool
    {
        if filename.is_empty() {
            return false;
        }
        let lookup = source_lookup_address(pc, is_pc_after_call);
        let found = self.with_image(Target::Containing(lookup), |image| {
            let file_addr = image.file_address(lookup)?;
            let (file, file_line) = match self.role {
                DecoderRole::Shared => image.prepare_line_info().lookup(file_addr)?,
                DecoderRole::ErrorHandler => image.location(file_addr)?,
            };
            write_cstr(filename, file).then_some(file_line)
        });
        match found {
            Some(file_line) => {
                *line = file_line;
                true
            }
            None => false,
        }
    }

    fn status(&self) -> DecoderStatus
    {
        DecoderStatus::from_code(self.status.load(Ordering::Relaxed)).unwrap_or(DecoderStatus::HelperInitError)
    }

    fn name(&self) -> &'static str
    {
        match self.role {
            DecoderRole::Shared => "elf",
            DecoderRole::ErrorHandler => "elf-pinned",
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::buffer::read_cstr;

    fn bogus_map() -> ModuleMap
    {
        ModuleMap::parse("1000-2000 r-xp 00000000 00:00 1 /definitely/not/here.so\n")
    }

    #[test]
    fn test_empty_module_map_is_rejected()
    {
        let err = ElfDecoder::with_modules(DecoderRole::Shared, ModuleMap::default(), &DecoderConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, DecoderError::ModuleMap(_)));
    }

    #[test]
    fn test_error_handler_needs_a_loadable_module()
    {
        let err = ElfDecoder::with_modules(DecoderRole::ErrorHandler, bogus_map(), &DecoderConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.status(), DecoderStatus::FileNotFound);
    }

    #[test]
    fn test_missing_image_downgrades_status_but_stays_total()
    {
        let decoder = ElfDecoder::with_modules(DecoderRole::Shared, bogus_map(), &DecoderConfig::default()).unwrap();
        assert_eq!(decoder.status(), DecoderStatus::NoError);

        let mut buf = [0xAAu8; 32];
        let mut offset = 0;
        assert!(!decoder.decode(Address::new(0x1800), &mut buf, &mut offset, None, true));
        assert!(buf.iter().all(|&b| b == 0xAA));
        assert_eq!(decoder.status(), DecoderStatus::FileNotFound);
        assert!(decoder.has_error());
    }

    #[test]
    fn test_failed_load_is_cached()
    {
        let decoder = ElfDecoder::with_modules(DecoderRole::Shared, bogus_map(), &DecoderConfig::default()).unwrap();
        let mut buf = [0u8; 32];
        let mut offset = 0;
        let mut line = 0;

        assert!(!decoder.decode(Address::new(0x1800), &mut buf, &mut offset, None, true));
        assert!(!decoder.decode(Address::new(0x1900), &mut buf, &mut offset, None, false));
        assert!(!decoder.get_source_info(Address::new(0x1800), &mut buf, &mut line, false));
        assert_eq!(decoder.cached_images(), (0, 1));
    }

    #[test]
    fn test_deleted_module_is_not_opened()
    {
        let map = ModuleMap::parse("1000-2000 r-xp 00000000 00:00 1 /proc/self/exe (deleted)\n");
        let decoder = ElfDecoder::with_modules(DecoderRole::Shared, map, &DecoderConfig::default()).unwrap();
        let mut buf = [0u8; 32];
        let mut offset = 0;

        assert!(!decoder.decode(Address::new(0x1800), &mut buf, &mut offset, None, true));
        assert_eq!(decoder.cached_images(), (0, 1));
        assert_eq!(decoder.status(), DecoderStatus::NoError);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_module_refresh_is_rate_limited_and_prunes_cache()
    {
        fn marker() {}
        let pc = Address::of_fn(marker as fn());
        let decoder = ElfDecoder::with_modules(DecoderRole::Shared, bogus_map(), &DecoderConfig::default()).unwrap();
        let mut buf = [0u8; 256];
        let mut offset = 0;

        assert!(!decoder.decode(Address::new(0x1800), &mut buf, &mut offset, None, false));
        assert_eq!(decoder.cached_images(), (0, 1));

        // the map was read at construction, so the miss does not re-read it yet
        assert!(!decoder.decode(pc, &mut buf, &mut offset, None, false));

        std::thread::sleep(MODULE_REFRESH_INTERVAL + Duration::from_millis(50));
        assert!(decoder.decode(pc, &mut buf, &mut offset, None, false));
        assert_eq!(decoder.cached_images(), (1, 0));
    }

    #[test]
    fn test_demangle_by_role()
    {
        let mut buf = [0u8; 32];
        let shared = ElfDecoder::with_modules(DecoderRole::Shared, bogus_map(), &DecoderConfig::default()).unwrap();
        assert!(shared.demangle("_Z3fooi", &mut buf));
        assert_eq!(read_cstr(&buf), "foo(int)");
        assert!(!shared.demangle("plain", &mut buf));
    }
}
