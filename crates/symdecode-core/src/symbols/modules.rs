//! Loaded-module map of the current process.
//!
//! On Linux the map is read from `/proc/self/maps`. Each file-backed image is
//! collapsed into one [`ModuleDescriptor`] spanning all of its mappings; the
//! base is the start of the mapping at file offset 0, which is where the
//! dynamic loader placed the ELF header.
//!
//! A file unlinked after it was mapped shows up with a ` (deleted)` suffix.
//! The suffix is stripped from the path and recorded in
//! [`ModuleDescriptor::deleted`]; the path on disk no longer names the mapped
//! image, so decoders do not try to open it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{DecoderError, DecoderResult};
use crate::types::Address;

/// One executable image mapped into the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor
{
    /// Path of the backing file.
    pub path: PathBuf,
    /// Load address of the file's first byte.
    pub base: Address,
    /// Lowest start and highest end over all mappings of the file.
    pub range: (Address, Address),
    /// The backing file was unlinked after it was mapped.
    pub deleted: bool,
}

impl ModuleDescriptor
{
    /// `true` if `pc` falls inside one of the module's mappings' overall span.
    pub fn contains(&self, pc: Address) -> bool
    {
        pc >= self.range.0 && pc < self.range.1
    }
}

/// Snapshot of the modules mapped into the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMap
{
    modules: Vec<ModuleDescriptor>,
}

const DELETED_SUFFIX: &str = " (deleted)";

#[derive(Default)]
struct Accumulator
{
    start: u64,
    end: u64,
    base: Option<u64>,
    executable: bool,
    deleted: bool,
}

impl ModuleMap
{
    /// Read the module map of the running process.
    ///
    /// ## Errors
    ///
    /// - `ModuleMap`: `/proc/self/maps` could not be read
    /// - `Unsupported`: the platform has no module map reader
    #[cfg(target_os = "linux")]
    pub fn current() -> DecoderResult<Self>
    {
        let text = std::fs::read_to_string("/proc/self/maps")
            .map_err(|err| DecoderError::ModuleMap(format!("reading /proc/self/maps: {err}")))?;
        Ok(Self::parse(&text))
    }

    /// Read the module map of the running process.
    ///
    /// ## Errors
    ///
    /// Always `Unsupported` on this platform.
    #[cfg(not(target_os = "linux"))]
    pub fn current() -> DecoderResult<Self>
    {
        Err(DecoderError::Unsupported)
    }

    /// Parse text in `/proc/<pid>/maps` format.
    ///
    /// Anonymous and pseudo mappings (`[heap]`, `[vdso]`, ...) are skipped, as
    /// are files with no executable mapping. Malformed lines are ignored.
    /// Mappings of unlinked files are kept and marked
    /// [`deleted`](ModuleDescriptor::deleted).
    pub fn parse(text: &str) -> Self
    {
        let mut grouped: BTreeMap<PathBuf, Accumulator> = BTreeMap::new();

        for line in text.lines() {
            let mut fields = line.split_ascii_whitespace();
            let (Some(range), Some(perms), Some(offset), Some(_dev), Some(_inode)) =
                (fields.next(), fields.next(), fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let path = fields.collect::<Vec<_>>().join(" ");
            if !path.starts_with('/') {
                continue;
            }
            let (path, deleted) = match path.strip_suffix(DELETED_SUFFIX) {
                Some(stripped) => (stripped.to_string(), true),
                None => (path, false),
            };

            let Some((start, end)) = range.split_once('-') else {
                continue;
            };
            let (Ok(start), Ok(end), Ok(offset)) = (
                u64::from_str_radix(start, 16),
                u64::from_str_radix(end, 16),
                u64::from_str_radix(offset, 16),
            ) else {
                continue;
            };

            let entry = grouped.entry(PathBuf::from(path)).or_insert_with(|| Accumulator {
                start,
                end,
                ..Accumulator::default()
            });
            entry.start = entry.start.min(start);
            entry.end = entry.end.max(end);
            if offset == 0 {
                entry.base = Some(entry.base.map_or(start, |base| base.min(start)));
            }
            entry.executable |= perms.contains('x');
            entry.deleted |= deleted;
        }

        let mut modules: Vec<ModuleDescriptor> = grouped
            .into_iter()
            .filter(|(_, acc)| acc.executable)
            .map(|(path, acc)| ModuleDescriptor {
                path,
                base: Address::new(acc.base.unwrap_or(acc.start)),
                range: (Address::new(acc.start), Address::new(acc.end)),
                deleted: acc.deleted,
            })
            .collect();
        modules.sort_by_key(|module| module.range.0);

        Self { modules }
    }

    /// All modules, ordered by start address.
    pub fn modules(&self) -> &[ModuleDescriptor]
    {
        &self.modules
    }

    /// Number of modules.
    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    /// `true` if no module is mapped.
    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }

    /// Module whose span contains `pc`.
    pub fn containing(&self, pc: Address) -> Option<&ModuleDescriptor>
    {
        self.modules.iter().find(|module| module.contains(pc))
    }

    /// Module loaded at exactly `base`.
    pub fn by_base(&self, base: Address) -> Option<&ModuleDescriptor>
    {
        self.modules.iter().find(|module| module.base == base)
    }

    /// Module backed by `path`.
    pub fn by_path(&self, path: &Path) -> Option<&ModuleDescriptor>
    {
        self.modules.iter().find(|module| module.path == path)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    const MAPS: &str = "\
55d0c0a00000-55d0c0a05000 r--p 00000000 fd:01 1234   /usr/bin/demo
55d0c0a05000-55d0c0a20000 r-xp 00005000 fd:01 1234   /usr/bin/demo
55d0c0a20000-55d0c0a30000 r--p 00020000 fd:01 1234   /usr/bin/demo
55d0c1000000-55d0c1021000 rw-p 00000000 00:00 0      [heap]
7f1000000000-7f1000028000 r--p 00000000 fd:01 42     /usr/lib/libc.so.6
7f1000028000-7f10001bd000 r-xp 00028000 fd:01 42     /usr/lib/libc.so.6
7f2000000000-7f2000001000 r--p 00000000 fd:01 77     /usr/share/locale/data file
7fff00000000-7fff00002000 r-xp 00000000 00:00 0      [vdso]
garbage line
";

    #[test]
    fn test_parse_groups_mappings_per_file()
    {
        let map = ModuleMap::parse(MAPS);
        assert_eq!(map.len(), 2);

        let demo = map.by_path(Path::new("/usr/bin/demo")).unwrap();
        assert_eq!(demo.base, Address::new(0x55d0_c0a0_0000));
        assert_eq!(demo.range, (Address::new(0x55d0_c0a0_0000), Address::new(0x55d0_c0a3_0000)));

        let libc = map.by_base(Address::new(0x7f10_0000_0000)).unwrap();
        assert_eq!(libc.path, PathBuf::from("/usr/lib/libc.so.6"));
    }

    #[test]
    fn test_parse_skips_non_executable_and_pseudo_mappings()
    {
        let map = ModuleMap::parse(MAPS);
        assert!(map.by_path(Path::new("/usr/share/locale/data file")).is_none());
        assert!(map.modules().iter().all(|module| module.path.is_absolute()));
    }

    #[test]
    fn test_containing_lookup()
    {
        let map = ModuleMap::parse(MAPS);
        let hit = map.containing(Address::new(0x55d0_c0a0_6000)).unwrap();
        assert_eq!(hit.path, PathBuf::from("/usr/bin/demo"));
        assert!(map.containing(Address::new(0xdead_beef)).is_none());
        assert!(map.containing(Address::new(0x55d0_c0a3_0000)).is_none());
    }

    #[test]
    fn test_paths_with_spaces_are_kept_whole()
    {
        let map = ModuleMap::parse("1000-2000 r-xp 00000000 00:00 1 /opt/my app/bin\n");
        assert_eq!(map.modules()[0].path, PathBuf::from("/opt/my app/bin"));
    }

    #[test]
    fn test_deleted_suffix_is_stripped_and_flagged()
    {
        let map = ModuleMap::parse(
            "\
7f3000000000-7f3000001000 r--p 00000000 fd:01 9 /tmp/plugin.so (deleted)
7f3000001000-7f3000004000 r-xp 00001000 fd:01 9 /tmp/plugin.so (deleted)
7f4000000000-7f4000002000 r-xp 00000000 fd:01 10 /opt/my app (deleted)/lib.so
",
        );
        assert_eq!(map.len(), 2);

        let plugin = map.by_path(Path::new("/tmp/plugin.so")).unwrap();
        assert!(plugin.deleted);
        assert_eq!(plugin.base, Address::new(0x7f30_0000_0000));
        assert_eq!(plugin.range.1, Address::new(0x7f30_0000_4000));

        let lib = map.by_path(Path::new("/opt/my app (deleted)/lib.so")).unwrap();
        assert!(!lib.deleted);
        assert!(!ModuleMap::parse(MAPS).modules().iter().any(|module| module.deleted));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_current_process_contains_this_function()
    {
        fn marker() {}
        let map = ModuleMap::current().unwrap();
        assert!(map.containing(Address::of_fn(marker as fn())).is_some());
    }
}
