//! Binary image parsing: symbol tables and DWARF line sections.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use addr2line::Context;
use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use once_cell::sync::OnceCell;

use super::lines::LineTable;
use crate::error::{DecoderError, DecoderResult};
use crate::types::Address;

type OwnedReader = EndianArcSlice<RunTimeEndian>;

const PAGE_MASK: u64 = !0xfff;

const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_addr", &[".debug_addr", "__debug_addr"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_ranges", &[".debug_ranges", "__debug_ranges"]),
    (".debug_rnglists", &[".debug_rnglists", "__debug_rnglists"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
    (".debug_str_offsets", &[".debug_str_offsets", "__debug_str_offsets"]),
    (".debug_aranges", &[".debug_aranges", "__debug_aranges"]),
];

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> Option<Arc<[u8]>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            // a section that fails to decompress is treated as absent
            let data = section.uncompressed_data().ok()?;
            return Some(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
                Cow::Owned(vec) => vec.into(),
            });
        }
    }
    None
}

/// A function symbol, by file address.
#[derive(Debug, Clone)]
struct FunctionSymbol
{
    address: u64,
    size: u64,
    name: Box<str>,
}

/// Parsed symbol data for one executable or shared object.
///
/// Addresses inside the image are "file addresses" (the virtual addresses
/// recorded in the file). `bias` converts between those and runtime
/// addresses of the mapped copy.
pub struct SymbolImage
{
    path: PathBuf,
    bias: i64,
    endian: RunTimeEndian,
    symbols: Vec<FunctionSymbol>,
    debug_sections: HashMap<&'static str, Arc<[u8]>>,
    line_table: OnceCell<LineTable>,
}

impl SymbolImage
{
    /// Parse the image at `path`.
    ///
    /// `base` is where the image's first byte is mapped in this process;
    /// `None` means "not mapped", and runtime addresses equal file addresses.
    ///
    /// ## Errors
    ///
    /// - `FileNotFound`: `path` does not exist
    /// - `ImageTooLarge`: the file exceeds `max_bytes`
    /// - `FileInvalid`: the file is not a parsable object file
    /// - `Io`: any other read failure
    pub fn load(path: &Path, base: Option<Address>, max_bytes: u64) -> DecoderResult<Self>
    {
        let metadata = fs::metadata(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => DecoderError::FileNotFound(path.to_path_buf()),
            _ => DecoderError::Io(err),
        })?;
        if metadata.len() > max_bytes {
            return Err(DecoderError::ImageTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: max_bytes,
            });
        }

        let data = fs::read(path)?;
        Self::parse(path, &data, base)
    }

    /// Parse an image from bytes already in memory.
    ///
    /// ## Errors
    ///
    /// `FileInvalid` if `data` is not a parsable object file.
    pub fn parse(path: &Path, data: &[u8], base: Option<Address>) -> DecoderResult<Self>
    {
        let file = object::File::parse(data).map_err(|err| DecoderError::FileInvalid {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let first_segment = file.segments().map(|segment| segment.address()).min().unwrap_or(0) & PAGE_MASK;
        #[allow(clippy::cast_possible_wrap)]
        let bias = base.map_or(0, |base| base.value().wrapping_sub(first_segment) as i64);

        let mut symbols: Vec<FunctionSymbol> = file
            .symbols()
            .chain(file.dynamic_symbols())
            .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.is_definition() && symbol.address() != 0)
            .filter_map(|symbol| {
                let name = symbol.name().ok().filter(|name| !name.is_empty())?;
                Some(FunctionSymbol {
                    address: symbol.address(),
                    size: symbol.size(),
                    name: name.into(),
                })
            })
            .collect();
        // sized entries win over zero-sized aliases at the same address
        symbols.sort_by(|a, b| a.address.cmp(&b.address).then(b.size.cmp(&a.size)));
        symbols.dedup_by_key(|symbol| symbol.address);
        symbols.shrink_to_fit();

        let mut debug_sections = HashMap::new();
        for (canonical, aliases) in DWARF_SECTIONS {
            if let Some(bytes) = load_section_bytes(&file, aliases) {
                debug_sections.insert(*canonical, bytes);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            bias,
            endian,
            symbols,
            debug_sections,
            line_table: OnceCell::new(),
        })
    }

    /// Path the image was loaded from.
    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// Number of function symbols.
    pub fn symbol_count(&self) -> usize
    {
        self.symbols.len()
    }

    /// `true` if the image carries a `.debug_line` section.
    pub fn has_line_info(&self) -> bool
    {
        self.debug_sections.contains_key(".debug_line")
    }

    /// Convert a runtime address to a file address.
    pub fn file_address(&self, pc: Address) -> Option<u64>
    {
        let value = pc.value();
        if self.bias >= 0 {
            value.checked_sub(self.bias.unsigned_abs())
        } else {
            value.checked_add(self.bias.unsigned_abs())
        }
    }

    /// Function containing `file_addr` and the offset into it.
    ///
    /// A symbol with no recorded size is taken to extend up to the next symbol.
    pub fn lookup(&self, file_addr: u64) -> Option<(&str, u64)>
    {
        let idx = self.symbols.partition_point(|symbol| symbol.address <= file_addr);
        let symbol = self.symbols.get(idx.checked_sub(1)?)?;
        let offset = file_addr - symbol.address;
        let within = if symbol.size > 0 {
            offset < symbol.size
        } else {
            self.symbols.get(idx).map_or(true, |next| file_addr < next.address)
        };
        within.then_some((&*symbol.name, offset))
    }

    /// Build the line table if it does not exist yet.
    ///
    /// Images without DWARF get an empty table.
    pub fn prepare_line_info(&self) -> &LineTable
    {
        self.line_table.get_or_init(|| {
            if !self.has_line_info() {
                return LineTable::default();
            }
            let Ok(dwarf) = Dwarf::load(|section| Ok::<_, gimli::Error>(self.section_reader(section))) else {
                return LineTable::default();
            };
            match Context::from_dwarf(dwarf) {
                Ok(ctx) => LineTable::build(&ctx),
                Err(_) => LineTable::default(),
            }
        })
    }

    /// The line table, if it has been built.
    ///
    /// Never builds anything, so it is safe on the emergency path.
    pub fn line_table(&self) -> Option<&LineTable>
    {
        self.line_table.get()
    }

    /// Source file and line for `file_addr`, if the line table has been built.
    pub fn location(&self, file_addr: u64) -> Option<(&str, u32)>
    {
        self.line_table()?.lookup(file_addr)
    }

    fn section_reader(&self, id: SectionId) -> OwnedReader
    {
        let data = self
            .debug_sections
            .get(id.name())
            .cloned()
            .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
        EndianArcSlice::new(data, self.endian)
    }
}
