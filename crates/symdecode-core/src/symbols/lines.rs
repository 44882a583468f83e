//! Flattened DWARF line table.
//!
//! `addr2line::Context` parses units lazily through interior mutability, so
//! it can neither be shared across threads nor queried without side effects.
//! A [`LineTable`] is built from a context once and afterwards is a plain
//! sorted array: lookups are a binary search with no locking, no allocation
//! and no lazy state, which is what the emergency path needs.

use std::collections::HashMap;

use addr2line::Context;
use gimli::Reader;

/// One address range that maps to a single file and line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineRow
{
    start: u64,
    len: u64,
    file: u32,
    line: u32,
}

/// Address-to-line lookup table for one image, keyed by file address.
#[derive(Debug, Clone, Default)]
pub struct LineTable
{
    rows: Vec<LineRow>,
    files: Vec<Box<str>>,
}

impl LineTable
{
    /// Flatten every line row reachable from `ctx`.
    ///
    /// Rows without a file or line number are dropped. A DWARF error stops
    /// the walk; whatever was collected so far is kept.
    pub fn build<R: Reader>(ctx: &Context<R>) -> Self
    {
        let Ok(iter) = ctx.find_location_range(0, u64::MAX) else {
            return Self::default();
        };

        let mut builder = LineTableBuilder::default();
        for (start, len, location) in iter {
            if let (Some(file), Some(line)) = (location.file, location.line) {
                builder.push(start, len, file, line);
            }
        }
        builder.finish()
    }

    /// Build a table from `(start, len, file, line)` rows.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = (u64, u64, &'a str, u32)>) -> Self
    {
        let mut builder = LineTableBuilder::default();
        for (start, len, file, line) in rows {
            builder.push(start, len, file, line);
        }
        builder.finish()
    }

    /// Number of rows.
    pub fn len(&self) -> usize
    {
        self.rows.len()
    }

    /// `true` if the table holds no rows.
    pub fn is_empty(&self) -> bool
    {
        self.rows.is_empty()
    }

    /// File and line covering `file_addr`.
    pub fn lookup(&self, file_addr: u64) -> Option<(&str, u32)>
    {
        let idx = self.rows.partition_point(|row| row.start <= file_addr);
        let row = self.rows.get(idx.checked_sub(1)?)?;
        if file_addr - row.start >= row.len {
            return None;
        }
        let file = self.files.get(row.file as usize)?;
        Some((file, row.line))
    }
}

#[derive(Default)]
struct LineTableBuilder
{
    rows: Vec<LineRow>,
    files: Vec<Box<str>>,
    file_ids: HashMap<String, u32>,
}

impl LineTableBuilder
{
    fn push(&mut self, start: u64, len: u64, file: &str, line: u32)
    {
        if len == 0 {
            return;
        }
        let id = if let Some(&id) = self.file_ids.get(file) {
            id
        } else {
            let Ok(id) = u32::try_from(self.files.len()) else {
                return;
            };
            self.files.push(file.into());
            self.file_ids.insert(file.to_string(), id);
            id
        };
        self.rows.push(LineRow { start, len, file: id, line });
    }

    fn finish(mut self) -> LineTable
    {
        self.rows.sort_by_key(|row| row.start);
        self.rows.dedup_by_key(|row| row.start);
        self.rows.shrink_to_fit();
        LineTable {
            rows: self.rows,
            files: self.files,
        }
    }
}
