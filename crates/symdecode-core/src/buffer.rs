//! # Output Buffers
//!
//! Caller-supplied, NUL-terminated output buffers.
//!
//! Decoders write names and file paths into byte slices owned by the caller
//! rather than returning `String`s, so the emergency path never needs the
//! heap. The only format contract is:
//!
//! - a buffer of length `n >= 1` holds at most `n - 1` bytes of text followed
//!   by a NUL terminator;
//! - text longer than that is truncated silently, never mid-character;
//! - nothing is ever written past `n` bytes.
//!
//! ## Example
//!
//! ```rust
//! use symdecode_core::buffer::{read_cstr, write_cstr};
//!
//! let mut buf = [0u8; 8];
//! assert!(write_cstr(&mut buf, "frobnicate"));
//! assert_eq!(read_cstr(&buf), "frobnic");
//! ```

use std::fmt;

/// Truncating `fmt::Write` sink over a byte buffer.
///
/// The buffer is kept NUL-terminated after every write, so the text seen by
/// the caller is always well formed even if formatting stops early.
pub struct CBuf<'a>
{
    buf: &'a mut [u8],
    len: usize,
    truncated: bool,
}

impl<'a> CBuf<'a>
{
    /// Wrap `buf`. Returns `None` for an empty buffer, which cannot even hold
    /// the terminator.
    ///
    /// Creating the sink does not touch the buffer.
    pub fn new(buf: &'a mut [u8]) -> Option<Self>
    {
        if buf.is_empty() {
            return None;
        }
        Some(Self {
            buf,
            len: 0,
            truncated: false,
        })
    }

    /// Number of text bytes written so far (excluding the terminator).
    pub fn len(&self) -> usize
    {
        self.len
    }

    /// `true` if no text has been written.
    pub fn is_empty(&self) -> bool
    {
        self.len == 0
    }

    /// `true` if some text did not fit.
    pub fn is_truncated(&self) -> bool
    {
        self.truncated
    }

    /// Terminate the buffer and return the text length.
    pub fn finish(self) -> usize
    {
        self.buf[self.len] = 0;
        self.len
    }
}

impl fmt::Write for CBuf<'_>
{
    fn write_str(&mut self, s: &str) -> fmt::Result
    {
        if self.truncated {
            return Ok(());
        }

        let room = self.buf.len() - 1 - self.len;
        let take = if s.len() <= room {
            s.len()
        } else {
            self.truncated = true;
            let mut cut = room;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            cut
        };

        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        self.buf[self.len] = 0;
        Ok(())
    }
}

/// Copy `text` into `buf` as a NUL-terminated string, truncating if needed.
///
/// Returns `false` only when `buf` is empty.
pub fn write_cstr(buf: &mut [u8], text: &str) -> bool
{
    let Some(mut out) = CBuf::new(buf) else {
        return false;
    };
    let _ = fmt::Write::write_str(&mut out, text);
    out.finish();
    true
}

/// Read the text in front of the first NUL.
///
/// Invalid UTF-8 is cut at the first bad byte; a buffer without a NUL is read
/// in full.
pub fn read_cstr(buf: &[u8]) -> &str
{
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    match std::str::from_utf8(&buf[..end]) {
        Ok(text) => text,
        Err(err) => std::str::from_utf8(&buf[..err.valid_up_to()]).unwrap_or_default(),
    }
}
