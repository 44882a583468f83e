//! # Decoder Status
//!
//! Status codes shared by every decoder backend.
//!
//! A status describes the health of a backend as a whole, not the outcome of a
//! single lookup. A healthy backend can still fail to find a given address;
//! that is reported through the boolean result of the operation.
//!
//! ## Ordering
//!
//! Codes are ordered by their numeric value. Anything strictly greater than
//! [`DecoderStatus::NoError`] is an error. [`DecoderStatus::NotAvailable`] sits
//! below zero: it means "there is no real backend", which is a normal state
//! and not a failure of a backend that exists.

use std::cmp::Ordering;
use std::fmt;

/// Status code for native frame decoding.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderStatus
{
    /// No real decoder is available (null backend).
    NotAvailable = -10,
    /// No error encountered.
    NoError = 0,
    /// Ran out of memory, or an image exceeded the configured size limit.
    OutOfMemory = 1,
    /// A symbol file exists but could not be parsed.
    FileInvalid = 2,
    /// A symbol file could not be found.
    FileNotFound = 3,
    /// A helper routine required for decoding is missing.
    HelperFuncError = 4,
    /// A helper facility failed to initialise (module map, construction).
    HelperInitError = 5,
}

impl DecoderStatus
{
    /// Every status, in ascending code order.
    pub const ALL: [DecoderStatus; 7] = [
        DecoderStatus::NotAvailable,
        DecoderStatus::NoError,
        DecoderStatus::OutOfMemory,
        DecoderStatus::FileInvalid,
        DecoderStatus::FileNotFound,
        DecoderStatus::HelperFuncError,
        DecoderStatus::HelperInitError,
    ];

    /// Numeric code of this status.
    pub const fn code(self) -> i32
    {
        self as i32
    }

    /// Map a numeric code back to a status.
    ///
    /// Returns `None` for codes that do not correspond to any status.
    pub const fn from_code(code: i32) -> Option<Self>
    {
        match code {
            -10 => Some(DecoderStatus::NotAvailable),
            0 => Some(DecoderStatus::NoError),
            1 => Some(DecoderStatus::OutOfMemory),
            2 => Some(DecoderStatus::FileInvalid),
            3 => Some(DecoderStatus::FileNotFound),
            4 => Some(DecoderStatus::HelperFuncError),
            5 => Some(DecoderStatus::HelperInitError),
            _ => None,
        }
    }

    /// `true` if this status is an error, i.e. its code is above `NoError`.
    pub const fn is_error(self) -> bool
    {
        self.code() > DecoderStatus::NoError.code()
    }

    /// Lower-case name used in diagnostic dumps.
    pub const fn as_str(self) -> &'static str
    {
        match self {
            DecoderStatus::NotAvailable => "not_available",
            DecoderStatus::NoError => "no_error",
            DecoderStatus::OutOfMemory => "out_of_memory",
            DecoderStatus::FileInvalid => "file_invalid",
            DecoderStatus::FileNotFound => "file_not_found",
            DecoderStatus::HelperFuncError => "helper_func_error",
            DecoderStatus::HelperInitError => "helper_init_error",
        }
    }
}

/// Free-function form of [`DecoderStatus::is_error`].
pub const fn is_error(status: DecoderStatus) -> bool
{
    status.is_error()
}

impl PartialOrd for DecoderStatus
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering>
    {
        Some(self.cmp(other))
    }
}

impl Ord for DecoderStatus
{
    fn cmp(&self, other: &Self) -> Ordering
    {
        self.code().cmp(&other.code())
    }
}

impl fmt::Display for DecoderStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_codes_round_trip_through_from_code()
    {
        for status in DecoderStatus::ALL {
            assert_eq!(DecoderStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(DecoderStatus::from_code(-1), None);
        assert_eq!(DecoderStatus::from_code(6), None);
    }

    #[test]
    fn test_ordering_follows_codes()
    {
        assert!(DecoderStatus::NotAvailable < DecoderStatus::NoError);
        assert!(DecoderStatus::NoError < DecoderStatus::OutOfMemory);
        assert!(DecoderStatus::FileNotFound < DecoderStatus::HelperInitError);
    }

    #[test]
    fn test_display_uses_snake_case_names()
    {
        assert_eq!(DecoderStatus::NotAvailable.to_string(), "not_available");
        assert_eq!(DecoderStatus::HelperInitError.to_string(), "helper_init_error");
    }
}
