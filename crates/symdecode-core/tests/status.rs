//! Tests for decoder status codes

use symdecode_core::{is_error, DecoderStatus};

#[test]
fn test_is_error_matches_code_ordering()
{
    for status in DecoderStatus::ALL {
        assert_eq!(is_error(status), status > DecoderStatus::NoError, "{status}");
    }
}

#[test]
fn test_not_available_and_no_error_are_not_errors()
{
    assert!(!is_error(DecoderStatus::NotAvailable));
    assert!(!is_error(DecoderStatus::NoError));
}

#[test]
fn test_failures_are_errors()
{
    for status in [
        DecoderStatus::OutOfMemory,
        DecoderStatus::FileInvalid,
        DecoderStatus::FileNotFound,
        DecoderStatus::HelperFuncError,
        DecoderStatus::HelperInitError,
    ] {
        assert!(is_error(status), "{status}");
    }
}

#[test]
fn test_codes_are_stable()
{
    assert_eq!(DecoderStatus::NotAvailable.code(), -10);
    assert_eq!(DecoderStatus::NoError.code(), 0);
    assert_eq!(DecoderStatus::HelperInitError.code(), 5);
    assert_eq!(DecoderStatus::from_code(42), None);
}
