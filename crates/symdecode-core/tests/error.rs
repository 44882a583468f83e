//! Tests for error handling

use std::io;
use std::path::PathBuf;

use symdecode_core::error::{DecoderError, DecoderResult};
use symdecode_core::DecoderStatus;

#[test]
fn test_file_not_found_message()
{
    let error = DecoderError::FileNotFound(PathBuf::from("/lib/libfoo.so"));
    let message = format!("{}", error);
    assert!(message.contains("not found"));
    assert!(message.contains("/lib/libfoo.so"));
}

#[test]
fn test_file_invalid_message()
{
    let error = DecoderError::FileInvalid {
        path: PathBuf::from("/tmp/junk"),
        reason: "bad magic".to_string(),
    };
    let message = format!("{}", error);
    assert!(message.contains("/tmp/junk"));
    assert!(message.contains("bad magic"));
}

#[test]
fn test_image_too_large_message()
{
    let error = DecoderError::ImageTooLarge {
        path: PathBuf::from("/big"),
        size: 4096,
        limit: 1024,
    };
    let message = format!("{}", error);
    assert!(message.contains("4096"));
    assert!(message.contains("1024"));
}

#[test]
fn test_status_mapping()
{
    assert_eq!(DecoderError::FileNotFound(PathBuf::new()).status(), DecoderStatus::FileNotFound);
    assert_eq!(
        DecoderError::FileInvalid {
            path: PathBuf::new(),
            reason: String::new()
        }
        .status(),
        DecoderStatus::FileInvalid
    );
    assert_eq!(
        DecoderError::ImageTooLarge {
            path: PathBuf::new(),
            size: 2,
            limit: 1
        }
        .status(),
        DecoderStatus::OutOfMemory
    );
    assert_eq!(DecoderError::ModuleMap("gone".to_string()).status(), DecoderStatus::HelperInitError);
    assert_eq!(DecoderError::ConstructionPanicked.status(), DecoderStatus::HelperInitError);
    assert_eq!(DecoderError::Unsupported.status(), DecoderStatus::NotAvailable);
    assert_eq!(DecoderError::Disabled.status(), DecoderStatus::NotAvailable);
}

#[test]
fn test_disabled_and_unsupported_are_not_errors()
{
    assert!(!DecoderError::Disabled.status().is_error());
    assert!(!DecoderError::Unsupported.status().is_error());
}

#[test]
fn test_io_error_conversion()
{
    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let decoder_error: DecoderError = io_error.into();

    match decoder_error {
        DecoderError::Io(_) => {}
        _ => panic!("Expected Io variant"),
    }
    assert_eq!(decoder_error.status(), DecoderStatus::FileNotFound);

    let denied: DecoderError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
    assert_eq!(denied.status(), DecoderStatus::FileInvalid);
}

#[test]
fn test_result_type()
{
    fn returns_result() -> DecoderResult<i32>
    {
        Ok(42)
    }

    fn returns_error() -> DecoderResult<i32>
    {
        Err(DecoderError::Unsupported)
    }

    assert_eq!(returns_result().unwrap(), 42);
    assert!(returns_error().is_err());
}
