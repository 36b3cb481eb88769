//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::time::Duration;

use gifify::{ConvertError, MediaSource};

#[test]
fn open_nonexistent_file() {
    let result = MediaSource::open("this_file_does_not_exist.mp4");
    assert!(result.is_err());

    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("Failed to open media source"),
        "Error message should mention the failed open: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    // A file with garbage content must fail during the probe, not later.
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = MediaSource::open(&invalid_file_path);
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn error_messages_are_descriptive() {
    assert_eq!(
        ConvertError::NoSourceLoaded.to_string(),
        "No video source loaded"
    );
    assert_eq!(
        ConvertError::Cancelled.to_string(),
        "Conversion cancelled"
    );
    assert!(
        ConvertError::InvalidDuration(0.0)
            .to_string()
            .contains("0 seconds")
    );
    assert!(
        ConvertError::EncodeStalled {
            waited: Duration::from_secs(30),
        }
        .to_string()
        .contains("30s")
    );
}

#[test]
fn io_errors_convert() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: ConvertError = io_error.into();
    assert!(matches!(error, ConvertError::Io(_)));
    assert!(error.to_string().contains("denied"));
}

#[test]
fn ffmpeg_errors_convert() {
    let error: ConvertError = ffmpeg_next::Error::StreamNotFound.into();
    assert!(matches!(error, ConvertError::Ffmpeg(_)));
    assert!(error.to_string().starts_with("FFmpeg error"));
}
