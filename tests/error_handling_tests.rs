use gnssconf::{GnssConfError, GnssConfResult, LineTerminator};
use std::error::Error;

/// Error handling tests
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let errors = vec![
            GnssConfError::UnsupportedPlatform,
            GnssConfError::DeviceSelectionCancelled,
            GnssConfError::OpenFailure { message: "busy".to_string() },
            GnssConfError::WriteFailure { message: "unplugged".to_string() },
            GnssConfError::NotConnected,
            GnssConfError::ConcurrentSendRejected,
            GnssConfError::EmptyBatch,
            GnssConfError::Interrupted,
            GnssConfError::ConfigLoadFailure {
                location: "conf_files/rover.txt".to_string(),
                message: "HTTP 404".to_string(),
            },
            GnssConfError::InvalidInput("Invalid input".to_string()),
            GnssConfError::Tui("TUI error".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty(), "Error display should not be empty");
        }

        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GnssConfError>();
    }

    #[test]
    fn test_io_error_conversion_keeps_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Access denied");
        let error: GnssConfError = io_error.into();
        assert!(matches!(error, GnssConfError::Io(_)));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_only_cancellation_is_silent() {
        assert!(GnssConfError::DeviceSelectionCancelled.is_silent());
        assert!(!GnssConfError::Interrupted.is_silent());
        assert!(!GnssConfError::EmptyBatch.is_silent());
    }

    #[test]
    fn test_terminator_error_propagates() {
        fn parse(raw: &str) -> GnssConfResult<LineTerminator> {
            Ok(raw.parse::<LineTerminator>()?)
        }

        assert_eq!(parse("crlf").unwrap(), LineTerminator::CrLf);
        match parse("\\t") {
            Err(GnssConfError::InvalidTerminator(raw)) => assert_eq!(raw, "\\t"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_async_error_propagation() {
        async fn failing() -> GnssConfResult<()> {
            Err(GnssConfError::WriteFailure {
                message: "device unplugged".to_string(),
            })
        }

        async fn calling() -> GnssConfResult<()> {
            failing().await?;
            Ok(())
        }

        let error = calling().await.unwrap_err();
        assert_eq!(error.to_string(), "Write error: device unplugged");
    }

    #[test]
    fn test_error_size() {
        let error_size = std::mem::size_of::<GnssConfError>();
        assert!(error_size <= 128, "GnssConfError too large: {} bytes", error_size);
    }
}
