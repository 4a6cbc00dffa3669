//! Error types for the TargetingGates adapters.
//!
//! Fallible functions return `Result<T, Report<AdapterError>>` so callers can
//! attach context with [`error_stack::ResultExt::change_context`].

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum AdapterError {
    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// A bid reached the request builder without the parameters the
    /// validity predicate requires.
    #[display("Invalid bid params for {bidder}: {message}")]
    InvalidBidParams { bidder: String, message: String },

    /// An outbound wire request could not be assembled.
    #[display("Failed to build request: {message}")]
    RequestBuild { message: String },

    /// An exchange response could not be decoded.
    #[display("Failed to parse exchange response: {message}")]
    ResponseParse { message: String },

    /// The logger could not be installed.
    #[display("Logging error: {message}")]
    Logging { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::{Report, ResultExt};

    #[test]
    fn display_includes_bidder_and_message() {
        let err = AdapterError::InvalidBidParams {
            bidder: "tg".to_string(),
            message: "missing ct".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid bid params for tg: missing ct");
    }

    #[test]
    fn change_context_keeps_outer_error() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let report: Report<AdapterError> = result
            .change_context(AdapterError::ResponseParse {
                message: "bad body".to_string(),
            })
            .expect_err("should fail to parse");

        assert!(matches!(
            report.current_context(),
            AdapterError::ResponseParse { .. }
        ));
        assert!(format!("{report:?}").contains("bad body"));
    }
}
