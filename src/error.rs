use thiserror::Error;

use crate::config::Provider;

/// Failures inside the streaming adapter.
///
/// These never reach the caller as errors. The `Display` text becomes the
/// final fragment of the reply stream.
#[derive(Error, Debug)]
pub enum StreamError {
    /// No credential stored for the selected provider
    #[error("{} is not configured. Please add an API key in the settings first.", .0.display_name())]
    NotConfigured(Provider),

    /// Nothing to send
    #[error("Error: there is no message to send")]
    EmptyHistory,

    /// The request could not be sent or the connection dropped before a response
    #[error("Error: request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("Error: {status}")]
    Status { status: reqwest::StatusCode },

    /// The response body stream broke mid-read
    #[error("Error: unable to read response stream: {0}")]
    Body(String),

    /// An incremental envelope was not valid JSON
    #[error("Error: malformed response chunk: {0}")]
    Malformed(String),

    /// The provider reported an error inside the stream
    #[error("API Error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            StreamError::Status { status }
        } else if err.is_body() || err.is_decode() {
            StreamError::Body(err.to_string())
        } else {
            StreamError::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_carries_code_and_reason() {
        let err = StreamError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(err.to_string(), "Error: 500 Internal Server Error");
    }

    #[test]
    fn not_configured_names_the_provider() {
        let message = StreamError::NotConfigured(Provider::Zhipu).to_string();
        assert!(message.starts_with("ZhipuAI is not configured"));
    }
}
