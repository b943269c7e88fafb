use std::error::Error as StdError;
use std::io::ErrorKind;

use super::RequestError;

fn error_chain_matches(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

/// Turns a transport-level `reqwest` failure into a `RequestError` whose
/// message tells the user what to check.
pub(crate) fn network_error(err: reqwest::Error, api_url: &str) -> RequestError {
    let message = if err.is_timeout() || error_chain_has_timeout(&err) {
        format!(
            "Request to '{}' timed out. Check network connectivity and try again.",
            api_url
        )
    } else if err.is_connect() && error_chain_has_connection_refused(&err) {
        format!(
            "Connection refused by '{}'. Check the provider base_url in your settings.",
            api_url
        )
    } else if err.is_connect() {
        format!(
            "Failed to connect to '{}'. Check the provider base_url and network connectivity.",
            api_url
        )
    } else {
        format!("Failed to call '{}': {}", api_url, err)
    };

    RequestError::Network {
        url: api_url.to_string(),
        message,
    }
}
