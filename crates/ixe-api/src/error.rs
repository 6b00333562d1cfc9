//! Device error classes.
//!
//! Every [`DeviceApi`](crate::DeviceApi) implementation must classify its
//! failures into one of three classes. The topology client relies on the
//! distinction: `NotFound` is an expected probe outcome, `CommandFailed` is
//! a remote rejection, and `TransportFailure` means the device could not be
//! reached (or did not answer in time).

use thiserror::Error;

use crate::path::Request;

/// Result type alias for device calls.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by the device control API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The addressed object or index does not exist.
    #[error("No such object: '{command}': {message}")]
    NotFound {
        /// The command that was attempted.
        command: String,
        /// Device supplied detail.
        message: String,
    },

    /// The device rejected the command.
    #[error("Command failed: '{command}': {message}")]
    CommandFailed {
        /// The command that was attempted.
        command: String,
        /// Device supplied detail.
        message: String,
    },

    /// The device could not be reached or did not answer.
    #[error("Transport failure during '{command}'{}: {message}", timeout_suffix(*.timed_out))]
    TransportFailure {
        /// The command that was attempted.
        command: String,
        /// Transport supplied detail.
        message: String,
        /// True when the failure was a timeout.
        timed_out: bool,
    },
}

fn timeout_suffix(timed_out: bool) -> &'static str {
    if timed_out {
        " (timed out)"
    } else {
        ""
    }
}

impl DeviceError {
    /// Creates a not-found error for a request.
    pub fn not_found(request: &Request, message: impl Into<String>) -> Self {
        Self::NotFound {
            command: request.to_string(),
            message: message.into(),
        }
    }

    /// Creates a command-failed error for a request.
    pub fn command_failed(request: &Request, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: request.to_string(),
            message: message.into(),
        }
    }

    /// Creates a transport error for a request.
    pub fn transport(request: &Request, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            command: request.to_string(),
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates a timeout error for a request.
    pub fn timeout(request: &Request, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            command: request.to_string(),
            message: message.into(),
            timed_out: true,
        }
    }

    /// Returns the command line that failed.
    pub fn command(&self) -> &str {
        match self {
            DeviceError::NotFound { command, .. }
            | DeviceError::CommandFailed { command, .. }
            | DeviceError::TransportFailure { command, .. } => command,
        }
    }

    /// Returns true for the expected outcome of probing an empty index.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DeviceError::NotFound { .. })
    }

    /// Returns true if the device rejected the command.
    pub fn is_command_failed(&self) -> bool {
        matches!(self, DeviceError::CommandFailed { .. })
    }

    /// Returns true for connectivity failures, including timeouts.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, DeviceError::TransportFailure { .. })
    }

    /// Returns true if the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DeviceError::TransportFailure {
                timed_out: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ObjectPath;
    use ixe_types::CardAddress;

    fn card_probe() -> Request {
        Request::invoke(&ObjectPath::card(CardAddress::new(1, 2)), "get", &[])
    }

    #[test]
    fn test_error_display() {
        let err = DeviceError::not_found(&card_probe(), "no card in slot");
        assert_eq!(
            err.to_string(),
            "No such object: 'card get 1 2': no card in slot"
        );
        assert_eq!(err.command(), "card get 1 2");
    }

    #[test]
    fn test_timeout_display() {
        let err = DeviceError::timeout(&card_probe(), "no reply after 30s");
        assert!(err.to_string().contains("(timed out)"));
        let err = DeviceError::transport(&card_probe(), "connection reset");
        assert!(!err.to_string().contains("timed out"));
    }

    #[test]
    fn test_classification() {
        let req = card_probe();
        assert!(DeviceError::not_found(&req, "").is_not_found());
        assert!(DeviceError::command_failed(&req, "").is_command_failed());
        assert!(DeviceError::transport(&req, "").is_transport_failure());
        assert!(!DeviceError::transport(&req, "").is_timeout());
        assert!(DeviceError::timeout(&req, "").is_transport_failure());
        assert!(DeviceError::timeout(&req, "").is_timeout());
        assert!(!DeviceError::command_failed(&req, "").is_transport_failure());
    }
}
