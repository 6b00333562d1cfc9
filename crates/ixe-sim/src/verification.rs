//! Verification helpers over the simulated device's call log
//!
//! Provides queries and ordering assertions on the requests a test issued

use ixe_api::{ObjectPath, Request};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Expected '{command}' on '{object}' was never issued")]
    CommandNotIssued { object: String, command: String },

    #[error("Expected '{first}' before '{second}'")]
    OutOfOrder { first: String, second: String },

    #[error("Unexpected request '{request}'")]
    UnexpectedRequest { request: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Snapshot of the requests received by a simulated device, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    requests: Vec<Request>,
}

impl CallLog {
    pub fn new(requests: Vec<Request>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Command lines in arrival order
    pub fn lines(&self) -> Vec<String> {
        self.requests.iter().map(ToString::to_string).collect()
    }

    /// Requests addressed to one object
    pub fn on<'a>(&'a self, object: &'a ObjectPath) -> impl Iterator<Item = &'a Request> {
        self.requests.iter().filter(move |r| r.path() == object)
    }

    /// Verbs issued on one object, in order (`invoke` commands by name)
    pub fn commands_on(&self, object: &ObjectPath) -> Vec<String> {
        self.on(object).map(|r| r.verb().to_string()).collect()
    }

    /// Returns true if `command` was invoked on `object`
    pub fn invoked(&self, object: &ObjectPath, command: &str) -> bool {
        self.position_of(object, command).is_some()
    }

    /// Number of times `command` was invoked on any object
    pub fn count_invoked(&self, command: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| matches!(r, Request::Invoke { command: c, .. } if c == command))
            .count()
    }

    /// Index of the first invocation of `command` on `object`
    pub fn position_of(&self, object: &ObjectPath, command: &str) -> Option<usize> {
        self.requests.iter().position(|r| {
            matches!(r, Request::Invoke { path, command: c, .. } if path == object && c == command)
        })
    }

    /// Returns true if any request touched `object`
    pub fn touched(&self, object: &ObjectPath) -> bool {
        self.on(object).next().is_some()
    }

    /// Verify that the given invocations happened in this order
    pub fn assert_order(&self, expected: &[(&ObjectPath, &str)]) -> VerifyResult<()> {
        let mut previous: Option<(usize, String)> = None;
        for (object, command) in expected {
            let label = format!("{} {}", object, command);
            let position =
                self.position_of(object, command)
                    .ok_or_else(|| VerificationError::CommandNotIssued {
                        object: object.to_string(),
                        command: command.to_string(),
                    })?;
            if let Some((prev_position, prev_label)) = &previous {
                if position < *prev_position {
                    return Err(VerificationError::OutOfOrder {
                        first: prev_label.clone(),
                        second: label,
                    });
                }
            }
            previous = Some((position, label));
        }
        Ok(())
    }

    /// Verify that no request touched `object`
    pub fn assert_untouched(&self, object: &ObjectPath) -> VerifyResult<()> {
        match self.on(object).next() {
            Some(request) => Err(VerificationError::UnexpectedRequest {
                request: request.to_string(),
            }),
            None => Ok(()),
        }
    }
}
