use std::fmt;

/// Failures a [`RemoteAccess`](crate::port::RemoteAccess) operation can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The server could not be reached at all.
    #[error("unable to connect to {url}. Check the URL and network connectivity")]
    Unreachable { url: String },

    /// HTTP 401.
    #[error("authentication failed. Check your token or credentials")]
    Unauthorized,

    /// HTTP 403.
    #[error("permission denied. This operation requires a System Administrator account")]
    Forbidden,

    /// HTTP 404 on a lookup that is not a team-name resolution.
    #[error("the requested resource was not found")]
    NotFound,

    /// Team-name resolution found no such team.
    #[error("team {name:?} not found. Please check the name and try again")]
    TeamNotFound { name: String },

    /// HTTP 5xx.
    #[error(
        "the Mattermost server returned an unexpected error (HTTP {status}). Check server logs for details"
    )]
    Server { status: u16 },

    /// Any other non-success HTTP status.
    #[error("API request failed (HTTP {status})")]
    Status { status: u16 },

    /// The request failed before a response arrived.
    #[error("API request failed: {0}")]
    Request(String),

    /// The response body did not match the expected shape.
    #[error("failed to decode API response: {0}")]
    Decode(String),
}

impl PortError {
    /// Classify a non-success HTTP status code.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500.. => Self::Server { status },
            _ => Self::Status { status },
        }
    }

    /// HTTP status behind this error, if it came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound | Self::TeamNotFound { .. } => Some(404),
            Self::Server { status } | Self::Status { status } => Some(*status),
            Self::Unreachable { .. } | Self::Request(_) | Self::Decode(_) => None,
        }
    }
}

/// A failure confined to one guest's enrichment.
///
/// The display string is what ends up in the guest record's error field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuestError {
    #[error("failed to get teams: {0}")]
    Teams(#[source] PortError),

    #[error("failed to get channels for team {team:?}: {source}")]
    Channels {
        team: String,
        #[source]
        source: PortError,
    },
}

/// Errors that abort an entire audit run. No result is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// The team filter could not be resolved.
    #[error("{source}")]
    Configuration {
        team: String,
        #[source]
        source: PortError,
    },

    /// A page of guest accounts could not be fetched.
    #[error("{source}")]
    Transport {
        page: u32,
        #[source]
        source: PortError,
    },
}

impl AuditError {
    /// The outcome a caller should report for this error.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::Configuration { .. } => Outcome::ConfigurationError,
            Self::Transport { .. } => Outcome::TransportError,
        }
    }
}

/// Classification of a finished (or aborted) audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    ConfigurationError,
    TransportError,
    PartialFailure,
}

impl Outcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::ConfigurationError => 1,
            Self::TransportError => 2,
            Self::PartialFailure => 3,
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "Audit completed",
            Self::ConfigurationError => "Configuration error",
            Self::TransportError => "API error",
            Self::PartialFailure => "Audit completed with failed guest lookups",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::Success => None,
            Self::ConfigurationError => {
                Some("Check --url, credentials and --team, then retry.")
            }
            Self::TransportError => Some("Check network connectivity and server logs, then retry."),
            Self::PartialFailure => Some("Re-run with --verbose to see which guests failed."),
        }
    }

    /// Stable identifier for machine-readable error output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ConfigurationError => "configuration_error",
            Self::TransportError => "transport_error",
            Self::PartialFailure => "partial_failure",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn status_classification() {
        assert_eq!(PortError::from_status(401), PortError::Unauthorized);
        assert_eq!(PortError::from_status(403), PortError::Forbidden);
        assert_eq!(PortError::from_status(404), PortError::NotFound);
        assert_eq!(
            PortError::from_status(502),
            PortError::Server { status: 502 }
        );
        assert_eq!(
            PortError::from_status(429),
            PortError::Status { status: 429 }
        );
    }

    #[test]
    fn status_messages() {
        let cases = [
            (401, "authentication failed"),
            (403, "permission denied"),
            (404, "not found"),
            (500, "unexpected error (HTTP 500)"),
            (502, "unexpected error (HTTP 502)"),
            (429, "API request failed (HTTP 429)"),
        ];
        for (status, want) in cases {
            let msg = PortError::from_status(status).to_string();
            assert!(msg.contains(want), "{status}: {msg:?} should contain {want:?}");
        }
    }

    #[test]
    fn status_round_trips_for_http_errors() {
        for status in [401, 403, 404, 418, 503] {
            assert_eq!(PortError::from_status(status).status(), Some(status));
        }
        assert_eq!(PortError::Request("boom".into()).status(), None);
    }

    #[test]
    fn guest_error_messages_carry_context() {
        let err = GuestError::Channels {
            team: "Sales".into(),
            source: PortError::Forbidden,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to get channels for team \"Sales\""));
        assert!(msg.contains("permission denied"));

        let err = GuestError::Teams(PortError::Server { status: 500 });
        assert!(err.to_string().starts_with("failed to get teams: "));
    }

    #[test]
    fn audit_error_maps_to_outcome() {
        let config = AuditError::Configuration {
            team: "ghost".into(),
            source: PortError::TeamNotFound {
                name: "ghost".into(),
            },
        };
        assert_eq!(config.outcome(), Outcome::ConfigurationError);
        assert!(config.to_string().contains("\"ghost\" not found"));

        let transport = AuditError::Transport {
            page: 1,
            source: PortError::Server { status: 500 },
        };
        assert_eq!(transport.outcome(), Outcome::TransportError);
    }

    #[test]
    fn exit_codes_are_unique() {
        let all = [
            Outcome::Success,
            Outcome::ConfigurationError,
            Outcome::TransportError,
            Outcome::PartialFailure,
        ];
        let mut seen = HashSet::new();
        for outcome in all {
            assert!(seen.insert(outcome.exit_code()), "duplicate code for {outcome}");
        }
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert!(Outcome::Success.hint().is_none());
    }
}
