//! Accounts and scopes read from the server, and the records an audit
//! produces from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::from_epoch_millis;

/// A user account as returned by the guest listing.
///
/// Timestamps are epoch milliseconds; `0` means the event never happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub create_at: i64,
    pub last_activity_at: i64,
    pub delete_at: i64,
}

impl User {
    /// Given and family name combined, see [`build_display_name`].
    #[must_use]
    pub fn display_name(&self) -> String {
        build_display_name(&self.first_name, &self.last_name)
    }

    /// An account is enabled iff it carries no deactivation timestamp.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.delete_at == 0
    }
}

/// A team as returned by team lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// A channel as returned by channel-membership lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// A team a guest belongs to, after team filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamRef {
    pub id: String,
    pub display_name: String,
}

impl From<&Team> for TeamRef {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.clone(),
            display_name: team.display_name.clone(),
        }
    }
}

/// A channel a guest can access, labelled with its owning team's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRef {
    #[serde(rename = "team")]
    pub team_name: String,
    #[serde(rename = "channel")]
    pub channel_name: String,
}

/// Audit findings for one guest account.
///
/// When `error` is set the record is a stub: only the identity fields,
/// `created_at` and `active` are meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRecord {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_post: Option<DateTime<Utc>>,
    pub teams: Vec<TeamRef>,
    pub channels: Vec<ChannelRef>,
    /// Account enabled (not deactivated).
    pub active: bool,
    /// Flagged by the inactivity threshold.
    pub inactive: bool,
    pub error: Option<String>,
}

impl GuestRecord {
    /// Stub record for a guest whose enrichment failed.
    #[must_use]
    pub fn failed(user: &User, error: impl Into<String>) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name(),
            email: user.email.clone(),
            created_at: from_epoch_millis(user.create_at),
            last_login: None,
            last_post: None,
            teams: Vec::new(),
            channels: Vec::new(),
            active: user.is_enabled(),
            inactive: false,
            error: Some(error.into()),
        }
    }

    /// `true` if enrichment failed for this guest.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Status bucket, or `None` for failed records.
    #[must_use]
    pub const fn status(&self) -> Option<GuestStatus> {
        if self.is_failed() {
            return None;
        }
        Some(GuestStatus::of(self.active, self.inactive))
    }
}

/// The status word shown for a guest. Deactivation beats inactivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GuestStatus {
    Active,
    Inactive,
    Deactivated,
}

impl GuestStatus {
    #[must_use]
    pub const fn of(enabled: bool, inactive: bool) -> Self {
        if !enabled {
            Self::Deactivated
        } else if inactive {
            Self::Inactive
        } else {
            Self::Active
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Deactivated => "Deactivated",
        }
    }
}

/// Aggregate counts over an audit's records.
///
/// `total_guests == active_guests + inactive_guests + deactivated_guests + failed_lookups`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub total_guests: usize,
    pub active_guests: usize,
    pub inactive_guests: usize,
    pub deactivated_guests: usize,
    pub failed_lookups: usize,
}

impl AuditSummary {
    /// Count every record into exactly one bucket.
    #[must_use]
    pub fn tally(records: &[GuestRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total_guests += 1;
            match record.status() {
                None => summary.failed_lookups += 1,
                Some(GuestStatus::Deactivated) => summary.deactivated_guests += 1,
                Some(GuestStatus::Inactive) => summary.inactive_guests += 1,
                Some(GuestStatus::Active) => summary.active_guests += 1,
            }
        }
        summary
    }
}

/// Everything an audit run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditResult {
    /// Records in guest-listing order.
    pub guests: Vec<GuestRecord>,
    pub summary: AuditSummary,
    /// Threshold used for inactivity flagging; `0` or less means disabled.
    pub inactive_days: i64,
}

/// Combine given and family name, skipping whichever part is empty.
#[must_use]
pub fn build_display_name(given: &str, family: &str) -> String {
    match (given.is_empty(), family.is_empty()) {
        (false, false) => format!("{given} {family}"),
        (false, true) => given.to_string(),
        (true, false) => family.to_string(),
        (true, true) => String::new(),
    }
}
