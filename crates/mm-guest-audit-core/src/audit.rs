//! The guest audit pipeline.
//!
//! # Algorithm
//!
//! 1. Resolve the optional team filter to a team ID. Failure aborts the run
//!    with [`AuditError::Configuration`].
//! 2. Page through all guest accounts, [`GUEST_PAGE_SIZE`] at a time, until a
//!    short or empty page. Any page failure aborts the run with
//!    [`AuditError::Transport`]; earlier pages are discarded.
//! 3. Enrich each guest in listing order: teams (filtered), channels per
//!    team, then last-post estimate. A team or channel lookup failure turns
//!    the guest into a stub record carrying the error; a last-post failure
//!    is logged and ignored. Guests with no team in scope under an active
//!    filter are dropped entirely.
//! 4. Tally the records into an [`AuditSummary`].
//!
//! The run is sequential and read-only against the server.

use chrono::{DateTime, Utc};

use crate::classify::is_inactive;
use crate::error::{AuditError, GuestError, Outcome};
use crate::model::{AuditResult, AuditSummary, ChannelRef, GuestRecord, TeamRef, User};
use crate::port::RemoteAccess;
use crate::time::from_epoch_millis;

/// Guests requested per listing page. A shorter page marks the last one.
pub const GUEST_PAGE_SIZE: u32 = 200;

/// Inputs for one audit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOptions {
    /// Restrict the audit to members of this team (by URL name).
    pub team_filter: Option<String>,
    /// Inactivity threshold in days; `0` or less disables flagging.
    pub inactive_days: i64,
    /// Reference time for inactivity classification.
    pub now: DateTime<Utc>,
}

impl AuditOptions {
    /// Options classified against the current wall clock.
    #[must_use]
    pub fn new(team_filter: Option<String>, inactive_days: i64) -> Self {
        Self {
            team_filter,
            inactive_days,
            now: Utc::now(),
        }
    }

    /// Override the reference time used for inactivity classification.
    #[must_use]
    pub const fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn team_filter(&self) -> Option<&str> {
        self.team_filter.as_deref().filter(|name| !name.is_empty())
    }
}

/// A completed audit: the result plus its outcome classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub result: AuditResult,
    /// [`Outcome::Success`] or [`Outcome::PartialFailure`].
    pub outcome: Outcome,
}

/// The resolved team filter.
#[derive(Debug, Clone)]
struct TeamScope {
    id: String,
    display_name: String,
}

/// What happened to one guest during enrichment.
#[derive(Debug)]
enum Enriched {
    Record(Box<GuestRecord>),
    OutOfScope,
}

/// Run a full audit against `source`.
///
/// # Errors
///
/// Returns [`AuditError::Configuration`] if the team filter cannot be
/// resolved, or [`AuditError::Transport`] if any guest page fails. Per-guest
/// failures never surface here; they are recorded on the guest's record.
pub fn run_audit<S>(source: &S, options: &AuditOptions) -> Result<AuditReport, AuditError>
where
    S: RemoteAccess + ?Sized,
{
    let scope = match options.team_filter() {
        Some(name) => Some(resolve_team(source, name)?),
        None => None,
    };

    let users = fetch_all_guests(source)?;
    tracing::info!(guest_count = users.len(), "retrieved guest accounts");

    let mut guests = Vec::with_capacity(users.len());
    for user in &users {
        match enrich_guest(source, user, scope.as_ref(), options) {
            Ok(Enriched::Record(record)) => guests.push(*record),
            Ok(Enriched::OutOfScope) => {
                tracing::debug!(username = %user.username, "guest not in filtered team, skipping");
            }
            Err(err) => {
                tracing::warn!(username = %user.username, "failed to process guest: {err}");
                guests.push(GuestRecord::failed(user, err.to_string()));
            }
        }
    }

    let summary = AuditSummary::tally(&guests);
    let outcome = if summary.failed_lookups > 0 {
        Outcome::PartialFailure
    } else {
        Outcome::Success
    };

    tracing::info!(
        total = summary.total_guests,
        active = summary.active_guests,
        inactive = summary.inactive_guests,
        deactivated = summary.deactivated_guests,
        failed = summary.failed_lookups,
        "guest audit complete"
    );

    Ok(AuditReport {
        result: AuditResult {
            guests,
            summary,
            inactive_days: options.inactive_days,
        },
        outcome,
    })
}

fn resolve_team<S>(source: &S, name: &str) -> Result<TeamScope, AuditError>
where
    S: RemoteAccess + ?Sized,
{
    let team = source
        .team_by_name(name)
        .map_err(|source| AuditError::Configuration {
            team: name.to_string(),
            source,
        })?;

    tracing::info!(team = %team.display_name, id = %team.id, "scoping audit to team");
    Ok(TeamScope {
        id: team.id,
        display_name: team.display_name,
    })
}

/// Collect every guest account, page by page.
fn fetch_all_guests<S>(source: &S) -> Result<Vec<User>, AuditError>
where
    S: RemoteAccess + ?Sized,
{
    let mut guests = Vec::new();
    let mut page = 0_u32;

    loop {
        let batch = source
            .list_guest_users(page, GUEST_PAGE_SIZE)
            .map_err(|source| AuditError::Transport { page, source })?;

        let raw_len = batch.len();
        tracing::debug!(page, count = raw_len, "fetched guest page");
        guests.extend(batch);

        if raw_len < GUEST_PAGE_SIZE as usize {
            break;
        }

        page += 1;
    }

    Ok(guests)
}

fn enrich_guest<S>(
    source: &S,
    user: &User,
    scope: Option<&TeamScope>,
    options: &AuditOptions,
) -> Result<Enriched, GuestError>
where
    S: RemoteAccess + ?Sized,
{
    let teams: Vec<TeamRef> = source
        .teams_for_user(&user.id)
        .map_err(GuestError::Teams)?
        .iter()
        .filter(|team| scope.is_none_or(|scope| team.id == scope.id))
        .map(TeamRef::from)
        .collect();

    if let Some(scope) = scope.filter(|_| teams.is_empty()) {
        tracing::trace!(username = %user.username, team = %scope.display_name, "no membership in scope");
        return Ok(Enriched::OutOfScope);
    }

    let mut channels = Vec::new();
    for team in &teams {
        let team_channels = source.channels_for_user(&team.id, &user.id).map_err(|source| {
            GuestError::Channels {
                team: team.display_name.clone(),
                source,
            }
        })?;
        channels.extend(team_channels.into_iter().map(|channel| ChannelRef {
            team_name: team.display_name.clone(),
            channel_name: channel.display_name,
        }));
    }

    let last_post = if teams.is_empty() {
        None
    } else {
        let team_ids: Vec<String> = teams.iter().map(|team| team.id.clone()).collect();
        source
            .last_post_time(&user.id, &user.username, &team_ids)
            .unwrap_or_else(|err| {
                tracing::warn!(
                    username = %user.username,
                    "could not retrieve last post date (non-fatal): {err}"
                );
                None
            })
    };

    let last_login = from_epoch_millis(user.last_activity_at);

    Ok(Enriched::Record(Box::new(GuestRecord {
        username: user.username.clone(),
        display_name: user.display_name(),
        email: user.email.clone(),
        created_at: from_epoch_millis(user.create_at),
        last_login,
        last_post,
        teams,
        channels,
        active: user.is_enabled(),
        inactive: is_inactive(last_login, options.inactive_days, options.now),
        error: None,
    })))
}
