//! The capability set an audit needs from the remote server.
//!
//! The pipeline only talks to the server through [`RemoteAccess`], so it can
//! run against the real HTTP adapter or an in-memory fake.

use chrono::{DateTime, Utc};

use crate::error::PortError;
use crate::model::{Channel, Team, User};

/// Read-only operations against a collaboration server.
pub trait RemoteAccess {
    /// One zero-based page of guest-role accounts, at most `per_page` long.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the page cannot be fetched.
    fn list_guest_users(&self, page: u32, per_page: u32) -> Result<Vec<User>, PortError>;

    /// Resolve a team by its URL name.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::TeamNotFound`] if no such team exists, or another
    /// [`PortError`] on transport failure.
    fn team_by_name(&self, name: &str) -> Result<Team, PortError>;

    /// Teams the user is a member of.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the lookup fails.
    fn teams_for_user(&self, user_id: &str) -> Result<Vec<Team>, PortError>;

    /// Channels the user is a member of within one team.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the lookup fails.
    fn channels_for_user(&self, team_id: &str, user_id: &str) -> Result<Vec<Channel>, PortError>;

    /// Best estimate of the user's most recent post across `team_ids`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the estimate cannot be computed.
    fn last_post_time(
        &self,
        user_id: &str,
        username: &str,
        team_ids: &[String],
    ) -> Result<Option<DateTime<Utc>>, PortError>;
}
