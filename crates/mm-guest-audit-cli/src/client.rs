//! Blocking HTTP adapter for the Mattermost REST API v4.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mm_guest_audit_core::PortError;
use mm_guest_audit_core::model::{Channel, Team, User};
use mm_guest_audit_core::port::RemoteAccess;
use mm_guest_audit_core::time::from_epoch_millis;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::display_url;

const USER_AGENT: &str = concat!("mm-guest-audit/", env!("CARGO_PKG_VERSION"));

/// Response header carrying the session token after a password login.
const SESSION_TOKEN_HEADER: &str = "Token";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostList {
    posts: Option<HashMap<String, Post>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Post {
    create_at: i64,
}

/// An authenticated API session.
pub struct MattermostClient {
    agent: ureq::Agent,
    api: Url,
    token: String,
    requests: Cell<usize>,
}

impl std::fmt::Debug for MattermostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattermostClient")
            .field("api", &self.api.as_str())
            .field("requests", &self.requests.get())
            .finish_non_exhaustive()
    }
}

impl MattermostClient {
    /// Authenticate with a personal access token, verified via `users/me`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Unreachable`] if the server cannot be reached, or
    /// the classified HTTP error if the token is rejected.
    pub fn with_token(server: &Url, token: &str, timeout: Duration) -> Result<Self, PortError> {
        let client = Self::new(server, token.to_string(), timeout)?;
        tracing::info!(server = %display_url(server), "authenticating with personal access token");

        let request = client.request("GET", &["users", "me"])?;
        client
            .send(request, None)
            .map_err(|err| unreachable_at(server, err))?;
        Ok(client)
    }

    /// Authenticate with a username and password.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Unreachable`] if the server cannot be reached,
    /// the classified HTTP error if the login is rejected, or
    /// [`PortError::Decode`] if the response carries no session token.
    pub fn login(
        server: &Url,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, PortError> {
        let mut client = Self::new(server, String::new(), timeout)?;
        tracing::info!(server = %display_url(server), %username, "authenticating with username and password");

        let url = endpoint(&client.api, &["users", "login"])?;
        let request = client.agent.request_url("POST", &url);
        let body = serde_json::json!({ "login_id": username, "password": password });
        let response = client
            .send(request, Some(&body))
            .map_err(|err| unreachable_at(server, err))?;

        client.token = response
            .header(SESSION_TOKEN_HEADER)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| PortError::Decode("login response carried no session token".into()))?;
        Ok(client)
    }

    fn new(server: &Url, token: String, timeout: Duration) -> Result<Self, PortError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Ok(Self {
            agent,
            api: api_base(server)?,
            token,
            requests: Cell::new(0),
        })
    }

    /// Requests sent so far, including authentication.
    pub fn request_count(&self) -> usize {
        self.requests.get()
    }

    fn request(&self, method: &str, segments: &[&str]) -> Result<ureq::Request, PortError> {
        let url = endpoint(&self.api, segments)?;
        Ok(self
            .agent
            .request_url(method, &url)
            .set("Authorization", &format!("Bearer {}", self.token)))
    }

    fn send(
        &self,
        request: ureq::Request,
        body: Option<&serde_json::Value>,
    ) -> Result<ureq::Response, ureq::Error> {
        self.requests.set(self.requests.get() + 1);
        tracing::debug!(method = request.method(), url = request.url(), "api request");

        match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, PortError> {
        let request = self.request("GET", segments)?.query_pairs(query.iter().copied());
        let response = self.send(request, None).map_err(classify)?;
        decode(response)
    }
}

impl RemoteAccess for MattermostClient {
    fn list_guest_users(&self, page: u32, per_page: u32) -> Result<Vec<User>, PortError> {
        let page = page.to_string();
        let per_page = per_page.to_string();
        self.get_json(
            &["users"],
            &[
                ("page", page.as_str()),
                ("per_page", per_page.as_str()),
                ("role", "system_guest"),
            ],
        )
    }

    fn team_by_name(&self, name: &str) -> Result<Team, PortError> {
        self.get_json(&["teams", "name", name], &[])
            .map_err(|err| match err {
                PortError::NotFound => PortError::TeamNotFound {
                    name: name.to_string(),
                },
                other => other,
            })
    }

    fn teams_for_user(&self, user_id: &str) -> Result<Vec<Team>, PortError> {
        self.get_json(&["users", user_id, "teams"], &[])
    }

    fn channels_for_user(&self, team_id: &str, user_id: &str) -> Result<Vec<Channel>, PortError> {
        self.get_json(&["users", user_id, "teams", team_id, "channels"], &[])
    }

    fn last_post_time(
        &self,
        _user_id: &str,
        username: &str,
        team_ids: &[String],
    ) -> Result<Option<DateTime<Utc>>, PortError> {
        let body = serde_json::json!({
            "terms": format!("from:{username}"),
            "is_or_search": false,
        });

        let mut latest: Option<DateTime<Utc>> = None;
        for team_id in team_ids {
            let request = self.request("POST", &["teams", team_id, "posts", "search"])?;
            let list: PostList = match self.send(request, Some(&body)).map_err(classify) {
                Ok(response) => decode(response)?,
                Err(PortError::NotFound) => {
                    tracing::debug!(%team_id, "post search not available for team, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let newest = list
                .posts
                .unwrap_or_default()
                .values()
                .filter_map(|post| from_epoch_millis(post.create_at))
                .max();
            latest = latest.max(newest);
        }
        Ok(latest)
    }
}

/// `<server>/api/v4`.
fn api_base(server: &Url) -> Result<Url, PortError> {
    endpoint(server, &["api", "v4"])
}

/// Append percent-encoded path segments to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, PortError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| PortError::Request(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn classify(err: ureq::Error) -> PortError {
    match err {
        ureq::Error::Status(status, _) => PortError::from_status(status),
        ureq::Error::Transport(transport) => PortError::Request(transport.to_string()),
    }
}

/// Transport failures while authenticating mean the server is unreachable.
fn unreachable_at(server: &Url, err: ureq::Error) -> PortError {
    match err {
        ureq::Error::Transport(transport) => {
            tracing::debug!("connection failed: {transport}");
            PortError::Unreachable {
                url: display_url(server),
            }
        }
        status @ ureq::Error::Status(..) => classify(status),
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, PortError> {
    response
        .into_json::<T>()
        .map_err(|err| PortError::Decode(err.to_string()))
}
