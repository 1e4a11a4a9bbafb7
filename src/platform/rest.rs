//! REST-backed platform client.
//!
//! Speaks a plain HTTP API: bearer-token auth, an `X-Audit-Log-Reason`
//! header on mutations, and a heartbeat ping as the keepalive loop.
//! Session establishment beyond presenting the bearer token is the
//! platform's problem, not ours.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::PlatformError;
use crate::platform::{ChannelId, Connector, GuildId, RoleId, Session, UserId};

/// Consecutive heartbeat misses before the session is declared lost.
const HEARTBEAT_MISS_LIMIT: u32 = 3;

/// Builds [`RestSession`]s against one API base URL and home guild.
pub struct RestConnector {
    base_url: String,
    guild: GuildId,
    heartbeat_interval: Duration,
    http: reqwest::Client,
}

impl RestConnector {
    pub fn new(base_url: impl Into<String>, guild: GuildId, heartbeat_interval: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            guild,
            heartbeat_interval,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Connector for RestConnector {
    async fn connect(
        &self,
        credential: &SecretString,
    ) -> Result<Arc<dyn Session>, PlatformError> {
        let session = RestSession {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            guild: self.guild,
            heartbeat_interval: self.heartbeat_interval,
            http: self.http.clone(),
            token: SecretString::from(credential.expose_secret().to_owned()),
        };

        // Probe once so a bad credential fails at connect time instead of
        // on the first dispatched task.
        let identity: SessionIdentity = session
            .send(Method::GET, "/session".to_string(), None, None)
            .await?
            .json()
            .await?;
        tracing::info!(user = identity.user_id.0, guild = %self.guild, "Session established");

        Ok(Arc::new(session))
    }
}

#[derive(Debug, Deserialize)]
struct SessionIdentity {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    roles: Vec<RoleId>,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    name: String,
}

/// One authenticated REST session.
pub struct RestSession {
    base_url: String,
    guild: GuildId,
    heartbeat_interval: Duration,
    http: reqwest::Client,
    token: SecretString,
}

impl RestSession {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        reason: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, PlatformError> {
        let mut request = self
            .http
            .request(method, self.url(&path))
            .bearer_auth(self.token.expose_secret());
        if let Some(reason) = reason {
            request = request.header("X-Audit-Log-Reason", reason);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(PlatformError::AuthFailed);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(PlatformError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(PlatformError::Status {
                endpoint: path,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn mutate(
        &self,
        method: Method,
        path: String,
        reason: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), PlatformError> {
        self.send(method, path, Some(reason), body).await?;
        Ok(())
    }

    fn member_path(&self, user: UserId) -> String {
        format!("/guilds/{}/members/{}", self.guild, user)
    }
}

#[async_trait]
impl Session for RestSession {
    async fn run(&self) -> Result<(), PlatformError> {
        let mut misses = 0u32;
        loop {
            // Jitter keeps a staggered worker fleet from pinging in phase.
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
            tokio::time::sleep(self.heartbeat_interval + jitter).await;

            match self
                .send(Method::GET, "/gateway/ping".to_string(), None, None)
                .await
            {
                Ok(_) => misses = 0,
                Err(e) => {
                    misses += 1;
                    tracing::warn!(error = %e, misses, "Heartbeat failed");
                    if misses >= HEARTBEAT_MISS_LIMIT {
                        return Err(PlatformError::Disconnected {
                            reason: format!("{misses} consecutive heartbeat failures: {e}"),
                        });
                    }
                }
            }
        }
    }

    async fn set_status(&self, status: &str) -> Result<(), PlatformError> {
        self.send(
            Method::POST,
            "/session/status".to_string(),
            None,
            Some(json!({ "status": status })),
        )
        .await?;
        Ok(())
    }

    async fn add_role(
        &self,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let path = format!("{}/roles/{}", self.member_path(user), role);
        self.mutate(Method::PUT, path, reason, None).await
    }

    async fn remove_role(
        &self,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let path = format!("{}/roles/{}", self.member_path(user), role);
        self.mutate(Method::DELETE, path, reason, None).await
    }

    async fn replace_roles(
        &self,
        user: UserId,
        roles: Vec<RoleId>,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.mutate(
            Method::PATCH,
            self.member_path(user),
            reason,
            Some(json!({ "roles": roles })),
        )
        .await
    }

    async fn kick(&self, user: UserId, reason: &str) -> Result<(), PlatformError> {
        self.mutate(Method::DELETE, self.member_path(user), reason, None)
            .await
    }

    async fn ban(&self, user: UserId, reason: &str) -> Result<(), PlatformError> {
        let path = format!("/guilds/{}/bans/{}", self.guild, user);
        self.mutate(Method::PUT, path, reason, None).await
    }

    async fn unban(&self, user: UserId, reason: &str) -> Result<(), PlatformError> {
        let path = format!("/guilds/{}/bans/{}", self.guild, user);
        self.mutate(Method::DELETE, path, reason, None).await
    }

    async fn timeout(
        &self,
        user: UserId,
        until: Option<DateTime<Utc>>,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.mutate(
            Method::PATCH,
            self.member_path(user),
            reason,
            Some(json!({
                "communication_disabled_until": until.map(|t| t.to_rfc3339()),
            })),
        )
        .await
    }

    async fn move_member(
        &self,
        user: UserId,
        channel: Option<ChannelId>,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.mutate(
            Method::PATCH,
            self.member_path(user),
            reason,
            Some(json!({ "channel_id": channel })),
        )
        .await
    }

    async fn set_voice_state(
        &self,
        user: UserId,
        mute: Option<bool>,
        deaf: Option<bool>,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let mut body = serde_json::Map::new();
        if let Some(mute) = mute {
            body.insert("mute".to_string(), json!(mute));
        }
        if let Some(deaf) = deaf {
            body.insert("deaf".to_string(), json!(deaf));
        }
        self.mutate(
            Method::PATCH,
            self.member_path(user),
            reason,
            Some(serde_json::Value::Object(body)),
        )
        .await
    }

    async fn rename_channel(
        &self,
        channel: ChannelId,
        name: &str,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.mutate(
            Method::PATCH,
            format!("/channels/{channel}"),
            reason,
            Some(json!({ "name": name })),
        )
        .await
    }

    async fn set_user_limit(
        &self,
        channel: ChannelId,
        limit: u32,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.mutate(
            Method::PATCH,
            format!("/channels/{channel}"),
            reason,
            Some(json!({ "user_limit": limit })),
        )
        .await
    }

    async fn member_roles(&self, user: UserId) -> Result<Vec<RoleId>, PlatformError> {
        let member: MemberPayload = self
            .send(Method::GET, self.member_path(user), None, None)
            .await
            .map_err(|e| not_found_as(e, "member", user.0))?
            .json()
            .await?;
        Ok(member.roles)
    }

    async fn channel_name(&self, channel: ChannelId) -> Result<String, PlatformError> {
        let payload: ChannelPayload = self
            .send(Method::GET, format!("/channels/{channel}"), None, None)
            .await
            .map_err(|e| not_found_as(e, "channel", channel.0))?
            .json()
            .await?;
        Ok(payload.name)
    }
}

/// Rewrite a 404 status error as a typed not-found for fetches.
fn not_found_as(err: PlatformError, entity: &'static str, id: u64) -> PlatformError {
    match err {
        PlatformError::Status { status: 404, .. } => PlatformError::NotFound { entity, id },
        other => other,
    }
}

fn parse_retry_after(header: Option<&str>) -> Option<Duration> {
    header
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_parses_seconds() {
        assert_eq!(
            parse_retry_after(Some("2")),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            parse_retry_after(Some("0.5")),
            Some(Duration::from_millis(500))
        );
        assert_eq!(parse_retry_after(Some("nonsense")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn not_found_rewrites_only_404() {
        let err = PlatformError::Status {
            endpoint: "/guilds/1/members/42".to_string(),
            status: 404,
        };
        assert!(matches!(
            not_found_as(err, "member", 42),
            PlatformError::NotFound {
                entity: "member",
                id: 42
            }
        ));

        let err = PlatformError::Status {
            endpoint: "/guilds/1/members/42".to_string(),
            status: 500,
        };
        assert!(matches!(
            not_found_as(err, "member", 42),
            PlatformError::Status { status: 500, .. }
        ));
    }
}
