//! Remote platform client abstraction.
//!
//! A [`Session`] is one independently-authenticated connection to the
//! platform: it owns its own keepalive loop (`run`) and exposes the
//! privileged operations the rest of the crate dispatches. Sessions are
//! produced by a [`Connector`]; the crate never cares whether a session
//! belongs to the primary credential or to a pooled worker.

pub mod rest;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Audit reason used when the caller does not provide one.
pub const DEFAULT_REASON: &str = "No reason provided";

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// A platform user id.
    UserId
);
id_type!(
    /// A platform role id.
    RoleId
);
id_type!(
    /// A platform channel id.
    ChannelId
);
id_type!(
    /// A platform guild id.
    GuildId
);

/// One authenticated connection to the remote platform.
///
/// All mutations are scoped to the session's home guild and carry an
/// audit `reason`. Implementations must be safe to call from any thread;
/// each worker drives exactly one session on its own loop.
#[async_trait]
pub trait Session: Send + Sync {
    /// Drive the connection's keepalive loop. Resolves only when the
    /// connection is lost (Err) or shut down by the platform (Ok).
    async fn run(&self) -> Result<(), PlatformError>;

    /// Publish a presence/status line for this connection.
    async fn set_status(&self, status: &str) -> Result<(), PlatformError>;

    async fn add_role(
        &self,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn remove_role(
        &self,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Replace the user's role set wholesale.
    async fn replace_roles(
        &self,
        user: UserId,
        roles: Vec<RoleId>,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn kick(&self, user: UserId, reason: &str) -> Result<(), PlatformError>;

    async fn ban(&self, user: UserId, reason: &str) -> Result<(), PlatformError>;

    async fn unban(&self, user: UserId, reason: &str) -> Result<(), PlatformError>;

    /// Set (or with `None`, clear) the user's communication-disabled
    /// deadline.
    async fn timeout(
        &self,
        user: UserId,
        until: Option<DateTime<Utc>>,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Move the user to a voice channel, or disconnect them with `None`.
    async fn move_member(
        &self,
        user: UserId,
        channel: Option<ChannelId>,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Server-mute and/or server-deafen the user. `None` leaves the
    /// corresponding flag untouched.
    async fn set_voice_state(
        &self,
        user: UserId,
        mute: Option<bool>,
        deaf: Option<bool>,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn rename_channel(
        &self,
        channel: ChannelId,
        name: &str,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn set_user_limit(
        &self,
        channel: ChannelId,
        limit: u32,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Role ids currently held by the user.
    async fn member_roles(&self, user: UserId) -> Result<Vec<RoleId>, PlatformError>;

    /// Current name of the channel.
    async fn channel_name(&self, channel: ChannelId) -> Result<String, PlatformError>;
}

/// Produces authenticated sessions from opaque credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credential: &SecretString)
        -> Result<Arc<dyn Session>, PlatformError>;
}
