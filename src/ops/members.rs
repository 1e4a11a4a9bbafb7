//! Member operations: roles, removals, timeouts, voice.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;

use crate::error::Result;
use crate::offload::{DispatchOptions, Offloader};
use crate::ops::audit_reason;
use crate::platform::{ChannelId, RoleId, Session, UserId};
use crate::worker::TaskTimeout;

/// Member-facing moderation operations.
///
/// Role and state edits are set-to-value and safe to retry, so they fall
/// back on any worker failure. Kick/ban/unban leave an audit trail per
/// attempt and are marked side-effecting: a worker-side task failure is
/// surfaced instead of being re-run on the primary session.
pub struct Members {
    gateway: Arc<Offloader>,
}

impl Members {
    pub fn new(gateway: Arc<Offloader>) -> Self {
        Self { gateway }
    }

    pub async fn add_role(
        &self,
        user: UserId,
        role: RoleId,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.add_role(user, role, &reason).await }.boxed()
            })
            .await
    }

    pub async fn remove_role(
        &self,
        user: UserId,
        role: RoleId,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.remove_role(user, role, &reason).await }.boxed()
            })
            .await
    }

    /// Replace the user's role set wholesale. Heavier than a single role
    /// edit; callers usually allow a longer wait here.
    pub async fn replace_roles(
        &self,
        user: UserId,
        roles: Vec<RoleId>,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                let roles = roles.clone();
                async move { session.replace_roles(user, roles, &reason).await }.boxed()
            })
            .await
    }

    pub async fn kick(&self, user: UserId, reason: Option<&str>, wait: TaskTimeout) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::side_effecting(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.kick(user, &reason).await }.boxed()
            })
            .await
    }

    pub async fn ban(&self, user: UserId, reason: Option<&str>, wait: TaskTimeout) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::side_effecting(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.ban(user, &reason).await }.boxed()
            })
            .await
    }

    pub async fn unban(&self, user: UserId, reason: Option<&str>, wait: TaskTimeout) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::side_effecting(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.unban(user, &reason).await }.boxed()
            })
            .await
    }

    /// Disable the user's communication for `duration` from now.
    pub async fn timeout_member(
        &self,
        user: UserId,
        duration: Duration,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        let until =
            Utc::now() + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.timeout(user, Some(until), &reason).await }.boxed()
            })
            .await
    }

    pub async fn clear_timeout(
        &self,
        user: UserId,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.timeout(user, None, &reason).await }.boxed()
            })
            .await
    }

    pub async fn move_member(
        &self,
        user: UserId,
        channel: ChannelId,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.move_member(user, Some(channel), &reason).await }.boxed()
            })
            .await
    }

    /// Drop the user from whichever voice channel they are in.
    pub async fn disconnect_voice(
        &self,
        user: UserId,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.move_member(user, None, &reason).await }.boxed()
            })
            .await
    }

    pub async fn set_voice_state(
        &self,
        user: UserId,
        mute: Option<bool>,
        deaf: Option<bool>,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.set_voice_state(user, mute, deaf, &reason).await }.boxed()
            })
            .await
    }

    /// Role ids currently held by the user.
    pub async fn member_roles(&self, user: UserId) -> Result<Vec<RoleId>> {
        self.gateway
            .fetch(
                DispatchOptions::idempotent(TaskTimeout::DEFAULT),
                move |session: Arc<dyn Session>| {
                    async move { session.member_roles(user).await }.boxed()
                },
            )
            .await
    }
}
