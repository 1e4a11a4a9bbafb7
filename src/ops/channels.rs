//! Channel operations: renames and voice-channel settings.

use std::sync::Arc;

use futures::FutureExt;

use crate::error::Result;
use crate::offload::{DispatchOptions, Offloader};
use crate::ops::audit_reason;
use crate::platform::{ChannelId, Session};
use crate::worker::TaskTimeout;

/// Channel-facing operations. All edits are set-to-value and therefore
/// idempotent.
pub struct Channels {
    gateway: Arc<Offloader>,
}

impl Channels {
    pub fn new(gateway: Arc<Offloader>) -> Self {
        Self { gateway }
    }

    pub async fn rename_channel(
        &self,
        channel: ChannelId,
        new_name: &str,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        let new_name = new_name.to_string();
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                let new_name = new_name.clone();
                async move { session.rename_channel(channel, &new_name, &reason).await }.boxed()
            })
            .await
    }

    pub async fn set_user_limit(
        &self,
        channel: ChannelId,
        limit: u32,
        reason: Option<&str>,
        wait: TaskTimeout,
    ) -> bool {
        let reason = audit_reason(reason);
        self.gateway
            .invoke(DispatchOptions::idempotent(wait), move |session: Arc<dyn Session>| {
                let reason = reason.clone();
                async move { session.set_user_limit(channel, limit, &reason).await }.boxed()
            })
            .await
    }

    /// Current name of the channel.
    pub async fn channel_name(&self, channel: ChannelId) -> Result<String> {
        self.gateway
            .fetch(
                DispatchOptions::idempotent(TaskTimeout::DEFAULT),
                move |session: Arc<dyn Session>| {
                    async move { session.channel_name(channel).await }.boxed()
                },
            )
            .await
    }
}
