use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::channel::{BindingStatus, ChannelId, ChannelState};

/// Receives channel updates. Implementations must return quickly and must
/// never call back into the scheduler.
pub trait StateSink: Send + Sync {
    fn publish(&self, channel: ChannelId, state: ChannelState);
    fn update_status(&self, status: BindingStatus);
}

/// Keeps the latest value of every channel for the HTTP surface.
pub struct ChannelCache {
    channels: RwLock<HashMap<ChannelId, ChannelState>>,
    status: RwLock<BindingStatus>,
}

impl ChannelCache {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            status: RwLock::new(BindingStatus::Unknown),
        }
    }

    /// `None` means the channel has not been published yet.
    pub fn get(&self, channel: ChannelId) -> Option<ChannelState> {
        self.channels.read().get(&channel).cloned()
    }

    pub fn snapshot(&self) -> Vec<(ChannelId, Option<ChannelState>)> {
        let channels = self.channels.read();
        ChannelId::ALL
            .iter()
            .map(|id| (*id, channels.get(id).cloned()))
            .collect()
    }

    pub fn status(&self) -> BindingStatus {
        self.status.read().clone()
    }
}

impl Default for ChannelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSink for ChannelCache {
    fn publish(&self, channel: ChannelId, state: ChannelState) {
        self.channels.write().insert(channel, state);
    }

    fn update_status(&self, status: BindingStatus) {
        *self.status.write() = status;
    }
}

pub struct LoggingSink;

impl StateSink for LoggingSink {
    fn publish(&self, channel: ChannelId, state: ChannelState) {
        tracing::debug!(channel = %channel, state = ?state, "channel updated");
    }

    fn update_status(&self, status: BindingStatus) {
        match &status {
            BindingStatus::Offline(reason) => tracing::warn!(reason = %reason, "binding offline"),
            other => tracing::info!(status = ?other, "binding status changed"),
        }
    }
}

/// Forwards every update to each inner sink in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn StateSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn StateSink>>) -> Self {
        Self { sinks }
    }
}

impl StateSink for FanoutSink {
    fn publish(&self, channel: ChannelId, state: ChannelState) {
        for sink in &self.sinks {
            sink.publish(channel, state.clone());
        }
    }

    fn update_status(&self, status: BindingStatus) {
        for sink in &self.sinks {
            sink.update_status(status.clone());
        }
    }
}
