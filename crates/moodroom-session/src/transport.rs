use std::sync::Arc;

use async_trait::async_trait;
use moodroom_core::{MediaTrack, ParticipantIdentity, TrackSid, TransportError};
use tokio::sync::mpsc;

// MARK: - RoomEvent

/// Inbound events from the realtime transport while connected.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A remote track became available to this client.
    TrackSubscribed {
        track: Arc<dyn MediaTrack>,
        participant: ParticipantIdentity,
    },
    /// A remote track is no longer available.
    TrackUnsubscribed {
        sid: TrackSid,
        participant: ParticipantIdentity,
    },
    ParticipantDisconnected { identity: ParticipantIdentity },
    /// The server closed the connection.
    Disconnected { reason: String },
}

pub type RoomEvents = mpsc::UnboundedReceiver<RoomEvent>;

// MARK: - Transport traits

/// Opens connections to the realtime media transport.
#[async_trait]
pub trait RoomConnector: Send + Sync {
    async fn connect(&self, url: &str, token: &str) -> Result<(Arc<dyn RoomHandle>, RoomEvents), TransportError>;
}

/// A connected room.
#[async_trait]
pub trait RoomHandle: Send + Sync {
    /// Publish camera and microphone; returns the local video track.
    async fn enable_camera_and_microphone(&self) -> Result<Arc<dyn MediaTrack>, TransportError>;

    async fn disconnect(&self);
}
