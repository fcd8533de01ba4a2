//! Room session state machine.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──join()──► token ─► connect ─► camera/mic ─► Joined
//!   ▲                 │         │           │
//!   └──── leave() ◄───┴─────────┴───────────┘  (any failure)
//!   ▲
//!   └──── leave() / Disconnected / event stream closed ◄── Joined
//! ```
//!
//! While joined, transport events update the remote track collection and tile
//! labels merge into the [`ExpressionBoard`]. [`RoomSession::next_update`]
//! drives both.

use std::sync::Arc;

use moodroom_core::{
    ClientConfig, JoinError, MediaTrack, ParticipantIdentity, SessionState, StaleLabelPolicy,
};
use moodroom_detection::ExpressionModel;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::board::{ExpressionBoard, ExpressionEvent};
use crate::stage::{LocalVideo, Stage};
use crate::tile::TileContext;
use crate::token::TokenSource;
use crate::transport::{RoomConnector, RoomEvent, RoomEvents, RoomHandle};
use crate::view::{JoinForm, RoomView, TileView};

/// A subscribed remote track and the participant publishing it.
#[derive(Debug, Clone)]
pub struct RemoteTrackEntry {
    pub track: Arc<dyn MediaTrack>,
    pub identity: ParticipantIdentity,
}

/// What [`RoomSession::next_update`] applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    Expression { changed: bool },
    Room { changed: bool },
    /// The transport went away and the session is idle again.
    Left,
}

impl SessionUpdate {
    pub fn changed(&self) -> bool {
        match self {
            Self::Expression { changed } | Self::Room { changed } => *changed,
            Self::Left => true,
        }
    }
}

// MARK: - RoomSession

pub struct RoomSession {
    config: Arc<ClientConfig>,
    tokens: Arc<dyn TokenSource>,
    connector: Arc<dyn RoomConnector>,

    state: SessionState,
    form: JoinForm,
    room: Option<Arc<dyn RoomHandle>>,
    room_events: Option<RoomEvents>,
    local_track: Option<Arc<dyn MediaTrack>>,
    remote_tracks: Vec<RemoteTrackEntry>,

    board: ExpressionBoard,
    stage: Stage,
    tile_ctx: TileContext,
    expression_rx: mpsc::UnboundedReceiver<ExpressionEvent>,
}

impl RoomSession {
    pub fn new(
        config: Arc<ClientConfig>,
        tokens: Arc<dyn TokenSource>,
        connector: Arc<dyn RoomConnector>,
        model: Arc<dyn ExpressionModel>,
    ) -> Self {
        let (events, expression_rx) = mpsc::unbounded_channel();
        let tile_ctx = TileContext {
            model,
            detection: config.detection.clone(),
            model_dir: config.model_dir(),
            events,
        };
        Self {
            board: ExpressionBoard::new(config.stale_labels),
            config,
            tokens,
            connector,
            state: SessionState::Idle,
            form: JoinForm::default(),
            room: None,
            room_events: None,
            local_track: None,
            remote_tracks: Vec::new(),
            stage: Stage::default(),
            tile_ctx,
            expression_rx,
        }
    }

    // MARK: Join / leave

    /// Join using the current form values.
    pub async fn join_with_form(&mut self) -> Result<(), JoinError> {
        let JoinForm { room_name, participant_name } = self.form.clone();
        self.join(&room_name, &participant_name).await
    }

    /// Fetch a token, connect, publish camera and microphone.
    ///
    /// On failure the session is left exactly as it was before the call.
    pub async fn join(&mut self, room_name: &str, participant_name: &str) -> Result<(), JoinError> {
        if let SessionState::Joined { room_name, .. } = &self.state {
            return Err(JoinError::AlreadyJoined { room_name: room_name.clone() });
        }
        if room_name.is_empty() {
            return Err(JoinError::EmptyField { field: "room name" });
        }
        if participant_name.is_empty() {
            return Err(JoinError::EmptyField { field: "participant name" });
        }
        self.form = JoinForm {
            participant_name: participant_name.to_string(),
            room_name: room_name.to_string(),
        };

        info!("Joining room '{}' as '{}'", room_name, participant_name);
        match self.try_join(room_name, participant_name).await {
            Ok(()) => {
                self.state = SessionState::Joined {
                    room_name: room_name.to_string(),
                    participant_name: participant_name.to_string(),
                };
                self.sync_stage();
                info!("Joined room '{}'", room_name);
                Ok(())
            }
            Err(e) => {
                error!("There was an error connecting to the room: {}", e);
                self.leave().await;
                Err(e)
            }
        }
    }

    async fn try_join(&mut self, room_name: &str, participant_name: &str) -> Result<(), JoinError> {
        let token = self.tokens.fetch(room_name, participant_name).await?;

        let url = self.config.endpoints().livekit_url;
        debug!("Connecting to {}", url);
        let (room, events) = self.connector.connect(&url, &token).await?;
        self.room = Some(Arc::clone(&room));
        self.room_events = Some(events);

        let local = room.enable_camera_and_microphone().await?;
        self.local_track = Some(local);
        Ok(())
    }

    /// Disconnect and drop every track reference. No-op when idle.
    pub async fn leave(&mut self) {
        self.stage.clear();
        if let Some(room) = self.room.take() {
            room.disconnect().await;
        }
        self.room_events = None;
        self.local_track = None;
        self.remote_tracks.clear();
        self.board.room_left();

        if let SessionState::Joined { room_name, .. } = std::mem::take(&mut self.state) {
            info!("Left room '{}'", room_name);
        }
    }

    // MARK: Events

    /// Apply one transport event. Returns whether the room changed.
    pub async fn handle_room_event(&mut self, event: RoomEvent) -> bool {
        if !self.state.is_joined() {
            debug!("Ignoring room event while idle: {:?}", event);
            return false;
        }
        match event {
            RoomEvent::TrackSubscribed { track, participant } => {
                if self.remote_tracks.iter().any(|e| e.track.sid() == track.sid()) {
                    debug!("Duplicate subscription for {} ignored", track.sid());
                    return false;
                }
                info!("Subscribed to {:?} track {} from '{}'", track.kind(), track.sid(), participant);
                self.remote_tracks.push(RemoteTrackEntry { track, identity: participant });
                self.sync_stage();
                true
            }
            RoomEvent::TrackUnsubscribed { sid, participant } => {
                let Some(i) = self.remote_tracks.iter().position(|e| *e.track.sid() == sid) else {
                    debug!("Unsubscribe for unknown track {} ignored", sid);
                    return false;
                };
                let entry = self.remote_tracks.remove(i);
                info!("Unsubscribed from track {} of '{}'", sid, participant);
                if !self.remote_tracks.iter().any(|e| e.identity == entry.identity) {
                    self.board.participant_departed(&entry.identity);
                }
                self.sync_stage();
                true
            }
            RoomEvent::ParticipantDisconnected { identity } => {
                let before = self.remote_tracks.len();
                self.remote_tracks.retain(|e| e.identity != identity);
                let pruned = self.board.participant_departed(&identity);
                info!("Participant '{}' disconnected", identity);
                self.sync_stage();
                pruned || before != self.remote_tracks.len()
            }
            RoomEvent::Disconnected { reason } => {
                warn!("Disconnected from room: {}", reason);
                self.leave().await;
                true
            }
        }
    }

    /// Merge a tile's label into the board. Returns whether the board changed.
    pub fn record_expression(&mut self, event: ExpressionEvent) -> bool {
        if self.board.policy() == StaleLabelPolicy::PruneOnDeparture && !self.is_present(&event.identity) {
            debug!("Dropping label for departed participant '{}'", event.identity);
            return false;
        }
        self.board.merge(event)
    }

    /// Wait for the next tile label or transport event and apply it.
    pub async fn next_update(&mut self) -> SessionUpdate {
        tokio::select! {
            Some(event) = self.expression_rx.recv() => {
                SessionUpdate::Expression { changed: self.record_expression(event) }
            }
            event = next_room_event(&mut self.room_events) => match event {
                Some(RoomEvent::Disconnected { reason }) => {
                    self.handle_room_event(RoomEvent::Disconnected { reason }).await;
                    SessionUpdate::Left
                }
                Some(event) => SessionUpdate::Room { changed: self.handle_room_event(event).await },
                None => {
                    warn!("Room event stream closed");
                    self.leave().await;
                    SessionUpdate::Left
                }
            },
        }
    }

    // MARK: Accessors

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub fn form(&self) -> &JoinForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut JoinForm {
        &mut self.form
    }

    pub fn has_room(&self) -> bool {
        self.room.is_some()
    }

    pub fn local_track(&self) -> Option<&Arc<dyn MediaTrack>> {
        self.local_track.as_ref()
    }

    pub fn remote_tracks(&self) -> &[RemoteTrackEntry] {
        &self.remote_tracks
    }

    pub fn board(&self) -> &ExpressionBoard {
        &self.board
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn view(&self) -> RoomView {
        let SessionState::Joined { room_name, .. } = &self.state else {
            return RoomView::Lobby(self.form.clone());
        };
        let locale = self.config.locale;
        RoomView::Room {
            room_name: room_name.clone(),
            tiles: self
                .stage
                .tiles()
                .map(|tile| TileView {
                    element_id: tile.element().id().to_string(),
                    caption: tile.caption(locale),
                    ready: tile.element().is_ready(),
                    indicator: tile.indicator(),
                })
                .collect(),
            audio: self
                .stage
                .audio_sinks()
                .iter()
                .map(|sink| sink.element().id().to_string())
                .collect(),
            expressions: self.board.lines(locale),
        }
    }

    fn is_present(&self, identity: &ParticipantIdentity) -> bool {
        let is_local = matches!(
            &self.state,
            SessionState::Joined { participant_name, .. } if participant_name == identity.as_str()
        );
        is_local || self.remote_tracks.iter().any(|e| e.identity == *identity)
    }

    fn sync_stage(&mut self) {
        let local_identity = match &self.state {
            SessionState::Joined { participant_name, .. } => ParticipantIdentity::new(participant_name.as_str()),
            SessionState::Idle => return,
        };
        let local = self
            .local_track
            .as_ref()
            .map(|track| LocalVideo { identity: &local_identity, track });
        self.stage.reconcile(local, &self.remote_tracks, &self.tile_ctx);
    }
}

async fn next_room_event(events: &mut Option<RoomEvents>) -> Option<RoomEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
