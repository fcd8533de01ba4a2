//! Scripted stand-ins for the media transport and the face model.
//!
//! A replay script describes one room visit: when remote tracks come and go,
//! and which faces the model "sees" on each track. Synthetic frames are pushed
//! into attached elements on a fixed interval so the detection loop runs
//! exactly as it would against a live stream.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use moodroom_core::{
    AttachedElements, DetectionError, MediaElement, MediaTrack, ParticipantIdentity, Resolution,
    TrackKind, TrackSid, TransportError, VideoFrame,
};
use moodroom_detection::{DetectorOptions, ExpressionModel, FaceDetection};
use moodroom_session::{RoomConnector, RoomEvent, RoomEvents, RoomHandle};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Sid given to the local camera track.
pub const LOCAL_TRACK_SID: &str = "TR_local";
/// Key in `faces` that refers to the local camera.
const LOCAL_FACES_KEY: &str = "local";

// MARK: - Script

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub room: Option<String>,
    pub participant: Option<String>,
    /// Skip the token endpoint and use this token.
    pub token: Option<String>,
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_resolution")]
    pub resolution: Resolution,
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
    /// Per track sid (or `local`): one face list per detection cycle, cycled.
    #[serde(default)]
    pub faces: HashMap<String, Vec<Vec<FaceDetection>>>,
}

fn default_duration_ms() -> u64 {
    10_000
}

fn default_frame_interval_ms() -> u64 {
    100
}

fn default_resolution() -> Resolution {
    Resolution::VGA
}

fn video() -> TrackKind {
    TrackKind::Video
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEvent {
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScriptAction {
    TrackSubscribed {
        sid: TrackSid,
        participant: ParticipantIdentity,
        #[serde(default = "video")]
        kind: TrackKind,
    },
    TrackUnsubscribed {
        sid: TrackSid,
        participant: ParticipantIdentity,
    },
    ParticipantDisconnected {
        identity: ParticipantIdentity,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
}

impl Script {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(json).context("invalid replay script")?;
        if script.frame_interval_ms == 0 {
            bail!("frameIntervalMs must be greater than zero");
        }
        if script.resolution.total_pixels() == 0 {
            bail!("resolution must not be empty");
        }
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Face lists keyed by the sid they will arrive on.
    pub fn faces_by_track(&self) -> HashMap<TrackSid, Vec<Vec<FaceDetection>>> {
        self.faces
            .iter()
            .map(|(key, cycles)| {
                let sid = if key == LOCAL_FACES_KEY { LOCAL_TRACK_SID } else { key.as_str() };
                (TrackSid::new(sid), cycles.clone())
            })
            .collect()
    }
}

// MARK: - ScriptedTrack

/// A track whose video is a solid-colour frame generator.
#[derive(Debug)]
pub struct ScriptedTrack {
    sid: TrackSid,
    kind: TrackKind,
    attached: Arc<AttachedElements>,
    pump: Option<JoinHandle<()>>,
}

impl ScriptedTrack {
    pub fn spawn(sid: TrackSid, kind: TrackKind, resolution: Resolution, frame_interval: Duration) -> Arc<Self> {
        let attached = Arc::new(AttachedElements::default());
        let pump = (kind == TrackKind::Video).then(|| {
            tokio::spawn(pump_frames(sid.clone(), Arc::clone(&attached), resolution, frame_interval))
        });
        Arc::new(Self { sid, kind, attached, pump })
    }
}

impl MediaTrack for ScriptedTrack {
    fn sid(&self) -> &TrackSid {
        &self.sid
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn attach(&self, element: MediaElement) {
        self.attached.attach(&self.sid, element);
    }

    fn detach(&self, element: &MediaElement) {
        self.attached.detach(&self.sid, element);
    }
}

impl Drop for ScriptedTrack {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump_frames(sid: TrackSid, attached: Arc<AttachedElements>, resolution: Resolution, every: Duration) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut n: u64 = 0;
    loop {
        ticker.tick().await;
        let shade = (n % 256) as u8;
        let ts = started.elapsed().as_micros() as u64;
        attached.present(&VideoFrame::solid(sid.clone(), resolution, [shade, 96, 160, 255], ts));
        n += 1;
    }
}

// MARK: - ScriptedRoom

pub struct ScriptedRoom {
    resolution: Resolution,
    frame_interval: Duration,
    player: Mutex<Option<JoinHandle<()>>>,
    local: Mutex<Option<Arc<ScriptedTrack>>>,
    disconnected: AtomicBool,
}

impl ScriptedRoom {
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomHandle for ScriptedRoom {
    async fn enable_camera_and_microphone(&self) -> Result<Arc<dyn MediaTrack>, TransportError> {
        let track = ScriptedTrack::spawn(
            TrackSid::new(LOCAL_TRACK_SID),
            TrackKind::Video,
            self.resolution,
            self.frame_interval,
        );
        *self.local.lock() = Some(Arc::clone(&track));
        info!("Local camera publishing as {}", LOCAL_TRACK_SID);
        Ok(track)
    }

    async fn disconnect(&self) {
        if let Some(player) = self.player.lock().take() {
            player.abort();
        }
        self.local.lock().take();
        self.disconnected.store(true, Ordering::SeqCst);
        info!("Scripted room disconnected");
    }
}

impl Drop for ScriptedRoom {
    fn drop(&mut self) {
        if let Some(player) = self.player.lock().take() {
            player.abort();
        }
    }
}

// MARK: - ScriptedConnector

/// Plays a script's room events as if they came from a media server.
pub struct ScriptedConnector {
    script: Arc<Script>,
    room: Mutex<Option<Arc<ScriptedRoom>>>,
}

impl ScriptedConnector {
    pub fn new(script: Arc<Script>) -> Self {
        Self { script, room: Mutex::new(None) }
    }

    /// The most recently connected room.
    pub fn room(&self) -> Option<Arc<ScriptedRoom>> {
        self.room.lock().clone()
    }
}

#[async_trait]
impl RoomConnector for ScriptedConnector {
    async fn connect(&self, url: &str, token: &str) -> Result<(Arc<dyn RoomHandle>, RoomEvents), TransportError> {
        if token.is_empty() {
            return Err(TransportError::ConnectionFailed { reason: "empty access token".into() });
        }
        info!("Connecting to {} (scripted, {} events)", url, self.script.events.len());

        let (tx, rx) = mpsc::unbounded_channel();
        let player = tokio::spawn(play_events(Arc::clone(&self.script), tx));
        let room = Arc::new(ScriptedRoom {
            resolution: self.script.resolution,
            frame_interval: self.script.frame_interval(),
            player: Mutex::new(Some(player)),
            local: Mutex::new(None),
            disconnected: AtomicBool::new(false),
        });
        *self.room.lock() = Some(Arc::clone(&room));
        Ok((room, rx))
    }
}

async fn play_events(script: Arc<Script>, tx: mpsc::UnboundedSender<RoomEvent>) {
    let started = Instant::now();
    let mut events = script.events.clone();
    events.sort_by_key(|e| e.at_ms);

    for event in events {
        tokio::time::sleep_until(started + Duration::from_millis(event.at_ms)).await;
        let room_event = match event.action {
            ScriptAction::TrackSubscribed { sid, participant, kind } => {
                let track = ScriptedTrack::spawn(sid, kind, script.resolution, script.frame_interval());
                RoomEvent::TrackSubscribed { track, participant }
            }
            ScriptAction::TrackUnsubscribed { sid, participant } => {
                RoomEvent::TrackUnsubscribed { sid, participant }
            }
            ScriptAction::ParticipantDisconnected { identity } => {
                RoomEvent::ParticipantDisconnected { identity }
            }
            ScriptAction::Disconnected { reason } => RoomEvent::Disconnected { reason },
        };
        debug!("t+{}ms: {:?}", event.at_ms, room_event);
        if tx.send(room_event).is_err() {
            return;
        }
    }

    // Keep the stream open until the session lets go of it.
    tx.closed().await;
}

// MARK: - ScriptedModel

/// Answers each detection with the script's next face list for the frame's track.
pub struct ScriptedModel {
    faces: HashMap<TrackSid, Vec<Vec<FaceDetection>>>,
    cursors: Mutex<HashMap<TrackSid, usize>>,
    loaded: AtomicBool,
}

impl ScriptedModel {
    pub fn from_script(script: &Script) -> Self {
        Self {
            faces: script.faces_by_track(),
            cursors: Mutex::new(HashMap::new()),
            loaded: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ExpressionModel for ScriptedModel {
    async fn load(&self, model_dir: &Path) -> Result<(), DetectionError> {
        debug!("Scripted model ready (ignoring {})", model_dir.display());
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn detect_all_faces(
        &self,
        frame: &VideoFrame,
        _options: &DetectorOptions,
    ) -> Result<Vec<FaceDetection>, DetectionError> {
        let Some(cycles) = self.faces.get(&frame.source).filter(|c| !c.is_empty()) else {
            return Ok(Vec::new());
        };
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(frame.source.clone()).or_insert(0);
        let faces = cycles[*cursor % cycles.len()].clone();
        *cursor += 1;
        Ok(faces)
    }

    fn required_artifacts(&self) -> &'static [&'static str] {
        &[]
    }
}
