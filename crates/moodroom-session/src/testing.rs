//! In-process fakes for the transport, token service and model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use moodroom_core::{
    AttachedElements, DetectionConfig, DetectionError, ExpressionScores, MediaElement, MediaTrack,
    Resolution, TokenError, TrackKind, TrackSid, TransportError, VideoFrame,
};
use moodroom_detection::{DetectorOptions, ExpressionModel, FaceDetection};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::board::ExpressionEvent;
use crate::tile::TileContext;
use crate::token::TokenSource;
use crate::transport::{RoomConnector, RoomEvent, RoomEvents, RoomHandle};

pub type OpLog = Arc<Mutex<Vec<String>>>;

// MARK: - FakeTrack

#[derive(Debug)]
pub struct FakeTrack {
    sid: TrackSid,
    kind: TrackKind,
    attached: AttachedElements,
    log: OpLog,
}

impl FakeTrack {
    pub fn new(sid: &str, kind: TrackKind, log: OpLog) -> Arc<Self> {
        Arc::new(Self { sid: sid.into(), kind, attached: AttachedElements::default(), log })
    }

    pub fn video(sid: &str) -> Arc<Self> {
        Self::new(sid, TrackKind::Video, Self::shared_log())
    }

    pub fn audio(sid: &str) -> Arc<Self> {
        Self::new(sid, TrackKind::Audio, Self::shared_log())
    }

    pub fn logged(sid: &str, log: OpLog) -> Arc<Self> {
        Self::new(sid, TrackKind::Video, log)
    }

    pub fn shared_log() -> OpLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn push_frame(&self, resolution: Resolution) -> usize {
        self.attached
            .present(&VideoFrame::solid(self.sid.clone(), resolution, [128, 128, 128, 255], 0))
    }
}

impl MediaTrack for FakeTrack {
    fn sid(&self) -> &TrackSid {
        &self.sid
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn attach(&self, element: MediaElement) {
        self.log.lock().push(format!("attach {} {}", self.sid, element.id()));
        self.attached.attach(&self.sid, element);
    }

    fn detach(&self, element: &MediaElement) {
        self.log.lock().push(format!("detach {} {}", self.sid, element.id()));
        self.attached.detach(&self.sid, element);
    }
}

// MARK: - StaticModel

/// Always-loaded model answering with one fixed face per track.
#[derive(Default)]
pub struct StaticModel {
    loaded: AtomicBool,
    faces: Mutex<HashMap<TrackSid, ExpressionScores>>,
}

impl StaticModel {
    pub fn set_scores(&self, sid: &str, scores: ExpressionScores) {
        self.faces.lock().insert(sid.into(), scores);
    }
}

#[async_trait]
impl ExpressionModel for StaticModel {
    async fn load(&self, _model_dir: &Path) -> Result<(), DetectionError> {
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
        Ok(self
            .faces
            .lock()
            .get(&frame.source)
            .map(|scores| vec![FaceDetection { score: 0.9, expressions: *scores, ..Default::default() }])
            .unwrap_or_default())
    }

    fn required_artifacts(&self) -> &'static [&'static str] {
        &[]
    }
}

pub fn tile_context(
    model: Arc<dyn ExpressionModel>,
) -> (TileContext, mpsc::UnboundedReceiver<ExpressionEvent>) {
    let (events, rx) = mpsc::unbounded_channel();
    let ctx = TileContext {
        model,
        detection: DetectionConfig::default(),
        model_dir: PathBuf::from("models"),
        events,
    };
    (ctx, rx)
}

// MARK: - FakeTokens

pub struct FakeTokens {
    pub fail_status: Option<u16>,
    pub calls: AtomicUsize,
}

impl FakeTokens {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { fail_status: None, calls: AtomicUsize::new(0) })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self { fail_status: Some(status), calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn fetch(&self, room_name: &str, participant_name: &str) -> Result<String, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_status {
            Some(status) => Err(TokenError::Status { status, body: "token service down".into() }),
            None => Ok(format!("{participant_name}@{room_name}")),
        }
    }
}

// MARK: - FakeConnector

#[derive(Default)]
pub struct FakeRoom {
    pub disconnected: AtomicBool,
    fail_media: bool,
    local: Mutex<Option<Arc<FakeTrack>>>,
}

#[async_trait]
impl RoomHandle for FakeRoom {
    async fn enable_camera_and_microphone(&self) -> Result<Arc<dyn MediaTrack>, TransportError> {
        if self.fail_media {
            return Err(TransportError::MediaUnavailable { reason: "no camera".into() });
        }
        let track = FakeTrack::video("TR_local");
        *self.local.lock() = Some(Arc::clone(&track));
        Ok(track)
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeConnector {
    fail_connect: bool,
    fail_media: bool,
    pub connects: Mutex<Vec<(String, String)>>,
    room: Mutex<Option<Arc<FakeRoom>>>,
    events: Mutex<Option<mpsc::UnboundedSender<RoomEvent>>>,
}

impl FakeConnector {
    /// Connector whose `connect` is refused.
    pub fn failing_connect() -> Arc<Self> {
        Arc::new(Self { fail_connect: true, ..Default::default() })
    }

    /// Connector whose rooms have no camera or microphone.
    pub fn failing_media() -> Arc<Self> {
        Arc::new(Self { fail_media: true, ..Default::default() })
    }

    pub fn room(&self) -> Option<Arc<FakeRoom>> {
        self.room.lock().clone()
    }

    pub fn local_track(&self) -> Option<Arc<FakeTrack>> {
        self.room().and_then(|room| room.local.lock().clone())
    }

    /// Deliver an event as the transport would. False once the receiver is gone.
    pub fn emit(&self, event: RoomEvent) -> bool {
        self.events.lock().as_ref().is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Close the event stream without a `Disconnected` event.
    pub fn drop_events(&self) {
        self.events.lock().take();
    }
}

#[async_trait]
impl RoomConnector for FakeConnector {
    async fn connect(&self, url: &str, token: &str) -> Result<(Arc<dyn RoomHandle>, RoomEvents), TransportError> {
        self.connects.lock().push((url.to_string(), token.to_string()));
        if self.fail_connect {
            return Err(TransportError::ConnectionFailed { reason: "refused".into() });
        }
        let room = Arc::new(FakeRoom { fail_media: self.fail_media, ..Default::default() });
        let (tx, rx) = mpsc::unbounded_channel();
        *self.room.lock() = Some(Arc::clone(&room));
        *self.events.lock() = Some(tx);
        Ok((room, rx))
    }
}
