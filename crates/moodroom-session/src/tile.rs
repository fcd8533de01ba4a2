//! Participant tiles and audio sinks.
//!
//! A tile owns one video element, keeps exactly one track attached to it and
//! runs a [`DetectionAdapter`] over it. Labels flow upward as
//! [`ExpressionEvent`]s on the session's channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageResult;
use moodroom_core::{
    AudioElement, DetectionConfig, Expression, Indicator, Locale, MediaElement,
    MediaTrack, ParticipantIdentity, TrackSid, VideoElement,
};
use moodroom_detection::{AdapterStats, DetectionAdapter, ExpressionModel};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::board::ExpressionEvent;

/// Everything a tile needs from its session to mount.
#[derive(Clone)]
pub struct TileContext {
    pub model: Arc<dyn ExpressionModel>,
    pub detection: DetectionConfig,
    pub model_dir: PathBuf,
    pub events: mpsc::UnboundedSender<ExpressionEvent>,
}

// MARK: - ParticipantTile

pub struct ParticipantTile {
    identity: ParticipantIdentity,
    local: bool,
    track: Arc<dyn MediaTrack>,
    element: Arc<VideoElement>,
    adapter: DetectionAdapter,
    forwarder: JoinHandle<()>,
}

impl ParticipantTile {
    /// Attach `track` to a fresh element and start sampling it.
    pub fn mount(
        identity: ParticipantIdentity,
        track: Arc<dyn MediaTrack>,
        local: bool,
        ctx: &TileContext,
    ) -> Self {
        let element = Arc::new(VideoElement::new(format!("camera-{identity}")));
        track.attach(MediaElement::Video(Arc::clone(&element)));

        let adapter = DetectionAdapter::spawn(
            Arc::clone(&element),
            Arc::clone(&ctx.model),
            &ctx.detection,
            ctx.model_dir.clone(),
        );
        let forwarder = tokio::spawn(forward_labels(
            identity.clone(),
            adapter.subscribe(),
            ctx.events.clone(),
        ));

        debug!("Mounted tile {} on track {}", element.id(), track.sid());
        Self { identity, local, track, element, adapter, forwarder }
    }

    /// Swap in a different track. The old one is detached first.
    /// Returns false when `track` is already the attached one.
    pub fn replace_track(&mut self, track: Arc<dyn MediaTrack>) -> bool {
        if same_track(&self.track, &track) {
            return false;
        }
        debug!("Tile {}: track {} → {}", self.element.id(), self.track.sid(), track.sid());
        self.track.detach(&self.media());
        track.attach(self.media());
        self.track = track;
        true
    }

    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn track_sid(&self) -> &TrackSid {
        self.track.sid()
    }

    pub fn element(&self) -> &Arc<VideoElement> {
        &self.element
    }

    pub fn label(&self) -> Option<Expression> {
        self.adapter.label()
    }

    pub fn indicator(&self) -> Option<Indicator> {
        self.adapter.indicator()
    }

    pub fn stats(&self) -> AdapterStats {
        self.adapter.stats()
    }

    /// Write the current detection overlay as PNG.
    pub fn save_overlay(&self, path: &Path) -> ImageResult<()> {
        self.adapter.save_overlay(path)
    }

    /// `identity`, ` (You)` for the local tile, then `: label` when one is set.
    pub fn caption(&self, locale: Locale) -> String {
        let mut caption = self.identity.to_string();
        if self.local {
            caption.push_str(" (You)");
        }
        if let Some(label) = self.label() {
            caption.push_str(": ");
            caption.push_str(label.label(locale));
        }
        caption
    }

    fn media(&self) -> MediaElement {
        MediaElement::Video(Arc::clone(&self.element))
    }
}

impl Drop for ParticipantTile {
    fn drop(&mut self) {
        self.adapter.stop();
        self.forwarder.abort();
        self.track.detach(&self.media());
        debug!("Unmounted tile {}", self.element.id());
    }
}

fn same_track(a: &Arc<dyn MediaTrack>, b: &Arc<dyn MediaTrack>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

async fn forward_labels(
    identity: ParticipantIdentity,
    mut labels: watch::Receiver<Option<Expression>>,
    events: mpsc::UnboundedSender<ExpressionEvent>,
) {
    let initial = *labels.borrow_and_update();
    if events.send(ExpressionEvent { identity: identity.clone(), label: initial }).is_err() {
        return;
    }
    while labels.changed().await.is_ok() {
        let label = *labels.borrow_and_update();
        if events.send(ExpressionEvent { identity: identity.clone(), label }).is_err() {
            break;
        }
    }
}

// MARK: - AudioSink

/// Plays one remote audio track.
pub struct AudioSink {
    track: Arc<dyn MediaTrack>,
    element: Arc<AudioElement>,
}

impl AudioSink {
    pub fn mount(track: Arc<dyn MediaTrack>) -> Self {
        let element = Arc::new(AudioElement::new(format!("audio-{}", track.sid())));
        track.attach(MediaElement::Audio(Arc::clone(&element)));
        Self { track, element }
    }

    pub fn track_sid(&self) -> &TrackSid {
        self.track.sid()
    }

    pub fn element(&self) -> &Arc<AudioElement> {
        &self.element
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        self.track.detach(&MediaElement::Audio(Arc::clone(&self.element)));
    }
}
