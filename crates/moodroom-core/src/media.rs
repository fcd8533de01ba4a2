//! Media elements and the track handle contract.
//!
//! Tracks are owned by the transport. Components in this workspace only
//! attach them to an element and detach them again; an element holds at most
//! one bound track at a time.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::types::{Resolution, TrackKind, TrackSid, VideoFrame};

// MARK: - MediaTrack

/// Handle to a live audio or video stream.
///
/// `attach` must bind the element to this track (`MediaElement::bind`) and
/// start delivering media to it; `detach` must stop delivery and unbind.
pub trait MediaTrack: Send + Sync + std::fmt::Debug {
    fn sid(&self) -> &TrackSid;
    fn kind(&self) -> TrackKind;
    fn attach(&self, element: MediaElement);
    fn detach(&self, element: &MediaElement);
}

// MARK: - VideoElement

#[derive(Debug, Default)]
struct VideoState {
    bound: Option<TrackSid>,
    frame: Option<VideoFrame>,
    frames_presented: u64,
}

/// Display surface for one video track.
#[derive(Debug)]
pub struct VideoElement {
    id: String,
    state: Mutex<VideoState>,
}

impl VideoElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(VideoState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Present a frame. Frames from a track other than the bound one are dropped.
    pub fn present(&self, frame: VideoFrame) -> bool {
        let mut s = self.state.lock();
        if s.bound.as_ref() != Some(&frame.source) {
            return false;
        }
        s.frames_presented += 1;
        s.frame = Some(frame);
        true
    }

    /// True once the bound track has presented at least one frame.
    pub fn is_ready(&self) -> bool {
        let s = self.state.lock();
        s.bound.is_some() && s.frame.is_some()
    }

    pub fn current_frame(&self) -> Option<VideoFrame> {
        self.state.lock().frame.clone()
    }

    pub fn native_resolution(&self) -> Option<Resolution> {
        self.state.lock().frame.as_ref().map(VideoFrame::resolution)
    }

    pub fn bound_track(&self) -> Option<TrackSid> {
        self.state.lock().bound.clone()
    }

    pub fn frames_presented(&self) -> u64 {
        self.state.lock().frames_presented
    }

    fn bind(&self, sid: &TrackSid) {
        let mut s = self.state.lock();
        if let Some(prev) = s.bound.as_ref().filter(|prev| *prev != sid) {
            warn!("Element {} rebound from {} to {} without detach", self.id, prev, sid);
        }
        s.bound = Some(sid.clone());
        s.frame = None;
    }

    fn unbind(&self, sid: &TrackSid) -> bool {
        let mut s = self.state.lock();
        if s.bound.as_ref() != Some(sid) {
            return false;
        }
        s.bound = None;
        s.frame = None;
        true
    }
}

// MARK: - AudioElement

#[derive(Debug)]
pub struct AudioElement {
    id: String,
    bound: Mutex<Option<TrackSid>>,
}

impl AudioElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bound: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bound_track(&self) -> Option<TrackSid> {
        self.bound.lock().clone()
    }
}

// MARK: - MediaElement

#[derive(Debug, Clone)]
pub enum MediaElement {
    Video(Arc<VideoElement>),
    Audio(Arc<AudioElement>),
}

impl MediaElement {
    pub fn id(&self) -> &str {
        match self {
            Self::Video(v) => v.id(),
            Self::Audio(a) => a.id(),
        }
    }

    pub fn bound_track(&self) -> Option<TrackSid> {
        match self {
            Self::Video(v) => v.bound_track(),
            Self::Audio(a) => a.bound_track(),
        }
    }

    pub fn bind(&self, sid: &TrackSid) {
        debug!("Binding {} to element {}", sid, self.id());
        match self {
            Self::Video(v) => v.bind(sid),
            Self::Audio(a) => *a.bound.lock() = Some(sid.clone()),
        }
    }

    /// Unbind if currently bound to `sid`. Returns whether anything changed.
    pub fn unbind(&self, sid: &TrackSid) -> bool {
        match self {
            Self::Video(v) => v.unbind(sid),
            Self::Audio(a) => {
                let mut bound = a.bound.lock();
                if bound.as_ref() == Some(sid) {
                    *bound = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn same_as(&self, other: &MediaElement) -> bool {
        match (self, other) {
            (Self::Video(a), Self::Video(b)) => Arc::ptr_eq(a, b),
            (Self::Audio(a), Self::Audio(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// MARK: - AttachedElements

/// Element bookkeeping for `MediaTrack` implementations.
#[derive(Debug, Default)]
pub struct AttachedElements {
    elements: Mutex<Vec<MediaElement>>,
}

impl AttachedElements {
    pub fn attach(&self, sid: &TrackSid, element: MediaElement) {
        element.bind(sid);
        let mut elements = self.elements.lock();
        if !elements.iter().any(|e| e.same_as(&element)) {
            elements.push(element);
        }
    }

    pub fn detach(&self, sid: &TrackSid, element: &MediaElement) {
        element.unbind(sid);
        self.elements.lock().retain(|e| !e.same_as(element));
    }

    pub fn len(&self) -> usize {
        self.elements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a frame to every attached video element.
    pub fn present(&self, frame: &VideoFrame) -> usize {
        let elements = self.elements.lock().clone();
        elements
            .iter()
            .filter_map(|e| match e {
                MediaElement::Video(v) => Some(v.present(frame.clone())),
                MediaElement::Audio(_) => None,
            })
            .filter(|delivered| *delivered)
            .count()
    }
}
