use serde::{Deserialize, Serialize};

// MARK: - Resolution

/// Native resolution of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const VGA: Self = Self { width: 640, height: 480 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// MARK: - TrackSid

/// Unique session id of a published track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackSid(String);

impl TrackSid {
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackSid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackSid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// MARK: - ParticipantIdentity

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantIdentity(String);

impl ParticipantIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// MARK: - TrackKind

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

// MARK: - SessionState

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No active room.
    #[default]
    Idle,
    /// Connected, tracks flowing.
    Joined {
        room_name: String,
        participant_name: String,
    },
}

impl SessionState {
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined { .. })
    }
}

// MARK: - VideoFrame

/// Decoded RGBA frame presented to a video element.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: bytes::Bytes,
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    /// Track that produced the frame.
    pub source: TrackSid,
}

impl VideoFrame {
    /// Solid-colour frame, used by synthetic sources.
    pub fn solid(source: TrackSid, resolution: Resolution, rgba: [u8; 4], timestamp_us: u64) -> Self {
        let pixels = resolution.total_pixels() as usize;
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            data: bytes::Bytes::from(data),
            width: resolution.width,
            height: resolution.height,
            timestamp_us,
            source,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}
