pub mod config;
pub mod errors;
pub mod expression;
pub mod media;
pub mod types;

pub use config::{ClientConfig, DetectionConfig, Endpoints, Locale, StaleLabelPolicy};
pub use errors::{ConfigError, DetectionError, JoinError, TokenError, TransportError};
pub use expression::{classify, label_text, Expression, ExpressionScores, Indicator};
pub use media::{AttachedElements, AudioElement, MediaElement, MediaTrack, VideoElement};
pub use types::*;
