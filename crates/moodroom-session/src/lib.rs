//! moodroom-session
//!
//! Joins a media room, keeps one tile per video track and one sink per remote
//! audio track, and collects every tile's expression label on a shared board.

pub mod board;
pub mod session;
pub mod stage;
pub mod tile;
pub mod token;
pub mod transport;
pub mod view;

#[cfg(test)]
mod testing;

pub use board::{ExpressionBoard, ExpressionEvent};
pub use session::{RemoteTrackEntry, RoomSession, SessionUpdate};
pub use stage::{LocalVideo, Stage, TileKey};
pub use tile::{AudioSink, ParticipantTile, TileContext};
pub use token::{LiteralToken, TokenClient, TokenSource};
pub use transport::{RoomConnector, RoomEvent, RoomEvents, RoomHandle};
pub use view::{JoinForm, RoomView, TileView};
