//! Keeps the mounted tiles and audio sinks in step with the session's tracks.

use std::sync::Arc;

use moodroom_core::{MediaTrack, ParticipantIdentity, TrackKind, TrackSid};
use tracing::debug;

use crate::session::RemoteTrackEntry;
use crate::tile::{AudioSink, ParticipantTile, TileContext};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TileKey {
    Local,
    Remote(TrackSid),
}

/// The local participant's camera, when published.
pub struct LocalVideo<'a> {
    pub identity: &'a ParticipantIdentity,
    pub track: &'a Arc<dyn MediaTrack>,
}

#[derive(Default)]
pub struct Stage {
    tiles: Vec<(TileKey, ParticipantTile)>,
    audio: Vec<AudioSink>,
}

impl Stage {
    /// Mount what is new, unmount what is gone. Tiles come out local first,
    /// then remote video in collection order. Returns whether anything changed.
    pub fn reconcile(
        &mut self,
        local: Option<LocalVideo<'_>>,
        remote: &[RemoteTrackEntry],
        ctx: &TileContext,
    ) -> bool {
        let mut wanted: Vec<(TileKey, &ParticipantIdentity, &Arc<dyn MediaTrack>, bool)> = Vec::new();
        if let Some(local) = &local {
            wanted.push((TileKey::Local, local.identity, local.track, true));
        }
        for entry in remote.iter().filter(|e| e.track.kind() == TrackKind::Video) {
            wanted.push((TileKey::Remote(entry.track.sid().clone()), &entry.identity, &entry.track, false));
        }
        let wanted_audio: Vec<&Arc<dyn MediaTrack>> = remote
            .iter()
            .filter(|e| e.track.kind() == TrackKind::Audio)
            .map(|e| &e.track)
            .collect();

        let mut changed = false;

        // Unmount leftovers before mounting anything new.
        let before = self.tiles.len() + self.audio.len();
        self.tiles.retain(|(key, _)| wanted.iter().any(|(k, ..)| k == key));
        self.audio
            .retain(|sink| wanted_audio.iter().any(|t| t.sid() == sink.track_sid()));
        changed |= before != self.tiles.len() + self.audio.len();

        let mut previous = std::mem::take(&mut self.tiles);
        for (key, identity, track, is_local) in wanted {
            let tile = match previous.iter().position(|(k, _)| *k == key) {
                Some(i) => {
                    let (_, mut tile) = previous.swap_remove(i);
                    changed |= tile.replace_track(Arc::clone(track));
                    tile
                }
                None => {
                    changed = true;
                    ParticipantTile::mount(identity.clone(), Arc::clone(track), is_local, ctx)
                }
            };
            self.tiles.push((key, tile));
        }

        for track in wanted_audio {
            if !self.audio.iter().any(|sink| sink.track_sid() == track.sid()) {
                self.audio.push(AudioSink::mount(Arc::clone(track)));
                changed = true;
            }
        }

        if changed {
            debug!("Stage: {} tiles, {} audio sinks", self.tiles.len(), self.audio.len());
        }
        changed
    }

    pub fn tiles(&self) -> impl Iterator<Item = &ParticipantTile> {
        self.tiles.iter().map(|(_, tile)| tile)
    }

    pub fn tile(&self, key: &TileKey) -> Option<&ParticipantTile> {
        self.tiles.iter().find(|(k, _)| k == key).map(|(_, tile)| tile)
    }

    pub fn audio_sinks(&self) -> &[AudioSink] {
        &self.audio
    }

    pub fn len(&self) -> usize {
        self.tiles.len() + self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unmount everything.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.audio.clear();
    }
}
