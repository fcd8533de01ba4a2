//! Text snapshot of what the client would render.

use std::fmt;

use moodroom_core::Indicator;
use rand::Rng;

/// Values entered before joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinForm {
    pub participant_name: String,
    pub room_name: String,
}

impl Default for JoinForm {
    fn default() -> Self {
        Self {
            participant_name: format!("Participant{}", rand::thread_rng().gen_range(0..100)),
            room_name: "Test Room".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileView {
    pub element_id: String,
    pub caption: String,
    pub ready: bool,
    pub indicator: Option<Indicator>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomView {
    Lobby(JoinForm),
    Room {
        room_name: String,
        tiles: Vec<TileView>,
        audio: Vec<String>,
        expressions: Vec<String>,
    },
}

impl RoomView {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Lobby(form) => vec![
                "Join a Video Room".to_string(),
                format!("Participant: {}", form.participant_name),
                format!("Room: {}", form.room_name),
            ],
            Self::Room { room_name, tiles, audio, expressions } => {
                let mut lines = vec![format!("Room: {room_name}")];
                for tile in tiles {
                    let mut line = format!("[{}] {}", tile.element_id, tile.caption);
                    if !tile.ready {
                        line.push_str(" (waiting for video)");
                    }
                    if let Some(indicator) = tile.indicator {
                        line.push_str(&format!(" <{}>", indicator.border_class));
                    }
                    lines.push(line);
                }
                lines.extend(audio.iter().map(|id| format!("[{id}] audio")));
                lines.extend(expressions.iter().cloned());
                lines
            }
        }
    }
}

impl fmt::Display for RoomView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodroom_core::Expression;

    #[test]
    fn default_form_uses_random_participant_suffix() {
        let form = JoinForm::default();
        assert_eq!(form.room_name, "Test Room");
        let suffix: u32 = form.participant_name.trim_start_matches("Participant").parse().unwrap();
        assert!(suffix < 100);
    }

    #[test]
    fn room_renders_tiles_audio_and_board() {
        let view = RoomView::Room {
            room_name: "Test Room".into(),
            tiles: vec![
                TileView {
                    element_id: "camera-me".into(),
                    caption: "me (You): happy".into(),
                    ready: true,
                    indicator: Some(Expression::Happy.indicator()),
                },
                TileView {
                    element_id: "camera-bob".into(),
                    caption: "bob".into(),
                    ready: false,
                    indicator: None,
                },
            ],
            audio: vec!["audio-TR_a1".into()],
            expressions: vec!["me: happy".into(), "bob: ".into()],
        };

        assert_eq!(
            view.to_string(),
            "Room: Test Room\n\
             [camera-me] me (You): happy <joy>\n\
             [camera-bob] bob (waiting for video)\n\
             [audio-TR_a1] audio\n\
             me: happy\n\
             bob: \n"
        );
    }
}
