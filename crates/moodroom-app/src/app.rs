use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use moodroom_core::ClientConfig;
use moodroom_session::{LiteralToken, RoomSession, RoomView, SessionUpdate, TokenClient, TokenSource};
use tracing::{info, warn};

use crate::replay::{Script, ScriptedConnector, ScriptedModel};
use crate::Args;

/// Replay loop
///
/// # Flow
/// 1. Build `ClientConfig` (file → environment → CLI flags)
/// 2. Load the script; pick a literal token or the token endpoint
/// 3. Join with the scripted transport and model
/// 4. Print the room view whenever it changes
/// 5. Leave after `durationMs`, on server disconnect, or on Ctrl-C
pub async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    }
    .with_env()
    .context("invalid environment configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    let config = Arc::new(config);
    let endpoints = config.endpoints();
    info!("Token endpoint: {} | media server: {}", endpoints.token_url(), endpoints.livekit_url);

    let script = Script::load(&args.script)?;
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, leaving room...");
    };

    let outcome = replay(
        config,
        script,
        JoinOverrides { room: args.room, participant: args.participant },
        args.overlay_dir.as_deref(),
        shutdown,
    )
    .await?;

    for path in &outcome.overlays {
        info!("Overlay written: {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct JoinOverrides {
    pub room: Option<String>,
    pub participant: Option<String>,
}

#[derive(Debug)]
pub struct ReplayOutcome {
    /// Every distinct view printed, in order.
    pub views: Vec<RoomView>,
    pub overlays: Vec<PathBuf>,
}

pub async fn replay(
    config: Arc<ClientConfig>,
    script: Script,
    overrides: JoinOverrides,
    overlay_dir: Option<&Path>,
    shutdown: impl Future<Output = ()>,
) -> Result<ReplayOutcome> {
    let script = Arc::new(script);
    let tokens: Arc<dyn TokenSource> = match &script.token {
        Some(token) => Arc::new(LiteralToken(token.clone())),
        None => Arc::new(TokenClient::new(&config.endpoints())?),
    };
    let connector = Arc::new(ScriptedConnector::new(Arc::clone(&script)));
    let model = Arc::new(ScriptedModel::from_script(&script));

    let mut session = RoomSession::new(config, tokens, connector.clone(), model);
    if let Some(room) = overrides.room.or_else(|| script.room.clone()) {
        session.form_mut().room_name = room;
    }
    if let Some(participant) = overrides.participant.or_else(|| script.participant.clone()) {
        session.form_mut().participant_name = participant;
    }

    let mut printer = ViewPrinter::default();
    printer.show(session.view());

    session.join_with_form().await.context("failed to join room")?;
    printer.show(session.view());

    let deadline = tokio::time::sleep(script.duration());
    tokio::pin!(deadline);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Replay finished after {} ms", script.duration_ms);
                break;
            }
            _ = &mut shutdown => break,
            update = session.next_update() => {
                if update.changed() {
                    printer.show(session.view());
                }
                if update == SessionUpdate::Left {
                    warn!("Room closed before the script finished");
                    break;
                }
            }
        }
    }

    let overlays = match overlay_dir {
        Some(dir) => write_overlays(&session, dir)?,
        None => Vec::new(),
    };

    session.leave().await;
    printer.show(session.view());
    if connector.room().is_some_and(|room| !room.is_disconnected()) {
        warn!("Scripted room still connected after leave");
    }

    Ok(ReplayOutcome { views: printer.views, overlays })
}

fn write_overlays(session: &RoomSession, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = Vec::new();
    for tile in session.stage().tiles() {
        // element ids repeat when one participant publishes several cameras
        let path = dir.join(format!("{}.png", file_stem(tile.track_sid().as_str())));
        tile.save_overlay(&path)
            .with_context(|| format!("failed to write overlay {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Default)]
struct ViewPrinter {
    views: Vec<RoomView>,
}

impl ViewPrinter {
    fn show(&mut self, view: RoomView) {
        if self.views.last() == Some(&view) {
            return;
        }
        println!("{view}");
        self.views.push(view);
    }
}
