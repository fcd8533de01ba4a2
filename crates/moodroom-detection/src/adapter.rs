//! Detection adapter: samples one video element on a fixed interval.
//!
//! # Lifecycle
//!
//! ```text
//! 1. DetectionAdapter::spawn(element, model, config, model_dir)
//!       └─ timer task: verify artifacts → model.load() → interval loop
//! 2. every tick: acquire the in-flight slot or skip the tick
//!       └─ cycle task: frame → detect_all_faces → classify → publish → draw
//! 3. drop / stop(): the timer is aborted; a cycle already running finishes
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use image::{ImageResult, RgbaImage};
use moodroom_core::expression::classify_with_threshold;
use moodroom_core::{DetectionConfig, Expression, Indicator, VideoElement};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::model::{verify_artifacts, DetectorOptions, ExpressionModel};
use crate::overlay::OverlayCanvas;

// MARK: - Stats

#[derive(Debug, Default)]
struct Counters {
    cycles_run: AtomicU64,
    skipped_busy: AtomicU64,
    skipped_not_ready: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of an adapter's cycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterStats {
    /// Cycles that reached the model and completed.
    pub cycles_run: u64,
    /// Ticks dropped because the previous cycle was still running.
    pub skipped_busy: u64,
    /// Ticks dropped because no frame was available or the model was unloaded.
    pub skipped_not_ready: u64,
    /// Cycles aborted by a model error.
    pub failures: u64,
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub faces: usize,
    pub label: Option<Expression>,
}

// MARK: - Shared

struct Shared {
    element: Arc<VideoElement>,
    model: Arc<dyn ExpressionModel>,
    options: DetectorOptions,
    threshold: f32,
    label_tx: watch::Sender<Option<Expression>>,
    indicator: Mutex<Option<Indicator>>,
    overlay: Mutex<OverlayCanvas>,
    last_cycle: Mutex<Option<CycleReport>>,
    in_flight: AtomicBool,
    counters: Counters,
}

impl Shared {
    async fn run_cycle(&self) -> Option<CycleReport> {
        if !self.model.is_loaded() {
            self.counters.skipped_not_ready.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let frame = match self.element.current_frame() {
            Some(frame) if self.element.is_ready() => frame,
            _ => {
                self.counters.skipped_not_ready.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let detections = match self.model.detect_all_faces(&frame, &self.options).await {
            Ok(d) => d,
            Err(e) => {
                let n = self.counters.failures.fetch_add(1, Ordering::Relaxed) + 1;
                if n <= 10 || n % 100 == 0 {
                    warn!("[{}] detection cycle aborted (#{}): {}", self.element.id(), n, e);
                }
                return None;
            }
        };
        self.counters.cycles_run.fetch_add(1, Ordering::Relaxed);

        let label = detections
            .first()
            .and_then(|face| classify_with_threshold(&face.expressions, self.threshold));

        *self.indicator.lock() = label.map(Expression::indicator);
        self.label_tx.send_if_modified(|current| {
            if *current == label {
                return false;
            }
            *current = label;
            true
        });
        self.overlay.lock().draw(frame.resolution(), &detections, label);

        debug!(
            "[{}] cycle: faces={} label={:?}",
            self.element.id(),
            detections.len(),
            label
        );
        Some(CycleReport { faces: detections.len(), label })
    }
}

/// Holds the single in-flight slot; released on drop, including on panic.
struct InFlightGuard {
    shared: Arc<Shared>,
}

impl InFlightGuard {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { shared: Arc::clone(shared) })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
    }
}

// MARK: - DetectionAdapter

pub struct DetectionAdapter {
    shared: Arc<Shared>,
    timer: JoinHandle<()>,
}

impl DetectionAdapter {
    /// Start the load step and sampling loop for `element`.
    pub fn spawn(
        element: Arc<VideoElement>,
        model: Arc<dyn ExpressionModel>,
        config: &DetectionConfig,
        model_dir: PathBuf,
    ) -> Self {
        let (label_tx, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            element,
            model,
            options: DetectorOptions::from(config),
            threshold: config.expression_threshold,
            label_tx,
            indicator: Mutex::new(None),
            overlay: Mutex::new(OverlayCanvas::default()),
            last_cycle: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            counters: Counters::default(),
        });

        let interval = config.interval();
        let timer = tokio::spawn(run_timer(Arc::clone(&shared), model_dir, interval));
        Self { shared, timer }
    }

    /// Receiver for the latest label. Only changes are signalled.
    pub fn subscribe(&self) -> watch::Receiver<Option<Expression>> {
        self.shared.label_tx.subscribe()
    }

    pub fn label(&self) -> Option<Expression> {
        *self.shared.label_tx.borrow()
    }

    pub fn indicator(&self) -> Option<Indicator> {
        *self.shared.indicator.lock()
    }

    pub fn stats(&self) -> AdapterStats {
        let c = &self.shared.counters;
        AdapterStats {
            cycles_run: c.cycles_run.load(Ordering::Relaxed),
            skipped_busy: c.skipped_busy.load(Ordering::Relaxed),
            skipped_not_ready: c.skipped_not_ready.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }

    /// Report of the most recent completed cycle.
    pub fn last_cycle(&self) -> Option<CycleReport> {
        *self.shared.last_cycle.lock()
    }

    pub fn overlay_snapshot(&self) -> RgbaImage {
        self.shared.overlay.lock().image().clone()
    }

    pub fn save_overlay(&self, path: &Path) -> ImageResult<()> {
        self.shared.overlay.lock().save_png(path)
    }

    pub fn element(&self) -> &Arc<VideoElement> {
        &self.shared.element
    }

    /// Stop future timer firings. A cycle already dispatched still completes.
    pub fn stop(&self) {
        self.timer.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.timer.is_finished()
    }
}

impl Drop for DetectionAdapter {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

async fn run_timer(shared: Arc<Shared>, model_dir: PathBuf, interval: std::time::Duration) {
    let id = shared.element.id().to_string();

    if let Err(e) = verify_artifacts(&model_dir, shared.model.required_artifacts()) {
        warn!("[{id}] face models unavailable: {e}");
        return;
    }
    if let Err(e) = shared.model.load(&model_dir).await {
        warn!("[{id}] face model load failed: {e}");
        return;
    }
    info!("[{id}] face models loaded from {} — sampling every {:?}", model_dir.display(), interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(guard) = InFlightGuard::acquire(&shared) else {
            let n = shared.counters.skipped_busy.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("[{id}] previous cycle still running — tick skipped ({n} total)");
            continue;
        };

        tokio::spawn(async move {
            let shared = Arc::clone(&guard.shared);
            if let Some(report) = shared.run_cycle().await {
                *shared.last_cycle.lock() = Some(report);
            }
            drop(guard);
        });
    }
}
