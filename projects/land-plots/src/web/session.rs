// Session registry: owns one capture surface per drawing session
//
// Plays the caller's part for each surface: persists completed plots and
// fans surface events out to SSE subscribers.

use crate::session_context::{self, SessionMetadata};
use crate::surface::capture::CaptureSurface;
use crate::surface::types::{Plot, Point, SketchState, SurfaceInputs};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// A polygon was committed
    PlotCompleted { plot: Plot },
    /// Something visible changed; clients should re-fetch the rendering
    Redraw { revision: u64 },
    /// A committed plot could not be written to plots.json
    PersistFailed { plot_id: String, error: String },
}

impl SurfaceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceEvent::PlotCompleted { .. } => "plot_completed",
            SurfaceEvent::Redraw { .. } => "redraw",
            SurfaceEvent::PersistFailed { .. } => "persist_failed",
        }
    }
}

/// Full view of a session as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub inputs: SurfaceInputs,
    pub state: SketchState,
    pub in_progress: Vec<Point>,
    pub dragging: bool,
    pub plots: Vec<Plot>,
    /// Ids of committed plots that only exist in memory
    pub unsaved_plots: Vec<String>,
    pub revision: u64,
}

pub struct Session {
    pub metadata: SessionMetadata,
    surface: Mutex<CaptureSurface>,
    events: broadcast::Sender<SurfaceEvent>,
    unsaved: Arc<Mutex<Vec<String>>>,
}

impl Session {
    pub fn open(metadata: SessionMetadata, plots: Vec<Plot>, inputs: SurfaceInputs) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let unsaved = Arc::new(Mutex::new(Vec::new()));
        let sink_metadata = metadata.clone();
        let sink_events = events.clone();
        let sink_unsaved = unsaved.clone();
        let surface = CaptureSurface::new(metadata.width, metadata.height, inputs)
            .with_plots(plots)
            .on_plot_completed(move |plot| {
                tracing::info!(
                    "Session {}: committed {} ({})",
                    sink_metadata.session_id,
                    plot.label(),
                    plot.id()
                );
                // No subscribers is not an error
                let _ = sink_events.send(SurfaceEvent::PlotCompleted { plot: plot.clone() });
                if let Err(e) = session_context::append_plot(&sink_metadata, plot) {
                    tracing::warn!(
                        "Session {}: failed to persist {}: {:#}",
                        sink_metadata.session_id,
                        plot.id(),
                        e
                    );
                    sink_unsaved
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(plot.id().to_string());
                    let _ = sink_events.send(SurfaceEvent::PersistFailed {
                        plot_id: plot.id().to_string(),
                        error: format!("{:#}", e),
                    });
                }
            });

        Arc::new(Self {
            metadata,
            surface: Mutex::new(surface),
            events,
            unsaved,
        })
    }

    /// True when `plot_id` was committed but could not be written to disk
    pub fn is_unsaved(&self, plot_id: &str) -> bool {
        self.unsaved_plots().iter().any(|id| id == plot_id)
    }

    pub fn unsaved_plots(&self) -> Vec<String> {
        self.unsaved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Idle sessions have no SSE subscribers and no sketch in progress, so
    /// dropping them loses nothing that is not on disk.
    fn is_idle(&self) -> bool {
        self.events.receiver_count() == 0 && self.read(|surface| surface.in_progress().is_empty())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }

    pub fn read<R>(&self, f: impl FnOnce(&CaptureSurface) -> R) -> R {
        let surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        f(&surface)
    }

    /// Runs `f` against the surface and announces a redraw if it changed.
    pub fn update<R>(&self, f: impl FnOnce(&mut CaptureSurface) -> R) -> R {
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        let before = surface.revision();
        let result = f(&mut surface);
        let after = surface.revision();
        if after != before {
            let _ = self.events.send(SurfaceEvent::Redraw { revision: after });
        }
        result
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read(|surface| SessionSnapshot {
            session_id: self.metadata.session_id.clone(),
            name: self.metadata.name.clone(),
            width: surface.width(),
            height: surface.height(),
            inputs: surface.inputs().clone(),
            state: surface.state(),
            in_progress: surface.in_progress().to_vec(),
            dragging: surface.is_dragging(),
            plots: surface.plots().to_vec(),
            unsaved_plots: self.unsaved_plots(),
            revision: surface.revision(),
        })
    }
}

/// Open sessions keyed by session id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, session: Arc<Session>) -> Arc<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        // Keep whichever instance registered first so concurrent restores
        // share one surface.
        sessions
            .entry(session.metadata.session_id.clone())
            .or_insert(session)
            .clone()
    }

    pub fn create(
        &self,
        output_root: &Path,
        name: &str,
        width: u32,
        height: u32,
        inputs: SurfaceInputs,
    ) -> Result<Arc<Session>> {
        let metadata = session_context::create_session(output_root, name, width, height)?;
        tracing::info!(
            "Created session {} ({}) {}x{}",
            metadata.session_id,
            name,
            width,
            height
        );
        Ok(self.insert(Session::open(metadata, Vec::new(), inputs)))
    }

    /// Drops idle sessions nobody else holds. They are restored from disk
    /// on next access. Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| Arc::strong_count(session) > 1 || !session.is_idle());
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    /// Returns an open session, restoring it from disk on first access.
    pub fn get_or_restore(
        &self,
        output_root: &Path,
        session_id: &str,
        inputs: SurfaceInputs,
    ) -> Result<Option<Arc<Session>>> {
        if let Some(session) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
        {
            return Ok(Some(session.clone()));
        }

        let Some(metadata) = session_context::load_session(output_root, session_id)? else {
            return Ok(None);
        };
        let plots = session_context::load_plots(&metadata)?;
        tracing::info!(
            "Restored session {} with {} plots",
            metadata.session_id,
            plots.len()
        );
        Ok(Some(self.insert(Session::open(metadata, plots, inputs))))
    }
}
