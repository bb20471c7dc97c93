use crate::cli::Args;
use crate::session_context::{list_sessions, SessionMetadata};
use crate::surface::color::Color;
use crate::surface::render::SvgCanvas;
use crate::surface::summary::{summarize, write_plots_csv, CategorySummary};
use crate::surface::types::{CropType, Plot, Point, SurfaceInputs};
use crate::web::session::{Session, SessionRegistry, SessionSnapshot, SurfaceEvent};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

pub struct AppState {
    pub args: Args,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(args: Args) -> Self {
        Self {
            args,
            sessions: SessionRegistry::new(),
        }
    }

    fn output_root(&self) -> &std::path::Path {
        std::path::Path::new(&self.args.output_root)
    }

    /// Inputs a freshly opened surface starts with: drawing off, default crop
    fn default_inputs(&self) -> SurfaceInputs {
        match CropType::from_label(&self.args.default_crop) {
            Some(crop) => SurfaceInputs {
                category: crop.label().to_string(),
                color: crop.color(),
                drawing_enabled: false,
            },
            None => SurfaceInputs::default(),
        }
    }
}

fn find_session(state: &AppState, session_id: &str) -> Result<Arc<Session>, StatusCode> {
    state
        .sessions
        .get_or_restore(state.output_root(), session_id, state.default_inputs())
        .map_err(|e| {
            tracing::warn!("Failed to open session {}: {}", session_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Serialize)]
pub struct CropInfo {
    pub crop: CropType,
    pub label: &'static str,
    pub color: Color,
}

pub async fn get_crops() -> Json<Vec<CropInfo>> {
    Json(
        CropType::ALL
            .into_iter()
            .map(|crop| CropInfo {
                crop,
                label: crop.label(),
                color: crop.color(),
            })
            .collect(),
    )
}

pub async fn get_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionMetadata>>, StatusCode> {
    list_sessions(state.output_root())
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let width = payload.width.unwrap_or(state.args.canvas_width);
    let height = payload.height.unwrap_or(state.args.canvas_height);
    if width == 0 || height == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.sessions.create(
        state.output_root(),
        &payload.name,
        width,
        height,
        state.default_inputs(),
    ) {
        Ok(session) => Ok(Json(session.snapshot())),
        Err(e) => {
            tracing::warn!("Failed to create session {}: {}", payload.name, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let session = find_session(&state, &session_id)?;
    Ok(Json(session.snapshot()))
}

#[derive(Deserialize)]
pub struct InputsRequest {
    pub category: String,
    /// Hex color; when absent the category must be a known crop
    pub color: Option<String>,
    pub drawing_enabled: bool,
}

impl InputsRequest {
    fn resolve(self) -> Result<SurfaceInputs, StatusCode> {
        let color = match self.color {
            Some(hex) => Color::parse_hex(&hex).map_err(|_| StatusCode::BAD_REQUEST)?,
            None => CropType::from_label(&self.category)
                .map(CropType::color)
                .ok_or(StatusCode::BAD_REQUEST)?,
        };
        Ok(SurfaceInputs {
            category: self.category,
            color,
            drawing_enabled: self.drawing_enabled,
        })
    }
}

pub async fn update_inputs_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<InputsRequest>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let session = find_session(&state, &session_id)?;
    let inputs = payload.resolve()?;
    session.update(|surface| surface.set_inputs(inputs));
    Ok(Json(session.snapshot()))
}

fn default_click_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerEvent {
    Down {
        x: f64,
        y: f64,
        #[serde(default = "default_click_count")]
        click_count: u32,
    },
    Move {
        x: f64,
        y: f64,
    },
    Up,
}

#[derive(Serialize)]
pub struct PointerResponse {
    pub committed: Option<Plot>,
    pub snapshot: SessionSnapshot,
}

pub async fn pointer_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(event): Json<PointerEvent>,
) -> Result<Json<PointerResponse>, StatusCode> {
    let session = find_session(&state, &session_id)?;
    let committed = session.update(|surface| match event {
        PointerEvent::Down { x, y, click_count } => {
            surface.pointer_down(Point::new(x, y), click_count)
        }
        PointerEvent::Move { x, y } => {
            surface.pointer_move(Point::new(x, y));
            None
        }
        PointerEvent::Up => {
            surface.pointer_up();
            None
        }
    });

    if let Some(plot) = &committed {
        if session.is_unsaved(plot.id()) {
            tracing::error!("Session {}: {} is not on disk", session_id, plot.id());
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok(Json(PointerResponse {
        committed,
        snapshot: session.snapshot(),
    }))
}

pub async fn undo_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let session = find_session(&state, &session_id)?;
    session.update(|surface| surface.undo_last_point());
    Ok(Json(session.snapshot()))
}

#[derive(Deserialize)]
pub struct PointQuery {
    pub x: f64,
    pub y: f64,
}

pub async fn plot_at_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<PointQuery>,
) -> Result<Json<Plot>, StatusCode> {
    let session = find_session(&state, &session_id)?;
    session
        .read(|surface| surface.plot_at(Point::new(query.x, query.y)).cloned())
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn render_svg_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let session = find_session(&state, &session_id)?;
    let svg = session.read(|surface| {
        let mut canvas = SvgCanvas::new();
        surface.render(&mut canvas);
        canvas.finish()
    });
    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        svg,
    ))
}

pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<CategorySummary>>, StatusCode> {
    let session = find_session(&state, &session_id)?;
    Ok(Json(session.read(|surface| summarize(surface.plots()))))
}

pub async fn plots_csv_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let session = find_session(&state, &session_id)?;
    let mut buf = Vec::new();
    session
        .read(|surface| write_plots_csv(surface.plots(), &mut buf))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let disposition = format!(
        "attachment; filename=\"{}-plots.csv\"",
        session.metadata.session_id
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buf,
    ))
}

fn to_sse_event(event: &SurfaceEvent) -> Option<Event> {
    Event::default().event(event.name()).json_data(event).ok()
}

/// Stream of surface events, starting with the current revision
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let session = find_session(&state, &session_id)?;
    let mut events = BroadcastStream::new(session.subscribe());
    let current = SurfaceEvent::Redraw {
        revision: session.read(|surface| surface.revision()),
    };

    let stream = async_stream::stream! {
        if let Some(event) = to_sse_event(&current) {
            yield Ok::<Event, Infallible>(event);
        }
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    if let Some(event) = to_sse_event(&event) {
                        yield Ok(event);
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!("Session {}: SSE client lagged by {} events", session_id, skipped);
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_context::tests::temp_root;
    use clap::Parser;

    fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
        let root = temp_root();
        let args = Args::try_parse_from([
            "land-plots",
            "--output-root",
            root.path().to_str().unwrap(),
        ])
        .unwrap();
        (Arc::new(AppState::new(args)), root)
    }

    async fn new_session(state: &Arc<AppState>) -> String {
        let Json(snapshot) = create_session_handler(
            State(state.clone()),
            Json(CreateSessionRequest {
                name: "Test field".into(),
                width: None,
                height: None,
            }),
        )
        .await
        .unwrap();
        snapshot.session_id
    }

    async fn send(state: &Arc<AppState>, id: &str, event: PointerEvent) -> PointerResponse {
        let Json(response) = pointer_handler(State(state.clone()), Path(id.to_string()), Json(event))
            .await
            .unwrap();
        response
    }

    async fn enable_drawing(state: &Arc<AppState>, id: &str, category: &str, color: Option<&str>) {
        update_inputs_handler(
            State(state.clone()),
            Path(id.to_string()),
            Json(InputsRequest {
                category: category.into(),
                color: color.map(str::to_string),
                drawing_enabled: true,
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_pointer_flow_commits_plot() {
        let (state, _root) = test_state();
        let id = new_session(&state).await;
        enable_drawing(&state, &id, "Corn", Some("#00FF00")).await;

        for (x, y) in [(10.0, 10.0), (50.0, 10.0), (50.0, 50.0)] {
            send(&state, &id, PointerEvent::Down { x, y, click_count: 1 }).await;
            send(&state, &id, PointerEvent::Up).await;
        }
        let response = send(
            &state,
            &id,
            PointerEvent::Down {
                x: 10.0,
                y: 50.0,
                click_count: 2,
            },
        )
        .await;

        let plot = response.committed.unwrap();
        assert_eq!(plot.label(), "Corn Plot 1");
        assert_eq!(plot.vertices().len(), 3);
        assert!(response.snapshot.in_progress.is_empty());
        assert_eq!(response.snapshot.plots.len(), 1);

        let Json(summary) = summary_handler(State(state.clone()), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_area, 800.0);
    }

    #[tokio::test]
    async fn test_unsaved_commit_is_server_error() {
        let (state, _root) = test_state();
        let id = new_session(&state).await;
        enable_drawing(&state, &id, "Wheat", None).await;
        std::fs::remove_dir_all(state.output_root().join(&id)).unwrap();

        for (x, y) in [(10.0, 10.0), (50.0, 10.0), (50.0, 50.0)] {
            send(&state, &id, PointerEvent::Down { x, y, click_count: 1 }).await;
            send(&state, &id, PointerEvent::Up).await;
        }
        let result = pointer_handler(
            State(state.clone()),
            Path(id.clone()),
            Json(PointerEvent::Down {
                x: 10.0,
                y: 50.0,
                click_count: 2,
            }),
        )
        .await;
        assert_eq!(result.err(), Some(StatusCode::INTERNAL_SERVER_ERROR));

        let Json(snapshot) = get_session_handler(State(state.clone()), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(snapshot.plots.len(), 1);
        assert_eq!(snapshot.unsaved_plots, vec![snapshot.plots[0].id().to_string()]);
    }

    #[tokio::test]
    async fn test_inputs_color_resolution() {
        let (state, _root) = test_state();
        let id = new_session(&state).await;

        enable_drawing(&state, &id, "wheat", None).await;
        let Json(snapshot) = get_session_handler(State(state.clone()), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(snapshot.inputs.color, CropType::Wheat.color());
        assert!(snapshot.inputs.drawing_enabled);

        let unknown = update_inputs_handler(
            State(state.clone()),
            Path(id.clone()),
            Json(InputsRequest {
                category: "Tobacco".into(),
                color: None,
                drawing_enabled: true,
            }),
        )
        .await;
        assert_eq!(unknown.err(), Some(StatusCode::BAD_REQUEST));

        let bad_color = update_inputs_handler(
            State(state.clone()),
            Path(id.clone()),
            Json(InputsRequest {
                category: "Corn".into(),
                color: Some("green".into()),
                drawing_enabled: true,
            }),
        )
        .await;
        assert_eq!(bad_color.err(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_new_session_ignores_input_until_enabled() {
        let (state, _root) = test_state();
        let id = new_session(&state).await;

        let response = send(
            &state,
            &id,
            PointerEvent::Down {
                x: 1.0,
                y: 1.0,
                click_count: 1,
            },
        )
        .await;
        assert!(response.snapshot.in_progress.is_empty());
        assert!(response.committed.is_none());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (state, _root) = test_state();
        let result = get_session_handler(State(state.clone()), Path("missing".into())).await;
        assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));

        let result = undo_handler(State(state.clone()), Path("../escape".into())).await;
        assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_plot_at_and_undo() {
        let (state, _root) = test_state();
        let id = new_session(&state).await;
        enable_drawing(&state, &id, "Rice", None).await;

        for (x, y) in [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)] {
            send(&state, &id, PointerEvent::Down { x, y, click_count: 1 }).await;
            send(&state, &id, PointerEvent::Up).await;
        }
        send(&state, &id, PointerEvent::Down { x: 0.0, y: 0.0, click_count: 2 }).await;

        let Json(plot) = plot_at_handler(
            State(state.clone()),
            Path(id.clone()),
            Query(PointQuery { x: 50.0, y: 50.0 }),
        )
        .await
        .unwrap();
        assert_eq!(plot.label(), "Rice Plot 1");

        let miss = plot_at_handler(
            State(state.clone()),
            Path(id.clone()),
            Query(PointQuery { x: 500.0, y: 50.0 }),
        )
        .await;
        assert_eq!(miss.err(), Some(StatusCode::NOT_FOUND));

        send(&state, &id, PointerEvent::Down { x: 5.0, y: 5.0, click_count: 1 }).await;
        let Json(snapshot) = undo_handler(State(state.clone()), Path(id.clone()))
            .await
            .unwrap();
        assert!(snapshot.in_progress.is_empty());
        assert_eq!(snapshot.plots.len(), 1);
    }

    #[test]
    fn test_pointer_event_json() {
        let down: PointerEvent =
            serde_json::from_str(r#"{"kind":"down","x":1.5,"y":2}"#).unwrap();
        assert!(matches!(down, PointerEvent::Down { click_count: 1, .. }));

        let up: PointerEvent = serde_json::from_str(r#"{"kind":"up"}"#).unwrap();
        assert!(matches!(up, PointerEvent::Up));

        assert!(serde_json::from_str::<PointerEvent>(r#"{"kind":"hover"}"#).is_err());
    }
}
