//! HTTP surface over a shared [`Library`].

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::BuildError;
use crate::formats::{ChapterPage, ChapterView, ManifestArtifact, SortDirection};
use crate::library::Library;
use crate::query::{DEFAULT_PAGE_SIZE, ListQuery};

#[derive(Clone)]
struct AppState {
    library: Arc<Library>,
}

pub fn router(library: Arc<Library>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/chapters", get(list_chapters))
        .route("/api/chapters/:ordinal", get(get_chapter))
        .route("/api/manifest", get(get_manifest))
        .route("/api/rebuild", post(start_rebuild))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { library })
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    sort: SortDirection,
    page: Option<usize>,
    page_size: Option<usize>,
}

async fn list_chapters(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<ChapterPage> {
    Json(state.library.list(&ListQuery {
        query: params.q,
        sort: params.sort,
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    }))
}

async fn get_chapter(
    State(state): State<AppState>,
    Path(ordinal): Path<u32>,
) -> Result<Json<ChapterView>, StatusCode> {
    state
        .library
        .get(ordinal)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_manifest(State(state): State<AppState>) -> Json<ManifestArtifact> {
    Json(state.library.manifest().to_artifact())
}

#[derive(Debug, Serialize)]
struct RebuildAccepted {
    status: &'static str,
}

async fn start_rebuild(State(state): State<AppState>) -> impl IntoResponse {
    let library = Arc::clone(&state.library);
    tokio::spawn(async move {
        match library.rebuild().await {
            Ok(manifest) => {
                tracing::info!(total = manifest.total_chapters(), "background rebuild published");
            }
            Err(BuildError::Superseded) => {
                tracing::debug!("background rebuild superseded");
            }
            Err(err) => {
                tracing::warn!(%err, "background rebuild failed; keeping current manifest");
            }
        }
    });
    (
        StatusCode::ACCEPTED,
        Json(RebuildAccepted { status: "accepted" }),
    )
}
