mod config;
mod convert;
mod coords;
mod error;
mod grammar;
mod ingest;
mod net;
mod query;
mod store;
mod track_geo;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, instrument, warn};

use color_eyre::eyre::eyre;
use config::{Config, StoreBackend};
use grammar::GrammarSet;
use net::response::Result;
use store::{memory::MemoryTrackStore, postgres::PgTrackStore, GeoStore};

/// Shared by every request: the store client and the two immutable,
/// once-loaded grammars. Constructed once in `main` and injected through
/// axum state; nothing else is shared between requests.
struct AppState<S> {
    grammars: GrammarSet,
    store: S,
    max_body_bytes: usize,
    max_results: usize,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    // Fail fast: the service must not start in a state where validation or
    // persistence cannot run.
    let grammars = GrammarSet::load(&config.grammar_dir)?;
    info!(dir = %config.grammar_dir.display(), "loaded both track grammar versions");

    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| eyre!("DATABASE_URL must be set for the postgres store"))?;
            let store = PgTrackStore::connect(database_url).await?;
            store.ensure_schema().await?;
            info!("connected to track store");

            let state = Arc::new(AppState {
                grammars,
                store,
                max_body_bytes: config.max_body_bytes,
                max_results: config.max_results,
            });
            serve(router(state.clone()), config.bind_addr).await?;

            // No new requests past this point; give in-flight store calls a
            // bounded window to settle before the connection goes away.
            if tokio::time::timeout(Duration::from_secs(10), state.store.close())
                .await
                .is_err()
            {
                warn!("store connections still open after the grace period");
            }
            info!("track store disconnected");
        }
        StoreBackend::Memory => {
            warn!("using the in-memory track store; documents will not survive a restart");
            let state = Arc::new(AppState {
                grammars,
                store: MemoryTrackStore::new(),
                max_body_bytes: config.max_body_bytes,
                max_results: config.max_results,
            });
            serve(router(state), config.bind_addr).await?;
        }
    }
    Ok(())
}

async fn serve(app: Router, bind_addr: std::net::SocketAddr) -> color_eyre::Result<()> {
    info!("listening on {bind_addr}");
    axum::Server::bind(&bind_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router<S: GeoStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/gpx-near/lat/:lat/lon/:lon", get(nearest_tracks::<S>))
        .route("/gpx-doc", post(submit_track::<S>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Tracks nearest to a point, as GPX documents in increasing distance.
#[instrument(skip(state))]
async fn nearest_tracks<S: GeoStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((lat, lon)): Path<(String, String)>,
) -> Result<Json<Vec<String>>> {
    let origin = coords::parse_lat_lon(&lat, &lon)?;
    let tracks = query::nearest_tracks(&state.store, origin, state.max_results).await?;
    Ok(Json(tracks))
}

/// User-submitted track document.
#[instrument(skip_all)]
async fn submit_track<S: GeoStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Result<&'static str> {
    ingest::ingest(&state.grammars, &state.store, &body, state.max_body_bytes).await?;
    Ok("Document inserted successfully")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining in-flight requests");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use crate::store::memory::MemoryTrackStore;
    use tower::ServiceExt;

    const TRAIL_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="unit-test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>Trail A</name><trkseg>
    <trkpt lat="48.0" lon="11.0"/>
  </trkseg></trk>
</gpx>"#;

    fn test_app() -> Router {
        let grammars = GrammarSet::load(
            &std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("schemas"),
        )
        .unwrap();
        let state = Arc::new(AppState {
            grammars,
            store: MemoryTrackStore::new(),
            max_body_bytes: 1024 * 1024,
            max_results: 100,
        });
        router(state)
    }

    async fn body_of(response: axum::response::Response) -> Vec<u8> {
        hyper::body::to_bytes(response.into_body())
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn malformed_point_is_a_client_error() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/gpx-near/lat/91/lon/0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = String::from_utf8(body_of(response).await).unwrap();
        assert!(body.contains("lat 91"));
    }

    #[tokio::test]
    async fn query_on_empty_store_is_an_empty_list() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/gpx-near/lat/48.0/lon/11.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tracks: Vec<String> = serde_json::from_slice(&body_of(response).await).unwrap();
        assert!(tracks.is_empty());
    }

    #[tokio::test]
    async fn submitted_track_comes_back_from_a_nearby_query() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/gpx-doc")
                    .body(Body::from(TRAIL_A))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/gpx-near/lat/48.0/lon/11.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tracks: Vec<String> = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].contains("Trail A"));
    }

    #[tokio::test]
    async fn duplicate_submission_is_a_conflict() {
        let app = test_app();
        let post = || {
            Request::builder()
                .method("POST")
                .uri("/gpx-doc")
                .body(Body::from(TRAIL_A))
                .unwrap()
        };

        let first = app.clone().oneshot(post()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(post()).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn grammar_rejection_reports_both_versions() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/gpx-doc")
                    .body(Body::from("<definitely-not-gpx/>"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert!(!report["v10"].as_array().unwrap().is_empty());
        assert!(!report["v11"].as_array().unwrap().is_empty());
    }
}
