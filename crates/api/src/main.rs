use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use stockscope_core::analyzer::{Analyzer, AnalyzerOptions, AnalyzerParams, PageLimits, RatingDistribution};
use stockscope_core::error::AnalyzerError;
use stockscope_core::storage::PgSnapshotProvider;
use stockscope_core::verdict::{VerdictEngine, VerdictInput, VerdictResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await
        {
            Ok(pool) => match stockscope_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let engine = VerdictEngine::default();
    let analyzer = pool.map(|pool| {
        Arc::new(Analyzer::new(
            Arc::new(PgSnapshotProvider::new(pool)),
            engine.clone(),
            settings.cache_ttl,
        ))
    });

    let state = AppState {
        analyzer,
        engine,
        page_limits: settings.page_limits,
        cache_ttl_secs: settings.cache_ttl.as_secs(),
    };

    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/analyzer", get(query_analyzer))
        .route("/analyzer/stats", get(get_rating_stats))
        .route("/verdict", post(evaluate_verdict))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    analyzer: Option<Arc<Analyzer>>,
    engine: VerdictEngine,
    page_limits: PageLimits,
    cache_ttl_secs: u64,
}

#[derive(Debug)]
enum ApiError {
    NoDatabase,
    Analyzer(AnalyzerError),
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        Self::Analyzer(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NoDatabase => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": "unavailable", "message": "snapshot store is not configured"}),
            ),
            ApiError::Analyzer(AnalyzerError::Validation { field, message }) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "validation", "field": field, "message": message}),
            ),
            ApiError::Analyzer(err @ AnalyzerError::Upstream(_)) => {
                let err = anyhow::Error::new(err);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %format!("{err:#}"), "analyzer upstream failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({"error": "upstream_unavailable", "message": err.to_string()}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

async fn query_analyzer(
    State(state): State<AppState>,
    Query(params): Query<AnalyzerParams>,
) -> Result<Response, ApiError> {
    // Validation runs before touching the store.
    let options = AnalyzerOptions::from_params(&params, &state.page_limits)?;
    let analyzer = state.analyzer.as_ref().ok_or(ApiError::NoDatabase)?;

    let request_id = Uuid::new_v4();
    let outcome = analyzer.query(&options).await?;
    tracing::info!(
        %request_id,
        total = outcome.page.meta.total,
        page = outcome.page.meta.page,
        limit = outcome.page.meta.limit,
        cache_hit = outcome.cache_hit,
        "analyzer query"
    );

    let mut res = Json(outcome.page.as_ref()).into_response();
    let headers = res.headers_mut();
    headers.insert(
        "x-cache",
        HeaderValue::from_static(if outcome.cache_hit { "hit" } else { "miss" }),
    );
    // Lets dashboards keep showing the previous page while the next one loads.
    if let Ok(v) = HeaderValue::from_str(&format!(
        "private, max-age={}, stale-while-revalidate=60",
        state.cache_ttl_secs
    )) {
        headers.insert(header::CACHE_CONTROL, v);
    }
    Ok(res)
}

async fn get_rating_stats(
    State(state): State<AppState>,
) -> Result<Json<RatingDistribution>, ApiError> {
    let analyzer = state.analyzer.as_ref().ok_or(ApiError::NoDatabase)?;
    Ok(Json(analyzer.rating_distribution().await?))
}

async fn evaluate_verdict(
    State(state): State<AppState>,
    Json(input): Json<VerdictInput>,
) -> Json<VerdictResult> {
    Json(state.engine.evaluate(&input))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockscope_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
