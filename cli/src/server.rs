use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use nibble_core::db::Database;
use nibble_core::error::{NibbleError, find_nibble_error};
use nibble_core::models::{
    DictionaryEntry, FoodLogEntry, FoodLogRow, NutrientReport, NutritionEntry, NutritionRow,
    OrphanReport,
};
use nibble_core::service::NibbleService;
use nibble_core::users::{UserMap, UserResolver, open_user_database, require_user};

const BODY_LIMIT: usize = 2 * 1024 * 1024; // 2 MB

type UserStore = Arc<Mutex<NibbleService>>;

#[derive(Clone)]
struct AppState {
    data_dir: Arc<PathBuf>,
    users: Arc<dyn UserResolver>,
    stores: Arc<Mutex<HashMap<String, UserStore>>>,
}

impl AppState {
    fn new(data_dir: PathBuf, users: Arc<dyn UserResolver>) -> Self {
        Self {
            data_dir: Arc::new(data_dir),
            users,
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// One store per user, opened on first use. Requests for the same user
    /// share its lock, so writes to one scope never interleave.
    ///
    /// The map lock is not held while a store is opened; if two requests race
    /// to open the same user, the first one inserted wins.
    fn store_for(&self, name: &str) -> anyhow::Result<UserStore> {
        let existing = self.stores().get(name).cloned();
        if let Some(store) = existing {
            return Ok(store);
        }
        let db: Database = open_user_database(&self.data_dir, name)?;
        let opened = Arc::new(Mutex::new(NibbleService::from_database(db)));
        let mut stores = self.stores();
        let store = stores.entry(name.to_string()).or_insert(opened);
        Ok(Arc::clone(store))
    }

    fn stores(&self) -> std::sync::MutexGuard<'_, HashMap<String, UserStore>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct UserQuery {
    user: Option<String>,
}

#[derive(Deserialize)]
struct ReplaceItemsRequest {
    items: Vec<Option<String>>,
}

#[derive(Deserialize)]
struct ReplaceLogRequest {
    entries: Vec<FoodLogRow>,
}

#[derive(Deserialize)]
struct ReplaceNutritionRequest {
    rows: Vec<NutritionRow>,
}

#[derive(Deserialize)]
struct ReportQuery {
    start: Option<String>,
    end: Option<String>,
    nutrient: String,
}

#[derive(Serialize)]
struct OptionsResponse {
    foods: Vec<String>,
    nutrition_types: Vec<String>,
    report_nutrients: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match find_nibble_error(&err) {
            Some(NibbleError::InvalidUser) => Self::Unauthorized(NibbleError::InvalidUser.to_string()),
            Some(kind) if kind.is_input_error() => Self::BadRequest(kind.to_string()),
            _ => Self::Internal(err),
        }
    }
}

impl From<NibbleError> for ApiError {
    fn from(err: NibbleError) -> Self {
        Self::from(anyhow::Error::from(err))
    }
}

fn lock(store: &UserStore) -> std::sync::MutexGuard<'_, NibbleService> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

// --- Middleware ---

/// Resolve `?user=<token>` and attach that user's store to the request.
async fn require_user_store(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = Query::<UserQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(q)| q.user);

    let name = match require_user(state.users.as_ref(), token.as_deref()) {
        Ok(name) => name,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match state.store_for(&name) {
        Ok(store) => {
            request.extensions_mut().insert(store);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Dictionary handlers ---

async fn list_dictionary(
    Extension(store): Extension<UserStore>,
) -> Result<Json<Vec<DictionaryEntry>>, ApiError> {
    let entries = lock(&store).list_dictionary()?;
    Ok(Json(entries))
}

async fn list_items(
    Extension(store): Extension<UserStore>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let items = lock(&store).list_items(&kind)?;
    Ok(Json(items))
}

async fn replace_items(
    Extension(store): Extension<UserStore>,
    Path(kind): Path<String>,
    Json(req): Json<ReplaceItemsRequest>,
) -> Result<Json<Vec<String>>, ApiError> {
    let items: Vec<String> = req.items.into_iter().flatten().collect();
    let saved = lock(&store).submit_items(&kind, &items)?;
    Ok(Json(saved))
}

// --- Food log handlers ---

async fn get_log(
    Extension(store): Extension<UserStore>,
    Path(date): Path<String>,
) -> Result<Json<Vec<FoodLogEntry>>, ApiError> {
    let entries = lock(&store).get_log(&date)?;
    Ok(Json(entries))
}

async fn replace_log(
    Extension(store): Extension<UserStore>,
    Path(date): Path<String>,
    Json(req): Json<ReplaceLogRequest>,
) -> Result<Json<Vec<FoodLogEntry>>, ApiError> {
    let entries = lock(&store).submit_log(&date, &req.entries)?;
    Ok(Json(entries))
}

// --- Nutrition handlers ---

async fn list_nutrition(
    Extension(store): Extension<UserStore>,
) -> Result<Json<Vec<NutritionEntry>>, ApiError> {
    let entries = lock(&store)
        .list_nutrition()
        .context("failed to list nutrition")?;
    Ok(Json(entries))
}

async fn get_nutrition(
    Extension(store): Extension<UserStore>,
    Path(food): Path<String>,
) -> Result<Json<Vec<NutritionEntry>>, ApiError> {
    let entries = lock(&store).get_nutrition(&food)?;
    Ok(Json(entries))
}

async fn replace_nutrition(
    Extension(store): Extension<UserStore>,
    Path(food): Path<String>,
    Json(req): Json<ReplaceNutritionRequest>,
) -> Result<Json<Vec<NutritionEntry>>, ApiError> {
    let entries = lock(&store).submit_nutrition(&food, &req.rows)?;
    Ok(Json(entries))
}

// --- Derived views ---

async fn get_options(
    Extension(store): Extension<UserStore>,
) -> Result<Json<OptionsResponse>, ApiError> {
    let svc = lock(&store);
    Ok(Json(OptionsResponse {
        foods: svc.food_options()?,
        nutrition_types: svc.nutrition_type_options()?,
        report_nutrients: svc.report_nutrient_options()?,
    }))
}

async fn get_report(
    Extension(store): Extension<UserStore>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<NutrientReport>, ApiError> {
    let today = Local::now().date_naive();
    let report = lock(&store).nutrient_report(
        params.start.as_deref().filter(|s| !s.is_empty()),
        params.end.as_deref().filter(|s| !s.is_empty()),
        &params.nutrient,
        today,
    )?;
    Ok(Json(report))
}

async fn get_orphans(
    Extension(store): Extension<UserStore>,
) -> Result<Json<OrphanReport>, ApiError> {
    let orphans = lock(&store).orphaned_references()?;
    Ok(Json(orphans))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/dictionary", get(list_dictionary))
        .route("/api/dictionary/{kind}", get(list_items).put(replace_items))
        .route("/api/log/{date}", get(get_log).put(replace_log))
        .route("/api/nutrition", get(list_nutrition))
        .route(
            "/api/nutrition/{food}",
            get(get_nutrition).put(replace_nutrition),
        )
        .route("/api/options", get(get_options))
        .route("/api/report", get(get_report))
        .route("/api/orphans", get(get_orphans))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_store,
        ))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    data_dir: PathBuf,
    users: UserMap,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    let user_count = users.len();
    let state = AppState::new(data_dir, Arc::new(users));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(users = user_count, "listening on http://{bind}:{port}");
    eprintln!("Listening on http://{bind}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
    }
}
