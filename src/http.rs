use crate::appointment_manager::AppointmentManager;
use crate::backend::{CollectionExt, DocumentStore};
use crate::configuration::Configuration;
use crate::error::{ApiError, ApiResponse};
use crate::submissions::Submissions;
use crate::types::{
    Appointment, AppointmentCreate, Availability, ContactForm, ContactFormCreate, StatusCheck,
    StatusCheckCreate, StatusUpdate,
};
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::{request::Parts, HeaderValue, Method, StatusCode};
use axum::{async_trait, extract::State, response::IntoResponse, Json};
use axum::{
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub const API_PREFIX: &str = "/api";
pub const PROJECT_NAME: &str = "Lead G API";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_LIMIT: i64 = 100;

pub struct AppState<S> {
    pub store: Arc<S>,
    pub appointments: AppointmentManager<S>,
    pub submissions: Submissions<S>,
    pub environment: String,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            appointments: self.appointments.clone(),
            submissions: self.submissions.clone(),
            environment: self.environment.clone(),
        }
    }
}

/// JSON body whose rejections use the service's error envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| ApiError::invalid("body", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string whose rejections use the service's error envelope.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| ApiError::invalid("query", rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    limit: Option<i64>,
    status_filter: Option<String>,
}

impl ListParams {
    fn limit(&self) -> Result<usize, ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        usize::try_from(limit)
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or_else(|| ApiError::invalid("limit", "limit must be greater than zero"))
    }

    fn status_filter(&self) -> Option<&str> {
        self.status_filter.as_deref().filter(|status| !status.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct AvailabilityParams {
    date: String,
    time: Option<String>,
}

pub fn create_app<S: DocumentStore, C: Configuration>(backend: S, configuration: &C) -> Router {
    let store = Arc::new(backend);
    let state = AppState {
        appointments: AppointmentManager::new(store.clone()),
        submissions: Submissions::new(store.clone()),
        store,
        environment: configuration.environment(),
    };

    let api = Router::new()
        .route(
            "/status",
            post(create_status_check::<S>).get(get_status_checks::<S>),
        )
        .route(
            "/contact",
            post(submit_contact_form::<S>).get(get_contact_forms::<S>),
        )
        .route(
            "/appointments",
            post(create_appointment::<S>).get(get_appointments::<S>),
        )
        .route("/appointments/availability", get(check_availability::<S>))
        .route("/appointments/:id/status", put(update_appointment_status::<S>));

    let mut app = Router::new()
        .route("/", get(root::<S>))
        .route("/health", get(health_check::<S>))
        .nest(API_PREFIX, api);
    if configuration.debug() {
        app = app.route("/docs", get(docs));
    }

    app.fallback(not_found)
        .with_state(state)
        .layer(cors_layer(&configuration.cors_origins()))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
}

async fn root<S: DocumentStore>(State(state): State<AppState<S>>) -> Json<ApiResponse> {
    Json(ApiResponse::ok(
        format!("{PROJECT_NAME} is running successfully"),
        Some(json!({
            "version": VERSION,
            "environment": state.environment,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    ))
}

async fn health_check<S: DocumentStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    match state.store.collection("health_check").limit(1).get() {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "All services are healthy",
                Some(json!({
                    "database": "connected",
                    "store": state.store.backend_name(),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )),
        ),
        Err(err) => {
            error!(%err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::failure("Service unavailable", None)),
            )
        }
    }
}

async fn docs() -> Json<Value> {
    Json(json!({
        "title": PROJECT_NAME,
        "version": VERSION,
        "routes": [
            { "method": "GET", "path": "/", "description": "Service banner" },
            { "method": "GET", "path": "/health", "description": "Store connectivity probe" },
            { "method": "POST", "path": "/api/status", "body": "StatusCheckCreate" },
            { "method": "GET", "path": "/api/status", "query": ["limit"] },
            { "method": "POST", "path": "/api/contact", "body": "ContactFormCreate" },
            { "method": "GET", "path": "/api/contact", "query": ["limit", "status_filter"] },
            { "method": "POST", "path": "/api/appointments", "body": "AppointmentCreate" },
            { "method": "GET", "path": "/api/appointments", "query": ["limit", "status_filter"] },
            { "method": "PUT", "path": "/api/appointments/{id}/status", "body": { "status": "pending | confirmed | completed | cancelled" } },
            { "method": "GET", "path": "/api/appointments/availability", "query": ["date", "time"] },
        ],
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure("Endpoint not found", None)),
    )
}

async fn create_status_check<S: DocumentStore>(
    State(state): State<AppState<S>>,
    JsonBody(input): JsonBody<StatusCheckCreate>,
) -> Result<Json<StatusCheck>, ApiError> {
    state.submissions.create_status_check(input).map(Json)
}

async fn get_status_checks<S: DocumentStore>(
    State(state): State<AppState<S>>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<StatusCheck>>, ApiError> {
    state.submissions.status_checks(params.limit()?).map(Json)
}

async fn submit_contact_form<S: DocumentStore>(
    State(state): State<AppState<S>>,
    JsonBody(input): JsonBody<ContactFormCreate>,
) -> Result<Json<ContactForm>, ApiError> {
    state.submissions.submit_contact_form(input).map(Json)
}

async fn get_contact_forms<S: DocumentStore>(
    State(state): State<AppState<S>>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<ContactForm>>, ApiError> {
    state
        .submissions
        .contact_forms(params.limit()?, params.status_filter())
        .map(Json)
}

async fn create_appointment<S: DocumentStore>(
    State(state): State<AppState<S>>,
    JsonBody(input): JsonBody<AppointmentCreate>,
) -> Result<Json<Appointment>, ApiError> {
    state.appointments.create_appointment(input).map(Json)
}

async fn get_appointments<S: DocumentStore>(
    State(state): State<AppState<S>>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    state
        .appointments
        .appointments(params.limit()?, params.status_filter())
        .map(Json)
}

async fn update_appointment_status<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> Result<Json<ApiResponse>, ApiError> {
    state
        .appointments
        .update_status(&id, update.requested_status())?;
    Ok(Json(ApiResponse::ok(
        "Appointment status updated successfully",
        None,
    )))
}

async fn check_availability<S: DocumentStore>(
    State(state): State<AppState<S>>,
    QueryParams(params): QueryParams<AvailabilityParams>,
) -> Result<Json<Availability>, ApiError> {
    let time = params.time.as_deref().filter(|time| !time.is_empty());
    state.appointments.availability(&params.date, time).map(Json)
}
