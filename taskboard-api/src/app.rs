/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use taskboard_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskboard_shared::{
    activation::ActivationPolicy,
    auth::middleware::authenticate,
    ordering::OrderingPolicy,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn ordering_policy(&self) -> OrderingPolicy {
        self.config.ordering_policy()
    }

    pub fn activation_policy(&self) -> ActivationPolicy {
        self.config.activation_policy()
    }
}

/// Builds the router with every route and the middleware stack
///
/// ```text
/// /health                                   public
/// /v1/auth/{register,login,refresh}         public
/// /v1/user                                  GET
/// /v1/boards                                GET POST
/// /v1/boards/active                         GET
/// /v1/boards/:id                            GET PUT DELETE
/// /v1/boards/:id/activate                   PATCH
/// /v1/columns                               GET POST
/// /v1/columns/:id                           GET PUT DELETE
/// /v1/tasks                                 GET POST
/// /v1/tasks/:id                             GET PUT DELETE
/// /v1/tasks/:id/reorder                     PUT
/// /v1/tasks/:id/move                        PUT
/// /v1/tasks/:id/tags/:tag_id                POST DELETE
/// /v1/subtasks                              POST
/// /v1/subtasks/bulk-reorder                 PATCH
/// /v1/subtasks/:id                          PUT DELETE
/// /v1/subtasks/:id/toggle-completion        PATCH
/// /v1/tags                                  GET POST
/// /v1/tags/:id                              PUT DELETE
/// ```
///
/// Everything under `/v1` except `/v1/auth` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{auth, boards, columns, health, subtasks, tags, tasks};

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh));

    let protected = Router::new()
        .route("/user", get(auth::me))
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route("/boards/active", get(boards::active_board))
        .route(
            "/boards/:id",
            get(boards::show_board)
                .put(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/boards/:id/activate", patch(boards::activate_board))
        .route("/columns", get(columns::list_columns).post(columns::create_column))
        .route(
            "/columns/:id",
            get(columns::show_column)
                .put(columns::update_column)
                .delete(columns::delete_column),
        )
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::show_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/:id/reorder", put(tasks::reorder_task))
        .route("/tasks/:id/move", put(tasks::move_task))
        .route(
            "/tasks/:id/tags/:tag_id",
            post(tags::attach_tag).delete(tags::detach_tag),
        )
        .route("/subtasks", post(subtasks::create_subtask))
        .route("/subtasks/bulk-reorder", patch(subtasks::bulk_reorder))
        .route(
            "/subtasks/:id",
            put(subtasks::update_subtask).delete(subtasks::delete_subtask),
        )
        .route(
            "/subtasks/:id/toggle-completion",
            patch(subtasks::toggle_completion),
        )
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/:id", put(tags::update_tag).delete(tags::delete_tag))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new().nest("/auth", auth_routes).merge(protected);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Validates the bearer token and inserts `AuthContext` into the request
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
