/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_api::{app::AppState, config::Config};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskhub_shared::notify;
/// use taskhub_shared::store::postgres::PgStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
/// let (queue, _rx) = notify::channel(config.notifications.queue_capacity);
///
/// let state = AppState::new(Arc::new(PgStore::new(pool)), queue, config);
/// let app = taskhub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use taskhub_shared::{
    auth::jwt,
    notify::NotificationQueue,
    service::{TaskService, UserService},
    store::{TaskStore, UserStore},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Credential service
    pub users: UserService,

    /// Task lifecycle controller
    pub tasks: TaskService,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates application state over a store implementing both ports
    pub fn new<S>(store: Arc<S>, notifications: NotificationQueue, config: Config) -> Self
    where
        S: UserStore + TaskStore + 'static,
    {
        let user_store: Arc<dyn UserStore> = store.clone();
        let task_store: Arc<dyn TaskStore> = store;

        Self {
            users: UserService::new(user_store.clone()),
            tasks: TaskService::new(task_store, user_store, notifications),
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// /
/// ├── GET    /health                # Store connectivity (public)
/// ├── POST   /token                 # Login, form-encoded (public)
/// ├── POST   /users                 # Register (public)
/// ├── GET    /users                 # List users (admin, manager)
/// ├── GET    /users/:id             # Get user (admin, manager)
/// ├── DELETE /users/:id             # Delete user (admin)
/// ├── PATCH  /users/:id/role        # Change role (admin)
/// ├── POST   /tasks                 # Create task
/// ├── GET    /tasks                 # List tasks (scoped by role)
/// ├── GET    /tasks/:id             # Get task
/// ├── PUT    /tasks/:id             # Update task
/// └── DELETE /tasks/:id             # Delete task (admin, manager)
/// ```
///
/// Everything but the public routes goes through [`jwt_auth_layer`].
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/token", post(routes::auth::login))
        .route("/users", post(routes::users::register));

    let protected_routes = Router::new()
        .route("/users", get(routes::users::list_users))
        .route(
            "/users/:id",
            get(routes::users::get_user).delete(routes::users::delete_user),
        )
        .route("/users/:id/role", patch(routes::users::change_role))
        .route(
            "/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
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
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Bearer authentication middleware
///
/// Validates the token from the `Authorization` header, resolves its subject
/// to a [`taskhub_shared::auth::policy::Caller`] and injects the caller into
/// request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let token = bearer_token(auth_header)
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token, state.jwt_secret())?;

    let caller = state
        .users
        .resolve_caller(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}

/// Extracts the credentials of a `Bearer` authorization header
///
/// The scheme name is matched case-insensitively.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("BEARER  abc.def"), Some("abc.def"));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes() {
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
