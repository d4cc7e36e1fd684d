use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::Scope;
use crate::config::{AllowedOrigins, CorsConfig};
use crate::handlers::{self, tarefas};
use crate::middleware::{authenticate, require_scope};
use crate::state::AppState;

/// Full application router: public health check plus the protected task routes
pub fn app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        // Public
        .route("/health", get(handlers::health))
        // Protected
        .merge(tarefas_routes(state.clone()))
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn tarefas_routes(state: AppState) -> Router<AppState> {
    use axum::routing::{delete, post, put};

    Router::new()
        .route("/tarefas", get(tarefas::tarefa_list))
        .route(
            "/tarefas",
            post(tarefas::tarefa_create)
                .route_layer(middleware::from_fn_with_state(Scope::CreateTasks, require_scope)),
        )
        .route(
            "/tarefas/:id",
            put(tarefas::tarefa_update)
                .route_layer(middleware::from_fn_with_state(Scope::UpdateTasks, require_scope)),
        )
        .route(
            "/tarefas/:id",
            delete(tarefas::tarefa_delete)
                .route_layer(middleware::from_fn_with_state(Scope::DeleteTasks, require_scope)),
        )
        // Outermost, so the token is checked before any scope gate
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

/// CORS policy for the configured browser origins
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = match &config.origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(origins) => {
            let values: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
