//! Web application router and middleware setup.

use crate::error::Result;
use crate::web::config::WebConfig;
use crate::web::handlers;
use crate::web::state::AppState;
use axum::{
    routing::{get, get_service, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

/// Create the axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: AppState) -> Result<Router> {
    let mut app = Router::new()
        // Media
        .route("/video_feed", get(handlers::video_feed))
        .route("/audio_feed", get(handlers::audio_feed))
        // Lights
        .route("/toggle_led/:led_id", post(handlers::toggle_led))
        .route("/led_status", get(handlers::led_status))
        // White noise
        .route("/white_noise/start", post(handlers::start_white_noise))
        .route("/white_noise/stop", post(handlers::stop_white_noise))
        .route("/white_noise/volume", post(handlers::set_white_noise_volume))
        .route("/white_noise/status", get(handlers::white_noise_status))
        // API
        .route("/api/camera", get(handlers::camera_status))
        .route("/api/health", get(handlers::health_check));

    match config.static_root() {
        Some(static_path) => {
            info!("Serving static files from: {:?}", static_path);

            app = app.nest_service(
                "/static",
                get_service(ServeDir::new(&static_path)).handle_error(|error| async move {
                    (
                        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Unhandled internal error: {}", error),
                    )
                }),
            );

            app = match config.index_file() {
                Some(index_file) => {
                    app.route("/", get(move || handlers::serve_index(index_file.clone())))
                }
                None => app.route("/", get(handlers::default_index)),
            };
        }
        None => {
            app = app.route("/", get(handlers::default_index));
        }
    }

    let mut app = app.with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    Ok(app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())))
}
