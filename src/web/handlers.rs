//! HTTP handlers.

use crate::error::MonitorError;
use crate::session::microphone::{microphone_stream, AUDIO_CONTENT_TYPE};
use crate::session::noise::{clamp_volume, DEFAULT_VOLUME};
use crate::session::video::{mjpeg_stream, MJPEG_CONTENT_TYPE};
use crate::session::{CaptureStatus, NoiseStatus};
use crate::web::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;
use tokio_stream::StreamExt;
use tracing::{error, warn};

/// Body of the white-noise start and volume requests.
#[derive(Debug, Default, Deserialize)]
pub struct VolumeRequest {
    pub volume: Option<f32>,
}

impl VolumeRequest {
    fn requested(body: Option<Json<VolumeRequest>>) -> f32 {
        body.and_then(|Json(req)| req.volume).unwrap_or(DEFAULT_VOLUME)
    }
}

/// Multipart MJPEG feed from the shared camera session.
pub async fn video_feed(State(state): State<AppState>) -> Response {
    let stream = mjpeg_stream(state.capture.clone()).map(Ok::<_, Infallible>);
    (
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Raw PCM feed from a dedicated microphone capture.
pub async fn audio_feed(State(state): State<AppState>) -> Response {
    let stream = microphone_stream(state.audio.clone()).map(Ok::<_, Infallible>);
    (
        [
            (header::CONTENT_TYPE, AUDIO_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Flip one LED.
pub async fn toggle_led(
    State(state): State<AppState>,
    Path(led_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.switches.toggle(&led_id).await {
        Ok(on) => (
            StatusCode::OK,
            Json(json!({ "success": true, "led": led_id, "state": on })),
        ),
        Err(MonitorError::UnknownSwitch(_)) => {
            warn!(led = %led_id, "Rejected toggle of unknown LED");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "Invalid LED ID" })),
            )
        }
        Err(e) => {
            error!(led = %led_id, "Failed to toggle LED: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

/// Current LED states.
pub async fn led_status(State(state): State<AppState>) -> Json<BTreeMap<String, bool>> {
    Json(state.switches.states().await)
}

/// Start white noise. Already playing is not an error.
pub async fn start_white_noise(
    State(state): State<AppState>,
    body: Option<Json<VolumeRequest>>,
) -> Json<Value> {
    let volume = clamp_volume(VolumeRequest::requested(body));
    state.noise.start(volume);
    Json(json!({ "success": true, "volume": volume }))
}

pub async fn stop_white_noise(State(state): State<AppState>) -> Json<Value> {
    state.noise.stop();
    Json(json!({ "success": true }))
}

pub async fn set_white_noise_volume(
    State(state): State<AppState>,
    body: Option<Json<VolumeRequest>>,
) -> Json<Value> {
    let volume = state.noise.set_volume(VolumeRequest::requested(body));
    Json(json!({ "success": true, "volume": volume }))
}

pub async fn white_noise_status(State(state): State<AppState>) -> Json<NoiseStatus> {
    Json(state.noise.status())
}

pub async fn camera_status(State(state): State<AppState>) -> Json<CaptureStatus> {
    Json(state.capture.status())
}

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "nursery-pi",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Serve `index.html` from the static directory.
pub async fn serve_index(index_file: PathBuf) -> Result<Html<String>, StatusCode> {
    match tokio::fs::read_to_string(&index_file).await {
        Ok(content) => Ok(Html(content)),
        Err(e) => {
            error!("Failed to read {}: {}", index_file.display(), e);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// Serve the built-in page when no static files are available.
pub async fn default_index() -> Html<&'static str> {
    Html(DEFAULT_INDEX_HTML)
}

/// Built-in monitor page.
const DEFAULT_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Nursery Pi</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #1f2937;
            color: #f9fafb;
            min-height: 100vh;
            padding: 20px;
        }

        .container {
            max-width: 720px;
            margin: 0 auto;
        }

        h1 {
            text-align: center;
            margin-bottom: 20px;
        }

        .card {
            background: #374151;
            border-radius: 12px;
            padding: 16px;
            margin-bottom: 16px;
        }

        .card h2 {
            font-size: 1.1rem;
            margin-bottom: 12px;
        }

        #video {
            width: 100%;
            border-radius: 8px;
            background: #000;
        }

        button {
            border: none;
            border-radius: 8px;
            padding: 10px 18px;
            margin-right: 8px;
            font-size: 1rem;
            cursor: pointer;
            background: #4b5563;
            color: #f9fafb;
        }

        button.on {
            background: #f59e0b;
            color: #111827;
        }

        input[type=range] {
            width: 100%;
            margin-top: 12px;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Nursery Pi</h1>

        <div class="card">
            <h2>Camera</h2>
            <img id="video" src="/video_feed" alt="Live video">
        </div>

        <div class="card">
            <h2>Lights</h2>
            <button id="led1" onclick="toggleLed('led1')">Red</button>
            <button id="led2" onclick="toggleLed('led2')">Yellow</button>
        </div>

        <div class="card">
            <h2>White noise</h2>
            <button id="noise-start" onclick="startNoise()">Start</button>
            <button onclick="stopNoise()">Stop</button>
            <input id="volume" type="range" min="0" max="1" step="0.05" value="0.5" onchange="updateVolume()">
        </div>
    </div>

    <script>
        async function post(url, body) {
            const response = await fetch(url, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: body === undefined ? undefined : JSON.stringify(body)
            });
            return response.json();
        }

        function showLed(id, on) {
            document.getElementById(id).classList.toggle('on', on);
        }

        async function loadLeds() {
            try {
                const states = await (await fetch('/led_status')).json();
                Object.entries(states).forEach(([id, on]) => {
                    if (document.getElementById(id)) showLed(id, on);
                });
            } catch (error) {
                console.error('Failed to load LED states:', error);
            }
        }

        async function toggleLed(id) {
            try {
                const data = await post('/toggle_led/' + id);
                if (data.success) showLed(id, data.state);
            } catch (error) {
                console.error('Failed to toggle LED:', error);
            }
        }

        function volume() {
            return parseFloat(document.getElementById('volume').value);
        }

        async function startNoise() {
            const data = await post('/white_noise/start', { volume: volume() });
            if (data.success) document.getElementById('noise-start').classList.add('on');
        }

        async function stopNoise() {
            const data = await post('/white_noise/stop');
            if (data.success) document.getElementById('noise-start').classList.remove('on');
        }

        async function updateVolume() {
            await post('/white_noise/volume', { volume: volume() });
        }

        loadLeds();
    </script>
</body>
</html>
"#;
