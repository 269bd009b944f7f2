mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{FakeAudio, FakeCameras, RecordingPins};
use futures_util::StreamExt;
use nursery_pi::session::video::MJPEG_CONTENT_TYPE;
use nursery_pi::{create_app, AppState, DeviceConfig, WebConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

fn test_state(cameras: FakeCameras, audio: FakeAudio) -> AppState {
    let config = DeviceConfig::default().with_dev_mode(true);
    AppState::with_backends(
        &config,
        Arc::new(cameras),
        Arc::new(audio),
        Box::new(RecordingPins::default()),
    )
}

fn test_app(state: AppState) -> Router {
    let config = WebConfig::default().with_static_dir(None);
    create_app(&config, state).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_video_feed_first_part_and_disconnect() {
    let cameras = FakeCameras::generic();
    let counters = cameras.counters.clone();
    let state = test_state(cameras, FakeAudio::absent());
    let app = test_app(state.clone());

    let response = app.clone().oneshot(get("/video_feed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        MJPEG_CONTENT_TYPE
    );

    let mut body = response.into_body().into_data_stream();
    let part = body.next().await.unwrap().unwrap();
    assert!(part.starts_with(PART_HEADER));
    let jpeg = &part[PART_HEADER.len()..part.len() - 2];
    assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
    assert!(part.ends_with(b"\xff\xd9\r\n"));

    // Disconnect: the shared session stays open for the next viewer.
    drop(body);
    assert!(state.capture.is_open());
    assert_eq!(counters.open_now(), 1);

    let response = app.oneshot(get("/video_feed")).await.unwrap();
    let mut body = response.into_body().into_data_stream();
    body.next().await.unwrap().unwrap();
    assert_eq!(counters.opens(), 1);
}

#[tokio::test]
async fn test_video_feed_without_camera_streams_placeholder() {
    let state = test_state(FakeCameras::absent(), FakeAudio::absent());
    let app = test_app(state);

    let response = app.clone().oneshot(get("/video_feed")).await.unwrap();
    let mut body = response.into_body().into_data_stream();
    for _ in 0..3 {
        let part = body.next().await.unwrap().unwrap();
        assert!(part.starts_with(PART_HEADER));
        let decoded = image::load_from_memory(&part[PART_HEADER.len()..part.len() - 2]).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    let (status, camera) = send(&app, get("/api/camera")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(camera["open"], true);
    assert_eq!(camera["kind"], "placeholder");
}

#[tokio::test]
async fn test_audio_feed_streams_pcm() {
    let state = test_state(FakeCameras::absent(), FakeAudio::present());
    let app = test_app(state);

    let response = app.oneshot(get("/audio_feed")).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/x-raw");

    let mut body = response.into_body().into_data_stream();
    let chunk = body.next().await.unwrap().unwrap();
    assert_eq!(chunk.len(), 2048);
    assert!(chunk.chunks(2).all(|s| s == [7u8, 0]));
}

#[tokio::test]
async fn test_toggle_led_and_status() {
    let app = test_app(test_state(FakeCameras::absent(), FakeAudio::absent()));

    let (status, body) = send(&app, post("/toggle_led/led1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "led": "led1", "state": true }));

    let (_, states) = send(&app, get("/led_status")).await;
    assert_eq!(states, json!({ "led1": true, "led2": false }));
}

#[tokio::test]
async fn test_toggle_unknown_led_is_rejected() {
    let app = test_app(test_state(FakeCameras::absent(), FakeAudio::absent()));

    let (status, body) = send(&app, post("/toggle_led/led3")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Invalid LED ID" }));

    let (_, states) = send(&app, get("/led_status")).await;
    assert_eq!(states, json!({ "led1": false, "led2": false }));
}

#[tokio::test]
async fn test_white_noise_endpoints() {
    let audio = FakeAudio::present();
    let counters = audio.output_counters.clone();
    let state = test_state(FakeCameras::absent(), audio);
    let app = test_app(state.clone());

    let (status, body) = send(&app, post_json("/white_noise/start", json!({ "volume": 2.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "volume": 1.0 }));
    assert!(common::wait_for(|| state.noise.device_open()).await);

    let (_, body) = send(&app, post_json("/white_noise/volume", json!({ "volume": -1.0 }))).await;
    assert_eq!(body, json!({ "success": true, "volume": 0.0 }));

    // No body means the default volume.
    let (_, body) = send(&app, post("/white_noise/volume")).await;
    assert_eq!(body, json!({ "success": true, "volume": 0.5 }));

    let (_, body) = send(&app, get("/white_noise/status")).await;
    assert_eq!(body["playing"], true);
    assert_eq!(body["volume"], 0.5);

    let (_, body) = send(&app, post("/white_noise/stop")).await;
    assert_eq!(body, json!({ "success": true }));
    assert!(common::wait_for(|| counters.open_now() == 0).await);
    assert_eq!(counters.opens(), 1);
}

#[tokio::test]
async fn test_health_and_default_index() {
    let app = test_app(test_state(FakeCameras::absent(), FakeAudio::absent()));

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "nursery-pi");

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("/video_feed"));
}

#[tokio::test]
async fn test_shutdown_releases_devices() {
    let cameras = FakeCameras::generic();
    let camera_counters = cameras.counters.clone();
    let audio = FakeAudio::present();
    let audio_counters = audio.output_counters.clone();
    let state = test_state(cameras, audio);

    let capture = state.capture.clone();
    tokio::task::spawn_blocking(move || capture.acquire()).await.unwrap();
    state.noise.start(0.5);
    state.switches.toggle("led2").await.unwrap();

    state.shutdown().await;
    assert_eq!(camera_counters.open_now(), 0);
    assert_eq!(audio_counters.open_now(), 0);
    assert!(!state.noise.is_playing());
    assert!(state.switches.states().await.values().all(|on| !on));
}

#[cfg(not(any(feature = "camera", feature = "camera-module", feature = "audio")))]
#[tokio::test]
async fn test_system_backends_fall_back_without_hardware() {
    let state = AppState::from_config(&DeviceConfig::default().with_dev_mode(true));
    let app = test_app(state.clone());

    let response = app.clone().oneshot(get("/video_feed")).await.unwrap();
    let mut body = response.into_body().into_data_stream();
    let part = body.next().await.unwrap().unwrap();
    assert!(part.starts_with(PART_HEADER));

    let response = app.oneshot(get("/audio_feed")).await.unwrap();
    let mut body = response.into_body().into_data_stream();
    let chunk = body.next().await.unwrap().unwrap();
    assert_eq!(chunk.len(), 2048);
    assert!(chunk.iter().all(|b| *b == 0));

    state.shutdown().await;
}
