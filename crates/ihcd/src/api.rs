use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    integrations: Vec<String>,
}

/// Error body for failed requests
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Body of POST /v1/lights/:entity_id
#[derive(Debug, Deserialize)]
struct LightCommandRequest {
    on: bool,
    #[serde(default)]
    brightness: Option<u8>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

fn error(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: message }))
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            integrations: state.engine.integration_names(),
        }),
    )
}

/// Handler for GET /v1/state
#[tracing::instrument(skip(state))]
async fn engine_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(snapshot.as_ref().clone()))
}

/// Handler for POST /v1/lights/:entity_id
#[tracing::instrument(skip(state))]
async fn light_command(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(req): Json<LightCommandRequest>,
) -> impl IntoResponse {
    if !entity_id.starts_with("light.")
        || !state.engine.state_snapshot().entities.contains_key(&entity_id)
    {
        return error(
            StatusCode::NOT_FOUND,
            format!("Unknown light: {}", entity_id),
        )
        .into_response();
    }

    match state
        .engine
        .send_light_command(entity_id, req.on, req.brightness)
    {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// Handler for POST /v1/integrations/:name/reload
#[tracing::instrument(skip(state))]
async fn reload(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.engine.reload_integration(&name) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error(StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(engine_state))
        .route("/v1/lights/:entity_id", post(light_command))
        .route("/v1/integrations/:name/reload", post(reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Serves until `shutdown_rx` fires, then shuts down gracefully.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::LightState;
    use crate::integrations::ihc::IhcConfig;
    use crate::integrations::ihc::IhcIntegration;
    use crate::integrations::ihc::controller::MockController;

    const PROJECT: &str = r#"<utcs_project><groups>
  <group name="Hall">
    <product_airlink product_identifier="_0x4406"><airlink_dimming id="_0x10"/></product_airlink>
    <product_dataline product_identifier="_0x2109"><dataline_input id="_0x11"/></product_dataline>
  </group>
</groups></utcs_project>"#;

    fn router(engine: Engine) -> (Router, Arc<Engine>) {
        let engine = Arc::new(engine);
        let state = Arc::new(AppState {
            version: "test",
            engine: engine.clone(),
        });
        (create_router(state), engine)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn light_request(entity_id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/v1/lights/{}", entity_id))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Wait until the engine state satisfies `f`
    async fn wait_for(engine: &Engine, f: impl Fn(&crate::engine::State) -> bool) {
        for _ in 0..200 {
            if f(&engine.state_snapshot()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("engine state never reached the expected value");
    }

    #[tokio::test]
    async fn test_ping() {
        let (app, _engine) = router(Engine::new());
        let response = app
            .oneshot(Request::get("/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_info_lists_integrations() {
        let (app, _engine) = router(Engine::new());
        let response = app
            .oneshot(Request::get("/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["version"], "test");
        assert_eq!(body["integrations"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_empty_state() {
        let (app, _engine) = router(Engine::new());
        let response = app
            .oneshot(Request::get("/v1/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "entities": {}, "lights": {}, "binary_sensors": {} })
        );
    }

    #[tokio::test]
    async fn test_unknown_light_is_not_found() {
        let (app, _engine) = router(Engine::new());
        let response = app
            .oneshot(light_request("light.ihc_1", r#"{"on": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_integration_reload_is_not_found() {
        let (app, _engine) = router(Engine::new());
        let response = app
            .oneshot(
                Request::post("/v1/integrations/nowhere/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_light_command_end_to_end() {
        let mut config = IhcConfig::default();
        config.light.autosetup = true;
        let mut engine = Engine::new();
        engine.register_integration(
            "ihc".to_string(),
            Box::new(IhcIntegration::new(
                MockController::with_project(PROJECT),
                &config,
            )),
        );

        let (app, engine) = router(engine);
        let runner = engine.clone();
        tokio::spawn(async move { runner.run().await });

        wait_for(&engine, |s| s.entities.contains_key("light.ihc_16")).await;

        let response = app
            .clone()
            .oneshot(light_request("light.ihc_16", r#"{"on": true, "brightness": 128}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        wait_for(&engine, |s| {
            s.lights.get("light.ihc_16")
                == Some(&LightState {
                    on: Some(true),
                    brightness: 128,
                    dimmable: true,
                })
        })
        .await;

        let response = app
            .oneshot(Request::get("/v1/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["entities"]["light.ihc_16"]["name"], "Hall_16");
        assert_eq!(body["lights"]["light.ihc_16"]["brightness"], 128);
    }

    #[tokio::test]
    async fn test_binary_sensor_is_not_a_light() {
        let mut config = IhcConfig::default();
        config.binary_sensor.autosetup = true;
        let mut engine = Engine::new();
        let controller = MockController::with_project(PROJECT);
        engine.register_integration(
            "ihc".to_string(),
            Box::new(IhcIntegration::new(controller, &config)),
        );

        let (app, engine) = router(engine);
        let runner = engine.clone();
        tokio::spawn(async move { runner.run().await });

        wait_for(&engine, |s| s.entities.contains_key("binary_sensor.ihc_17")).await;

        let response = app
            .oneshot(light_request("binary_sensor.ihc_17", r#"{"on": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["error"],
            "Unknown light: binary_sensor.ihc_17"
        );
    }
}
