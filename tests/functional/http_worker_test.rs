//! HttpWorker against a mocked worker process

use prompt_forge_gateway::{
    config::ModelConfig,
    error::AppError,
    response::base64,
    worker::http_worker::HttpWorker,
    worker::traits::{ImageWorker, InferenceDefaults, LoraAdapter, PipelineKind, WorkerRequest},
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::fake_png;

fn model(endpoint: &str) -> ModelConfig {
    ModelConfig {
        id: "flux-koda".to_string(),
        name: "Koda".to_string(),
        description: String::new(),
        available: true,
        tags: vec![],
        trigger_word: Some("flmft style".to_string()),
        icon: None,
        pipeline: PipelineKind::Flux,
        adapter: Some(LoraAdapter {
            repo: "alvdansen/flux-koda".to_string(),
            weight_name: Some("araminta_k_flux_koda.safetensors".to_string()),
        }),
        defaults: InferenceDefaults::default(),
        endpoints: vec![endpoint.to_string()],
        health_check_path: "/health".to_string(),
        health_check_interval_secs: 30,
    }
}

fn request() -> WorkerRequest {
    WorkerRequest {
        prompt: "a lighthouse at dusk".to_string(),
        width: 768,
        height: 512,
        num_inference_steps: 28,
        guidance_scale: 3.5,
        seed: Some(7.0),
        num_images: 1,
    }
}

fn worker(server: &MockServer) -> HttpWorker {
    HttpWorker::new(&model(&server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_png_body_is_returned_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(fake_png("raw").to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let result = worker(&server).generate(request()).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.image(0).unwrap(), &fake_png("raw"));
}

#[tokio::test]
async fn test_json_images_are_decoded() {
    let server = MockServer::start().await;
    let first = base64::encode(&fake_png("one"));
    let second = base64::create_data_url(&fake_png("two"), "image/png");

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"b64_json": first}, {"base64": second}]
        })))
        .mount(&server)
        .await;

    let result = worker(&server).generate(request()).await.unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result.image(1).unwrap(), &fake_png("two"));
}

#[tokio::test]
async fn test_request_carries_pipeline_and_adapter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_partial_json(json!({
            "pipeline": "flux",
            "adapter": {
                "repo": "alvdansen/flux-koda",
                "weight_name": "araminta_k_flux_koda.safetensors"
            },
            "prompt": "a lighthouse at dusk",
            "width": 768,
            "height": 512,
            "num_inference_steps": 28,
            "num_images": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(fake_png("ok").to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    assert!(worker(&server).generate(request()).await.is_ok());
}

#[tokio::test]
async fn test_busy_worker_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = worker(&server).generate(request()).await.unwrap_err();
    assert!(matches!(err, AppError::WorkerUnavailable(_)));
}

#[tokio::test]
async fn test_worker_error_is_inference_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&server)
        .await;

    let err = worker(&server).generate(request()).await.unwrap_err();
    match err {
        AppError::InferenceFailure(message) => assert!(message.contains("CUDA out of memory")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_non_png_payload_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"GIF89a".to_vec(), "image/png"))
        .mount(&server)
        .await;

    let err = worker(&server).generate(request()).await.unwrap_err();
    assert!(matches!(err, AppError::InferenceFailure(_)));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": []})))
        .mount(&server)
        .await;

    let err = worker(&server).generate(request()).await.unwrap_err();
    assert!(matches!(err, AppError::InferenceFailure(_)));
}

#[tokio::test]
async fn test_health_check_probes_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let worker = worker(&server);
    assert!(worker.health_check().await);
    assert!(worker.is_healthy());
    assert_eq!(worker.status().model_id, "flux-koda");
}

#[tokio::test]
async fn test_unreachable_worker_is_unavailable() {
    let worker = HttpWorker::new(&model("http://127.0.0.1:1"), Duration::from_secs(2)).unwrap();

    let err = worker.generate(request()).await.unwrap_err();
    assert!(matches!(err, AppError::WorkerUnavailable(_)));
    assert!(!worker.health_check().await);
}

#[tokio::test]
async fn test_stalled_health_probe_gives_up_before_generation_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
        .mount(&server)
        .await;

    let worker = HttpWorker::new(&model(&server.uri()), Duration::from_secs(900)).unwrap();

    let started = std::time::Instant::now();
    assert!(!worker.health_check().await);
    assert!(started.elapsed() < Duration::from_secs(30));
}
