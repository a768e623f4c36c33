//! Unit tests for dispatching and polling jobs

use prompt_forge_gateway::error::AppError;
use prompt_forge_gateway::jobs::executor::JobExecutor;
use prompt_forge_gateway::jobs::{GenerationRequest, JobDispatcher, JobHandle, JobPoller, PollOutcome};
use prompt_forge_gateway::response::png;
use prompt_forge_gateway::worker::registry::ModelRegistry;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{fake_png, GatedWorker};

struct Harness {
    dispatcher: JobDispatcher,
    poller: JobPoller,
}

fn harness(worker: Arc<GatedWorker>) -> Harness {
    let mut registry = ModelRegistry::new();
    registry.register(worker);
    registry.register_unavailable("sdxl-base");
    let registry = Arc::new(registry);
    let executor = Arc::new(JobExecutor::new());

    Harness {
        dispatcher: JobDispatcher::new(registry, executor.clone()),
        poller: JobPoller::new(executor),
    }
}

async fn poll_until_done(poller: &JobPoller, handle: &JobHandle) -> Result<PollOutcome, AppError> {
    for _ in 0..400 {
        match poller.poll(handle) {
            Ok(PollOutcome::Pending) => tokio::time::sleep(Duration::from_millis(5)).await,
            other => return other,
        }
    }
    panic!("job {} never finished", handle);
}

#[tokio::test]
async fn test_async_then_immediate_poll_is_pending() {
    let worker = GatedWorker::new("sdxl-turbo");
    let h = harness(worker.clone());

    let handle = h.dispatcher.generate_async(GenerationRequest::new("a cat", "sdxl-turbo")).unwrap();
    assert_eq!(h.poller.poll(&handle).unwrap(), PollOutcome::Pending);

    worker.release();
    match poll_until_done(&h.poller, &handle).await.unwrap() {
        PollOutcome::Ready(result) => {
            assert_eq!(result.len(), 1);
            assert!(png::is_png(result.image(0).unwrap()));
        }
        PollOutcome::Pending => unreachable!(),
    }
}

#[tokio::test]
async fn test_ready_poll_is_idempotent_and_matches_sync() {
    let worker = GatedWorker::new("sdxl-turbo");
    worker.open();
    let h = harness(worker.clone());

    let sync = h
        .dispatcher
        .generate_sync(GenerationRequest::new("a cat", "sdxl-turbo"))
        .await
        .unwrap();

    let handle = h.dispatcher.generate_async(GenerationRequest::new("a cat", "sdxl-turbo")).unwrap();
    let first = poll_until_done(&h.poller, &handle).await.unwrap();
    let second = h.poller.poll(&handle).unwrap();

    assert_eq!(first, second);
    assert_eq!(first, PollOutcome::Ready(sync));
    assert_eq!(worker.calls(), 2);
}

#[tokio::test]
async fn test_unknown_model_never_reaches_worker() {
    let worker = GatedWorker::new("sdxl-turbo");
    let h = harness(worker.clone());

    let async_err = h.dispatcher.generate_async(GenerationRequest::new("a cat", "nonexistent"));
    assert!(matches!(async_err, Err(AppError::UnknownModel(_))));

    let sync_err = h
        .dispatcher
        .generate_sync(GenerationRequest::new("a cat", "nonexistent"))
        .await;
    assert!(matches!(sync_err, Err(AppError::UnknownModel(_))));

    assert_eq!(worker.calls(), 0);
}

#[tokio::test]
async fn test_invalid_and_unavailable_requests_rejected_before_dispatch() {
    let worker = GatedWorker::new("sdxl-turbo");
    let h = harness(worker.clone());

    let mut bad = GenerationRequest::new("a cat", "sdxl-turbo");
    bad.width = 100;
    assert!(matches!(h.dispatcher.generate_async(bad), Err(AppError::InvalidRequest(_))));

    let unavailable = h.dispatcher.generate_async(GenerationRequest::new("a cat", "sdxl-base"));
    assert!(matches!(unavailable, Err(AppError::WorkerUnavailable(_))));

    assert_eq!(worker.calls(), 0);
}

#[tokio::test]
async fn test_failed_job_reports_error_on_every_poll() {
    let worker = GatedWorker::failing("sdxl-turbo", "CUDA out of memory");
    worker.open();
    let h = harness(worker);

    let handle = h.dispatcher.generate_async(GenerationRequest::new("a cat", "sdxl-turbo")).unwrap();
    let first = poll_until_done(&h.poller, &handle).await;
    assert!(matches!(first, Err(AppError::InferenceFailure(ref m)) if m.contains("out of memory")));
    assert!(matches!(h.poller.poll(&handle), Err(AppError::InferenceFailure(_))));
}

#[tokio::test]
async fn test_unknown_handle_is_not_found() {
    let h = harness(GatedWorker::new("sdxl-turbo"));
    let result = h.poller.poll(&JobHandle::from("job-does-not-exist"));
    assert!(matches!(result, Err(AppError::JobNotFound(_))));
}

#[tokio::test]
async fn test_model_defaults_reach_worker() {
    let worker = GatedWorker::new("sdxl-turbo");
    worker.open();
    let h = harness(worker.clone());

    let mut request = GenerationRequest::new("a cat", "sdxl-turbo");
    request.width = 512;
    request.height = 512;
    request.number_images = 2;
    let result = h.dispatcher.generate_sync(request).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.image(1).unwrap(), &fake_png("sdxl-turbo-1"));

    let sent = worker.last_request().await.unwrap();
    assert_eq!(sent.width, 512);
    assert_eq!(sent.num_inference_steps, 1);
    assert_eq!(sent.guidance_scale, 0.0);
}
