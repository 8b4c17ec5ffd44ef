use super::controller::TorchState;
use super::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn controller_for(torch: &MockTorch) -> TorchController {
    TorchController::new(Arc::new(torch.clone()), CancellationToken::new())
}

#[tokio::test(start_paused = true)]
async fn test_acquire_is_idempotent() {
    let torch = MockTorch::new(MockTorchOutcome::Grant);
    let mut controller = controller_for(&torch);

    controller.acquire();
    controller.acquire();
    settle().await;
    controller.acquire();
    settle().await;

    assert_eq!(torch.log().open_requests, 1);
    assert_eq!(controller.state(), TorchState::Ready);
    assert!(controller.accepts_commands());

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_set_torch_before_acquire_is_noop() {
    let torch = MockTorch::new(MockTorchOutcome::Grant);
    let mut controller = controller_for(&torch);

    controller.set_torch(true);
    settle().await;

    assert_eq!(torch.log().open_requests, 0);
    assert!(torch.log().torch_calls.is_empty());

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_torch_follows_requests_in_order() {
    let torch = MockTorch::new(MockTorchOutcome::Grant);
    let mut controller = controller_for(&torch);

    controller.acquire();
    settle().await;

    for on in [true, false, true, false] {
        controller.set_torch(on);
        settle().await;
    }

    assert_eq!(torch.log().torch_calls, vec![true, false, true, false]);
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_requests_during_acquisition_coalesce_to_latest() {
    let torch = MockTorch::new(MockTorchOutcome::Grant).with_open_delay(Duration::from_millis(300));
    let mut controller = controller_for(&torch);

    controller.acquire();
    controller.set_torch(true);
    controller.set_torch(false);
    controller.set_torch(true);
    settle().await;
    assert_eq!(controller.state(), TorchState::Acquiring);

    tokio::time::advance(Duration::from_millis(300)).await;
    settle().await;

    assert_eq!(torch.log().torch_calls, vec![true]);
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_degrades_silently() {
    let torch = MockTorch::new(MockTorchOutcome::Deny);
    let mut controller = controller_for(&torch);

    controller.acquire();
    settle().await;
    assert_eq!(controller.state(), TorchState::Unavailable);

    controller.set_torch(true);
    controller.set_torch(false);
    settle().await;

    let log = torch.log();
    assert_eq!(log.streams_opened, 0);
    assert!(log.torch_calls.is_empty());

    // Never retried
    controller.acquire();
    settle().await;
    assert_eq!(torch.log().open_requests, 1);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_without_torch_is_still_stopped() {
    let torch = MockTorch::new(MockTorchOutcome::NoTorchTrack);
    let mut controller = controller_for(&torch);

    controller.acquire();
    settle().await;
    assert_eq!(controller.state(), TorchState::Unavailable);

    assert!(!controller.accepts_commands());

    for tick in 0..100 {
        controller.set_torch(tick % 2 == 0);
    }
    settle().await;
    assert!(torch.log().torch_calls.is_empty());
    assert_eq!(torch.log().live_streams(), 1);

    controller.shutdown().await;
    assert_eq!(torch.log().live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_constraints_are_swallowed() {
    let torch = MockTorch::new(MockTorchOutcome::FailConstraints);
    let mut controller = controller_for(&torch);

    controller.acquire();
    settle().await;
    controller.set_torch(true);
    settle().await;
    controller.set_torch(false);
    settle().await;

    assert_eq!(torch.log().failed_torch_calls, 2);
    assert_eq!(controller.state(), TorchState::Ready);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_release_stops_tracks_and_blocks_reacquire() {
    let torch = MockTorch::new(MockTorchOutcome::Grant);
    let mut controller = controller_for(&torch);

    controller.acquire();
    settle().await;
    assert_eq!(torch.log().live_streams(), 1);

    controller.shutdown().await;
    assert_eq!(torch.log().live_streams(), 0);
    assert_eq!(controller.state(), TorchState::Released);

    controller.acquire();
    controller.set_torch(true);
    settle().await;

    assert_eq!(torch.log().open_requests, 1);
    assert!(torch.log().torch_calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_release_without_acquire_is_safe() {
    let torch = MockTorch::new(MockTorchOutcome::Grant);
    let mut controller = controller_for(&torch);

    controller.release();
    controller.release();
    controller.shutdown().await;

    assert_eq!(torch.log(), MockTorchLog::default());
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_in_flight_at_release_never_leaks() {
    let torch = MockTorch::new(MockTorchOutcome::Grant).with_open_delay(Duration::from_millis(500));
    let mut controller = controller_for(&torch);

    controller.acquire();
    settle().await;
    controller.release();

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    controller.shutdown().await;

    let log = torch.log();
    assert_eq!(log.open_requests, 1);
    assert_eq!(log.live_streams(), 0);
    assert_eq!(controller.state(), TorchState::Released);
}

#[tokio::test(start_paused = true)]
async fn test_parent_token_cancellation_releases_session() {
    let torch = MockTorch::new(MockTorchOutcome::Grant);
    let parent = CancellationToken::new();
    let mut controller = TorchController::new(Arc::new(torch.clone()), parent.child_token());

    controller.acquire();
    settle().await;
    assert_eq!(torch.log().live_streams(), 1);

    parent.cancel();
    settle().await;
    assert_eq!(torch.log().live_streams(), 0);

    controller.shutdown().await;
}

#[tokio::test]
async fn test_no_torch_device_is_unavailable() {
    let mut controller = TorchController::new(Arc::new(NoTorch), CancellationToken::new());

    controller.acquire();
    controller.set_torch(true);
    settle().await;

    assert_eq!(controller.state(), TorchState::Unavailable);
    controller.shutdown().await;
}

#[test]
fn test_from_config_selects_backend() {
    let mut config = crate::config::PawSignalConfig::default().torch;
    assert!(from_config(&config).name().ends_with("torch-light0"));

    config.backend = crate::config::TorchBackend::None;
    assert_eq!(from_config(&config).name(), "none");

    config.backend = crate::config::TorchBackend::Mock;
    assert_eq!(from_config(&config).name(), "mock");
}
