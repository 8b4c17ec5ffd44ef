use super::device::{TorchDevice, TorchStream};
use crate::error::TorchError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How a [`MockTorch`] answers stream requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockTorchOutcome {
    /// Stream with a working torch
    Grant,
    /// Permission prompt rejected
    Deny,
    /// Stream granted but no track exposes a torch
    NoTorchTrack,
    /// Stream granted but every torch constraint fails
    FailConstraints,
}

/// Everything a [`MockTorch`] was asked to do
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MockTorchLog {
    /// Calls to `open_stream`
    pub open_requests: u32,
    /// Streams handed out
    pub streams_opened: u32,
    /// Streams whose tracks were stopped
    pub streams_stopped: u32,
    /// Torch states successfully applied, in order
    pub torch_calls: Vec<bool>,
    /// Torch requests that reached the stream but failed
    pub failed_torch_calls: u32,
}

impl MockTorchLog {
    /// Streams currently holding the hardware
    pub fn live_streams(&self) -> u32 {
        self.streams_opened - self.streams_stopped
    }

    /// Last torch state applied, if any
    pub fn torch_on(&self) -> Option<bool> {
        self.torch_calls.last().copied()
    }
}

/// Torch device for tests and demos that records every hardware call
#[derive(Debug, Clone)]
pub struct MockTorch {
    outcome: MockTorchOutcome,
    open_delay: Duration,
    log: Arc<Mutex<MockTorchLog>>,
}

impl MockTorch {
    pub fn new(outcome: MockTorchOutcome) -> Self {
        Self {
            outcome,
            open_delay: Duration::ZERO,
            log: Arc::new(Mutex::new(MockTorchLog::default())),
        }
    }

    /// Delay stream acquisition, simulating a slow permission prompt
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Snapshot of recorded calls
    pub fn log(&self) -> MockTorchLog {
        self.log.lock().clone()
    }
}

#[async_trait]
impl TorchDevice for MockTorch {
    async fn open_stream(&self) -> Result<Box<dyn TorchStream>, TorchError> {
        self.log.lock().open_requests += 1;

        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        if self.outcome == MockTorchOutcome::Deny {
            debug!("Mock torch denying stream request");
            return Err(TorchError::PermissionDenied("mock".to_string()));
        }

        self.log.lock().streams_opened += 1;
        Ok(Box::new(MockTorchStream {
            outcome: self.outcome,
            log: Arc::clone(&self.log),
            stopped: false,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockTorchStream {
    outcome: MockTorchOutcome,
    log: Arc<Mutex<MockTorchLog>>,
    stopped: bool,
}

#[async_trait]
impl TorchStream for MockTorchStream {
    fn supports_torch(&self) -> bool {
        self.outcome != MockTorchOutcome::NoTorchTrack
    }

    async fn apply_torch(&mut self, on: bool) -> Result<(), TorchError> {
        let mut log = self.log.lock();
        if self.stopped || self.outcome == MockTorchOutcome::FailConstraints {
            log.failed_torch_calls += 1;
            return Err(TorchError::Constraint {
                details: "mock constraint rejected".to_string(),
            });
        }

        log.torch_calls.push(on);
        Ok(())
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.log.lock().streams_stopped += 1;
        }
    }
}
