use super::device::{TorchDevice, TorchStream};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of the torch session held by a [`TorchController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TorchState {
    /// Nothing requested yet
    Idle,
    /// Stream request in flight
    Acquiring,
    /// Stream held and torch usable
    Ready,
    /// Request failed or stream has no torch; all calls are no-ops
    Unavailable,
    /// Session torn down; never acquired again
    Released,
}

/// Best-effort torch control for one screen lifetime.
///
/// Hardware work happens on a worker task that exclusively owns the stream.
/// Every public operation returns immediately and never reports failure.
pub struct TorchController {
    device: Arc<dyn TorchDevice>,
    state: Arc<Mutex<TorchState>>,
    commands: Option<mpsc::UnboundedSender<bool>>,
    cancellation_token: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl TorchController {
    /// Create a controller whose session ends when `cancellation_token` fires
    pub fn new(device: Arc<dyn TorchDevice>, cancellation_token: CancellationToken) -> Self {
        Self {
            device,
            state: Arc::new(Mutex::new(TorchState::Idle)),
            commands: None,
            cancellation_token,
            worker: None,
        }
    }

    /// Request the torch stream. Only the first call has any effect.
    pub fn acquire(&mut self) {
        if self.cancellation_token.is_cancelled() {
            *self.state.lock() = TorchState::Released;
            return;
        }

        {
            let mut state = self.state.lock();
            if *state != TorchState::Idle {
                debug!("Torch acquisition already attempted ({:?})", *state);
                return;
            }
            *state = TorchState::Acquiring;
        }

        debug!("Requesting torch stream from {}", self.device.name());

        let (sender, receiver) = mpsc::unbounded_channel();
        self.commands = Some(sender);
        self.worker = Some(tokio::spawn(Self::run_worker(
            Arc::clone(&self.device),
            receiver,
            self.cancellation_token.clone(),
            Arc::clone(&self.state),
        )));
    }

    /// Ask for the torch to be on or off. Fire-and-forget.
    pub fn set_torch(&self, on: bool) {
        if self.cancellation_token.is_cancelled() || !self.accepts_commands() {
            return;
        }

        if let Some(commands) = &self.commands {
            let _ = commands.send(on);
        }
    }

    /// Whether torch requests still reach a worker. False before acquisition
    /// and once the worker has given up on the hardware.
    pub(crate) fn accepts_commands(&self) -> bool {
        self.commands
            .as_ref()
            .map_or(false, |commands| !commands.is_closed())
    }

    /// Stop every track and drop the session. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.cancellation_token.cancel();
        self.commands = None;

        let mut state = self.state.lock();
        if *state != TorchState::Released {
            debug!("Releasing torch session ({:?})", *state);
            *state = TorchState::Released;
        }
    }

    /// Release and wait for the worker to hand the hardware back
    pub async fn shutdown(&mut self) {
        self.release();

        if let Some(worker) = self.worker.take() {
            match timeout(Duration::from_secs(2), worker).await {
                Ok(Ok(())) => debug!("Torch worker stopped"),
                Ok(Err(e)) => warn!("Torch worker ended abnormally: {}", e),
                Err(_) => warn!("Torch worker did not stop within 2s"),
            }
        }
    }

    pub(crate) fn state(&self) -> TorchState {
        *self.state.lock()
    }

    fn settle(state: &Mutex<TorchState>, next: TorchState) {
        let mut state = state.lock();
        if *state != TorchState::Released {
            *state = next;
        }
    }

    async fn run_worker(
        device: Arc<dyn TorchDevice>,
        mut commands: mpsc::UnboundedReceiver<bool>,
        cancellation_token: CancellationToken,
        state: Arc<Mutex<TorchState>>,
    ) {
        let opened = tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                debug!("Torch request abandoned before it resolved");
                return;
            }
            result = device.open_stream() => result,
        };

        let mut stream: Box<dyn TorchStream> = match opened {
            Ok(stream) => stream,
            Err(e) => {
                debug!("Torch unavailable, flashing screen only: {}", e);
                Self::settle(&state, TorchState::Unavailable);
                return;
            }
        };

        if cancellation_token.is_cancelled() {
            debug!("Torch stream arrived after teardown, stopping it");
            stream.stop_tracks();
            return;
        }

        if !stream.supports_torch() {
            debug!("Torch stream from {} has no torch track", device.name());
            Self::settle(&state, TorchState::Unavailable);
            // Closes the queue so later requests are not buffered
            drop(commands);
            cancellation_token.cancelled().await;
            stream.stop_tracks();
            return;
        }

        Self::settle(&state, TorchState::Ready);
        info!("Torch ready on {}", device.name());

        loop {
            let mut on = tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break,
                command = commands.recv() => match command {
                    Some(on) => on,
                    None => break,
                },
            };

            // Only the most recent request matters
            while let Ok(next) = commands.try_recv() {
                on = next;
            }

            if let Err(e) = stream.apply_torch(on).await {
                debug!("Torch {} ignored: {}", if on { "on" } else { "off" }, e);
            }
        }

        stream.stop_tracks();
        debug!("Torch stream stopped");
    }
}

impl Drop for TorchController {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
