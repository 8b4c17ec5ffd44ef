use super::render::{render, Frame};
use super::state::{PresentationMode, PresentationState, ScreenInput, Transition, Trigger};
use crate::analytics::{AnalyticsSink, EventParams, NoopAnalytics};
use crate::config::{PresentationConfig, TorchAcquisition};
use crate::events::{EventBus, SignalEvent};
use crate::motion::{MotionSource, NoMotion, ShakeDetector};
use crate::signal::{Signal, SignalId};
use crate::torch::{NoTorch, TorchController, TorchDevice};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Callback invoked when the user asks to leave the screen
pub type BackCallback = Box<dyn FnMut() + Send + 'static>;

/// Cloneable handle for delivering user input to a mounted screen
#[derive(Clone)]
pub struct ScreenInputs {
    sender: mpsc::UnboundedSender<ScreenInput>,
}

impl ScreenInputs {
    /// Deliver an input. Returns `false` once the screen is gone.
    pub fn send(&self, input: ScreenInput) -> bool {
        self.sender.send(input).is_ok()
    }

    pub fn tap(&self) -> bool {
        self.send(ScreenInput::Tap)
    }

    pub fn press_flash(&self) -> bool {
        self.send(ScreenInput::FlashButton)
    }

    pub fn back(&self) -> bool {
        self.send(ScreenInput::Back)
    }
}

/// Builder for mounting a [`SignalScreen`]
pub struct SignalScreenBuilder {
    torch: Arc<dyn TorchDevice>,
    motion: Box<dyn MotionSource>,
    analytics: Arc<dyn AnalyticsSink>,
    event_bus: Option<Arc<EventBus>>,
    config: PresentationConfig,
    acquisition: TorchAcquisition,
    on_back: Option<BackCallback>,
}

impl SignalScreenBuilder {
    pub fn new() -> Self {
        Self {
            torch: Arc::new(NoTorch),
            motion: Box::new(NoMotion),
            analytics: Arc::new(NoopAnalytics),
            event_bus: None,
            config: PresentationConfig::default(),
            acquisition: TorchAcquisition::Lazy,
            on_back: None,
        }
    }

    pub fn with_torch(mut self, torch: Arc<dyn TorchDevice>) -> Self {
        self.torch = torch;
        self
    }

    pub fn with_motion(mut self, motion: Box<dyn MotionSource>) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_presentation_config(mut self, config: PresentationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_torch_acquisition(mut self, acquisition: TorchAcquisition) -> Self {
        self.acquisition = acquisition;
        self
    }

    pub fn on_back<F>(mut self, on_back: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_back = Some(Box::new(on_back));
        self
    }

    /// Mount the screen for `signal`. Must be called inside a Tokio runtime.
    pub fn mount(self, signal: Signal) -> SignalScreen {
        let cancellation_token = CancellationToken::new();
        let event_bus = self.event_bus.unwrap_or_default();
        let state = PresentationState::new();
        let (frames_tx, frames_rx) = watch::channel(render(&signal, &state));
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let mut torch = TorchController::new(self.torch, cancellation_token.child_token());
        if self.acquisition == TorchAcquisition::Eager {
            torch.acquire();
        }

        let flash_period = self.config.flash_period().max(Duration::from_millis(1));
        let detector =
            ShakeDetector::with_settings(self.config.shake_threshold, self.config.shake_debounce());

        info!(
            "Mounting signal screen for {} (flash period {:?})",
            signal.id, flash_period
        );
        event_bus.publish(SignalEvent::ScreenMounted {
            signal: signal.id,
            timestamp: SystemTime::now(),
        });

        let signal_id = signal.id;
        let presenter = SignalPresenter {
            signal,
            state,
            torch,
            flash_period,
            ticker: None,
            frames: frames_tx,
            analytics: self.analytics,
            event_bus,
        };

        let task = tokio::spawn(run_screen(
            presenter,
            input_rx,
            self.motion,
            detector,
            self.on_back.unwrap_or_else(|| Box::new(|| {})),
            cancellation_token.clone(),
        ));

        SignalScreen {
            signal_id,
            inputs: ScreenInputs { sender: input_tx },
            frames: frames_rx,
            cancellation_token,
            task: Some(task),
        }
    }
}

impl Default for SignalScreenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A mounted full-screen signal.
///
/// Dropping the handle tears the screen down just like [`SignalScreen::unmount`],
/// without waiting for the torch to be handed back.
pub struct SignalScreen {
    signal_id: SignalId,
    inputs: ScreenInputs,
    frames: watch::Receiver<Frame>,
    cancellation_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SignalScreen {
    pub fn builder() -> SignalScreenBuilder {
        SignalScreenBuilder::new()
    }

    pub fn signal_id(&self) -> SignalId {
        self.signal_id
    }

    pub fn inputs(&self) -> ScreenInputs {
        self.inputs.clone()
    }

    pub fn tap(&self) {
        self.inputs.tap();
    }

    pub fn press_flash(&self) {
        self.inputs.press_flash();
    }

    pub fn back(&self) {
        self.inputs.back();
    }

    /// The most recently rendered frame
    pub fn frame(&self) -> Frame {
        self.frames.borrow().clone()
    }

    pub fn mode(&self) -> PresentationMode {
        self.frames.borrow().mode
    }

    /// Receiver notified on every repaint
    pub fn frames(&self) -> watch::Receiver<Frame> {
        self.frames.clone()
    }

    pub fn is_mounted(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }

    /// Tear the screen down: stop the duty cycle and release the torch.
    ///
    /// Cancellation happens before the first await, so no tick is processed
    /// after this is called.
    pub async fn unmount(mut self) {
        self.cancellation_token.cancel();

        if let Some(task) = self.task.take() {
            match timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => debug!("Signal screen task finished"),
                Ok(Err(e)) => warn!("Signal screen task ended abnormally: {}", e),
                Err(_) => warn!("Signal screen task did not finish within 5s"),
            }
        }
    }
}

impl Drop for SignalScreen {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// Owns the presentation state, the duty-cycle timer and the torch session
struct SignalPresenter {
    signal: Signal,
    state: PresentationState,
    torch: TorchController,
    flash_period: Duration,
    ticker: Option<Interval>,
    frames: watch::Sender<Frame>,
    analytics: Arc<dyn AnalyticsSink>,
    event_bus: Arc<EventBus>,
}

impl SignalPresenter {
    fn handle(&mut self, input: ScreenInput) -> Transition {
        let from = self.state.mode();
        let transition = self.state.apply(input);

        match transition {
            Transition::EnterAttention(trigger) => {
                self.torch.acquire();
                self.torch.set_torch(true);
                self.ticker = Some(self.start_ticker());
                self.repaint();
                self.mode_changed(from, trigger);

                let mut params = EventParams::new();
                params.insert("signal_id".to_string(), json!(self.signal.id.as_str()));
                params.insert("trigger".to_string(), json!(trigger.as_str()));
                self.analytics.track_event("flash_started", params);
            }
            Transition::LeaveAttention(trigger) => {
                self.ticker = None;
                self.torch.set_torch(false);
                self.repaint();
                self.mode_changed(from, trigger);
            }
            Transition::Exit => {
                self.event_bus.publish(SignalEvent::BackRequested {
                    timestamp: SystemTime::now(),
                });
            }
            Transition::Ignored => trace!("{:?} ignored in {:?}", input, from),
        }

        transition
    }

    fn on_tick(&mut self) {
        if let Some(color_on) = self.state.tick() {
            self.torch.set_torch(color_on);
            self.repaint();
            self.event_bus.publish(SignalEvent::DutyCycleTick {
                color_on,
                timestamp: SystemTime::now(),
            });
        }
    }

    /// Resolves on the next duty-cycle tick; never resolves when solid
    async fn next_tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn start_ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.flash_period, self.flash_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn repaint(&self) {
        self.frames.send_replace(render(&self.signal, &self.state));
    }

    fn mode_changed(&self, from: PresentationMode, trigger: Trigger) {
        self.event_bus.publish(SignalEvent::ModeChanged {
            from,
            to: self.state.mode(),
            trigger,
            timestamp: SystemTime::now(),
        });
    }

    async fn teardown(&mut self) {
        self.ticker = None;
        self.torch.shutdown().await;
        self.event_bus.publish(SignalEvent::ScreenUnmounted {
            timestamp: SystemTime::now(),
        });
        info!("Signal screen for {} unmounted", self.signal.id);
    }
}

async fn run_screen(
    mut presenter: SignalPresenter,
    mut inputs: mpsc::UnboundedReceiver<ScreenInput>,
    mut motion: Box<dyn MotionSource>,
    mut detector: ShakeDetector,
    mut on_back: BackCallback,
    cancellation_token: CancellationToken,
) {
    let mut motion_live = true;

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => break,
            _ = presenter.next_tick() => presenter.on_tick(),
            input = inputs.recv() => match input {
                Some(input) => {
                    if presenter.handle(input) == Transition::Exit {
                        on_back();
                    }
                }
                None => break,
            },
            sample = motion.next_sample(), if motion_live => match sample {
                Some(sample) => {
                    if let Some(shake) = detector.process(sample, Instant::now()) {
                        presenter.event_bus.publish(SignalEvent::ShakeDetected {
                            magnitude: shake.magnitude,
                            timestamp: SystemTime::now(),
                        });
                        presenter.handle(ScreenInput::Shake);
                    }
                }
                None => {
                    debug!("Motion source ended, shake input disabled");
                    motion_live = false;
                }
            },
        }
    }

    presenter.teardown().await;
}
