use super::*;
use crate::analytics::{AnalyticsSink, EventParams};
use crate::config::{PresentationConfig, TorchAcquisition};
use crate::events::{EventBus, SignalEvent};
use crate::motion::{self, AccelerationSample};
use crate::signal::{Rgb, Signal, SignalId};
use crate::torch::{MockTorch, MockTorchOutcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const PERIOD: Duration = Duration::from_millis(500);
const RED: Rgb = Rgb::new(0xC6, 0x28, 0x28);

#[derive(Default)]
struct RecordingAnalytics {
    events: Mutex<Vec<(String, EventParams)>>,
}

impl AnalyticsSink for RecordingAnalytics {
    fn track_event(&self, name: &str, params: EventParams) {
        self.events.lock().push((name.to_string(), params));
    }
}

struct Harness {
    screen: SignalScreen,
    torch: MockTorch,
    motion: mpsc::Sender<AccelerationSample>,
    back_presses: Arc<AtomicUsize>,
    analytics: Arc<RecordingAnalytics>,
    event_bus: Arc<EventBus>,
}

fn mount_with(id: SignalId, torch: MockTorch, acquisition: TorchAcquisition) -> Harness {
    let (motion_tx, motion_source) = motion::channel(16);
    let back_presses = Arc::new(AtomicUsize::new(0));
    let analytics = Arc::new(RecordingAnalytics::default());
    let event_bus = Arc::new(EventBus::new(256));

    let presses = Arc::clone(&back_presses);
    let screen = SignalScreen::builder()
        .with_torch(Arc::new(torch.clone()))
        .with_motion(Box::new(motion_source))
        .with_analytics(analytics.clone())
        .with_event_bus(Arc::clone(&event_bus))
        .with_presentation_config(PresentationConfig::default())
        .with_torch_acquisition(acquisition)
        .on_back(move || {
            presses.fetch_add(1, Ordering::SeqCst);
        })
        .mount(Signal::get(id).clone());

    Harness {
        screen,
        torch,
        motion: motion_tx,
        back_presses,
        analytics,
        event_bus,
    }
}

fn mount(id: SignalId) -> Harness {
    mount_with(id, MockTorch::new(MockTorchOutcome::Grant), TorchAcquisition::Lazy)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

fn shake() -> AccelerationSample {
    AccelerationSample::new(30.0, 0.0, 0.0)
}

#[test]
fn test_state_machine_transitions() {
    let mut state = PresentationState::new();
    assert_eq!(state.mode(), PresentationMode::Solid);
    assert!(state.color_on());

    assert_eq!(state.apply(ScreenInput::Tap), Transition::Ignored);
    assert_eq!(state.mode(), PresentationMode::Solid);

    assert_eq!(
        state.apply(ScreenInput::FlashButton),
        Transition::EnterAttention(Trigger::Button)
    );
    assert_eq!(state.tick(), Some(false));
    assert_eq!(
        state.apply(ScreenInput::Tap),
        Transition::LeaveAttention(Trigger::Tap)
    );
    assert!(state.color_on());

    assert_eq!(
        state.apply(ScreenInput::Shake),
        Transition::EnterAttention(Trigger::Shake)
    );
    assert_eq!(
        state.apply(ScreenInput::Shake),
        Transition::LeaveAttention(Trigger::Shake)
    );
    assert_eq!(state.tick(), None);

    assert_eq!(state.apply(ScreenInput::Back), Transition::Exit);
    assert_eq!(state.mode(), PresentationMode::Solid);
}

#[test]
fn test_render_solid_and_attention_halves() {
    let signal = Signal::get(SignalId::Yellow);
    let mut state = PresentationState::new();

    let solid = render(signal, &state);
    assert_eq!(solid.background, signal.hex);
    assert_eq!(solid.foreground, signal.text_color);
    assert!(solid.text_visible);
    assert_eq!(solid.hint, HINT_START);
    assert_eq!(solid.flash_control, "Flash");
    assert_eq!(solid.back_label, BACK_LABEL);

    state.apply(ScreenInput::FlashButton);
    let lit = render(signal, &state);
    assert_eq!(lit.background, signal.hex);
    assert!(lit.text_visible);
    assert_eq!(lit.hint, HINT_STOP);
    assert_eq!(lit.flash_control, "Stop");

    state.tick();
    let dark = render(signal, &state);
    assert_eq!(dark.background, Rgb::BLACK);
    assert!(!dark.text_visible);
    assert_eq!(dark.back_label, BACK_LABEL);
    assert_eq!(dark.hint, HINT_STOP);
}

#[tokio::test(start_paused = true)]
async fn test_red_signal_flash_scenario() {
    let h = mount(SignalId::Red);
    settle().await;

    let frame = h.screen.frame();
    assert_eq!(frame.background, RED);
    assert_eq!(frame.background.to_hex(), "#C62828");
    assert_eq!(frame.foreground, Rgb::WHITE);
    assert_eq!(frame.label, "Do Not Approach");
    assert!(frame.text_visible);
    assert_eq!(h.screen.mode(), PresentationMode::Solid);

    h.screen.press_flash();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Attention);
    assert_eq!(h.screen.frame().background, RED);
    assert!(h.screen.frame().text_visible);
    assert_eq!(h.torch.log().torch_calls, vec![true]);

    let expected = [(Rgb::BLACK, false), (RED, true), (Rgb::BLACK, false), (RED, true)];
    for (background, visible) in expected {
        advance(PERIOD).await;
        let frame = h.screen.frame();
        assert_eq!(frame.background, background);
        assert_eq!(frame.text_visible, visible);
        assert_eq!(h.torch.log().torch_on(), Some(visible));
    }

    h.screen.press_flash();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Solid);
    assert_eq!(h.torch.log().torch_on(), Some(false));

    let calls = h.torch.log().torch_calls.len();
    for _ in 0..4 {
        advance(PERIOD).await;
        assert_eq!(h.screen.frame().background, RED);
        assert!(h.screen.frame().text_visible);
    }
    assert_eq!(h.torch.log().torch_calls.len(), calls);

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_color_on_is_set_before_first_tick() {
    let h = mount(SignalId::Green);
    let mut frames = h.screen.frames();
    frames.borrow_and_update();

    h.screen.press_flash();
    frames.changed().await.unwrap();

    let frame = frames.borrow_and_update().clone();
    assert_eq!(frame.mode, PresentationMode::Attention);
    assert!(frame.text_visible);
    assert_eq!(frame.background, Signal::get(SignalId::Green).hex);

    // Nothing else happens until a full period has elapsed
    advance(PERIOD - Duration::from_millis(1)).await;
    assert!(!frames.has_changed().unwrap());

    advance(Duration::from_millis(1)).await;
    assert!(frames.has_changed().unwrap());
    assert!(!frames.borrow_and_update().text_visible);

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_every_tick_drives_torch_with_same_value() {
    let h = mount(SignalId::Blue);
    let mut events = h.event_bus.subscribe();

    h.screen.press_flash();
    settle().await;

    for _ in 0..7 {
        advance(PERIOD).await;
        let frame = h.screen.frame();
        assert_eq!(h.torch.log().torch_on(), Some(frame.text_visible));
    }

    let log = h.torch.log();
    assert_eq!(log.torch_calls.len(), 8);
    assert!(log.torch_calls.windows(2).all(|pair| pair[0] != pair[1]));

    let mut ticks = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SignalEvent::DutyCycleTick { color_on, .. } = event {
            ticks.push(color_on);
        }
    }
    assert_eq!(ticks, vec![false, true, false, true, false, true, false]);

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_tap_only_stops_flashing() {
    let h = mount(SignalId::Yellow);

    h.screen.tap();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Solid);
    assert_eq!(h.torch.log().open_requests, 0);

    h.screen.press_flash();
    settle().await;
    advance(PERIOD).await;
    assert!(!h.screen.frame().text_visible);

    // Leaving on an odd tick still restores the color and turns the torch off
    h.screen.tap();
    settle().await;
    let frame = h.screen.frame();
    assert_eq!(frame.mode, PresentationMode::Solid);
    assert!(frame.text_visible);
    assert_eq!(frame.background, Signal::get(SignalId::Yellow).hex);
    assert_eq!(h.torch.log().torch_on(), Some(false));

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_shake_toggles_with_debounce() {
    let h = mount(SignalId::Red);

    h.motion.send(shake()).await.unwrap();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Attention);

    // Still inside the debounce window
    advance(Duration::from_millis(400)).await;
    h.motion.send(shake()).await.unwrap();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Attention);

    // Gentle movement never counts
    advance(Duration::from_millis(500)).await;
    h.motion.send(AccelerationSample::new(25.0, 0.0, 0.0)).await.unwrap();
    h.motion
        .send(AccelerationSample {
            x: Some(90.0),
            y: None,
            z: Some(0.0),
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Attention);

    h.motion.send(shake()).await.unwrap();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Solid);
    assert!(h.screen.frame().text_visible);
    assert_eq!(h.torch.log().torch_on(), Some(false));

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_back_navigates_without_mode_change() {
    let h = mount(SignalId::Green);

    h.screen.press_flash();
    settle().await;
    h.screen.back();
    settle().await;

    assert_eq!(h.back_presses.load(Ordering::SeqCst), 1);
    assert_eq!(h.screen.mode(), PresentationMode::Attention);

    advance(PERIOD).await;
    assert!(!h.screen.frame().text_visible);
    assert_eq!(h.screen.frame().back_label, BACK_LABEL);

    h.screen.back();
    settle().await;
    assert_eq!(h.back_presses.load(Ordering::SeqCst), 2);

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_flash_started_tracked_once_per_entry() {
    let h = mount(SignalId::Blue);

    h.screen.press_flash();
    settle().await;
    advance(PERIOD * 3).await;
    h.screen.tap();
    settle().await;
    advance(Duration::from_secs(1)).await;
    h.motion.send(shake()).await.unwrap();
    settle().await;

    let events = h.analytics.events.lock().clone();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|(name, _)| name == "flash_started"));
    assert_eq!(events[0].1["signal_id"], "blue");
    assert_eq!(events[0].1["trigger"], "button");
    assert_eq!(events[1].1["trigger"], "shake");

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_torch_acquired_lazily_once() {
    let h = mount(SignalId::Red);
    settle().await;
    assert_eq!(h.torch.log().open_requests, 0);

    for _ in 0..3 {
        h.screen.press_flash();
        settle().await;
        h.screen.press_flash();
        settle().await;
    }

    assert_eq!(h.torch.log().open_requests, 1);
    assert_eq!(h.torch.log().live_streams(), 1);

    h.screen.unmount().await;
    assert_eq!(h.torch.log().live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mount_and_immediate_unmount_releases_everything() {
    for id in SignalId::ALL {
        for acquisition in [TorchAcquisition::Lazy, TorchAcquisition::Eager] {
            let h = mount_with(id, MockTorch::new(MockTorchOutcome::Grant), acquisition);
            let mut events = h.event_bus.subscribe();
            let torch = h.torch.clone();

            h.screen.unmount().await;
            advance(Duration::from_secs(5)).await;

            assert_eq!(torch.log().live_streams(), 0, "{} {:?}", id, acquisition);
            assert!(torch.log().torch_calls.is_empty());

            let mut saw_unmount = false;
            while let Ok(event) = events.try_recv() {
                assert!(!matches!(event, SignalEvent::DutyCycleTick { .. }));
                saw_unmount |= matches!(event, SignalEvent::ScreenUnmounted { .. });
            }
            assert!(saw_unmount);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_unmount_while_flashing_stops_ticks() {
    let h = mount(SignalId::Green);
    let mut events = h.event_bus.subscribe();
    let torch = h.torch.clone();
    let frames = h.screen.frames();

    h.screen.press_flash();
    settle().await;
    advance(PERIOD).await;
    assert_eq!(torch.log().live_streams(), 1);

    h.screen.unmount().await;
    let calls_at_unmount = torch.log().torch_calls.len();
    let frame_at_unmount = frames.borrow().clone();

    advance(PERIOD * 10).await;

    assert_eq!(torch.log().live_streams(), 0);
    assert_eq!(torch.log().torch_calls.len(), calls_at_unmount);
    assert_eq!(*frames.borrow(), frame_at_unmount);

    let mut after_unmount = false;
    while let Ok(event) = events.try_recv() {
        if after_unmount {
            panic!("Event after unmount: {:?}", event);
        }
        after_unmount = matches!(event, SignalEvent::ScreenUnmounted { .. });
    }
    assert!(after_unmount);
}

#[tokio::test(start_paused = true)]
async fn test_pending_torch_acquisition_abandoned_on_unmount() {
    let torch = MockTorch::new(MockTorchOutcome::Grant).with_open_delay(Duration::from_secs(2));
    let h = mount_with(SignalId::Red, torch.clone(), TorchAcquisition::Lazy);

    h.screen.press_flash();
    settle().await;
    assert_eq!(torch.log().open_requests, 1);

    h.screen.unmount().await;
    advance(Duration::from_secs(3)).await;

    assert_eq!(torch.log().live_streams(), 0);
    assert!(torch.log().torch_calls.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_screen_releases_torch() {
    let h = mount_with(
        SignalId::Yellow,
        MockTorch::new(MockTorchOutcome::Grant),
        TorchAcquisition::Eager,
    );
    settle().await;
    assert_eq!(h.torch.log().live_streams(), 1);

    let torch = h.torch.clone();
    drop(h);
    settle().await;

    assert_eq!(torch.log().live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_still_flashes_screen() {
    let h = mount_with(
        SignalId::Red,
        MockTorch::new(MockTorchOutcome::Deny),
        TorchAcquisition::Lazy,
    );

    h.screen.press_flash();
    settle().await;

    for visible in [false, true, false, true] {
        advance(PERIOD).await;
        let frame = h.screen.frame();
        assert_eq!(frame.text_visible, visible);
        assert_eq!(frame.background, if visible { RED } else { Rgb::BLACK });
    }

    let log = h.torch.log();
    assert_eq!(log.open_requests, 1);
    assert_eq!(log.streams_opened, 0);
    assert!(log.torch_calls.is_empty());

    h.screen.press_flash();
    settle().await;
    assert_eq!(h.screen.mode(), PresentationMode::Solid);

    h.screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_motion_source_ending_leaves_screen_working() {
    let h = mount(SignalId::Green);
    let Harness { screen, motion, .. } = h;
    drop(motion);
    settle().await;

    screen.press_flash();
    settle().await;
    advance(PERIOD).await;
    assert_eq!(screen.mode(), PresentationMode::Attention);
    assert!(!screen.frame().text_visible);

    screen.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_inputs_after_unmount_are_rejected() {
    let h = mount(SignalId::Green);
    let inputs = h.screen.inputs();
    assert!(h.screen.is_mounted());

    h.screen.unmount().await;

    assert!(!inputs.press_flash());
    assert!(!inputs.back());
    assert_eq!(h.back_presses.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_flash_period() {
    let (_motion_tx, motion_source) = motion::channel(1);
    let screen = SignalScreen::builder()
        .with_motion(Box::new(motion_source))
        .with_presentation_config(PresentationConfig {
            flash_period_ms: 1000,
            ..PresentationConfig::default()
        })
        .mount(Signal::get(SignalId::Blue).clone());

    screen.press_flash();
    settle().await;

    advance(PERIOD).await;
    assert!(screen.frame().text_visible);
    advance(PERIOD).await;
    assert!(!screen.frame().text_visible);

    screen.unmount().await;
}
