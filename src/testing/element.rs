use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::element::{
    MediaEvent, NetworkState, PlaybackElement, PreloadHint, ReadyState, TimeRange,
};

#[derive(Debug, Clone)]
struct ElementState {
    buffered: Vec<TimeRange>,
    current_time: f64,
    duration: Option<f64>,
    ready_state: ReadyState,
    network_state: NetworkState,
    preload: Option<PreloadHint>,
}

/// Playback element whose readings are set by the test
pub struct ScriptedElement {
    state: Mutex<ElementState>,
    events: broadcast::Sender<MediaEvent>,
}

impl ScriptedElement {
    /// Element that is playing from the start with nothing buffered
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(ElementState {
                buffered: Vec::new(),
                current_time: 0.0,
                duration: None,
                ready_state: ReadyState::HaveEnoughData,
                network_state: NetworkState::Loading,
                preload: None,
            }),
            events,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ElementState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn set_buffered_end(&self, end_secs: f64) {
        self.with_state(|s| s.buffered = vec![TimeRange::new(0.0, end_secs)]);
    }

    pub fn set_buffered(&self, ranges: Vec<TimeRange>) {
        self.with_state(|s| s.buffered = ranges);
    }

    pub fn set_position(&self, secs: f64) {
        self.with_state(|s| s.current_time = secs);
    }

    pub fn set_duration(&self, secs: Option<f64>) {
        self.with_state(|s| s.duration = secs);
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.with_state(|s| s.ready_state = ready_state);
    }

    pub fn set_network_state(&self, network_state: NetworkState) {
        self.with_state(|s| s.network_state = network_state);
    }

    pub fn preload_hint(&self) -> Option<PreloadHint> {
        self.with_state(|s| s.preload)
    }

    /// Emit a notification; returns how many listeners received it
    pub fn emit(&self, event: MediaEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for ScriptedElement {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackElement for ScriptedElement {
    fn buffered(&self) -> Vec<TimeRange> {
        self.with_state(|s| s.buffered.clone())
    }

    fn current_time(&self) -> f64 {
        self.with_state(|s| s.current_time)
    }

    fn duration(&self) -> Option<f64> {
        self.with_state(|s| s.duration)
    }

    fn ready_state(&self) -> ReadyState {
        self.with_state(|s| s.ready_state)
    }

    fn network_state(&self) -> NetworkState {
        self.with_state(|s| s.network_state)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<MediaEvent>> {
        Some(self.events.subscribe())
    }

    fn set_preload(&self, hint: PreloadHint) {
        self.with_state(|s| s.preload = Some(hint));
    }
}
