use super::{LayerId, LocalTransform, UiWindow};
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Lets behavior hooks veto a show request that is in progress.
#[derive(Debug, Default)]
pub struct WindowControl {
    cancelled: bool,
}

impl WindowControl {
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Per-window hooks. Everything defaults to a no-op so behaviors only override what they need.
pub trait WindowBehavior {
    /// Runs before the window activates. Cancelling keeps it hidden.
    fn before_show(&mut self, _control: &mut WindowControl) {}

    /// Runs right after activation. Cancelling deactivates the window again.
    fn on_show(&mut self, _control: &mut WindowControl) -> Result<()> {
        Ok(())
    }

    fn on_hide(&mut self) {}

    fn load_state(&mut self, _state: Option<&Value>) {}

    fn on_load(&mut self) {}

    fn on_jettison(&mut self) {}

    fn is_state_visible(&self, _state: &Value) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoBehavior;

impl WindowBehavior for NoBehavior {}

/// Transition lengths in seconds. A zero show time makes `show` complete immediately;
/// a hide always takes at least one tick to settle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct TransitionTimings {
    #[serde(default)]
    pub show_secs: f32,
    #[serde(default)]
    pub hide_secs: f32,
}

pub struct StandardWindow {
    name: String,
    layer: LayerId,
    active: bool,
    showing: bool,
    hiding: bool,
    ready: bool,
    loaded: bool,
    state: Option<Value>,
    transform: LocalTransform,
    parent: Option<LayerId>,
    timings: TransitionTimings,
    transition_left: f32,
    behavior: Box<dyn WindowBehavior>,
}

impl StandardWindow {
    /// A freshly instantiated window is active, as it would be inside a scene that just loaded.
    pub fn new(name: impl Into<String>, layer: LayerId) -> Self {
        Self {
            name: name.into(),
            layer,
            active: true,
            showing: false,
            hiding: false,
            ready: false,
            loaded: false,
            state: None,
            transform: LocalTransform::IDENTITY,
            parent: None,
            timings: TransitionTimings::default(),
            transition_left: 0.0,
            behavior: Box::new(NoBehavior),
        }
    }

    pub fn with_behavior(mut self, behavior: impl WindowBehavior + 'static) -> Self {
        self.behavior = Box::new(behavior);
        self
    }

    pub fn with_timings(mut self, timings: TransitionTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_transform(mut self, transform: LocalTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn timings(&self) -> TransitionTimings {
        self.timings
    }

    fn settle_hidden(&mut self) {
        self.active = false;
        self.hiding = false;
        self.transition_left = 0.0;
    }
}

impl UiWindow for StandardWindow {
    fn name(&self) -> &str {
        &self.name
    }

    fn layer(&self) -> LayerId {
        self.layer
    }

    fn show(&mut self) {
        if self.showing || self.ready {
            return;
        }
        self.hiding = false;
        self.showing = true;
        self.ready = false;

        let mut control = WindowControl::default();
        self.behavior.before_show(&mut control);
        if control.is_cancelled() {
            self.showing = false;
            return;
        }

        self.active = true;
        if let Err(err) = self.behavior.on_show(&mut control) {
            log::error!("[window:{}] on_show failed: {err:?}", self.name);
        }
        if control.is_cancelled() {
            self.showing = false;
            self.active = false;
            return;
        }

        if self.timings.show_secs > 0.0 {
            self.transition_left = self.timings.show_secs;
        } else {
            self.showing = false;
            self.ready = true;
        }
    }

    fn hide(&mut self) {
        if self.showing {
            // Interrupting a show skips the hide transition.
            self.showing = false;
            self.ready = false;
            self.settle_hidden();
            return;
        }
        if !self.active || self.hiding {
            return;
        }
        self.ready = false;
        self.hiding = true;
        self.behavior.on_hide();
        self.transition_left = self.timings.hide_secs;
    }

    fn is_visible(&self) -> bool {
        self.active
    }

    fn is_showing(&self) -> bool {
        self.showing
    }

    fn is_hiding(&self) -> bool {
        self.hiding
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    fn set_state(&mut self, state: Option<Value>) {
        if self.state != state {
            self.state = state;
            self.behavior.load_state(self.state.as_ref());
        }
    }

    fn is_state_visible(&self, state: &Value) -> bool {
        self.behavior.is_state_visible(state)
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn mark_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        self.behavior.on_load();
    }

    fn jettison(&mut self) {
        self.behavior.on_jettison();
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.showing = false;
            self.ready = false;
            self.hiding = false;
            self.transition_left = 0.0;
        }
    }

    fn local_transform(&self) -> LocalTransform {
        self.transform
    }

    fn set_local_transform(&mut self, transform: LocalTransform) {
        self.transform = transform;
    }

    fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<LayerId>) {
        self.parent = parent;
    }

    fn advance(&mut self, dt: f32) {
        if self.showing {
            self.transition_left -= dt;
            if self.transition_left <= 0.0 {
                self.transition_left = 0.0;
                self.showing = false;
                self.ready = true;
            }
        } else if self.hiding {
            self.transition_left -= dt;
            if self.transition_left <= 0.0 {
                self.settle_hidden();
            }
        }
    }
}
