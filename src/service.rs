use anyhow::Result;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::UiConfig;
use crate::events::{EventBus, UiEvent};
use crate::host::{LayerHost, ScenePayload, SceneLoader};
use crate::layers::LayerRoots;
use crate::load::{AfterLoad, LoadOrchestrator, LoadOutcome, LoadRequester, OnLoadError};
use crate::popup::{AfterClose, AfterShow, PopupId, PopupScheduler, PopupStep};
use crate::registry::{Registry, WindowId};
use crate::resolution;
use crate::window::WindowRc;

/// Request recorded from inside a callback and applied at the start of the next tick.
pub enum UiCommand {
    Show { window: String, after_show: Option<AfterShow> },
    Hide { window: String },
    LoadWindow { window: String, after_load: Option<AfterLoad>, on_error: Option<OnLoadError> },
    Popup { window: String, after_show: Option<AfterShow>, after_close: Option<AfterClose> },
    QueuePopup { window: String, after_show: Option<AfterShow>, after_close: Option<AfterClose>, priority: i32 },
    InvalidatePopup { id: PopupId },
}

impl UiCommand {
    fn label(&self) -> &'static str {
        match self {
            UiCommand::Show { .. } => "show",
            UiCommand::Hide { .. } => "hide",
            UiCommand::LoadWindow { .. } => "load_window",
            UiCommand::Popup { .. } => "popup",
            UiCommand::QueuePopup { .. } => "queue_popup",
            UiCommand::InvalidatePopup { .. } => "invalidate_popup",
        }
    }
}

/// Cloneable handle for issuing requests from callbacks, which cannot borrow the service.
#[derive(Clone, Default)]
pub struct UiCommands {
    inner: Rc<RefCell<VecDeque<UiCommand>>>,
}

impl UiCommands {
    pub fn push(&self, command: UiCommand) {
        self.inner.borrow_mut().push_back(command);
    }

    pub fn show(&self, window: impl Into<String>, after_show: Option<AfterShow>) {
        self.push(UiCommand::Show { window: window.into(), after_show });
    }

    pub fn hide(&self, window: impl Into<String>) {
        self.push(UiCommand::Hide { window: window.into() });
    }

    pub fn load_window(&self, window: impl Into<String>, after_load: Option<AfterLoad>, on_error: Option<OnLoadError>) {
        self.push(UiCommand::LoadWindow { window: window.into(), after_load, on_error });
    }

    pub fn popup(&self, window: impl Into<String>, after_show: Option<AfterShow>, after_close: Option<AfterClose>) {
        self.push(UiCommand::Popup { window: window.into(), after_show, after_close });
    }

    pub fn queue_popup(
        &self,
        window: impl Into<String>,
        after_show: Option<AfterShow>,
        after_close: Option<AfterClose>,
        priority: i32,
    ) {
        self.push(UiCommand::QueuePopup { window: window.into(), after_show, after_close, priority });
    }

    pub fn invalidate_popup(&self, id: PopupId) {
        self.push(UiCommand::InvalidatePopup { id });
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    fn take(&self) -> Vec<UiCommand> {
        self.inner.borrow_mut().drain(..).collect()
    }
}

/// Entry point of the UI core: one instance per application, driven by [`UiService::update`].
pub struct UiService {
    config: UiConfig,
    registry: Registry,
    layers: Box<dyn LayerHost>,
    loads: LoadOrchestrator,
    popups: PopupScheduler,
    events: EventBus,
    commands: UiCommands,
    frame: u64,
}

impl UiService {
    pub fn new(config: UiConfig, loader: Box<dyn SceneLoader>) -> Self {
        let layers = LayerRoots::from_config(&config);
        Self::with_layer_host(config, loader, Box::new(layers))
    }

    pub fn with_layer_host(config: UiConfig, loader: Box<dyn SceneLoader>, layers: Box<dyn LayerHost>) -> Self {
        let loads = LoadOrchestrator::new(loader, config.loading.scene_timeout_ticks);
        Self {
            config,
            registry: Registry::new(),
            layers,
            loads,
            popups: PopupScheduler::new(),
            events: EventBus::default(),
            commands: UiCommands::default(),
            frame: 0,
        }
    }

    pub fn config(&self) -> &UiConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn popups(&self) -> &PopupScheduler {
        &self.popups
    }

    pub fn layers_mut(&mut self) -> &mut dyn LayerHost {
        self.layers.as_mut()
    }

    pub fn commands(&self) -> UiCommands {
        self.commands.clone()
    }

    /// Events waiting for [`UiService::drain_events`].
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Ticks processed so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Scene-load calls issued to the loader so far.
    pub fn scene_load_calls(&self) -> usize {
        self.loads.issued_loads()
    }

    pub fn pending_requests(&self) -> usize {
        self.loads.waiting_requests()
    }

    pub fn register(&mut self, window: &str, scene: Option<&str>) -> WindowId {
        self.registry.register(window, scene)
    }

    /// Live instance of `window`, if it was resolved and still exists.
    pub fn window(&self, window: &str) -> Option<WindowRc> {
        let id = self.registry.lookup_window(window)?;
        self.registry.window(id).live_window()
    }

    pub fn is_visible(&self, window: &str) -> bool {
        self.window(window).is_some_and(|window| window.borrow().is_visible())
    }

    /// Loads `window` if needed, shows it and then runs `after_show`.
    pub fn show(&mut self, window: &str, after_show: Option<AfterShow>) {
        let after_load: AfterLoad = Box::new(move |loaded: &WindowRc| {
            loaded.borrow_mut().show();
            match after_show {
                Some(after_show) => after_show(loaded),
                None => Ok(()),
            }
        });
        self.load_window(window, Some(after_load), None);
    }

    /// Hides an already resolved window. Unknown or unloaded windows are ignored.
    pub fn hide(&mut self, window: &str) -> bool {
        match self.window(window) {
            Some(window) => {
                window.borrow_mut().hide();
                true
            }
            None => false,
        }
    }

    pub fn load_window(&mut self, window: &str, after_load: Option<AfterLoad>, on_error: Option<OnLoadError>) {
        let requester = LoadRequester::Caller { after_load, on_error };
        if let Some((requester, outcome)) =
            self.loads.start(&mut self.registry, &mut self.events, window.to_string(), requester)
        {
            self.dispatch(requester, outcome);
        }
    }

    pub fn popup(&mut self, window: &str, after_show: Option<AfterShow>, after_close: Option<AfterClose>) -> PopupId {
        self.popups.push(window, after_show, after_close)
    }

    /// Queues a popup at the configured default priority.
    pub fn queue_popup(
        &mut self,
        window: &str,
        after_show: Option<AfterShow>,
        after_close: Option<AfterClose>,
    ) -> PopupId {
        let priority = self.config.popups.default_priority;
        self.queue_popup_with_priority(window, after_show, after_close, priority)
    }

    pub fn queue_popup_with_priority(
        &mut self,
        window: &str,
        after_show: Option<AfterShow>,
        after_close: Option<AfterClose>,
        priority: i32,
    ) -> PopupId {
        self.popups.enqueue(window, after_show, after_close, priority)
    }

    pub fn invalidate_popup(&mut self, id: PopupId) -> bool {
        self.popups.invalidate(id)
    }

    /// Resolves content the host delivered outside of a tracked load.
    pub fn resolve_payload(&mut self, payload: Box<dyn ScenePayload>) {
        resolution::resolve_payload(&mut self.registry, self.layers.as_mut(), &mut self.events, payload);
    }

    /// Processes one tick.
    pub fn update(&mut self, dt: f32) {
        self.frame += 1;
        self.apply_commands();

        for window in self.registry.live_windows() {
            window.borrow_mut().advance(dt);
        }

        self.loads.poll_scenes(&mut self.registry, self.layers.as_mut(), &mut self.events);
        for (requester, outcome) in self.loads.advance(&mut self.registry, &mut self.events) {
            self.dispatch(requester, outcome);
        }

        match self.popups.step(&mut self.events) {
            PopupStep::Load { id, window } => {
                if let Some((requester, outcome)) =
                    self.loads.start(&mut self.registry, &mut self.events, window, LoadRequester::Popup(id))
                {
                    self.dispatch(requester, outcome);
                }
            }
            step => log::trace!("Popup step on frame {}: {step:?}", self.frame),
        }
    }

    /// Takes the events produced since the last call. The service keeps every event until
    /// drained, so hosts should call this once per tick.
    pub fn drain_events(&mut self) -> Vec<UiEvent> {
        self.events.drain()
    }

    fn apply_commands(&mut self) {
        for command in self.commands.take() {
            log::trace!("Applying deferred {}", command.label());
            match command {
                UiCommand::Show { window, after_show } => self.show(&window, after_show),
                UiCommand::Hide { window } => {
                    self.hide(&window);
                }
                UiCommand::LoadWindow { window, after_load, on_error } => {
                    self.load_window(&window, after_load, on_error);
                }
                UiCommand::Popup { window, after_show, after_close } => {
                    self.popup(&window, after_show, after_close);
                }
                UiCommand::QueuePopup { window, after_show, after_close, priority } => {
                    self.queue_popup_with_priority(&window, after_show, after_close, priority);
                }
                UiCommand::InvalidatePopup { id } => {
                    if !self.invalidate_popup(id) {
                        log::debug!("Popup {id:?} is no longer queued; invalidation ignored");
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, requester: LoadRequester, outcome: LoadOutcome) {
        match requester {
            LoadRequester::Popup(id) => self.popups.complete_load(id, outcome),
            LoadRequester::Caller { after_load, on_error } => match outcome {
                Ok(window) => {
                    if let Some(after_load) = after_load {
                        report_callback("after_load", after_load(&window));
                    }
                }
                Err(err) => {
                    log::error!("{err}");
                    if let Some(on_error) = on_error {
                        report_callback("on_error", on_error(&err));
                    }
                    self.events.push(UiEvent::WindowLoadFailed { error: err });
                }
            },
        }
    }
}

fn report_callback(name: &str, result: Result<()>) {
    if let Err(err) = result {
        log::error!("{name} callback failed: {err:?}");
    }
}
