use anyhow::Result;
use std::collections::BTreeMap;
use std::mem;

use crate::events::{EventBus, UiEvent};
use crate::host::{LayerHost, LoadProgress, ScenePayload, SceneLoadOperation, SceneLoader};
use crate::popup::PopupId;
use crate::registry::{Registry, SceneId, WindowId};
use crate::resolution;
use crate::window::WindowRc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Not registered window '{window}'")]
    UnregisteredWindow { window: String },
    #[error("Scene '{scene}' failed to load for window '{window}': {reason}")]
    SceneLoadFailed { window: String, scene: String, reason: String },
    #[error("Can't find window '{window}' from scene '{scene}'")]
    WindowNotFound { window: String, scene: String },
}

impl LoadError {
    pub fn window(&self) -> &str {
        match self {
            LoadError::UnregisteredWindow { window }
            | LoadError::SceneLoadFailed { window, .. }
            | LoadError::WindowNotFound { window, .. } => window,
        }
    }
}

pub type AfterLoad = Box<dyn FnOnce(&WindowRc) -> Result<()>>;
pub type OnLoadError = Box<dyn FnOnce(&LoadError) -> Result<()>>;

pub(crate) type LoadOutcome = std::result::Result<WindowRc, LoadError>;

pub(crate) enum LoadRequester {
    Caller { after_load: Option<AfterLoad>, on_error: Option<OnLoadError> },
    Popup(PopupId),
}

#[derive(Debug, Clone, Copy)]
enum TaskStage {
    Start,
    /// Parked until the scene stops loading; `generation` identifies the load being waited on.
    AwaitingScene { scene: SceneId, generation: u64 },
}

struct LoadTask {
    window: String,
    stage: TaskStage,
    requester: LoadRequester,
}

struct PendingSceneLoad {
    operation: Box<dyn SceneLoadOperation>,
    ticks: u32,
}

type SceneSettlement = std::result::Result<Option<Box<dyn ScenePayload>>, String>;

/// Resolves window names to live instances, loading the owning scene when needed.
///
/// At most one load is in flight per scene. Every request is a task that re-polls the
/// registry once per tick, so any number of requesters can share a single load.
pub struct LoadOrchestrator {
    loader: Box<dyn SceneLoader>,
    pending: BTreeMap<SceneId, PendingSceneLoad>,
    tasks: Vec<LoadTask>,
    timeout_ticks: Option<u32>,
    issued: usize,
}

impl LoadOrchestrator {
    pub fn new(loader: Box<dyn SceneLoader>, timeout_ticks: Option<u32>) -> Self {
        Self { loader, pending: BTreeMap::new(), tasks: Vec::new(), timeout_ticks, issued: 0 }
    }

    /// Number of scene-load calls issued to the loader so far.
    pub fn issued_loads(&self) -> usize {
        self.issued
    }

    pub fn waiting_requests(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_scene_pending(&self, scene: SceneId) -> bool {
        self.pending.contains_key(&scene)
    }

    /// Runs the first step of a new request right away; returns the outcome if it settled.
    pub(crate) fn start(
        &mut self,
        registry: &mut Registry,
        events: &mut EventBus,
        window: String,
        requester: LoadRequester,
    ) -> Option<(LoadRequester, LoadOutcome)> {
        let mut task = LoadTask { window, stage: TaskStage::Start, requester };
        match self.step(registry, events, &mut task) {
            Some(outcome) => Some((task.requester, outcome)),
            None => {
                self.tasks.push(task);
                None
            }
        }
    }

    /// Re-polls every parked request and returns the ones that settled this tick.
    pub(crate) fn advance(
        &mut self,
        registry: &mut Registry,
        events: &mut EventBus,
    ) -> Vec<(LoadRequester, LoadOutcome)> {
        let mut settled = Vec::new();
        for mut task in mem::take(&mut self.tasks) {
            match self.step(registry, events, &mut task) {
                Some(outcome) => settled.push((task.requester, outcome)),
                None => self.tasks.push(task),
            }
        }
        settled
    }

    /// Polls outstanding scene loads. A finished load is resolved into the registry before the
    /// scene stops reporting `is_loading`, so waiters see the windows on their next poll.
    pub(crate) fn poll_scenes(
        &mut self,
        registry: &mut Registry,
        layers: &mut dyn LayerHost,
        events: &mut EventBus,
    ) {
        let timeout = self.timeout_ticks;
        let mut settled: Vec<(SceneId, SceneSettlement)> = Vec::new();
        for (scene, pending) in self.pending.iter_mut() {
            pending.ticks += 1;
            match pending.operation.poll() {
                LoadProgress::Pending => {
                    if let Some(limit) = timeout {
                        if pending.ticks >= limit {
                            settled.push((*scene, Err(format!("timed out after {limit} ticks"))));
                        }
                    }
                }
                LoadProgress::Loaded(payload) => settled.push((*scene, Ok(payload))),
                LoadProgress::Failed(err) => settled.push((*scene, Err(format!("{err:#}")))),
            }
        }

        for (scene, settlement) in settled {
            self.pending.remove(&scene);
            let scene_name = registry.scene(scene).name().to_string();
            match settlement {
                Ok(payload) => {
                    if let Some(payload) = payload {
                        resolution::resolve_payload(registry, layers, events, payload);
                    }
                    registry.scene_mut(scene).finish_loading(None);
                    events.push(UiEvent::SceneLoadFinished { scene: scene_name });
                }
                Err(reason) => {
                    log::error!("Scene '{scene_name}' failed to load: {reason}");
                    registry.scene_mut(scene).finish_loading(Some(reason.clone()));
                    events.push(UiEvent::SceneLoadFailed { scene: scene_name, reason });
                }
            }
        }
    }

    fn step(&mut self, registry: &mut Registry, events: &mut EventBus, task: &mut LoadTask) -> Option<LoadOutcome> {
        let Some(window_id) = registry.lookup_window(&task.window) else {
            return Some(Err(LoadError::UnregisteredWindow { window: task.window.clone() }));
        };

        match task.stage {
            TaskStage::Start => {
                if let Some(window) = registry.window(window_id).live_window() {
                    return Some(Ok(window));
                }
                let Some(scene_id) = registry.window(window_id).scene() else {
                    return Some(settle_window(registry, window_id));
                };
                let scene = registry.scene(scene_id);
                if scene.is_loading() {
                    task.stage = TaskStage::AwaitingScene { scene: scene_id, generation: scene.load_generation() };
                    return None;
                }
                if scene.is_empty() {
                    return match self.issue_load(registry, events, scene_id, &task.window) {
                        Ok(generation) => {
                            task.stage = TaskStage::AwaitingScene { scene: scene_id, generation };
                            None
                        }
                        Err(err) => Some(Err(err)),
                    };
                }
                // The scene already produced windows, just not this one.
                Some(settle_window(registry, window_id))
            }
            TaskStage::AwaitingScene { scene, generation } => {
                let entry = registry.scene(scene);
                if entry.is_loading() {
                    return None;
                }
                if let Some(reason) = entry.failure_of(generation) {
                    return Some(Err(LoadError::SceneLoadFailed {
                        window: task.window.clone(),
                        scene: entry.name().to_string(),
                        reason: reason.to_string(),
                    }));
                }
                Some(settle_window(registry, window_id))
            }
        }
    }

    fn issue_load(
        &mut self,
        registry: &mut Registry,
        events: &mut EventBus,
        scene: SceneId,
        window: &str,
    ) -> std::result::Result<u64, LoadError> {
        let scene_name = registry.scene(scene).name().to_string();
        let generation = registry.scene_mut(scene).begin_loading();
        self.issued += 1;
        log::debug!("Loading scene '{scene_name}' for window '{window}'");
        events.push(UiEvent::SceneLoadStarted { scene: scene_name.clone() });

        let reason = match self.loader.load_scene_additive_async(&scene_name) {
            Ok(Some(operation)) => {
                self.pending.insert(scene, PendingSceneLoad { operation, ticks: 0 });
                return Ok(generation);
            }
            Ok(None) => "scene loader returned no load operation".to_string(),
            Err(err) => format!("{err:#}"),
        };

        log::error!("Scene '{scene_name}' failed to load: {reason}");
        registry.scene_mut(scene).finish_loading(Some(reason.clone()));
        events.push(UiEvent::SceneLoadFailed { scene: scene_name.clone(), reason: reason.clone() });
        Err(LoadError::SceneLoadFailed { window: window.to_string(), scene: scene_name, reason })
    }
}

/// Final check once loading is out of the way: either the instance is there now or it never will be.
fn settle_window(registry: &Registry, window: WindowId) -> LoadOutcome {
    let entry = registry.window(window);
    entry.live_window().ok_or_else(|| LoadError::WindowNotFound {
        window: entry.name().to_string(),
        scene: entry.scene().map(|scene| registry.scene(scene).name().to_string()).unwrap_or_default(),
    })
}
