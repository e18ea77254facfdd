use crate::window::{WindowHandle, WindowRc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(usize);

#[derive(Debug)]
pub struct SceneEntry {
    name: String,
    windows: HashMap<String, WindowHandle>,
    loading: bool,
    generation: u64,
    last_failure: Option<(u64, String)>,
}

impl SceneEntry {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), windows: HashMap::new(), loading: false, generation: 0, last_failure: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True until at least one window has been resolved from this scene.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn window_names(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    /// Counter of issued loads; waiters remember it to learn how the load they waited on ended.
    pub fn load_generation(&self) -> u64 {
        self.generation
    }

    pub fn failure_of(&self, generation: u64) -> Option<&str> {
        match &self.last_failure {
            Some((failed, reason)) if *failed == generation => Some(reason.as_str()),
            _ => None,
        }
    }

    pub(crate) fn begin_loading(&mut self) -> u64 {
        self.loading = true;
        self.generation += 1;
        self.generation
    }

    pub(crate) fn finish_loading(&mut self, failure: Option<String>) {
        self.loading = false;
        self.last_failure = failure.map(|reason| (self.generation, reason));
    }
}

#[derive(Debug)]
pub struct WindowEntry {
    name: String,
    window: WindowHandle,
    scene: Option<SceneId>,
}

impl WindowEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    pub fn handle(&self) -> &WindowHandle {
        &self.window
    }

    /// The attached instance, if one was attached and the host has not destroyed it.
    pub fn live_window(&self) -> Option<WindowRc> {
        self.window.upgrade()
    }
}

/// Name-keyed bookkeeping of windows and the scenes that provide them.
///
/// Entries are never removed, so ids stay valid for the lifetime of the registry.
#[derive(Debug, Default)]
pub struct Registry {
    scenes: Vec<SceneEntry>,
    windows: Vec<WindowEntry>,
    scene_ids: HashMap<String, SceneId>,
    window_ids: HashMap<String, WindowId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `window` under `scene` (defaulting to a scene of the same name).
    /// Registering an existing name returns the existing entry untouched.
    pub fn register(&mut self, window: &str, scene: Option<&str>) -> WindowId {
        let scene_id = self.ensure_scene(scene.unwrap_or(window));
        if let Some(id) = self.window_ids.get(window) {
            return *id;
        }
        self.insert_window(window, Some(scene_id))
    }

    pub fn lookup_window(&self, name: &str) -> Option<WindowId> {
        self.window_ids.get(name).copied()
    }

    pub fn lookup_scene(&self, name: &str) -> Option<SceneId> {
        self.scene_ids.get(name).copied()
    }

    pub fn window(&self, id: WindowId) -> &WindowEntry {
        &self.windows[id.0]
    }

    pub fn scene(&self, id: SceneId) -> &SceneEntry {
        &self.scenes[id.0]
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn live_windows(&self) -> Vec<WindowRc> {
        self.windows.iter().filter_map(WindowEntry::live_window).collect()
    }

    pub(crate) fn scene_mut(&mut self, id: SceneId) -> &mut SceneEntry {
        &mut self.scenes[id.0]
    }

    pub(crate) fn ensure_scene(&mut self, name: &str) -> SceneId {
        if let Some(id) = self.scene_ids.get(name) {
            return *id;
        }
        let id = SceneId(self.scenes.len());
        self.scenes.push(SceneEntry::new(name));
        self.scene_ids.insert(name.to_string(), id);
        id
    }

    /// Looks up `name`, creating an entry without scene association when it was never registered.
    /// The flag reports whether the entry was created.
    pub(crate) fn ensure_window(&mut self, name: &str) -> (WindowId, bool) {
        match self.window_ids.get(name) {
            Some(id) => (*id, false),
            None => (self.insert_window(name, None), true),
        }
    }

    pub(crate) fn assign_scene(&mut self, window: WindowId, scene: SceneId) {
        let entry = &mut self.windows[window.0];
        if entry.scene.is_none() {
            entry.scene = Some(scene);
        }
    }

    /// Links a resolved instance to its entry and records it in `scene`, the scene whose
    /// payload delivered it. A window associated with another scene leaves that scene untouched.
    pub(crate) fn attach(&mut self, window: WindowId, scene: SceneId, instance: &WindowRc) {
        let entry = &mut self.windows[window.0];
        entry.window = WindowHandle::new(instance);
        let name = entry.name.clone();
        self.scenes[scene.0].windows.insert(name, WindowHandle::new(instance));
    }

    fn insert_window(&mut self, name: &str, scene: Option<SceneId>) -> WindowId {
        let id = WindowId(self.windows.len());
        self.windows.push(WindowEntry { name: name.to_string(), window: WindowHandle::default(), scene });
        self.window_ids.insert(name.to_string(), id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::standard::StandardWindow;
    use crate::window::{share, LayerId};

    #[test]
    fn register_is_idempotent() {
        let mut registry = Registry::new();
        let first = registry.register("w", None);
        let second = registry.register("w", None);
        assert_eq!(first, second);
        assert_eq!(registry.window_count(), 1);
        let scene = registry.window(first).scene().expect("scene assigned");
        assert_eq!(registry.scene(scene).name(), "w");
    }

    #[test]
    fn re_registering_keeps_first_scene() {
        let mut registry = Registry::new();
        let id = registry.register("login", Some("auth"));
        registry.register("login", Some("other"));
        let scene = registry.window(id).scene().expect("scene assigned");
        assert_eq!(registry.scene(scene).name(), "auth");
    }

    #[test]
    fn lookups_never_fail_loudly() {
        let registry = Registry::new();
        assert!(registry.lookup_window("missing").is_none());
        assert!(registry.lookup_scene("missing").is_none());
    }

    #[test]
    fn windows_share_a_scene_entry() {
        let mut registry = Registry::new();
        let a = registry.register("login", Some("auth"));
        let b = registry.register("signup", Some("auth"));
        assert_eq!(registry.window(a).scene(), registry.window(b).scene());
        assert_eq!(registry.scene_count(), 1);
    }

    #[test]
    fn attach_fills_scene_and_tracks_liveness() {
        let mut registry = Registry::new();
        let id = registry.register("login", Some("auth"));
        let scene = registry.lookup_scene("auth").expect("scene exists");
        assert!(registry.scene(scene).is_empty());

        let window = share(StandardWindow::new("login", LayerId(5)));
        registry.attach(id, scene, &window);
        assert!(!registry.scene(scene).is_empty());
        assert!(registry.window(id).live_window().is_some());

        drop(window);
        assert!(registry.window(id).live_window().is_none());
        assert!(registry.live_windows().is_empty());
    }

    #[test]
    fn failures_are_tied_to_their_generation() {
        let mut registry = Registry::new();
        registry.register("login", Some("auth"));
        let scene = registry.lookup_scene("auth").expect("scene exists");
        let generation = registry.scene_mut(scene).begin_loading();
        assert!(registry.scene(scene).is_loading());
        registry.scene_mut(scene).finish_loading(Some("boom".into()));
        assert!(!registry.scene(scene).is_loading());
        assert_eq!(registry.scene(scene).failure_of(generation), Some("boom"));
        assert_eq!(registry.scene(scene).failure_of(generation + 1), None);
    }
}
