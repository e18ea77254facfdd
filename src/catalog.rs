//! JSON-described scenes served by a tick-driven fake loader. Used by the demo binary and the
//! tests in place of a real content pipeline.

use anyhow::{anyhow, bail, Context, Result};
use glam::{Quat, Vec3};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::host::{LoadProgress, ScenePayload, SceneLoadOperation, SceneLoader};
use crate::window::standard::{StandardWindow, TransitionTimings};
use crate::window::{share, LayerId, LocalTransform, WindowRc};

#[derive(Debug, Clone, Deserialize)]
pub struct WindowDescription {
    pub name: String,
    #[serde(default = "WindowDescription::default_layer")]
    pub layer: LayerId,
    #[serde(default)]
    pub transitions: TransitionTimings,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default = "WindowDescription::default_scale")]
    pub scale: [f32; 3],
    /// Left out of registration so the window is discovered when its scene loads.
    #[serde(default)]
    pub unregistered: bool,
}

impl WindowDescription {
    fn default_layer() -> LayerId {
        LayerId(5)
    }

    fn default_scale() -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }

    pub fn transform(&self) -> LocalTransform {
        LocalTransform {
            translation: Vec3::from(self.translation),
            rotation: Quat::IDENTITY,
            scale: Vec3::from(self.scale),
        }
    }

    pub fn instantiate(&self) -> WindowRc {
        share(
            StandardWindow::new(self.name.as_str(), self.layer)
                .with_timings(self.transitions)
                .with_transform(self.transform()),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescription {
    pub name: String,
    /// Ticks the load stays pending before it completes.
    #[serde(default)]
    pub load_ticks: u32,
    /// Makes the load fail with this reason once `load_ticks` ran out.
    #[serde(default)]
    pub fail_on_load: Option<String>,
    /// The loader accepts the request but hands back no operation.
    #[serde(default)]
    pub no_operation: bool,
    #[serde(default)]
    pub windows: Vec<WindowDescription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub scenes: Vec<SceneDescription>,
}

pub type WindowFactory = Rc<dyn Fn(&WindowDescription) -> WindowRc>;

/// Shared record of every scene name the catalog was asked to load, in call order.
#[derive(Clone, Default)]
pub struct SceneRequestLog(Rc<RefCell<Vec<String>>>);

impl SceneRequestLog {
    fn record(&self, scene: &str) {
        self.0.borrow_mut().push(scene.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, scene: &str) -> usize {
        self.0.borrow().iter().filter(|requested| requested.as_str() == scene).count()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

#[derive(Default)]
pub struct SceneCatalog {
    scenes: HashMap<String, SceneDescription>,
    order: Vec<String>,
    factories: HashMap<String, WindowFactory>,
    requests: SceneRequestLog,
}

impl SceneCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: CatalogFile) -> Result<Self> {
        let mut catalog = Self::new();
        for scene in file.scenes {
            if catalog.scenes.contains_key(&scene.name) {
                bail!("Scene '{}' is declared twice", scene.name);
            }
            catalog.insert(scene);
        }
        Ok(catalog)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json).context("Failed to parse scene catalog")?;
        Self::from_file(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene catalog {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid scene catalog {}", path.display()))
    }

    pub fn insert(&mut self, scene: SceneDescription) {
        if !self.scenes.contains_key(&scene.name) {
            self.order.push(scene.name.clone());
        }
        self.scenes.insert(scene.name.clone(), scene);
    }

    /// Overrides how the named window is instantiated, e.g. to attach a behavior.
    pub fn with_factory(
        mut self,
        window: impl Into<String>,
        factory: impl Fn(&WindowDescription) -> WindowRc + 'static,
    ) -> Self {
        self.factories.insert(window.into(), Rc::new(factory));
        self
    }

    pub fn scene(&self, name: &str) -> Option<&SceneDescription> {
        self.scenes.get(name)
    }

    /// Scenes in declaration order.
    pub fn scenes(&self) -> impl Iterator<Item = &SceneDescription> {
        self.order.iter().filter_map(|name| self.scenes.get(name))
    }

    /// `(window, scene)` pairs to register up front.
    pub fn registrations(&self) -> Vec<(String, String)> {
        self.scenes()
            .flat_map(|scene| {
                scene
                    .windows
                    .iter()
                    .filter(|window| !window.unregistered)
                    .map(move |window| (window.name.clone(), scene.name.clone()))
            })
            .collect()
    }

    pub fn request_log(&self) -> SceneRequestLog {
        self.requests.clone()
    }
}

impl SceneLoader for SceneCatalog {
    fn load_scene_additive_async(&mut self, scene: &str) -> Result<Option<Box<dyn SceneLoadOperation>>> {
        self.requests.record(scene);
        let Some(description) = self.scenes.get(scene) else {
            bail!("Unknown scene '{scene}'");
        };
        if description.no_operation {
            return Ok(None);
        }
        Ok(Some(Box::new(CatalogLoad {
            description: description.clone(),
            factories: self.factories.clone(),
            remaining: description.load_ticks,
        })))
    }
}

struct CatalogLoad {
    description: SceneDescription,
    factories: HashMap<String, WindowFactory>,
    remaining: u32,
}

impl SceneLoadOperation for CatalogLoad {
    fn poll(&mut self) -> LoadProgress {
        if self.remaining > 0 {
            self.remaining -= 1;
            return LoadProgress::Pending;
        }
        if let Some(reason) = &self.description.fail_on_load {
            return LoadProgress::Failed(anyhow!("{reason}"));
        }
        let windows = self
            .description
            .windows
            .iter()
            .map(|window| match self.factories.get(&window.name) {
                Some(factory) => factory(window),
                None => window.instantiate(),
            })
            .collect();
        LoadProgress::Loaded(Some(Box::new(CatalogPayload::new(self.description.name.as_str(), windows))))
    }
}

/// Transient container holding freshly instantiated windows until resolution moves them out.
pub struct CatalogPayload {
    name: String,
    windows: Vec<WindowRc>,
}

impl CatalogPayload {
    pub fn new(name: impl Into<String>, windows: Vec<WindowRc>) -> Self {
        Self { name: name.into(), windows }
    }
}

impl ScenePayload for CatalogPayload {
    fn name(&self) -> &str {
        &self.name
    }

    fn windows(&self) -> Vec<WindowRc> {
        self.windows.clone()
    }

    fn jettison(self: Box<Self>) {
        log::debug!("Jettisoning payload '{}' ({} windows)", self.name, self.windows.len());
    }
}
