use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::{ScalingConfig, UiConfig};
use crate::host::LayerHost;
use crate::window::{LayerId, LocalTransform, WindowRc};

/// Persistent container that owns every resolved window of one render layer.
pub struct LayerRoot {
    name: String,
    layer: LayerId,
    depth: i32,
    scaling: ScalingConfig,
    origin: LocalTransform,
    children: Vec<WindowRc>,
}

impl LayerRoot {
    pub fn new(name: impl Into<String>, layer: LayerId, depth: i32, scaling: ScalingConfig) -> Self {
        Self {
            name: format!("GameUI_{}", name.into()),
            layer,
            depth,
            scaling,
            origin: LocalTransform::IDENTITY,
            children: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: LocalTransform) -> Self {
        self.origin = origin;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn scaling(&self) -> ScalingConfig {
        self.scaling
    }

    pub fn origin(&self) -> LocalTransform {
        self.origin
    }

    pub fn children(&self) -> impl Iterator<Item = &WindowRc> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Takes ownership of `window` and parents it here.
    ///
    /// Like a scene-graph reparent this keeps the window's world placement, so its local
    /// transform becomes relative to the root origin. Adopting a current child again is a no-op.
    pub fn adopt(&mut self, window: WindowRc) {
        let already_child = self.children.iter().any(|existing| Rc::ptr_eq(existing, &window));
        if already_child && window.borrow().parent() == Some(self.layer) {
            return;
        }
        {
            let mut child = window.borrow_mut();
            let world = child.local_transform().to_affine();
            let local = self.origin.to_affine().inverse() * world;
            child.set_local_transform(LocalTransform::from_affine(local));
            child.set_parent(Some(self.layer));
        }
        if !already_child {
            self.children.push(window);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<WindowRc> {
        let index = self.children.iter().position(|child| child.borrow().name() == name)?;
        let window = self.children.remove(index);
        window.borrow_mut().set_parent(None);
        Some(window)
    }
}

/// Default [`LayerHost`]: one root per configured layer.
#[derive(Default)]
pub struct LayerRoots {
    roots: BTreeMap<LayerId, LayerRoot>,
}

impl LayerRoots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &UiConfig) -> Self {
        let mut roots = Self::new();
        for layer in &config.layers {
            roots.insert(LayerRoot::new(layer.name.as_str(), LayerId(layer.layer), layer.depth, config.scaling));
        }
        roots
    }

    pub fn insert(&mut self, root: LayerRoot) {
        self.roots.insert(root.layer(), root);
    }

    pub fn get(&self, layer: LayerId) -> Option<&LayerRoot> {
        self.roots.get(&layer)
    }

    /// Roots ordered by draw depth.
    pub fn by_depth(&self) -> Vec<&LayerRoot> {
        let mut roots: Vec<&LayerRoot> = self.roots.values().collect();
        roots.sort_by_key(|root| root.depth());
        roots
    }
}

impl LayerHost for LayerRoots {
    fn layer_root_for(&mut self, layer: LayerId) -> Option<&mut LayerRoot> {
        self.roots.get_mut(&layer)
    }

    fn release(&mut self, window: &str) -> Option<WindowRc> {
        self.roots.values_mut().find_map(|root| root.remove(window))
    }
}
