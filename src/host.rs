use anyhow::Result;

use crate::layers::LayerRoot;
use crate::window::{LayerId, WindowRc};

/// Transient container produced by a finished scene load.
pub trait ScenePayload {
    /// Container name; doubles as the scene name when none of its windows was registered up front.
    fn name(&self) -> &str;

    /// Every window instance found under this container.
    fn windows(&self) -> Vec<WindowRc>;

    /// Cleanup hook invoked once the windows have moved to their layer roots. The container is
    /// discarded afterwards.
    fn jettison(self: Box<Self>);
}

pub enum LoadProgress {
    /// Still loading; polled again on the next tick.
    Pending,
    /// Finished. The payload is `None` when the host delivers content out of band through
    /// `UiService::resolve_payload`.
    Loaded(Option<Box<dyn ScenePayload>>),
    Failed(anyhow::Error),
}

/// Handle of one in-flight additive scene load.
pub trait SceneLoadOperation {
    /// Polled once per tick until it stops reporting [`LoadProgress::Pending`].
    fn poll(&mut self) -> LoadProgress;
}

/// Collaborator that loads scene content on top of whatever is already loaded.
pub trait SceneLoader {
    /// Starts loading `scene`. An error or a missing operation both count as a failed load.
    fn load_scene_additive_async(&mut self, scene: &str) -> Result<Option<Box<dyn SceneLoadOperation>>>;
}

/// Host display tree: the persistent per-layer containers resolved windows live under.
pub trait LayerHost {
    fn layer_root_for(&mut self, layer: LayerId) -> Option<&mut LayerRoot>;

    /// Destroys the named window out of band, returning the last strong reference held by the host.
    fn release(&mut self, window: &str) -> Option<WindowRc>;
}
