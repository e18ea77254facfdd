use smallvec::SmallVec;
use std::rc::Rc;

use crate::events::{EventBus, UiEvent};
use crate::host::{LayerHost, ScenePayload};
use crate::registry::{Registry, SceneId, WindowId};
use crate::window::WindowRc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionIssue {
    #[error("Inconsistent scene name '{expected}' != '{found}' for window '{window}'")]
    SceneAssociationConflict { window: String, expected: String, found: String },
    #[error("Tried to load window '{window}' from '{payload}' but window from '{scene}' already loaded")]
    InstanceConflict { window: String, payload: String, scene: String },
}

fn report(events: &mut EventBus, issue: ResolutionIssue) {
    log::error!("{issue}");
    events.push(UiEvent::ResolutionIssue { issue });
}

/// Links the windows of a freshly loaded payload into the registry and moves them under
/// their layer roots.
///
/// Inconsistencies are logged and skipped; the handler always runs to completion so that
/// requests waiting on the scene get unblocked. Returns the scene the windows were
/// attributed to.
pub fn resolve_payload(
    registry: &mut Registry,
    layers: &mut dyn LayerHost,
    events: &mut EventBus,
    payload: Box<dyn ScenePayload>,
) -> SceneId {
    let payload_name = payload.name().to_string();
    let windows: SmallVec<[(WindowId, WindowRc); 8]> = payload
        .windows()
        .into_iter()
        .map(|window| {
            let name = window.borrow().name().to_string();
            let (id, created) = registry.ensure_window(&name);
            if created {
                log::info!("Delay loaded window '{name}'");
            }
            (id, window)
        })
        .collect();

    // First window with a known scene decides where the whole payload belongs.
    let mut target: Option<SceneId> = None;
    for (id, _) in &windows {
        let entry = registry.window(*id);
        let Some(scene) = entry.scene() else { continue };
        match target {
            None => target = Some(scene),
            Some(current) if current != scene => report(
                events,
                ResolutionIssue::SceneAssociationConflict {
                    window: entry.name().to_string(),
                    expected: registry.scene(current).name().to_string(),
                    found: registry.scene(scene).name().to_string(),
                },
            ),
            Some(_) => {}
        }
    }
    let scene = target.unwrap_or_else(|| registry.ensure_scene(&payload_name));

    for (id, _) in &windows {
        registry.assign_scene(*id, scene);
    }

    for (id, window) in &windows {
        let entry = registry.window(*id);
        let name = entry.name().to_string();
        let owner = entry.scene().map(|s| registry.scene(s).name().to_string()).unwrap_or_default();

        if let Some(existing) = entry.live_window() {
            if !Rc::ptr_eq(&existing, window) {
                report(
                    events,
                    ResolutionIssue::InstanceConflict { window: name, payload: payload_name.clone(), scene: owner },
                );
                continue;
            }
        }

        let layer = window.borrow().layer();
        let saved = window.borrow().local_transform();
        let Some(root) = layers.layer_root_for(layer) else {
            log::error!("No layer root for layer {layer}; window '{name}' from '{payload_name}' dropped");
            continue;
        };
        root.adopt(window.clone());
        {
            let mut window = window.borrow_mut();
            window.set_local_transform(saved);
            window.set_active(false);
        }

        registry.attach(*id, scene, window);
        log::info!("Window '{name}' from '{owner}' loaded");
        events.push(UiEvent::WindowResolved { window: name, scene: owner });
    }

    payload.jettison();

    for (_, window) in &windows {
        let mut window = window.borrow_mut();
        window.jettison();
        window.mark_loaded();
    }

    scene
}
