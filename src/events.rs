use crate::load::LoadError;
use crate::resolution::ResolutionIssue;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    SceneLoadStarted { scene: String },
    SceneLoadFinished { scene: String },
    SceneLoadFailed { scene: String, reason: String },
    WindowResolved { window: String, scene: String },
    WindowLoadFailed { error: LoadError },
    ResolutionIssue { issue: ResolutionIssue },
    PopupShown { window: String },
    PopupClosed { window: String },
    /// Popped after its window failed to load; never shown.
    PopupDropped { window: String },
    /// Invalidated while queued; discarded when drained.
    PopupDiscarded { window: String },
}

impl fmt::Display for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiEvent::SceneLoadStarted { scene } => write!(f, "SceneLoadStarted scene={scene}"),
            UiEvent::SceneLoadFinished { scene } => write!(f, "SceneLoadFinished scene={scene}"),
            UiEvent::SceneLoadFailed { scene, reason } => {
                write!(f, "SceneLoadFailed scene={scene} reason={reason}")
            }
            UiEvent::WindowResolved { window, scene } => {
                write!(f, "WindowResolved window={window} scene={scene}")
            }
            UiEvent::WindowLoadFailed { error } => write!(f, "WindowLoadFailed {error}"),
            UiEvent::ResolutionIssue { issue } => write!(f, "ResolutionIssue {issue}"),
            UiEvent::PopupShown { window } => write!(f, "PopupShown window={window}"),
            UiEvent::PopupClosed { window } => write!(f, "PopupClosed window={window}"),
            UiEvent::PopupDropped { window } => write!(f, "PopupDropped window={window}"),
            UiEvent::PopupDiscarded { window } => write!(f, "PopupDiscarded window={window}"),
        }
    }
}

/// Events accumulated since the last drain.
///
/// Nothing is dropped, so the bus grows until the host drains it; call
/// [`crate::UiService::drain_events`] once per tick.
#[derive(Default)]
pub struct EventBus {
    events: Vec<UiEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: UiEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<UiEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_hands_over_everything_in_order() {
        let mut bus = EventBus::default();
        bus.push(UiEvent::SceneLoadStarted { scene: "auth".into() });
        bus.push(UiEvent::SceneLoadFinished { scene: "auth".into() });
        assert_eq!(bus.len(), 2);
        let drained = bus.drain();
        assert_eq!(drained[0], UiEvent::SceneLoadStarted { scene: "auth".into() });
        assert_eq!(drained.len(), 2);
        assert!(bus.is_empty());
    }
}
