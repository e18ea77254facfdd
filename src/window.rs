use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub mod standard;

/// Render layer of a window. Resolved windows are parented under the layer root with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTransform {
    pub const IDENTITY: Self = Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE };

    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_affine(affine: Affine3A) -> Self {
        let (scale, rotation, translation) = affine.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }

    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Lifecycle contract every managed window exposes to the UI core.
///
/// The core never renders or animates; it only drives these flags and hooks. `show`/`hide`
/// are requests and must be idempotent. `showing`/`hiding` are true only while a transition
/// is in flight, `ready` once the window is fully shown.
pub trait UiWindow {
    /// Registry name of the window.
    fn name(&self) -> &str;

    /// Layer whose root the window gets parented under after resolution.
    fn layer(&self) -> LayerId;

    fn show(&mut self);

    fn hide(&mut self);

    /// Whether the window is active in the display tree (this includes a running hide transition).
    fn is_visible(&self) -> bool;

    fn is_showing(&self) -> bool;

    fn is_hiding(&self) -> bool;

    fn is_ready(&self) -> bool;

    /// Opaque state saved by the popup stack when the window gets suspended.
    fn state(&self) -> Option<&Value>;

    /// Assigns state; implementations run their state-loading hook when the value changes.
    fn set_state(&mut self, state: Option<Value>);

    /// Whether restoring `state` should bring the window back on screen.
    fn is_state_visible(&self, _state: &Value) -> bool {
        true
    }

    fn is_loaded(&self) -> bool;

    /// Marks the window loaded. Only the first call has an effect.
    fn mark_loaded(&mut self);

    /// Cleanup hook invoked once after the window was moved to its layer root.
    fn jettison(&mut self);

    /// Activates or deactivates the window without running show/hide logic.
    fn set_active(&mut self, active: bool);

    fn local_transform(&self) -> LocalTransform;

    fn set_local_transform(&mut self, transform: LocalTransform);

    fn parent(&self) -> Option<LayerId>;

    fn set_parent(&mut self, parent: Option<LayerId>);

    /// Per-tick hook driving in-flight transitions.
    fn advance(&mut self, _dt: f32) {}
}

/// Strong reference to a window. Held by the host display tree (layer roots) and by callers.
pub type WindowRc = Rc<RefCell<dyn UiWindow>>;

pub fn share<W: UiWindow + 'static>(window: W) -> WindowRc {
    Rc::new(RefCell::new(window))
}

/// Non-owning reference to a window instance.
///
/// The host may destroy a window out of band, so every use goes through [`WindowHandle::upgrade`]
/// or the explicit [`WindowHandle::is_alive`] query.
#[derive(Clone, Default)]
pub struct WindowHandle(Option<Weak<RefCell<dyn UiWindow>>>);

impl WindowHandle {
    pub fn new(window: &WindowRc) -> Self {
        Self(Some(Rc::downgrade(window)))
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.0.as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }

    pub fn upgrade(&self) -> Option<WindowRc> {
        self.0.as_ref().and_then(Weak::upgrade)
    }

    /// Whether this handle points at `window`, regardless of liveness.
    pub fn refers_to(&self, window: &WindowRc) -> bool {
        self.0.as_ref().is_some_and(|weak| Weak::ptr_eq(weak, &Rc::downgrade(window)))
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(window) => match window.try_borrow() {
                Ok(window) => write!(f, "WindowHandle({})", window.name()),
                Err(_) => write!(f, "WindowHandle(<borrowed>)"),
            },
            None if self.is_set() => write!(f, "WindowHandle(<dead>)"),
            None => write!(f, "WindowHandle(<none>)"),
        }
    }
}
