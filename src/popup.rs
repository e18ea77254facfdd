use anyhow::Result;
use bitflags::bitflags;
use serde_json::Value;

use crate::events::{EventBus, UiEvent};
use crate::load::LoadOutcome;
use crate::priority_queue::PriorityQueue;
use crate::window::{WindowHandle, WindowRc};

pub type AfterShow = Box<dyn FnOnce(&WindowRc) -> Result<()>>;
pub type AfterClose = Box<dyn FnOnce(&WindowRc) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupId(u64);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PopupFlags: u8 {
        const LOADING = 1 << 0;
        const LOADED = 1 << 1;
        /// Waiting to be (re)shown once it surfaces at the top of the stack.
        const SUSPENDED = 1 << 2;
        /// Cleared by invalidation; only meaningful while queued.
        const VALID = 1 << 3;
    }
}

pub struct PopupEntry {
    id: PopupId,
    window_name: String,
    state: Option<Value>,
    flags: PopupFlags,
    window: WindowHandle,
    after_show: Option<AfterShow>,
    after_close: Option<AfterClose>,
}

impl PopupEntry {
    fn new(id: PopupId, window_name: String, after_show: Option<AfterShow>, after_close: Option<AfterClose>) -> Self {
        Self {
            id,
            window_name,
            state: None,
            flags: PopupFlags::SUSPENDED | PopupFlags::VALID,
            window: WindowHandle::default(),
            after_show,
            after_close,
        }
    }

    pub fn id(&self) -> PopupId {
        self.id
    }

    pub fn window_name(&self) -> &str {
        &self.window_name
    }

    pub fn flags(&self) -> PopupFlags {
        self.flags
    }

    /// State snapshot taken when the entry got suspended.
    pub fn saved_state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    pub fn window(&self) -> &WindowHandle {
        &self.window
    }
}

/// What a single scheduling step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupStep {
    /// Stack and queue are both empty.
    Idle,
    /// The top entry is loading or on screen.
    Waiting,
    /// The top entry needs its window resolved; the caller starts the load.
    Load { id: PopupId, window: String },
    Shown,
    Closed,
    /// The top entry's window never resolved (or was destroyed) and got popped unshown.
    Dropped,
}

/// LIFO stack of popups where only the top entry is ever on screen, fed by a priority
/// queue whenever the stack runs empty.
#[derive(Default)]
pub struct PopupScheduler {
    stack: Vec<PopupEntry>,
    queue: PriorityQueue<i32, PopupEntry>,
    next_id: u64,
}

impl PopupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> PopupId {
        self.next_id += 1;
        PopupId(self.next_id)
    }

    /// Suspends the currently displayed popup (if any) and stacks `window` on top of it.
    /// The new popup surfaces on a later step once its window is loaded.
    pub fn push(
        &mut self,
        window: impl Into<String>,
        after_show: Option<AfterShow>,
        after_close: Option<AfterClose>,
    ) -> PopupId {
        if let Some(top) = self.stack.last_mut() {
            if let Some(current) = top.window.upgrade() {
                let displayed = {
                    let current = current.borrow();
                    current.is_visible() && !current.is_hiding()
                };
                if displayed {
                    top.state = current.borrow().state().cloned();
                    top.flags.insert(PopupFlags::SUSPENDED);
                    log::debug!("Suspending popup '{}'", top.window_name);
                    current.borrow_mut().hide();
                }
            }
        }
        let id = self.allocate_id();
        self.stack.push(PopupEntry::new(id, window.into(), after_show, after_close));
        id
    }

    pub fn enqueue(
        &mut self,
        window: impl Into<String>,
        after_show: Option<AfterShow>,
        after_close: Option<AfterClose>,
        priority: i32,
    ) -> PopupId {
        let id = self.allocate_id();
        self.queue.enqueue(PopupEntry::new(id, window.into(), after_show, after_close), priority);
        id
    }

    /// Marks a queued popup invalid so it is discarded instead of stacked. Returns false when
    /// the id is not waiting in the queue; stacked popups always run to completion.
    pub fn invalidate(&mut self, id: PopupId) -> bool {
        match self.queue.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.flags.remove(PopupFlags::VALID);
                true
            }
            None => false,
        }
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.stack.is_empty() && self.queue.is_empty()
    }

    pub fn top(&self) -> Option<&PopupEntry> {
        self.stack.last()
    }

    pub fn top_window_name(&self) -> Option<&str> {
        self.stack.last().map(PopupEntry::window_name)
    }

    /// Stacked entries, bottom first.
    pub fn stack(&self) -> impl Iterator<Item = &PopupEntry> {
        self.stack.iter()
    }

    /// Records the result of a load started for `id`. A failed load leaves the entry without
    /// a window, which makes the next step drop it.
    pub(crate) fn complete_load(&mut self, id: PopupId, outcome: LoadOutcome) {
        let Some(entry) = self.stack.iter_mut().find(|entry| entry.id == id) else {
            log::warn!("Load finished for unknown popup {id:?}");
            return;
        };
        entry.flags.remove(PopupFlags::LOADING);
        entry.flags.insert(PopupFlags::LOADED);
        match outcome {
            Ok(window) => entry.window = WindowHandle::new(&window),
            Err(err) => {
                log::warn!("Popup '{}' failed to load: {err}", entry.window_name);
                entry.window.clear();
            }
        }
    }

    /// One scheduling step. Runs at most once per tick.
    pub(crate) fn step(&mut self, events: &mut EventBus) -> PopupStep {
        while self.stack.is_empty() {
            let Ok(entry) = self.queue.dequeue() else { break };
            if !entry.flags.contains(PopupFlags::VALID) {
                log::debug!("Discarding invalidated popup '{}'", entry.window_name);
                events.push(UiEvent::PopupDiscarded { window: entry.window_name });
                continue;
            }
            self.stack.push(entry);
        }

        let Some(top) = self.stack.last_mut() else {
            return PopupStep::Idle;
        };
        if top.flags.contains(PopupFlags::LOADING) {
            return PopupStep::Waiting;
        }
        if !top.flags.contains(PopupFlags::LOADED) {
            top.flags.insert(PopupFlags::LOADING);
            return PopupStep::Load { id: top.id, window: top.window_name.clone() };
        }

        let Some(window) = top.window.upgrade() else {
            let window_name = top.window_name.clone();
            self.stack.pop();
            events.push(UiEvent::PopupDropped { window: window_name });
            return PopupStep::Dropped;
        };

        if window.borrow().is_visible() {
            return PopupStep::Waiting;
        }

        if top.flags.contains(PopupFlags::SUSPENDED) && !window.borrow().is_hiding() {
            top.flags.remove(PopupFlags::SUSPENDED);
            let state = top.state.take();
            let state_visible = match &state {
                Some(state) => window.borrow().is_state_visible(state),
                None => true,
            };
            if state_visible {
                window.borrow_mut().show();
                window.borrow_mut().set_state(state);
                events.push(UiEvent::PopupShown { window: top.window_name.clone() });
                if let Some(after_show) = top.after_show.take() {
                    if let Err(err) = after_show(&window) {
                        log::error!("after_show for popup '{}' failed: {err:?}", top.window_name);
                    }
                }
                let settled = {
                    let window = window.borrow();
                    window.is_showing() || window.is_ready()
                };
                if settled {
                    return PopupStep::Shown;
                }
            }
        }

        // Neither on screen nor waiting to resume: the popup is closed.
        let Some(entry) = self.stack.pop() else {
            return PopupStep::Idle;
        };
        events.push(UiEvent::PopupClosed { window: entry.window_name.clone() });
        if let Some(after_close) = entry.after_close {
            if let Err(err) = after_close(&window) {
                log::error!("after_close for popup '{}' failed: {err:?}", entry.window_name);
            }
        }
        PopupStep::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::LoadError;
    use crate::window::standard::StandardWindow;
    use crate::window::{share, LayerId, UiWindow};
    use anyhow::anyhow;
    use std::cell::Cell;
    use std::rc::Rc;

    /// A window as resolution leaves it: parented and deactivated.
    fn window(name: &str) -> WindowRc {
        deactivated(StandardWindow::new(name, LayerId(5)))
    }

    fn deactivated(window: StandardWindow) -> WindowRc {
        let window = share(window);
        window.borrow_mut().set_active(false);
        window
    }

    fn load_top(scheduler: &mut PopupScheduler, events: &mut EventBus, window: &WindowRc) {
        match scheduler.step(events) {
            PopupStep::Load { id, .. } => scheduler.complete_load(id, Ok(window.clone())),
            other => panic!("expected a load request, got {other:?}"),
        }
    }

    #[test]
    fn loaded_popup_shows_then_closes_once() {
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        let p = window("P");
        let closed = Rc::new(Cell::new(0));
        let counter = closed.clone();
        scheduler.push(
            "P",
            None,
            Some(Box::new(move |_: &WindowRc| {
                counter.set(counter.get() + 1);
                Ok(())
            })),
        );

        load_top(&mut scheduler, &mut events, &p);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
        assert!(p.borrow().is_ready());
        assert_eq!(scheduler.step(&mut events), PopupStep::Waiting);

        p.borrow_mut().hide();
        p.borrow_mut().advance(0.016);
        assert_eq!(scheduler.step(&mut events), PopupStep::Closed);
        assert_eq!(scheduler.step(&mut events), PopupStep::Idle);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn waits_while_loading() {
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        scheduler.push("P", None, None);
        assert!(matches!(scheduler.step(&mut events), PopupStep::Load { .. }));
        assert_eq!(scheduler.step(&mut events), PopupStep::Waiting);
    }

    #[test]
    fn failed_load_is_dropped_silently() {
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        let closed = Rc::new(Cell::new(false));
        let flag = closed.clone();
        scheduler.push(
            "ghost",
            None,
            Some(Box::new(move |_: &WindowRc| {
                flag.set(true);
                Ok(())
            })),
        );
        let PopupStep::Load { id, .. } = scheduler.step(&mut events) else {
            panic!("expected load");
        };
        scheduler.complete_load(id, Err(LoadError::UnregisteredWindow { window: "ghost".into() }));
        assert_eq!(scheduler.step(&mut events), PopupStep::Dropped);
        assert_eq!(scheduler.stack_len(), 0);
        assert!(!closed.get());
        assert_eq!(events.drain(), vec![UiEvent::PopupDropped { window: "ghost".into() }]);
    }

    #[test]
    fn push_suspends_displayed_popup() {
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        let a = window("A");
        let b = window("B");
        scheduler.push("A", None, None);
        load_top(&mut scheduler, &mut events, &a);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
        a.borrow_mut().set_state(Some(serde_json::json!({"page": 2})));

        scheduler.push("B", None, None);
        assert!(a.borrow().is_hiding());
        let suspended = scheduler.stack().next().expect("A stays stacked");
        assert!(suspended.flags().contains(PopupFlags::SUSPENDED));
        assert_eq!(suspended.saved_state(), Some(&serde_json::json!({"page": 2})));

        load_top(&mut scheduler, &mut events, &b);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
        assert_eq!(scheduler.top_window_name(), Some("B"));

        b.borrow_mut().hide();
        b.borrow_mut().advance(0.016);
        a.borrow_mut().advance(0.016);
        assert_eq!(scheduler.step(&mut events), PopupStep::Closed);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
        assert_eq!(a.borrow().state(), Some(&serde_json::json!({"page": 2})));
    }

    #[test]
    fn queue_feeds_only_an_empty_stack() {
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        let a = window("A");
        scheduler.push("A", None, None);
        scheduler.enqueue("X", None, None, 1);
        load_top(&mut scheduler, &mut events, &a);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
        assert_eq!(scheduler.queue_len(), 1);

        a.borrow_mut().hide();
        a.borrow_mut().advance(0.016);
        assert_eq!(scheduler.step(&mut events), PopupStep::Closed);
        assert!(matches!(scheduler.step(&mut events), PopupStep::Load { ref window, .. } if window == "X"));
    }

    #[test]
    fn invalidated_entries_are_discarded() {
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        let fired = Rc::new(Cell::new(false));
        let (show_flag, close_flag) = (fired.clone(), fired.clone());
        let id = scheduler.enqueue(
            "X",
            Some(Box::new(move |_: &WindowRc| {
                show_flag.set(true);
                Ok(())
            })),
            Some(Box::new(move |_: &WindowRc| {
                close_flag.set(true);
                Ok(())
            })),
            0,
        );
        assert!(scheduler.invalidate(id));
        assert_eq!(scheduler.step(&mut events), PopupStep::Idle);
        assert!(!fired.get());
        assert_eq!(events.drain(), vec![UiEvent::PopupDiscarded { window: "X".into() }]);
        assert!(!scheduler.invalidate(id), "already drained");
    }

    #[test]
    fn hidden_state_closes_without_showing() {
        struct NeverVisible;
        impl crate::window::standard::WindowBehavior for NeverVisible {
            fn is_state_visible(&self, _state: &Value) -> bool {
                false
            }
        }
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        let a = deactivated(StandardWindow::new("A", LayerId(5)).with_behavior(NeverVisible));
        let b = window("B");
        scheduler.push("A", None, None);
        load_top(&mut scheduler, &mut events, &a);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
        a.borrow_mut().set_state(Some(Value::Bool(true)));

        scheduler.push("B", None, None);
        a.borrow_mut().advance(0.016);
        load_top(&mut scheduler, &mut events, &b);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
        b.borrow_mut().hide();
        b.borrow_mut().advance(0.016);
        assert_eq!(scheduler.step(&mut events), PopupStep::Closed);
        assert_eq!(scheduler.step(&mut events), PopupStep::Closed, "A is popped without resuming");
        assert!(!a.borrow().is_visible());
    }

    #[test]
    fn callback_errors_are_absorbed() {
        let mut scheduler = PopupScheduler::new();
        let mut events = EventBus::default();
        let p = window("P");
        scheduler.push("P", Some(Box::new(|_: &WindowRc| Err(anyhow!("boom")))), None);
        load_top(&mut scheduler, &mut events, &p);
        assert_eq!(scheduler.step(&mut events), PopupStep::Shown);
    }
}
