//! Deferred UI actions
//!
//! UI widgets and window events run in the middle of a frame, where touching
//! GPU resources is unsafe. They queue an action instead; the frame loop
//! drains the queue between frames and calls the registered handlers with
//! mutable access to the application context.

use std::collections::{HashMap, VecDeque};

/// Identifiers of the actions the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiAction {
    /// Replace the loaded point cloud (string payload: file path)
    LoadSplatFile,
    /// Enable or disable the translucency pass (bool payload)
    ToggleTranslucency,
    /// Change the opaque/translucent split (float payload)
    SetOpaqueThreshold,
    /// Put the camera back at its configured start (no payload)
    ResetCamera,
}

/// Payload carried by a queued action
#[derive(Debug, Clone, PartialEq)]
pub enum UiValue {
    Unit,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
}

impl UiValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

enum Handler<C> {
    Unit(Box<dyn FnMut(&mut C)>),
    Bool(Box<dyn FnMut(&mut C, bool)>),
    Int(Box<dyn FnMut(&mut C, i32)>),
    Float(Box<dyn FnMut(&mut C, f32)>),
    String(Box<dyn FnMut(&mut C, &str)>),
}

impl<C> Handler<C> {
    /// Returns false when the payload type does not match the handler
    fn call(&mut self, context: &mut C, value: &UiValue) -> bool {
        match (self, value) {
            (Self::Unit(handler), UiValue::Unit) => handler(context),
            (Self::Bool(handler), UiValue::Bool(v)) => handler(context, *v),
            (Self::Int(handler), UiValue::Int(v)) => handler(context, *v),
            (Self::Float(handler), UiValue::Float(v)) => handler(context, *v),
            (Self::String(handler), UiValue::String(v)) => handler(context, v),
            _ => return false,
        }
        true
    }
}

/// Queue of pending UI actions with their registered handlers
pub struct UiActionQueue<C> {
    handlers: HashMap<UiAction, Vec<Handler<C>>>,
    pending: VecDeque<(UiAction, UiValue)>,
}

impl<C> UiActionQueue<C> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    fn register(&mut self, action: UiAction, handler: Handler<C>) {
        self.handlers.entry(action).or_default().push(handler);
    }

    /// Register a handler without payload
    pub fn register_action(&mut self, action: UiAction, handler: impl FnMut(&mut C) + 'static) {
        self.register(action, Handler::Unit(Box::new(handler)));
    }

    /// Register a bool handler (toggles)
    pub fn register_bool_action(&mut self, action: UiAction, handler: impl FnMut(&mut C, bool) + 'static) {
        self.register(action, Handler::Bool(Box::new(handler)));
    }

    /// Register an int handler (spinners)
    pub fn register_int_action(&mut self, action: UiAction, handler: impl FnMut(&mut C, i32) + 'static) {
        self.register(action, Handler::Int(Box::new(handler)));
    }

    /// Register a float handler (sliders)
    pub fn register_float_action(&mut self, action: UiAction, handler: impl FnMut(&mut C, f32) + 'static) {
        self.register(action, Handler::Float(Box::new(handler)));
    }

    /// Register a string handler (text fields, file pickers)
    pub fn register_string_action(&mut self, action: UiAction, handler: impl FnMut(&mut C, &str) + 'static) {
        self.register(action, Handler::String(Box::new(handler)));
    }

    /// Remove every handler of an action
    pub fn unregister(&mut self, action: UiAction) {
        self.handlers.remove(&action);
    }

    /// Whether any handler is registered for an action
    pub fn has_action(&self, action: UiAction) -> bool {
        self.handlers.get(&action).is_some_and(|handlers| !handlers.is_empty())
    }

    pub fn queue_action(&mut self, action: UiAction) {
        self.pending.push_back((action, UiValue::Unit));
    }

    pub fn queue_bool_action(&mut self, action: UiAction, value: bool) {
        self.pending.push_back((action, UiValue::Bool(value)));
    }

    pub fn queue_int_action(&mut self, action: UiAction, value: i32) {
        self.pending.push_back((action, UiValue::Int(value)));
    }

    pub fn queue_float_action(&mut self, action: UiAction, value: f32) {
        self.pending.push_back((action, UiValue::Float(value)));
    }

    pub fn queue_string_action(&mut self, action: UiAction, value: impl Into<String>) {
        self.pending.push_back((action, UiValue::String(value.into())));
    }

    /// Number of actions waiting for the next drain
    pub fn queued_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_queued_actions(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop pending actions without running them
    pub fn clear_queued_actions(&mut self) {
        self.pending.clear();
    }

    /// Run every pending action in FIFO order
    ///
    /// Actions queued by a handler during the drain run on the next call.
    /// Returns the number of actions that reached at least one handler.
    pub fn process_queued_actions(&mut self, context: &mut C) -> usize {
        let drained: Vec<_> = self.pending.drain(..).collect();
        let mut handled = 0;

        for (action, value) in drained {
            let Some(handlers) = self.handlers.get_mut(&action) else {
                log::warn!("Dropping {:?}: no handler registered", action);
                continue;
            };

            let mut dispatched = false;
            for handler in handlers.iter_mut() {
                dispatched |= handler.call(context, &value);
            }

            if dispatched {
                handled += 1;
            } else {
                log::warn!("Dropping {:?}: no handler accepts a {} payload", action, value.kind());
            }
        }

        handled
    }
}

impl<C> Default for UiActionQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Context {
        loaded: Vec<String>,
        translucency: bool,
        threshold: f32,
        resets: u32,
    }

    fn queue() -> UiActionQueue<Context> {
        let mut queue = UiActionQueue::new();
        queue.register_string_action(UiAction::LoadSplatFile, |ctx: &mut Context, path| {
            ctx.loaded.push(path.to_string());
        });
        queue.register_bool_action(UiAction::ToggleTranslucency, |ctx: &mut Context, on| {
            ctx.translucency = on;
        });
        queue.register_float_action(UiAction::SetOpaqueThreshold, |ctx: &mut Context, value| {
            ctx.threshold = value;
        });
        queue
    }

    #[test]
    fn test_actions_wait_for_drain() {
        let mut queue = queue();
        let mut ctx = Context::default();

        queue.queue_string_action(UiAction::LoadSplatFile, "a.ply");
        assert!(ctx.loaded.is_empty());
        assert_eq!(queue.queued_count(), 1);

        assert_eq!(queue.process_queued_actions(&mut ctx), 1);
        assert_eq!(ctx.loaded, vec!["a.ply".to_string()]);
        assert!(!queue.has_queued_actions());
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = queue();
        let mut ctx = Context::default();

        queue.queue_string_action(UiAction::LoadSplatFile, "first.ply");
        queue.queue_bool_action(UiAction::ToggleTranslucency, true);
        queue.queue_string_action(UiAction::LoadSplatFile, "second.ply");
        queue.queue_bool_action(UiAction::ToggleTranslucency, false);

        assert_eq!(queue.process_queued_actions(&mut ctx), 4);
        assert_eq!(ctx.loaded, vec!["first.ply".to_string(), "second.ply".to_string()]);
        assert!(!ctx.translucency);
    }

    #[test]
    fn test_unregistered_and_mismatched_actions_dropped() {
        let mut queue = queue();
        let mut ctx = Context::default();

        queue.queue_action(UiAction::ResetCamera);
        queue.queue_int_action(UiAction::SetOpaqueThreshold, 3);
        queue.queue_float_action(UiAction::SetOpaqueThreshold, 0.5);

        assert_eq!(queue.process_queued_actions(&mut ctx), 1);
        assert_eq!(ctx.threshold, 0.5);
        assert_eq!(ctx.resets, 0);
        assert!(!queue.has_queued_actions());
    }

    #[test]
    fn test_multiple_handlers_and_unregister() {
        let mut queue = queue();
        let mut ctx = Context::default();
        queue.register_action(UiAction::ResetCamera, |ctx: &mut Context| ctx.resets += 1);
        queue.register_action(UiAction::ResetCamera, |ctx: &mut Context| ctx.resets += 10);

        queue.queue_action(UiAction::ResetCamera);
        queue.process_queued_actions(&mut ctx);
        assert_eq!(ctx.resets, 11);

        queue.unregister(UiAction::ResetCamera);
        assert!(!queue.has_action(UiAction::ResetCamera));
        queue.queue_action(UiAction::ResetCamera);
        assert_eq!(queue.process_queued_actions(&mut ctx), 0);
        assert_eq!(ctx.resets, 11);
    }

    #[test]
    fn test_clear_queued_actions() {
        let mut queue = queue();
        let mut ctx = Context::default();

        queue.queue_string_action(UiAction::LoadSplatFile, "skipped.ply");
        queue.clear_queued_actions();
        assert_eq!(queue.process_queued_actions(&mut ctx), 0);
        assert!(ctx.loaded.is_empty());
    }
}
