//! Hook names, the hook table, and the registry of push-event handlers.
use std::{fmt, str::FromStr};

use log::{debug, warn};

use crate::{
    error::HookError,
    net::{ClientEvent, Frame, ServerEvent},
};

pub type HookId = u32;

/// Where hooks send their events.
pub trait EventSink {
    fn push_event(&self, event: ClientEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    MinesweeperFlag,
    LightCyclesDraw,
}

impl HookKind {
    pub const ALL: [Self; 2] = [Self::MinesweeperFlag, Self::LightCyclesDraw];

    /// The `phx-hook` attribute value.
    pub const fn name(self) -> &'static str {
        match self {
            Self::MinesweeperFlag => "MinesweeperFlag",
            Self::LightCyclesDraw => "LightCyclesDraw",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HookKind {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| HookError::UnknownHook(s.to_owned()))
    }
}

/// The hooks a page is allowed to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookTable {
    kinds: Vec<HookKind>,
}

impl Default for HookTable {
    fn default() -> Self {
        Self {
            kinds: HookKind::ALL.to_vec(),
        }
    }
}

impl HookTable {
    pub fn resolve(&self, name: &str) -> Result<HookKind, HookError> {
        let kind = name.parse()?;
        if self.kinds.contains(&kind) {
            Ok(kind)
        } else {
            Err(HookError::UnknownHook(name.to_owned()))
        }
    }
}

struct Registration<E> {
    event: String,
    hook: HookId,
    handler: Box<dyn FnMut(&E)>,
}

/// Push-event handlers, keyed by event name and owning hook.
pub struct PushRegistry<E> {
    handlers: Vec<Registration<E>>,
}

impl<E> Default for PushRegistry<E> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<E> PushRegistry<E> {
    pub fn register(&mut self, event: &str, hook: HookId, handler: impl FnMut(&E) + 'static) {
        self.handlers.push(Registration {
            event: event.to_owned(),
            hook,
            handler: Box::new(handler),
        });
    }

    /// Drops every handler the hook registered, returning how many.
    pub fn unregister(&mut self, hook: HookId) -> usize {
        let before = self.handlers.len();
        self.handlers.retain(|registration| registration.hook != hook);
        before - self.handlers.len()
    }

    /// Runs every handler for `event`, returning how many ran.
    pub fn dispatch(&mut self, event: &str, payload: &E) -> usize {
        let mut ran = 0;
        for registration in self.handlers.iter_mut().filter(|r| r.event == event) {
            (registration.handler)(payload);
            ran += 1;
        }
        ran
    }
}

impl PushRegistry<ServerEvent> {
    /// Hands every event pushed in `frame` to the hooks listening for it,
    /// in order. Returns how many handlers ran.
    ///
    /// A malformed event is skipped; the rest of the frame still goes out.
    pub fn dispatch_frame(&mut self, frame: &Frame) -> usize {
        let mut ran = 0;
        for (name, payload) in frame.push_events() {
            match ServerEvent::parse(&name, payload) {
                Ok(Some(event)) => {
                    let handled = self.dispatch(event.name(), &event);
                    if handled == 0 {
                        debug!("no hook listening for {name}");
                    }
                    ran += handled;
                }
                Ok(None) => debug!("ignoring pushed event {name}"),
                Err(e) => warn!("malformed {name} event: {e}"),
            }
        }
        ran
    }
}

#[cfg(test)]
mod test {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::*;
    use crate::games::light_cycles::{Surface, draw_trails};

    #[test]
    fn resolves_known_names() {
        let table = HookTable::default();
        assert_eq!(table.resolve("MinesweeperFlag").unwrap(), HookKind::MinesweeperFlag);
        assert_eq!(table.resolve("LightCyclesDraw").unwrap(), HookKind::LightCyclesDraw);
        assert!(matches!(
            table.resolve("Confetti"),
            Err(HookError::UnknownHook(name)) if name == "Confetti"
        ));
    }

    #[test]
    fn dispatch_by_name() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = PushRegistry::<u32>::default();
        for hook in [1, 2] {
            let seen = Rc::clone(&seen);
            registry.register("draw", hook, move |n| seen.borrow_mut().push((hook, *n)));
        }
        let other = Rc::clone(&seen);
        registry.register("tick", 3, move |n| other.borrow_mut().push((3, *n)));

        assert_eq!(registry.dispatch("draw", &9), 2);
        assert_eq!(registry.dispatch("nothing", &0), 0);
        assert_eq!(*seen.borrow(), vec![(1, 9), (2, 9)]);
    }

    #[test]
    fn unregister_removes_only_that_hook() {
        let mut registry = PushRegistry::<()>::default();
        registry.register("draw", 1, |_| {});
        registry.register("draw", 2, |_| {});
        registry.register("tick", 1, |_| {});

        assert_eq!(registry.unregister(1), 2);
        assert_eq!(registry.dispatch("draw", &()), 1);
        assert_eq!(registry.unregister(2), 1);
        assert_eq!(registry.dispatch("draw", &()), 0);
        assert_eq!(registry.dispatch("tick", &()), 0);
    }

    /// Remembers the last stroke color and how many paths were stroked.
    #[derive(Default)]
    struct Arena {
        clears: Cell<u32>,
        strokes: Cell<u32>,
        color: RefCell<String>,
    }

    impl Surface for Arena {
        fn width(&self) -> f64 {
            100.
        }

        fn height(&self) -> f64 {
            100.
        }

        fn clear_rect(&self, _: f64, _: f64, _: f64, _: f64) {
            self.clears.set(self.clears.get() + 1);
        }

        fn set_line_width(&self, _: f64) {}

        fn set_stroke_style(&self, color: &str) {
            *self.color.borrow_mut() = color.to_owned();
        }

        fn begin_path(&self) {}

        fn move_to(&self, _: f64, _: f64) {}

        fn line_to(&self, _: f64, _: f64) {}

        fn stroke(&self) {
            self.strokes.set(self.strokes.get() + 1);
        }
    }

    fn draw_hook(registry: &mut PushRegistry<ServerEvent>, hook: HookId) -> Rc<Arena> {
        let arena = Rc::new(Arena::default());
        let surface = Rc::clone(&arena);
        registry.register(ServerEvent::DRAW, hook, move |event| {
            let ServerEvent::Draw(payload) = event;
            draw_trails(&*surface, payload);
        });
        arena
    }

    #[test]
    fn pushed_draw_reaches_the_canvas() {
        let mut registry = PushRegistry::default();
        let arena = draw_hook(&mut registry, 1);
        let frame = Frame::decode(
            r##"[null,null,"lv:phx-F1","diff",{"0":"x","e":[["draw",{"players":{"p1":{"color":"#ff0000","points":[[0,0],[10,10]]}}}]]}]"##,
        )
        .unwrap();

        assert_eq!(registry.dispatch_frame(&frame), 1);
        assert_eq!(arena.clears.get(), 1);
        assert_eq!(arena.strokes.get(), 1);
        assert_eq!(*arena.color.borrow(), "#ff0000");
    }

    #[test]
    fn pushed_events_in_a_join_reply() {
        let mut registry = PushRegistry::default();
        let arena = draw_hook(&mut registry, 1);
        let frame = Frame::decode(
            r#"["1","1","lv:phx-F1","phx_reply",{"status":"ok","response":{"rendered":{"e":[["draw",{"players":{}}]]}}}]"#,
        )
        .unwrap();

        assert_eq!(registry.dispatch_frame(&frame), 1);
        assert_eq!(arena.clears.get(), 1);
        assert_eq!(arena.strokes.get(), 0);
    }

    #[test]
    fn malformed_event_does_not_block_the_next() {
        let mut registry = PushRegistry::default();
        let arena = draw_hook(&mut registry, 1);
        let frame = Frame::decode(
            r#"[null,null,"lv:x","diff",{"e":[["draw",{"nope":1}],["confetti",{}],["draw",{"players":{"a":{"color":"red","points":[[1,1],[2,2]]}}}]]}]"#,
        )
        .unwrap();

        assert_eq!(registry.dispatch_frame(&frame), 1);
        assert_eq!(arena.strokes.get(), 1);
    }

    #[test]
    fn destroyed_hook_stops_drawing() {
        let mut registry = PushRegistry::default();
        let first = draw_hook(&mut registry, 1);
        let second = draw_hook(&mut registry, 2);
        let frame = Frame::decode(
            r#"[null,null,"lv:x","diff",{"e":[["draw",{"players":{"a":{"color":"red","points":[[1,1]]}}}]]}]"#,
        )
        .unwrap();

        assert_eq!(registry.dispatch_frame(&frame), 2);
        registry.unregister(1);
        assert_eq!(registry.dispatch_frame(&frame), 1);
        assert_eq!(first.strokes.get(), 1);
        assert_eq!(second.strokes.get(), 2);
    }
}
