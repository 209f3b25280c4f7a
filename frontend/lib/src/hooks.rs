use std::{
    collections::{HashMap, HashSet},
    rc::Weak,
};

use arcade_core::{
    error::HookError,
    games::{light_cycles::draw_trails, minesweeper},
    hooks::{EventSink, HookId, HookKind, HookTable},
    net::{ClientEvent, ServerEvent},
};
use log::{debug, error, warn};
use wasm_bindgen::{prelude::Closure, JsCast};
use web_sys::{Document, Element, Event, HtmlCanvasElement};

use crate::{
    canvas::CanvasSurface,
    dom::{self, DomEvent, ElementAttributes},
    error::LiveError,
    socket::Shared,
};

const HOOK_ATTR: &str = "phx-hook";
const CONTEXT_MENU: &str = "contextmenu";

/// What a mounted hook may reach: the socket it was mounted by.
#[derive(Clone)]
pub struct HookContext {
    socket: Weak<Shared>,
}

impl HookContext {
    pub const fn new(socket: Weak<Shared>) -> Self {
        Self { socket }
    }

    #[cfg(all(test, target_arch = "wasm32"))]
    pub const fn detached() -> Self {
        Self { socket: Weak::new() }
    }

    pub fn on_push(&self, event: &str, hook: HookId, handler: impl FnMut(&ServerEvent) + 'static) {
        if let Some(socket) = self.socket.upgrade() {
            socket.register_push(event, hook, handler);
        }
    }

    pub fn remove_pushes(&self, hook: HookId) {
        if let Some(socket) = self.socket.upgrade() {
            socket.unregister_pushes(hook);
        }
    }
}

impl EventSink for HookContext {
    fn push_event(&self, event: ClientEvent) {
        match self.socket.upgrade() {
            Some(socket) => socket.push_event(event),
            None => warn!("socket is gone, dropping {} event", event.name()),
        }
    }
}

pub trait Hook {
    fn destroyed(&mut self, ctx: &HookContext);
}

/// `MinesweeperFlag`: right-click flags the cell.
pub struct FlagHook {
    el: Element,
    listener: Closure<dyn FnMut(Event)>,
}

impl FlagHook {
    pub fn mounted(el: &Element, sink: impl EventSink + 'static) -> Result<Self, LiveError> {
        let target = el.clone();
        let listener = Closure::<dyn FnMut(_)>::new(move |event: Event| {
            let attributes = ElementAttributes(&target);
            if let Err(e) = minesweeper::on_context_menu(&DomEvent(&event), &attributes, &sink) {
                warn!("not flagging #{}: {e}", target.id());
            }
        });
        el.add_event_listener_with_callback(CONTEXT_MENU, listener.as_ref().unchecked_ref())?;
        Ok(Self {
            el: el.clone(),
            listener,
        })
    }
}

impl Hook for FlagHook {
    fn destroyed(&mut self, _ctx: &HookContext) {
        if let Err(e) = self
            .el
            .remove_event_listener_with_callback(CONTEXT_MENU, self.listener.as_ref().unchecked_ref())
        {
            warn!("could not remove flag listener: {e:?}");
        }
    }
}

/// `LightCyclesDraw`: redraws the arena on every `draw` push.
pub struct DrawHook {
    id: HookId,
}

impl DrawHook {
    pub fn mounted(el: &Element, ctx: &HookContext, id: HookId) -> Result<Self, LiveError> {
        let canvas = el
            .clone()
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| HookError::NotACanvas)?;
        let surface = CanvasSurface::new(canvas)?;
        ctx.on_push(ServerEvent::DRAW, id, move |event| {
            let ServerEvent::Draw(payload) = event;
            let stroked = draw_trails(&surface, payload);
            debug!("drew {stroked} of {} trails", payload.players.len());
        });
        Ok(Self { id })
    }
}

impl Hook for DrawHook {
    fn destroyed(&mut self, ctx: &HookContext) {
        ctx.remove_pushes(self.id);
    }
}

struct Mounted {
    kind: HookKind,
    hook: Box<dyn Hook>,
}

/// Hooks mounted on the page, keyed by element id.
pub struct HookRuntime {
    table: HookTable,
    mounted: HashMap<String, Mounted>,
    next_id: HookId,
}

impl HookRuntime {
    pub fn new(table: HookTable) -> Self {
        Self {
            table,
            mounted: HashMap::new(),
            next_id: 0,
        }
    }

    /// Mounts every `[phx-hook]` element not mounted yet and destroys hooks
    /// whose element left the page. Returns how many were newly mounted.
    pub fn mount_all(&mut self, document: &Document, ctx: &HookContext) -> usize {
        let elements = match dom::query_all(document, &format!("[{HOOK_ATTR}]")) {
            Ok(elements) => elements,
            Err(e) => {
                error!("could not look up hooks: {e}");
                return 0;
            }
        };

        let present: HashSet<String> = elements.iter().map(Element::id).collect();
        let gone: Vec<String> = self
            .mounted
            .keys()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();
        for id in gone {
            self.destroy(&id, ctx);
        }

        let mut mounted = 0;
        for el in &elements {
            match self.mount(el, ctx) {
                Ok(true) => mounted += 1,
                Ok(false) => {}
                Err(LiveError::Hook(e @ HookError::UnknownHook(_))) => warn!("{e}"),
                Err(e) => error!("could not mount hook on #{}: {e}", el.id()),
            }
        }
        mounted
    }

    fn mount(&mut self, el: &Element, ctx: &HookContext) -> Result<bool, LiveError> {
        let name = el.get_attribute(HOOK_ATTR).unwrap_or_default();
        let kind = self.table.resolve(&name)?;
        let dom_id = el.id();
        if dom_id.is_empty() {
            return Err(HookError::MissingId.into());
        }
        if self.mounted.contains_key(&dom_id) {
            return Ok(false);
        }

        self.next_id += 1;
        let hook: Box<dyn Hook> = match kind {
            HookKind::MinesweeperFlag => Box::new(FlagHook::mounted(el, ctx.clone())?),
            HookKind::LightCyclesDraw => Box::new(DrawHook::mounted(el, ctx, self.next_id)?),
        };
        debug!("mounted {kind} on #{dom_id}");
        self.mounted.insert(dom_id, Mounted { kind, hook });
        Ok(true)
    }

    fn destroy(&mut self, dom_id: &str, ctx: &HookContext) {
        if let Some(mut mounted) = self.mounted.remove(dom_id) {
            mounted.hook.destroyed(ctx);
            debug!("destroyed {} on #{dom_id}", mounted.kind);
        }
    }

    pub fn destroy_all(&mut self, ctx: &HookContext) {
        for (dom_id, mut mounted) in self.mounted.drain() {
            mounted.hook.destroyed(ctx);
            debug!("destroyed {} on #{dom_id}", mounted.kind);
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use arcade_core::{
        config::{DebugSettings, SocketConfig},
        games::{
            light_cycles::DrawPayload,
            minesweeper::{ATTR_X, ATTR_Y},
        },
        net::Frame,
    };
    use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
    use web_sys::EventInit;

    use super::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[derive(Clone, Default)]
    struct Outbox(Rc<RefCell<Vec<ClientEvent>>>);

    impl EventSink for Outbox {
        fn push_event(&self, event: ClientEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    fn create(tag: &str) -> Element {
        dom::document().unwrap().create_element(tag).unwrap()
    }

    fn context_menu() -> Event {
        let init = EventInit::new();
        init.set_cancelable(true);
        Event::new_with_event_init_dict(CONTEXT_MENU, &init).unwrap()
    }

    #[wasm_bindgen_test]
    fn right_click_sends_one_flag() {
        let el = create("div");
        el.set_attribute(ATTR_X, "3").unwrap();
        el.set_attribute(ATTR_Y, "5").unwrap();
        let outbox = Outbox::default();
        let mut hook = FlagHook::mounted(&el, outbox.clone()).unwrap();

        let click = context_menu();
        el.dispatch_event(&click).unwrap();

        assert!(click.default_prevented());
        let sent = outbox.0.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            serde_json::to_value(&sent[0]).unwrap(),
            serde_json::json!({"event": "flag", "value": {"x": "3", "y": "5"}})
        );
        drop(sent);

        hook.destroyed(&HookContext::detached());
        el.dispatch_event(&context_menu()).unwrap();
        assert_eq!(outbox.0.borrow().len(), 1);
    }

    #[wasm_bindgen_test]
    fn right_click_without_coordinates_is_still_suppressed() {
        let el = create("div");
        let outbox = Outbox::default();
        let _hook = FlagHook::mounted(&el, outbox.clone()).unwrap();

        let click = context_menu();
        el.dispatch_event(&click).unwrap();

        assert!(click.default_prevented());
        assert!(outbox.0.borrow().is_empty());
    }

    #[wasm_bindgen_test]
    fn draw_hook_needs_a_canvas() {
        let result = DrawHook::mounted(&create("div"), &HookContext::detached(), 1);
        assert!(matches!(result, Err(LiveError::Hook(HookError::NotACanvas))));
    }

    #[wasm_bindgen_test]
    fn canvas_surface_draws_trails() {
        let canvas = create("canvas").dyn_into::<HtmlCanvasElement>().unwrap();
        let surface = CanvasSurface::new(canvas).unwrap();
        let payload: DrawPayload = serde_json::from_str(
            r##"{"players": {"p1": {"color": "#ff0000", "points": [[0, 0], [10, 10]]},
                             "p2": {"color": "#00ff00", "points": []}}}"##,
        )
        .unwrap();

        assert_eq!(draw_trails(&surface, &payload), 1);
    }

    fn hooked(tag: &str, id: &str, hook: &str) -> Element {
        let el = create(tag);
        el.set_id(id);
        el.set_attribute(HOOK_ATTR, hook).unwrap();
        dom::document()
            .unwrap()
            .body()
            .unwrap()
            .append_child(&el)
            .unwrap();
        el
    }

    fn draw_frame() -> Frame {
        Frame::decode(
            r##"[null,null,"lv:phx-F1","diff",{"e":[["draw",{"players":{"p1":{"color":"#ff0000","points":[[0,0],[10,10]]}}}]]}]"##,
        )
        .unwrap()
    }

    #[wasm_bindgen_test]
    fn runtime_follows_the_page() {
        let document = dom::document().unwrap();
        let config = SocketConfig::new(Some("tok".to_owned())).unwrap();
        let shared = Rc::new(Shared::new(config, DebugSettings::default()));
        let ctx = HookContext::new(Rc::downgrade(&shared));
        let mut runtime = HookRuntime::new(HookTable::default());

        let cell = hooked("div", "runtime-cell", "MinesweeperFlag");
        let arena = hooked("canvas", "runtime-arena", "LightCyclesDraw");
        let stray = hooked("div", "runtime-stray", "Confetti");

        assert_eq!(runtime.mount_all(&document, &ctx), 2);
        assert_eq!(runtime.mount_all(&document, &ctx), 0);
        assert_eq!(shared.handle(&draw_frame()), 1);

        arena.remove();
        assert_eq!(runtime.mount_all(&document, &ctx), 0);
        assert_eq!(shared.handle(&draw_frame()), 0);

        let arena = hooked("canvas", "runtime-arena", "LightCyclesDraw");
        assert_eq!(runtime.mount_all(&document, &ctx), 1);
        assert_eq!(shared.handle(&draw_frame()), 1);

        runtime.destroy_all(&ctx);
        assert_eq!(shared.handle(&draw_frame()), 0);

        for el in [cell, arena, stray] {
            el.remove();
        }
    }
}
