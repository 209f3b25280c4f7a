#![allow(clippy::future_not_send)]

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use arcade_core::{
    config::{DebugSettings, SocketConfig, CSRF_META, DEBUG_KEY, LATENCY_KEY},
    hooks::{EventSink, HookId, PushRegistry},
    net::{
        ClientEvent, Frame, JoinParams, RefCounter, ServerEvent, EVENT_CLOSE, EVENT_ERROR,
        EVENT_REPLY,
    },
};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{
    stream::{SplitSink, SplitStream, StreamExt},
    SinkExt,
};
use gloo_timers::future::{IntervalStream, TimeoutFuture};
use log::{debug, error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::Element;
use ws_stream_wasm::{WsMessage, WsMeta, WsStream};

use crate::{
    codec, dom,
    error::LiveError,
    hooks::{HookContext, HookRuntime},
    progress::ProgressWiring,
};

type LiveSink = SplitSink<WsStream, WsMessage>;
type LiveStream = SplitStream<WsStream>;

/// Name the debug handle is exposed under on `window`.
const DEBUG_GLOBAL: &str = "liveSocket";

struct Channel {
    topic: String,
    join_ref: String,
}

/// Connection state shared between the socket, its tasks and the hooks.
pub struct Shared {
    config: SocketConfig,
    debug: Cell<DebugSettings>,
    refs: RefCounter,
    /// Bumped on every open and close; tasks of an older connection stop.
    generation: Cell<u64>,
    outbound: RefCell<Option<UnboundedSender<Frame>>>,
    channel: RefCell<Option<Channel>>,
    pushes: RefCell<PushRegistry<ServerEvent>>,
}

impl Shared {
    pub(crate) fn new(config: SocketConfig, debug: DebugSettings) -> Self {
        Self {
            config,
            debug: Cell::new(debug),
            refs: RefCounter::new(),
            generation: Cell::new(0),
            outbound: RefCell::new(None),
            channel: RefCell::new(None),
            pushes: RefCell::new(PushRegistry::default()),
        }
    }

    pub fn register_push(
        &self,
        event: &str,
        hook: HookId,
        handler: impl FnMut(&ServerEvent) + 'static,
    ) {
        self.pushes.borrow_mut().register(event, hook, handler);
    }

    pub fn unregister_pushes(&self, hook: HookId) {
        self.pushes.borrow_mut().unregister(hook);
    }

    fn latency(&self) -> Option<u32> {
        self.debug.get().latency_ms
    }

    fn is_connected(&self) -> bool {
        self.outbound.borrow().is_some()
    }

    fn send(&self, frame: Frame) -> bool {
        self.outbound
            .borrow()
            .as_ref()
            .is_some_and(|outbound| outbound.unbounded_send(frame).is_ok())
    }

    /// Installs a new connection and returns its generation.
    fn open(&self, channel: Channel, outbound: UnboundedSender<Frame>) -> u64 {
        self.close();
        *self.channel.borrow_mut() = Some(channel);
        *self.outbound.borrow_mut() = Some(outbound);
        self.generation.get()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation
    }

    fn close(&self) {
        self.generation.set(self.generation.get() + 1);
        if let Some(outbound) = self.outbound.borrow_mut().take() {
            outbound.close_channel();
        }
        self.channel.borrow_mut().take();
    }

    /// Closes the connection only if it is still the one `generation` opened.
    fn close_session(&self, generation: u64) {
        if self.is_current(generation) {
            self.close();
        }
    }

    fn update_debug(&self, update: impl FnOnce(&mut DebugSettings)) {
        let mut settings = self.debug.get();
        update(&mut settings);
        self.debug.set(settings);
        log::set_max_level(settings.log_level());
        store_debug_settings(settings);
    }

    fn is_join_reply(&self, frame: &Frame) -> bool {
        frame.event == EVENT_REPLY
            && self
                .channel
                .borrow()
                .as_ref()
                .is_some_and(|channel| frame.msg_ref.as_deref() == Some(channel.join_ref.as_str()))
    }

    /// Returns how many hook handlers ran.
    pub(crate) fn handle(&self, frame: &Frame) -> usize {
        debug!("received {} on {}", frame.event, frame.topic);
        if frame.event == EVENT_ERROR || frame.event == EVENT_CLOSE {
            warn!("channel {} got {}", frame.topic, frame.event);
        }
        if self.is_join_reply(frame) {
            match frame.reply_status() {
                Some("ok") => info!("joined {}", frame.topic),
                status => error!("joining {} failed ({status:?}): {}", frame.topic, frame.payload),
            }
            if let Err(e) = dom::dispatch_window_event(dom::PAGE_LOADING_STOP) {
                warn!("{e}");
            }
        } else if frame.reply_status() == Some("error") {
            warn!("server rejected a push on {}: {}", frame.topic, frame.payload);
        }

        self.pushes.borrow_mut().dispatch_frame(frame)
    }
}

impl EventSink for Shared {
    fn push_event(&self, event: ClientEvent) {
        let frame = {
            let channel = self.channel.borrow();
            let Some(channel) = channel.as_ref() else {
                warn!("not joined yet, dropping {} event", event.name());
                return;
            };
            Frame::hook_event(
                channel.join_ref.clone(),
                self.refs.next(),
                &channel.topic,
                &event,
            )
        };
        match frame {
            // replies to hook events are not awaited
            Ok(frame) => {
                if !self.send(frame) {
                    warn!("connection closed, dropping {} event", event.name());
                }
            }
            Err(e) => warn!("could not encode {} event: {e}", event.name()),
        }
    }
}

fn stored_debug_settings() -> DebugSettings {
    let Some(storage) = dom::session_storage() else {
        return DebugSettings::default();
    };
    let debug = storage.get_item(DEBUG_KEY).ok().flatten();
    let latency = storage.get_item(LATENCY_KEY).ok().flatten();
    DebugSettings::from_storage(debug.as_deref(), latency.as_deref())
}

fn store_debug_settings(settings: DebugSettings) {
    let Some(storage) = dom::session_storage() else {
        return;
    };
    let debug = if settings.debug {
        storage.set_item(DEBUG_KEY, "true")
    } else {
        storage.remove_item(DEBUG_KEY)
    };
    let latency = match settings.latency_ms {
        Some(ms) => storage.set_item(LATENCY_KEY, &ms.to_string()),
        None => storage.remove_item(LATENCY_KEY),
    };
    if debug.and(latency).is_err() {
        warn!("could not persist debug settings");
    }
}

pub fn init_log_level() {
    log::set_max_level(stored_debug_settings().log_level());
}

fn join_params(main: &Element, config: &SocketConfig) -> Result<JoinParams, LiveError> {
    let session = main
        .get_attribute("data-phx-session")
        .ok_or_else(|| LiveError::Dom("main live view has no data-phx-session".to_owned()))?;
    Ok(JoinParams {
        url: dom::window()?.location().href()?,
        csrf_token: config.csrf_token.clone(),
        session,
        static_token: main.get_attribute("data-phx-static"),
    })
}

#[wasm_bindgen]
pub struct LiveSocket {
    shared: Rc<Shared>,
    hooks: RefCell<HookRuntime>,
    _progress: ProgressWiring,
}

#[wasm_bindgen]
impl LiveSocket {
    /// Reads the CSRF token from the page. `endpoint` defaults to `/live`.
    #[wasm_bindgen(constructor)]
    pub fn new(endpoint: Option<String>) -> Result<LiveSocket, JsValue> {
        Self::build(endpoint).map_err(|e| {
            error!("{e}");
            e.into()
        })
    }

    /// Mounts the page's hooks and joins the main live view, if there is one.
    pub fn connect(&self) -> Result<(), JsValue> {
        self.try_connect().map_err(|e| {
            error!("{e}");
            e.into()
        })
    }

    pub fn disconnect(&self) {
        self.hooks.borrow_mut().destroy_all(&self.context());
        self.shared.close();
    }

    /// Mounts hooks on elements added since the last scan.
    #[wasm_bindgen(js_name = mountHooks)]
    pub fn mount_hooks(&self) -> Result<usize, JsValue> {
        let document = dom::document()?;
        Ok(self.hooks.borrow_mut().mount_all(&document, &self.context()))
    }

    #[wasm_bindgen(js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    #[wasm_bindgen(js_name = debugHandle)]
    pub fn debug_handle(&self) -> DebugHandle {
        DebugHandle {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Puts a [`DebugHandle`] on `window.liveSocket` for the browser console.
    #[wasm_bindgen(js_name = exposeDebug)]
    pub fn expose_debug(&self) -> Result<(), JsValue> {
        let window = dom::window()?;
        js_sys::Reflect::set(
            &window,
            &JsValue::from_str(DEBUG_GLOBAL),
            &JsValue::from(self.debug_handle()),
        )?;
        Ok(())
    }
}

impl LiveSocket {
    fn build(endpoint: Option<String>) -> Result<Self, LiveError> {
        let document = dom::document()?;
        let mut config = SocketConfig::new(dom::meta_content(&document, CSRF_META))?;
        if let Some(endpoint) = endpoint {
            config = config.with_endpoint(&endpoint);
        }
        let debug = stored_debug_settings();
        log::set_max_level(debug.log_level());

        let progress = ProgressWiring::install(config.progress.clone())?;
        let hooks = RefCell::new(HookRuntime::new(config.hooks.clone()));
        Ok(Self {
            shared: Rc::new(Shared::new(config, debug)),
            hooks,
            _progress: progress,
        })
    }

    fn context(&self) -> HookContext {
        HookContext::new(Rc::downgrade(&self.shared))
    }

    fn try_connect(&self) -> Result<(), LiveError> {
        if self.shared.is_connected() {
            return Ok(());
        }
        let document = dom::document()?;
        let Some(main) = document.query_selector("[data-phx-main]")? else {
            info!("no live view on this page, not connecting");
            return Ok(());
        };
        let join = join_params(&main, &self.shared.config)?;
        let topic = JoinParams::topic(&main.id());
        let location = dom::window()?.location();
        let url = self
            .shared
            .config
            .websocket_url(&location.protocol()?, &location.host()?, |component| {
                js_sys::encode_uri_component(component).into()
            });

        let mounted = self.hooks.borrow_mut().mount_all(&document, &self.context());
        debug!("mounted {mounted} hooks");
        dom::dispatch_window_event(dom::PAGE_LOADING_START)?;

        let (outbound, frames) = unbounded();
        let join_ref = self.shared.refs.next();
        outbound
            .unbounded_send(Frame::join(join_ref.clone(), &topic, &join))
            .map_err(|_| LiveError::Dom("outbound queue closed".to_owned()))?;
        let generation = self
            .shared
            .open(Channel { topic, join_ref }, outbound.clone());

        spawn_local(run(Rc::clone(&self.shared), generation, url, outbound, frames));
        Ok(())
    }
}

async fn run(
    shared: Rc<Shared>,
    generation: u64,
    url: String,
    outbound: UnboundedSender<Frame>,
    frames: UnboundedReceiver<Frame>,
) {
    let (meta, stream) = match WsMeta::connect(&url, None).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("could not connect to {url}: {}", LiveError::from(e));
            if shared.is_current(generation) {
                shared.close();
                let _ = dom::dispatch_window_event(dom::PAGE_LOADING_STOP);
            }
            return;
        }
    };
    info!("connected to {}", shared.config.endpoint);

    let (sink, stream) = stream.split();
    spawn_local(write_loop(Rc::downgrade(&shared), sink, frames));
    spawn_local(heartbeat_loop(
        Rc::downgrade(&shared),
        outbound,
        shared.config.heartbeat.as_millis() as u32,
    ));

    read_loop(&shared, generation, stream).await;

    shared.close_session(generation);
    let _ = meta.close().await;
    info!("connection closed");
}

async fn read_loop(shared: &Shared, generation: u64, mut stream: LiveStream) {
    while let Some(message) = stream.next().await {
        if !shared.is_current(generation) {
            break;
        }
        let frame = match codec::decode(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("skipping inbound message: {e}");
                continue;
            }
        };
        if let Some(ms) = shared.latency() {
            TimeoutFuture::new(ms).await;
            if !shared.is_current(generation) {
                break;
            }
        }
        shared.handle(&frame);
    }
}

async fn write_loop(shared: Weak<Shared>, mut sink: LiveSink, mut frames: UnboundedReceiver<Frame>) {
    while let Some(frame) = frames.next().await {
        if let Some(ms) = shared.upgrade().and_then(|shared| shared.latency()) {
            TimeoutFuture::new(ms).await;
        }
        debug!("sending {} on {}", frame.event, frame.topic);
        let message = match codec::encode(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping outbound frame: {e}");
                continue;
            }
        };
        if let Err(e) = sink.send(message).await {
            warn!("send failed: {e}");
            break;
        }
    }
    let _ = sink.close().await;
}

async fn heartbeat_loop(shared: Weak<Shared>, outbound: UnboundedSender<Frame>, every_ms: u32) {
    let mut ticks = IntervalStream::new(every_ms);
    while ticks.next().await.is_some() {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if outbound
            .unbounded_send(Frame::heartbeat(shared.refs.next()))
            .is_err()
        {
            break;
        }
    }
}

/// Console handle for verbose logging and simulated latency.
#[wasm_bindgen]
pub struct DebugHandle {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl DebugHandle {
    #[wasm_bindgen(js_name = enableDebug)]
    pub fn enable_debug(&self) {
        self.shared.update_debug(|settings| settings.debug = true);
    }

    #[wasm_bindgen(js_name = disableDebug)]
    pub fn disable_debug(&self) {
        self.shared.update_debug(|settings| settings.debug = false);
    }

    /// Delays every inbound and outbound frame; kept for the browser session.
    #[wasm_bindgen(js_name = enableLatencySim)]
    pub fn enable_latency_sim(&self, ms: u32) {
        warn!("latency simulator enabled: {ms}ms");
        self.shared
            .update_debug(|settings| settings.latency_ms = Some(ms));
    }

    #[wasm_bindgen(js_name = disableLatencySim)]
    pub fn disable_latency_sim(&self) {
        self.shared.update_debug(|settings| settings.latency_ms = None);
    }

    #[wasm_bindgen(js_name = latencySim)]
    pub fn latency_sim(&self) -> Option<u32> {
        self.shared.latency()
    }

    #[wasm_bindgen(js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod test {
    use wasm_bindgen_test::wasm_bindgen_test;

    use super::*;

    fn shared() -> Shared {
        let config = SocketConfig::new(Some("tok".to_owned())).unwrap();
        Shared::new(config, DebugSettings::default())
    }

    fn channel(join_ref: &str) -> Channel {
        Channel {
            topic: "lv:phx-F1".to_owned(),
            join_ref: join_ref.to_owned(),
        }
    }

    #[wasm_bindgen_test]
    fn old_connection_cannot_close_the_new_one() {
        let shared = shared();
        let (old_tx, _old_rx) = unbounded();
        let old = shared.open(channel("1"), old_tx);
        shared.close();
        assert!(!shared.is_current(old));

        let (new_tx, mut new_rx) = unbounded();
        let new = shared.open(channel("2"), new_tx);
        shared.close_session(old);

        assert!(shared.is_connected());
        assert!(shared.is_current(new));
        assert!(shared.send(Frame::heartbeat("9".to_owned())));
        assert!(new_rx.try_next().unwrap().is_some());

        shared.close_session(new);
        assert!(!shared.is_connected());
    }

    #[wasm_bindgen_test]
    fn reopening_retires_the_previous_connection() {
        let shared = shared();
        let (old_tx, mut old_rx) = unbounded();
        let old = shared.open(channel("1"), old_tx);
        let (new_tx, _new_rx) = unbounded();
        shared.open(channel("2"), new_tx);

        assert!(!shared.is_current(old));
        // closed senders end the old writer
        assert_eq!(old_rx.try_next().unwrap(), None);
    }
}
