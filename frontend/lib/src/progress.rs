use std::{cell::RefCell, rc::Rc, time::Duration};

use arcade_core::progress::{Paint, ProgressBar, ProgressConfig, SHOW_DELAY};
use gloo_timers::callback::{Interval, Timeout};
use log::warn;
use wasm_bindgen::{prelude::Closure, JsCast};
use wasm_bindgen_futures::spawn_local;
use web_sys::Event;

use crate::{
    canvas::ProgressCanvas,
    dom::{self, PAGE_LOADING_START, PAGE_LOADING_STOP},
    error::LiveError,
};

const FRAME_MS: u32 = 16;

struct TopBar {
    state: RefCell<ProgressBar>,
    config: ProgressConfig,
    canvas: RefCell<Option<ProgressCanvas>>,
    delay: RefCell<Option<Timeout>>,
    frames: RefCell<Option<Interval>>,
}

impl TopBar {
    fn new(config: ProgressConfig) -> Self {
        Self {
            state: RefCell::new(ProgressBar::new()),
            config,
            canvas: RefCell::new(None),
            delay: RefCell::new(None),
            frames: RefCell::new(None),
        }
    }

    fn show_after(self: &Rc<Self>, delay: Duration) {
        if !self.state.borrow_mut().show_after() {
            return;
        }
        let bar = Rc::downgrade(self);
        let timeout = Timeout::new(delay.as_millis() as u32, move || {
            if let Some(bar) = bar.upgrade() {
                bar.delay_elapsed();
            }
        });
        *self.delay.borrow_mut() = Some(timeout);
        self.animate();
    }

    fn delay_elapsed(self: &Rc<Self>) {
        if let Some(timeout) = self.delay.borrow_mut().take() {
            // still inside the timeout's own callback
            spawn_local(async move { drop(timeout) });
        }
        if self.state.borrow_mut().delay_elapsed() {
            self.animate();
        }
    }

    fn hide(&self) {
        if self.state.borrow_mut().hide() {
            // dropping the handle clears the timeout
            self.delay.replace(None);
        }
    }

    fn animate(self: &Rc<Self>) {
        if self.frames.borrow().is_some() {
            return;
        }
        let bar = Rc::downgrade(self);
        let frames = Interval::new(FRAME_MS, move || {
            if let Some(bar) = bar.upgrade() {
                bar.frame();
            }
        });
        *self.frames.borrow_mut() = Some(frames);
    }

    fn frame(&self) {
        let paint = self.state.borrow_mut().tick();
        if let Err(e) = self.paint(paint) {
            warn!("progress bar: {e}");
        }
        if paint.is_none() {
            if let Some(frames) = self.frames.borrow_mut().take() {
                spawn_local(async move { drop(frames) });
            }
        }
    }

    fn paint(&self, paint: Option<Paint>) -> Result<(), LiveError> {
        let mut slot = self.canvas.borrow_mut();
        if slot.is_none() {
            if paint.is_none() {
                return Ok(());
            }
            *slot = Some(ProgressCanvas::create(&dom::document()?)?);
        }
        let Some(canvas) = slot.as_ref() else {
            return Ok(());
        };
        match paint {
            Some(paint) => canvas.paint(paint, &self.config),
            None => canvas.hide(),
        }
    }
}

/// Drives the progress bar from the page-loading window events.
pub struct ProgressWiring {
    on_start: Closure<dyn FnMut(Event)>,
    on_stop: Closure<dyn FnMut(Event)>,
}

impl ProgressWiring {
    pub fn install(config: ProgressConfig) -> Result<Self, LiveError> {
        let bar = Rc::new(TopBar::new(config));
        let window = dom::window()?;

        let on_start = {
            let bar = Rc::clone(&bar);
            Closure::<dyn FnMut(_)>::new(move |_: Event| bar.show_after(SHOW_DELAY))
        };
        let on_stop = Closure::<dyn FnMut(_)>::new(move |_: Event| bar.hide());

        window.add_event_listener_with_callback(
            PAGE_LOADING_START,
            on_start.as_ref().unchecked_ref(),
        )?;
        window
            .add_event_listener_with_callback(PAGE_LOADING_STOP, on_stop.as_ref().unchecked_ref())?;
        Ok(Self { on_start, on_stop })
    }
}

impl Drop for ProgressWiring {
    fn drop(&mut self) {
        let Ok(window) = dom::window() else {
            return;
        };
        let _ = window.remove_event_listener_with_callback(
            PAGE_LOADING_START,
            self.on_start.as_ref().unchecked_ref(),
        );
        let _ = window.remove_event_listener_with_callback(
            PAGE_LOADING_STOP,
            self.on_stop.as_ref().unchecked_ref(),
        );
    }
}
