use wasm_bindgen::prelude::wasm_bindgen;

mod canvas;
mod codec;
mod dom;
mod error;
mod hooks;
mod progress;
mod socket;

pub use socket::{DebugHandle, LiveSocket};

#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[wasm_bindgen(start)]
pub fn start() {
    init_panic_hook();
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        web_sys::console::warn_1(&format!("logger already set: {e}").into());
    }
    socket::init_log_level();
}
