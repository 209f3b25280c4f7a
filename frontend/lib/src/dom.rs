use arcade_core::games::minesweeper::{Attributes, Interaction};
use wasm_bindgen::JsCast;
use web_sys::{CustomEvent, Document, Element, Event, Storage, Window};

use crate::error::LiveError;

pub const PAGE_LOADING_START: &str = "phx:page-loading-start";
pub const PAGE_LOADING_STOP: &str = "phx:page-loading-stop";

pub fn window() -> Result<Window, LiveError> {
    web_sys::window().ok_or_else(|| LiveError::Dom("no window".to_owned()))
}

pub fn document() -> Result<Document, LiveError> {
    window()?
        .document()
        .ok_or_else(|| LiveError::Dom("no document".to_owned()))
}

pub fn meta_content(document: &Document, name: &str) -> Option<String> {
    document
        .query_selector(&format!("meta[name='{name}']"))
        .ok()
        .flatten()
        .and_then(|meta| meta.get_attribute("content"))
}

pub fn query_all(document: &Document, selector: &str) -> Result<Vec<Element>, LiveError> {
    let nodes = document.query_selector_all(selector)?;
    Ok((0..nodes.length())
        .filter_map(|i| nodes.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect())
}

pub fn session_storage() -> Option<Storage> {
    web_sys::window()?.session_storage().ok().flatten()
}

pub fn dispatch_window_event(name: &str) -> Result<(), LiveError> {
    let event = CustomEvent::new(name)?;
    window()?.dispatch_event(&event)?;
    Ok(())
}

pub struct ElementAttributes<'a>(pub &'a Element);

impl Attributes for ElementAttributes<'_> {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }
}

pub struct DomEvent<'a>(pub &'a Event);

impl Interaction for DomEvent<'_> {
    fn prevent_default(&self) {
        self.0.prevent_default();
    }
}
