use std::fmt;

use log::debug;
use serde::Serialize;

use crate::{error::HookError, hooks::EventSink, net::ClientEvent};

pub const ATTR_X: &str = "phx-value-x";
pub const ATTR_Y: &str = "phx-value-y";

/// One board coordinate, kept exactly as the server rendered it.
///
/// Only values that read as an unsigned integer are accepted, but the
/// original text is what goes back out.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Coordinate(pub(crate) String);

impl Coordinate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A board cell as rendered by the server.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub x: Coordinate,
    pub y: Coordinate,
}

/// Read access to an element's attributes at event time.
pub trait Attributes {
    fn attribute(&self, name: &str) -> Option<String>;
}

/// The browser interaction being handled.
pub trait Interaction {
    fn prevent_default(&self);
}

impl Cell {
    pub fn from_attributes(el: &impl Attributes) -> Result<Self, HookError> {
        Ok(Self {
            x: coordinate(el, ATTR_X)?,
            y: coordinate(el, ATTR_Y)?,
        })
    }
}

fn coordinate(el: &impl Attributes, attribute: &'static str) -> Result<Coordinate, HookError> {
    let value = el
        .attribute(attribute)
        .ok_or(HookError::MissingAttribute(attribute))?;
    if value.parse::<u32>().is_err() {
        return Err(HookError::InvalidCoordinate { attribute, value });
    }
    Ok(Coordinate(value))
}

/// Right-click on a board cell: never show the native menu, flag the cell.
///
/// # Errors
///
/// Fails when the coordinates can't be read. Nothing is sent in that case.
pub fn on_context_menu(
    event: &impl Interaction,
    el: &impl Attributes,
    sink: &impl EventSink,
) -> Result<Cell, HookError> {
    event.prevent_default();
    let cell = Cell::from_attributes(el)?;
    debug!("flag {}, {}", cell.x, cell.y);
    sink.push_event(ClientEvent::Flag(cell.clone()));
    Ok(cell)
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, collections::HashMap};

    use serde_test::{Token, assert_ser_tokens};

    use super::*;

    #[derive(Default)]
    struct Element(RefCell<HashMap<&'static str, String>>);

    impl Element {
        fn with(x: &str, y: &str) -> Self {
            let el = Self::default();
            el.set(ATTR_X, x);
            el.set(ATTR_Y, y);
            el
        }

        fn set(&self, name: &'static str, value: &str) {
            self.0.borrow_mut().insert(name, value.to_owned());
        }
    }

    impl Attributes for Element {
        fn attribute(&self, name: &str) -> Option<String> {
            self.0.borrow().get(name).cloned()
        }
    }

    #[derive(Default)]
    struct ContextMenu {
        prevented: RefCell<u32>,
    }

    impl Interaction for ContextMenu {
        fn prevent_default(&self) {
            *self.prevented.borrow_mut() += 1;
        }
    }

    #[derive(Default)]
    struct Outbox(RefCell<Vec<ClientEvent>>);

    impl EventSink for Outbox {
        fn push_event(&self, event: ClientEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    fn cell(x: &str, y: &str) -> Cell {
        Cell {
            x: Coordinate(x.to_owned()),
            y: Coordinate(y.to_owned()),
        }
    }

    #[test]
    fn right_click_flags_cell() {
        let el = Element::with("3", "5");
        let click = ContextMenu::default();
        let outbox = Outbox::default();

        let cell = on_context_menu(&click, &el, &outbox).unwrap();

        assert_eq!(cell, self::cell("3", "5"));
        assert_eq!(*click.prevented.borrow(), 1);
        let sent = outbox.0.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name(), "flag");
        assert_eq!(
            serde_json::to_value(&sent[0]).unwrap(),
            serde_json::json!({"event": "flag", "value": {"x": "3", "y": "5"}})
        );
    }

    #[test]
    fn reads_attributes_at_click_time() {
        let el = Element::with("0", "0");
        let outbox = Outbox::default();
        on_context_menu(&ContextMenu::default(), &el, &outbox).unwrap();
        el.set(ATTR_X, "7");
        on_context_menu(&ContextMenu::default(), &el, &outbox).unwrap();

        let sent = outbox.0.borrow();
        assert_eq!(
            *sent,
            vec![
                ClientEvent::Flag(cell("0", "0")),
                ClientEvent::Flag(cell("7", "0"))
            ]
        );
    }

    #[test]
    fn missing_coordinate_still_prevents_menu() {
        let el = Element::default();
        el.set(ATTR_X, "1");
        let click = ContextMenu::default();
        let outbox = Outbox::default();

        let err = on_context_menu(&click, &el, &outbox).unwrap_err();

        assert!(matches!(err, HookError::MissingAttribute(ATTR_Y)));
        assert_eq!(*click.prevented.borrow(), 1);
        assert!(outbox.0.borrow().is_empty());
    }

    #[test]
    fn garbage_coordinate_is_skipped() {
        let click = ContextMenu::default();
        let outbox = Outbox::default();
        let err = on_context_menu(&click, &Element::with("-1", "2"), &outbox).unwrap_err();

        assert!(matches!(err, HookError::InvalidCoordinate { attribute: ATTR_X, .. }));
        assert_eq!(*click.prevented.borrow(), 1);
        assert!(outbox.0.borrow().is_empty());
    }

    #[test]
    fn coordinates_go_back_verbatim() {
        let outbox = Outbox::default();
        let cell = on_context_menu(&ContextMenu::default(), &Element::with("03", "+5"), &outbox)
            .unwrap();

        assert_eq!(cell.x.as_str(), "03");
        assert_eq!(
            serde_json::to_value(&outbox.0.borrow()[0]).unwrap(),
            serde_json::json!({"event": "flag", "value": {"x": "03", "y": "+5"}})
        );
    }

    #[test]
    fn cell_serializes_as_strings() {
        assert_ser_tokens(
            &cell("12", "4"),
            &[
                Token::Struct {
                    name: "Cell",
                    len: 2,
                },
                Token::Str("x"),
                Token::Str("12"),
                Token::Str("y"),
                Token::Str("4"),
                Token::StructEnd,
            ],
        );
    }
}
