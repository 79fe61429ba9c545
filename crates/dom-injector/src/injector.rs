//! Text injection that the host page's framework observes as a user edit.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dom::{ControlKind, Document, Element};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InjectError {
    #[error("element {0} was detached before injection")]
    Detached(String),
    #[error("element {0} is not editable")]
    NotEditable(String),
}

/// Which path wrote the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePath {
    TextContent,
    NativeSetter,
    DirectAssignment,
}

/// Events synthesized after every write, in dispatch order.
pub const SYNTHETIC_EVENTS: [&str; 2] = ["input", "change"];

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeValueInjector;

impl NativeValueInjector {
    pub fn new() -> Self {
        Self
    }

    /// Writes `text` into `element` and dispatches `input` then `change`,
    /// both bubbling. A detached element fails without retry.
    pub fn inject(
        &self,
        document: &Document,
        element: &Arc<Element>,
        text: &str,
    ) -> Result<WritePath, InjectError> {
        if !element.is_connected() {
            warn!(target: "content-script", element = %element.describe(), "target vanished before injection");
            return Err(InjectError::Detached(element.describe()));
        }

        let path = if element.is_content_editable() {
            element.set_text_content(text);
            WritePath::TextContent
        } else {
            self.write_controlled_value(document, element, text)?
        };

        for kind in SYNTHETIC_EVENTS {
            document.dispatch_event(element, kind, true);
        }
        debug!(target: "content-script", element = %element.describe(), ?path, chars = text.chars().count(), "value written");
        Ok(path)
    }

    /// Sets a form control's value past any framework override.
    ///
    /// Looks up the prototype setter for the control kind and calls it on the
    /// element. Plain assignment is used only when the page has made that
    /// setter unreachable.
    pub fn write_controlled_value(
        &self,
        document: &Document,
        element: &Element,
        text: &str,
    ) -> Result<WritePath, InjectError> {
        let kind =
            ControlKind::of(element.tag()).ok_or_else(|| InjectError::NotEditable(element.describe()))?;
        match document.native_setter(kind) {
            Some(setter) => {
                setter(element, text);
                Ok(WritePath::NativeSetter)
            }
            None => {
                warn!(target: "content-script", ?kind, "native value setter unavailable; assigning directly");
                element.assign_value(text);
                Ok(WritePath::DirectAssignment)
            }
        }
    }
}
