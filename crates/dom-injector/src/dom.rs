//! Minimal document model standing in for a hosted page.
//!
//! Only what the content script observes is modelled: a connected element
//! tree, attributes, text content, a value property with a native backing
//! store, per-instance value overrides (how UI frameworks shadow the native
//! setter), and event dispatch with bubbling.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::selector::{Selector, SelectorError};

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Property setter for an element's `value`.
pub type ValueSetter = Arc<dyn Fn(&Element, &str) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

/// Form controls with a platform `value` setter on their prototype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlKind {
    TextArea,
    Input,
}

impl ControlKind {
    pub fn of(tag: &str) -> Option<Self> {
        match tag {
            "textarea" => Some(ControlKind::TextArea),
            "input" => Some(ControlKind::Input),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Event {
    pub kind: String,
    pub bubbles: bool,
    pub target: Arc<Element>,
}

struct ElementState {
    attributes: Vec<(String, String)>,
    text: String,
    value: String,
    value_override: Option<ValueSetter>,
    parent: Weak<Element>,
    children: Vec<Arc<Element>>,
    connected: bool,
}

pub struct Element {
    id: ElementId,
    tag: String,
    state: RwLock<ElementState>,
    listeners: RwLock<Vec<(String, Listener)>>,
    dispatched: Mutex<Vec<String>>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("node", &self.describe())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Element {
    fn new(id: ElementId, tag: &str, connected: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            tag: tag.to_ascii_lowercase(),
            state: RwLock::new(ElementState {
                attributes: Vec::new(),
                text: String::new(),
                value: String::new(),
                value_override: None,
                parent: Weak::new(),
                children: Vec::new(),
                connected,
            }),
            listeners: RwLock::new(Vec::new()),
            dispatched: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.state
            .read()
            .attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let mut state = self.state.write();
        match state.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => state.attributes.push((name, value.to_string())),
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        self.state
            .write()
            .attributes
            .retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn class_list(&self) -> Vec<String> {
        self.attribute("class")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// `tag#id.class` form used in logs and outlines.
    pub fn describe(&self) -> String {
        let mut out = self.tag.clone();
        if let Some(id) = self.attribute("id") {
            out.push('#');
            out.push_str(&id);
        }
        for class in self.class_list() {
            out.push('.');
            out.push_str(&class);
        }
        out
    }

    pub fn text_content(&self) -> String {
        let (mut text, children) = {
            let state = self.state.read();
            (state.text.clone(), state.children.clone())
        };
        for child in children {
            text.push_str(&child.text_content());
        }
        text
    }

    /// Replaces all children with a single run of text.
    pub fn set_text_content(&self, text: &str) {
        let removed = {
            let mut state = self.state.write();
            state.text = text.to_string();
            std::mem::take(&mut state.children)
        };
        for child in removed {
            child.state.write().parent = Weak::new();
            child.set_connected(false);
        }
    }

    /// Current value as read through the property getter.
    pub fn value(&self) -> String {
        self.state.read().value.clone()
    }

    /// Plain `element.value = text`. Goes through an instance override when one
    /// is installed, otherwise straight to the backing store.
    pub fn assign_value(&self, text: &str) {
        let setter = self.state.read().value_override.clone();
        match setter {
            Some(setter) => setter(self, text),
            None => self.store_value(text),
        }
    }

    /// Writes the backing store without consulting any override.
    pub(crate) fn store_value(&self, text: &str) {
        self.state.write().value = text.to_string();
    }

    pub fn set_value_override(&self, setter: ValueSetter) {
        self.state.write().value_override = Some(setter);
    }

    pub fn clear_value_override(&self) {
        self.state.write().value_override = None;
    }

    pub fn has_value_override(&self) -> bool {
        self.state.read().value_override.is_some()
    }

    pub fn parent(&self) -> Option<Arc<Element>> {
        self.state.read().parent.upgrade()
    }

    pub fn children(&self) -> Vec<Arc<Element>> {
        self.state.read().children.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    /// Appends `child`, moving it out of any previous parent.
    pub fn append_child(self: &Arc<Self>, child: &Arc<Element>) {
        child.remove();
        let connected = {
            let mut state = self.state.write();
            state.children.push(Arc::clone(child));
            state.connected
        };
        child.state.write().parent = Arc::downgrade(self);
        child.set_connected(connected);
    }

    /// Detaches this element (and its subtree) from the document.
    pub fn remove(&self) {
        let parent = {
            let mut state = self.state.write();
            std::mem::replace(&mut state.parent, Weak::new())
        };
        if let Some(parent) = parent.upgrade() {
            parent
                .state
                .write()
                .children
                .retain(|existing| existing.id != self.id);
        }
        self.set_connected(false);
    }

    fn set_connected(&self, connected: bool) {
        let children = {
            let mut state = self.state.write();
            state.connected = connected;
            state.children.clone()
        };
        for child in children {
            child.set_connected(connected);
        }
    }

    /// `contenteditable` resolves against ancestors when not set explicitly.
    pub fn is_content_editable(&self) -> bool {
        match self.attribute("contenteditable").as_deref() {
            Some("") | Some("true") | Some("plaintext-only") => true,
            Some("false") => false,
            _ => self
                .parent()
                .map(|parent| parent.is_content_editable())
                .unwrap_or(false),
        }
    }

    pub fn add_event_listener(&self, kind: &str, listener: Listener) {
        self.listeners.write().push((kind.to_string(), listener));
    }

    /// Event kinds dispatched with this element as target, in order.
    pub fn dispatched_events(&self) -> Vec<String> {
        self.dispatched.lock().clone()
    }

    fn listeners_for(&self, kind: &str) -> Vec<Listener> {
        self.listeners
            .read()
            .iter()
            .filter(|(registered, _)| registered == kind)
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

pub struct Document {
    url: String,
    body: Arc<Element>,
    next_id: AtomicU64,
    active: RwLock<Option<Arc<Element>>>,
    native_setters: RwLock<HashMap<ControlKind, ValueSetter>>,
    listeners: RwLock<Vec<(String, Listener)>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document").field("url", &self.url).finish()
    }
}

impl Document {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        let native: ValueSetter = Arc::new(|element: &Element, text: &str| {
            element.store_value(text);
        });
        let mut native_setters = HashMap::new();
        native_setters.insert(ControlKind::TextArea, Arc::clone(&native));
        native_setters.insert(ControlKind::Input, native);

        Arc::new(Self {
            url: url.into(),
            body: Element::new(ElementId(0), "body", true),
            next_id: AtomicU64::new(1),
            active: RwLock::new(None),
            native_setters: RwLock::new(native_setters),
            listeners: RwLock::new(Vec::new()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &Arc<Element> {
        &self.body
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> Arc<Element> {
        let id = ElementId(self.next_id.fetch_add(1, Ordering::SeqCst));
        Element::new(id, tag, false)
    }

    /// Connected elements in document order, starting at `body`.
    pub fn elements(&self) -> Vec<Arc<Element>> {
        let mut out = Vec::new();
        let mut stack = vec![Arc::clone(&self.body)];
        while let Some(element) = stack.pop() {
            let mut children = element.children();
            children.reverse();
            stack.extend(children);
            out.push(element);
        }
        out
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Arc<Element>>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query(&selector))
    }

    pub fn query(&self, selector: &Selector) -> Option<Arc<Element>> {
        self.elements()
            .into_iter()
            .find(|element| selector.matches(element))
    }

    pub fn query_all(&self, selector: &Selector) -> Vec<Arc<Element>> {
        self.elements()
            .into_iter()
            .filter(|element| selector.matches(element))
            .collect()
    }

    pub fn active_element(&self) -> Option<Arc<Element>> {
        self.active.read().clone()
    }

    /// Focuses a connected element. Returns false for detached ones.
    pub fn focus(&self, element: &Arc<Element>) -> bool {
        if !element.is_connected() {
            return false;
        }
        *self.active.write() = Some(Arc::clone(element));
        self.dispatch_event(element, "focus", false);
        true
    }

    /// Prototype-level setter for a control kind, if the page left it reachable.
    pub fn native_setter(&self, kind: ControlKind) -> Option<ValueSetter> {
        self.native_setters.read().get(&kind).cloned()
    }

    pub fn remove_native_setter(&self, kind: ControlKind) -> Option<ValueSetter> {
        self.native_setters.write().remove(&kind)
    }

    pub fn add_event_listener(&self, kind: &str, listener: Listener) {
        self.listeners.write().push((kind.to_string(), listener));
    }

    /// Runs target listeners, then ancestors and document listeners when the
    /// event bubbles. Listener lists are snapshotted per node.
    pub fn dispatch_event(&self, target: &Arc<Element>, kind: &str, bubbles: bool) {
        target.dispatched.lock().push(kind.to_string());
        let event = Event {
            kind: kind.to_string(),
            bubbles,
            target: Arc::clone(target),
        };

        for listener in target.listeners_for(kind) {
            listener(&event);
        }
        if !bubbles {
            return;
        }
        let mut current = target.parent();
        while let Some(node) = current {
            for listener in node.listeners_for(kind) {
                listener(&event);
            }
            current = node.parent();
        }
        if target.is_connected() {
            let document_listeners: Vec<Listener> = self
                .listeners
                .read()
                .iter()
                .filter(|(registered, _)| registered == kind)
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in document_listeners {
                listener(&event);
            }
        }
    }

    /// Indented `tag#id.class` lines for diagnostics.
    pub fn outline(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![(Arc::clone(&self.body), 0usize)];
        while let Some((element, depth)) = stack.pop() {
            out.push(format!("{}{}", "  ".repeat(depth), element.describe()));
            let mut children = element.children();
            children.reverse();
            stack.extend(children.into_iter().map(|child| (child, depth + 1)));
        }
        out
    }
}

/// Stand-in for a framework's controlled-input bookkeeping.
///
/// Installs an instance override of `value` that records every assignment as
/// the "last known" value, and listens for `input` at the document root. A
/// change is reported only when the live value differs from the recorded
/// one, so writes made through the override are invisible to it.
pub struct FrameworkTracker {
    element: Weak<Element>,
    tracked: Mutex<String>,
    changes: Mutex<Vec<String>>,
}

impl FrameworkTracker {
    pub fn attach(document: &Document, element: &Arc<Element>) -> Arc<Self> {
        let tracker = Arc::new(Self {
            element: Arc::downgrade(element),
            tracked: Mutex::new(element.value()),
            changes: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&tracker);
        element.set_value_override(Arc::new(move |target: &Element, text: &str| {
            if let Some(tracker) = weak.upgrade() {
                *tracker.tracked.lock() = text.to_string();
            }
            target.store_value(text);
        }));

        let weak = Arc::downgrade(&tracker);
        let watched = element.id();
        document.add_event_listener(
            "input",
            Arc::new(move |event: &Event| {
                if event.target.id() != watched {
                    return;
                }
                if let Some(tracker) = weak.upgrade() {
                    tracker.observe();
                }
            }),
        );
        tracker
    }

    fn observe(&self) {
        let Some(element) = self.element.upgrade() else {
            return;
        };
        let current = element.value();
        let mut tracked = self.tracked.lock();
        if *tracked != current {
            *tracked = current.clone();
            self.changes.lock().push(current);
        }
    }

    /// Values the framework's change handler has seen.
    pub fn changes(&self) -> Vec<String> {
        self.changes.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (Arc<Document>, Arc<Element>) {
        let doc = Document::new("https://chat.deepseek.com/");
        let form = doc.create_element("form");
        let input = doc.create_element("textarea");
        input.set_attribute("id", "chat-input");
        form.append_child(&input);
        doc.body().append_child(&form);
        (doc, input)
    }

    #[test]
    fn append_and_remove_track_connection() {
        let (doc, input) = page();
        assert!(input.is_connected());
        input.remove();
        assert!(!input.is_connected());
        assert!(doc.query_selector("#chat-input").unwrap().is_none());
    }

    #[test]
    fn events_bubble_to_ancestors_and_document() {
        let (doc, input) = page();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        input
            .parent()
            .unwrap()
            .add_event_listener("input", Arc::new(move |_: &Event| s.lock().push("form")));
        let s = Arc::clone(&seen);
        doc.add_event_listener("input", Arc::new(move |_: &Event| s.lock().push("document")));

        doc.dispatch_event(&input, "input", true);
        doc.dispatch_event(&input, "focus", false);
        assert_eq!(*seen.lock(), vec!["form", "document"]);
        assert_eq!(input.dispatched_events(), vec!["input", "focus"]);
    }

    #[test]
    fn contenteditable_is_inherited() {
        let doc = Document::new("https://chat.kimi.ai/");
        let editor = doc.create_element("div");
        editor.set_attribute("contenteditable", "true");
        let line = doc.create_element("p");
        editor.append_child(&line);
        assert!(line.is_content_editable());
        line.set_attribute("contenteditable", "false");
        assert!(!line.is_content_editable());
    }

    #[test]
    fn tracker_ignores_writes_through_the_override() {
        let (doc, input) = page();
        let tracker = FrameworkTracker::attach(&doc, &input);

        input.assign_value("typed");
        doc.dispatch_event(&input, "input", true);
        assert!(tracker.changes().is_empty());

        input.store_value("native");
        doc.dispatch_event(&input, "input", true);
        assert_eq!(tracker.changes(), vec!["native"]);
    }

    #[test]
    fn set_text_content_detaches_children() {
        let doc = Document::new("https://chat.kimi.ai/");
        let editor = doc.create_element("div");
        doc.body().append_child(&editor);
        let old = doc.create_element("p");
        editor.append_child(&old);

        editor.set_text_content("fresh");
        assert_eq!(editor.text_content(), "fresh");
        assert!(!old.is_connected());
    }
}
