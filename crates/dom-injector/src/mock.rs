//! In-process browser with canned chat pages, used by the simulated topology
//! and by tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use command_bridge::{BridgeError, TabSwitcher};
use parking_lot::RwLock;
use synapse_core_types::TabId;
use tracing::info;

use crate::content_script::PageHost;
use crate::dom::{Document, Element, Event, FrameworkTracker};

pub struct MockPage {
    document: Arc<Document>,
    input: Arc<Element>,
    tracker: Option<Arc<FrameworkTracker>>,
    transcript: RwLock<Vec<(String, String)>>,
    submits: Arc<AtomicUsize>,
}

impl MockPage {
    /// Controlled `<textarea id="chat-input">` managed by a framework tracker.
    pub fn deepseek() -> Arc<Self> {
        let document = Document::new("https://chat.deepseek.com/");
        let form = document.create_element("div");
        form.set_attribute("class", "composer");
        let input = document.create_element("textarea");
        input.set_attribute("id", "chat-input");
        input.set_attribute("placeholder", "Send a message...");
        let send = document.create_element("div");
        send.set_attribute("role", "button");
        send.set_attribute("aria-label", "Send");
        form.append_child(&input);
        form.append_child(&send);
        document.body().append_child(&form);

        let tracker = FrameworkTracker::attach(&document, &input);
        Self::assemble(document, input, Some(tracker), &send)
    }

    /// Rich-text editor surface.
    pub fn kimi() -> Arc<Self> {
        let document = Document::new("https://chat.kimi.ai/");
        let shell = document.create_element("div");
        shell.set_attribute("class", "chat-shell");
        let input = document.create_element("div");
        input.set_attribute("class", "input-editor");
        input.set_attribute("contenteditable", "true");
        let send = document.create_element("button");
        send.set_attribute("class", "send-btn");
        shell.append_child(&input);
        shell.append_child(&send);
        document.body().append_child(&shell);

        let page = Self::assemble(document, input, None, &send);
        page.push_message("user", "Compare the two retrieval strategies we discussed.");
        page.push_message(
            "assistant",
            "Dense retrieval wins on recall; BM25 stays cheaper and more predictable.",
        );
        page
    }

    /// Uncontrolled textarea with a plain submit button.
    pub fn generic(url: impl Into<String>) -> Arc<Self> {
        let document = Document::new(url);
        let input = document.create_element("textarea");
        let send = document.create_element("button");
        send.set_attribute("type", "submit");
        document.body().append_child(&input);
        document.body().append_child(&send);
        Self::assemble(document, input, None, &send)
    }

    fn assemble(
        document: Arc<Document>,
        input: Arc<Element>,
        tracker: Option<Arc<FrameworkTracker>>,
        send: &Arc<Element>,
    ) -> Arc<Self> {
        let submits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&submits);
        send.add_event_listener(
            "click",
            Arc::new(move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        Arc::new(Self {
            document,
            input,
            tracker,
            transcript: RwLock::new(Vec::new()),
            submits,
        })
    }

    pub fn url(&self) -> &str {
        self.document.url()
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn input(&self) -> &Arc<Element> {
        &self.input
    }

    /// Text currently in the input, whichever editing model it uses.
    pub fn input_text(&self) -> String {
        if self.input.is_content_editable() {
            self.input.text_content()
        } else {
            self.input.value()
        }
    }

    pub fn tracker(&self) -> Option<&Arc<FrameworkTracker>> {
        self.tracker.as_ref()
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn push_message(&self, role: &str, text: &str) {
        self.transcript
            .write()
            .push((role.to_string(), text.to_string()));
    }

    pub fn render_transcript(&self) -> String {
        self.transcript
            .read()
            .iter()
            .map(|(role, text)| format!("{role}: {text}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl PageHost for MockPage {
    fn current_document(&self) -> Option<Arc<Document>> {
        Some(Arc::clone(&self.document))
    }

    fn transcript(&self) -> String {
        self.render_transcript()
    }
}

/// A strip of pages with one in front.
pub struct MockBrowser {
    pages: RwLock<Vec<Arc<MockPage>>>,
    active: RwLock<Option<usize>>,
}

impl MockBrowser {
    pub fn new(pages: Vec<Arc<MockPage>>) -> Arc<Self> {
        let active = if pages.is_empty() { None } else { Some(0) };
        Arc::new(Self {
            pages: RwLock::new(pages),
            active: RwLock::new(active),
        })
    }

    /// Kimi in front, DeepSeek and a translator behind it.
    pub fn with_default_pages() -> Arc<Self> {
        Self::new(vec![
            MockPage::kimi(),
            MockPage::deepseek(),
            MockPage::generic("https://translate.google.com/"),
        ])
    }

    pub fn open(&self, page: Arc<MockPage>) -> TabId {
        let mut pages = self.pages.write();
        pages.push(page);
        let index = pages.len() - 1;
        *self.active.write() = Some(index);
        TabId(index as u32 + 1)
    }

    pub fn pages(&self) -> Vec<Arc<MockPage>> {
        self.pages.read().clone()
    }

    pub fn active_page(&self) -> Option<Arc<MockPage>> {
        let index = (*self.active.read())?;
        self.pages.read().get(index).cloned()
    }

    pub fn page_for(&self, needle: &str) -> Option<Arc<MockPage>> {
        self.pages
            .read()
            .iter()
            .find(|page| page.url().contains(needle))
            .cloned()
    }
}

impl PageHost for MockBrowser {
    fn current_document(&self) -> Option<Arc<Document>> {
        self.active_page().map(|page| Arc::clone(page.document()))
    }

    fn transcript(&self) -> String {
        self.active_page()
            .map(|page| page.render_transcript())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TabSwitcher for MockBrowser {
    async fn focus(&self, target: &str) -> Result<Option<TabId>, BridgeError> {
        let index = self
            .pages
            .read()
            .iter()
            .position(|page| page.url().contains(target))
            .ok_or_else(|| BridgeError::NoMatchingTab(target.to_string()))?;
        *self.active.write() = Some(index);
        info!(target: "bridge", %target, tab = index + 1, "mock browser switched page");
        Ok(Some(TabId(index as u32 + 1)))
    }
}
