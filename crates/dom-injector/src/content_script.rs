//! Page-side command handler.

use std::sync::Arc;

use command_bridge::{Command, CommandHandler, CommandResponse, InjectionAck, SenderInfo};
use selector_config::{ConfigError, EffectiveSelectors, SelectorConfigStore};
use tracing::{debug, error, info, warn};

use crate::diagnostics::{DiagnosticSink, EmergencyReport, LogDiagnostics};
use crate::dom::Document;
use crate::injector::NativeValueInjector;
use crate::resolver::{DefaultElementResolver, ResolveError, Resolved};

/// What the content script can see of the page it runs in.
pub trait PageHost: Send + Sync {
    /// The editable surface currently mounted, if any.
    fn current_document(&self) -> Option<Arc<Document>>;

    /// Chat transcript as rendered text.
    fn transcript(&self) -> String;
}

pub struct ContentScript {
    host: Arc<dyn PageHost>,
    store: Arc<SelectorConfigStore>,
    resolver: Arc<DefaultElementResolver>,
    injector: NativeValueInjector,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl ContentScript {
    pub fn new(host: Arc<dyn PageHost>, store: Arc<SelectorConfigStore>) -> Self {
        Self {
            host,
            store,
            resolver: Arc::new(DefaultElementResolver::new()),
            injector: NativeValueInjector::new(),
            diagnostics: Arc::new(LogDiagnostics),
        }
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<DefaultElementResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    fn selectors_for(&self, document: &Document) -> Result<EffectiveSelectors, ConfigError> {
        let effective = self.store.effective_selectors(document.url())?;
        if effective.is_fallback() {
            info!(target: "content-script", url = document.url(), "no platform config; using generic selectors");
        }
        Ok(effective)
    }

    fn locate(
        &self,
        action: &str,
        document: &Document,
        effective: &EffectiveSelectors,
        selectors: &[String],
    ) -> Result<Resolved, ResolveError> {
        self.resolver
            .resolve_with(effective.strategy, document, selectors)
            .map_err(|err| {
                error!(target: "content-script", action, url = document.url(), error = %err, "DOM error");
                self.diagnostics.report(EmergencyReport::new(
                    document.url(),
                    action,
                    err.trace().to_vec(),
                    document.outline(),
                ));
                err
            })
    }

    /// Handles `INJECT_TEXT`. Never touches the DOM while the killswitch is set.
    pub fn inject_text(&self, text: &str) -> InjectionAck {
        let Some(document) = self.host.current_document() else {
            warn!(target: "content-script", "no document mounted");
            return InjectionAck::failure("no document mounted");
        };
        let effective = match self.selectors_for(&document) {
            Ok(effective) => effective,
            Err(err) => {
                warn!(target: "content-script", error = %err, "injection refused");
                return InjectionAck::failure(err.to_string());
            }
        };
        let resolved = match self.locate("INJECT_TEXT", &document, &effective, &effective.input) {
            Ok(resolved) => resolved,
            Err(err) => return InjectionAck::failure(err.to_string()),
        };

        document.focus(&resolved.element);
        match self.injector.inject(&document, &resolved.element, text) {
            Ok(path) => {
                info!(target: "content-script", selector = %resolved.selector, ?path, "text injected");
                InjectionAck::success(resolved.selector)
            }
            Err(err) => InjectionAck::failure(err.to_string()),
        }
    }

    /// Handles `SUBMIT_INPUT`: clicks the first submit control that resolves.
    pub fn submit(&self) -> InjectionAck {
        let Some(document) = self.host.current_document() else {
            return InjectionAck::failure("no document mounted");
        };
        let effective = match self.selectors_for(&document) {
            Ok(effective) => effective,
            Err(err) => {
                warn!(target: "content-script", error = %err, "submit refused");
                return InjectionAck::failure(err.to_string());
            }
        };
        let resolved = match self.locate("SUBMIT_INPUT", &document, &effective, &effective.submit) {
            Ok(resolved) => resolved,
            Err(err) => return InjectionAck::failure(err.to_string()),
        };
        if !resolved.element.is_connected() {
            return InjectionAck::failure(format!(
                "element {} was detached before submit",
                resolved.element.describe()
            ));
        }
        document.dispatch_event(&resolved.element, "click", true);
        info!(target: "content-script", selector = %resolved.selector, "submit triggered");
        InjectionAck::success(resolved.selector)
    }

    pub fn page_content(&self) -> String {
        self.host.transcript()
    }
}

impl CommandHandler for ContentScript {
    fn handle(&self, command: &Command, sender: &SenderInfo) -> Option<CommandResponse> {
        debug!(target: "content-script", action = command.action(), sender = %sender.id, "command received");
        let response = match command {
            Command::InjectText { payload } => CommandResponse::Ack(self.inject_text(payload)),
            Command::SubmitInput => CommandResponse::Ack(self.submit()),
            Command::GetPageContent => CommandResponse::PageContent {
                content: self.page_content(),
            },
        };
        Some(response)
    }
}
