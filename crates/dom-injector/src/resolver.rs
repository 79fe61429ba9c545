//! Element resolution over an ordered selector list.

use std::fmt;
use std::sync::Arc;

use selector_config::Strategy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dom::{Document, Element};
use crate::selector::Selector;

/// What happened to one candidate selector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Matched,
    NoMatch,
    Invalid { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorAttempt {
    pub selector: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl fmt::Display for SelectorAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Matched => write!(f, "{} -> match", self.selector),
            AttemptOutcome::NoMatch => write!(f, "{} -> no match", self.selector),
            AttemptOutcome::Invalid { reason } => write!(f, "{} -> invalid ({reason})", self.selector),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Resolved {
    pub element: Arc<Element>,
    pub selector: String,
    pub trace: Vec<SelectorAttempt>,
}

#[derive(Clone, Debug, Error)]
pub enum ResolveError {
    #[error("no selector matched ({} tried)", .trace.len())]
    NotFound { trace: Vec<SelectorAttempt> },
}

impl ResolveError {
    pub fn trace(&self) -> &[SelectorAttempt] {
        match self {
            ResolveError::NotFound { trace } => trace,
        }
    }
}

pub trait ElementResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(&self, document: &Document, selectors: &[String]) -> Result<Resolved, ResolveError>;
}

/// Tries candidates in declared order; the first match in the connected tree wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaterfallResolver;

impl ElementResolver for WaterfallResolver {
    fn name(&self) -> &'static str {
        "waterfall"
    }

    fn resolve(&self, document: &Document, selectors: &[String]) -> Result<Resolved, ResolveError> {
        let mut trace = Vec::with_capacity(selectors.len());
        for raw in selectors {
            let outcome = match Selector::parse(raw) {
                Err(err) => {
                    warn!(target: "content-script", selector = %raw, error = %err, "invalid selector skipped");
                    AttemptOutcome::Invalid {
                        reason: err.to_string(),
                    }
                }
                Ok(selector) => match document.query(&selector) {
                    Some(element) => {
                        info!(target: "content-script", selector = %raw, element = %element.describe(), "selector matched");
                        trace.push(SelectorAttempt {
                            selector: raw.clone(),
                            outcome: AttemptOutcome::Matched,
                        });
                        return Ok(Resolved {
                            element,
                            selector: raw.clone(),
                            trace,
                        });
                    }
                    None => {
                        debug!(target: "content-script", selector = %raw, "no match");
                        AttemptOutcome::NoMatch
                    }
                },
            };
            trace.push(SelectorAttempt {
                selector: raw.clone(),
                outcome,
            });
        }
        Err(ResolveError::NotFound { trace })
    }
}

/// Slot for visual/structural ranking. Delegates to the waterfall until a
/// ranking implementation lands.
pub struct HeuristicResolver {
    fallback: Arc<dyn ElementResolver>,
}

impl HeuristicResolver {
    pub fn new(fallback: Arc<dyn ElementResolver>) -> Self {
        Self { fallback }
    }
}

impl Default for HeuristicResolver {
    fn default() -> Self {
        Self::new(Arc::new(WaterfallResolver))
    }
}

impl ElementResolver for HeuristicResolver {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn resolve(&self, document: &Document, selectors: &[String]) -> Result<Resolved, ResolveError> {
        debug!(target: "content-script", delegate = self.fallback.name(), "heuristic resolution");
        self.fallback.resolve(document, selectors)
    }
}

/// Routes each strategy to its own resolver.
pub struct DefaultElementResolver {
    waterfall: Arc<dyn ElementResolver>,
    heuristic: Arc<dyn ElementResolver>,
}

impl Default for DefaultElementResolver {
    fn default() -> Self {
        Self {
            waterfall: Arc::new(WaterfallResolver),
            heuristic: Arc::new(HeuristicResolver::default()),
        }
    }
}

impl DefaultElementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces only the HEURISTIC branch.
    pub fn with_heuristic(mut self, resolver: Arc<dyn ElementResolver>) -> Self {
        self.heuristic = resolver;
        self
    }

    pub fn for_strategy(&self, strategy: Strategy) -> &Arc<dyn ElementResolver> {
        match strategy {
            Strategy::Waterfall => &self.waterfall,
            Strategy::Heuristic => &self.heuristic,
        }
    }

    pub fn resolve_with(
        &self,
        strategy: Strategy,
        document: &Document,
        selectors: &[String],
    ) -> Result<Resolved, ResolveError> {
        self.for_strategy(strategy).resolve(document, selectors)
    }
}
