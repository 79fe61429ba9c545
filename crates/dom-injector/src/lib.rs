//! Content-script side of Synapse: find the chat input on a hosted page and
//! write into it so the page's own framework sees a user edit.

pub mod content_script;
pub mod diagnostics;
pub mod dom;
pub mod injector;
pub mod mock;
pub mod resolver;
pub mod selector;

pub use content_script::{ContentScript, PageHost};
pub use diagnostics::{DiagnosticSink, EmergencyReport, LogDiagnostics, RecordingDiagnostics};
pub use dom::{ControlKind, Document, Element, ElementId, Event, FrameworkTracker};
pub use injector::{InjectError, NativeValueInjector, WritePath, SYNTHETIC_EVENTS};
pub use mock::{MockBrowser, MockPage};
pub use resolver::{
    AttemptOutcome, DefaultElementResolver, ElementResolver, HeuristicResolver, ResolveError,
    Resolved, SelectorAttempt, WaterfallResolver,
};
pub use selector::{Selector, SelectorError};

use synapse_core_types::SynapseError;

impl From<InjectError> for SynapseError {
    fn from(err: InjectError) -> Self {
        SynapseError::new(err.to_string())
    }
}

impl From<ResolveError> for SynapseError {
    fn from(err: ResolveError) -> Self {
        SynapseError::new(err.to_string())
    }
}

impl From<SelectorError> for SynapseError {
    fn from(err: SelectorError) -> Self {
        SynapseError::new(err.to_string())
    }
}
