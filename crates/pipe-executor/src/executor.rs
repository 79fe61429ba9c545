//! Pipe state machine: IDLE -> RUNNING -> SUCCESS | ERROR -> IDLE.
//!
//! Only one run exists at a time. The slot is held from trigger until the
//! settle window after the terminal state has elapsed, so a slow transform
//! keeps later triggers out. Every run owns a cancellation token; once it is
//! cancelled (reset or shutdown) the run can no longer write to the console.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use command_bridge::{Command, CommandBridge, CommandResponse, Delivery, TabSwitcher, Target};
use parking_lot::Mutex;
use synapse_core_types::RunId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{PipeError, TransformError};
use crate::model::{LogEntry, PipeConsole, PipeDef, PipeRun, PipeStatus, StageTimings};
use crate::ports::TransformPort;

/// Result of asking for a run.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The handle resolves with the terminal status once the run has reset.
    Started {
        run: RunId,
        handle: JoinHandle<PipeStatus>,
    },
    /// Another pipe holds the slot; nothing happened.
    Rejected { running: String },
}

impl TriggerOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, TriggerOutcome::Started { .. })
    }
}

struct Inner {
    bridge: Arc<dyn CommandBridge>,
    switcher: Arc<dyn TabSwitcher>,
    transform: Arc<dyn TransformPort>,
    timings: StageTimings,
    console: watch::Sender<PipeConsole>,
    active: Mutex<Option<RunId>>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct PipeExecutor {
    inner: Arc<Inner>,
}

impl PipeExecutor {
    pub fn new(
        bridge: Arc<dyn CommandBridge>,
        switcher: Arc<dyn TabSwitcher>,
        transform: Arc<dyn TransformPort>,
        timings: StageTimings,
    ) -> Self {
        let (console, _) = watch::channel(PipeConsole::default());
        Self {
            inner: Arc::new(Inner {
                bridge,
                switcher,
                transform,
                timings,
                console,
                active: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn timings(&self) -> StageTimings {
        self.inner.timings
    }

    pub fn console(&self) -> PipeConsole {
        self.inner.console.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipeConsole> {
        self.inner.console.subscribe()
    }

    /// Starts `pipe` unless a run already holds the slot. Must be called
    /// inside a tokio runtime.
    pub fn trigger(&self, pipe: &PipeDef) -> TriggerOutcome {
        let mut active = self.inner.active.lock();
        if active.is_some() {
            let running = self
                .inner
                .console
                .borrow()
                .running_pipe
                .clone()
                .unwrap_or_default();
            info!(target: "pipe", requested = %pipe.id, %running, "pipe busy; trigger ignored");
            return TriggerOutcome::Rejected { running };
        }
        if self.inner.shutdown.is_cancelled() {
            return TriggerOutcome::Rejected {
                running: String::new(),
            };
        }

        let run = RunId::new();
        let token = self.inner.shutdown.child_token();
        *active = Some(run.clone());
        self.inner.console.send_modify(|console| {
            console.status = PipeStatus::Running;
            console.running_pipe = Some(pipe.id.clone());
            console.last_run = Some(PipeRun::new(run.clone(), pipe));
        });
        drop(active);

        info!(target: "pipe", pipe = %pipe.id, %run, "pipe started");
        let inner = Arc::clone(&self.inner);
        let pipe = pipe.clone();
        let run_id = run.clone();
        let handle = tokio::spawn(async move {
            let outcome = inner.execute(&run_id, &token, &pipe).await;
            inner.finish(&run_id, &token, outcome).await
        });
        TriggerOutcome::Started { run, handle }
    }

    /// Cancels the current run and its settle timer, and refuses new triggers.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    /// Appends a console line for `run`. Dropped once the run is cancelled or
    /// superseded.
    fn log(&self, run: &RunId, token: &CancellationToken, line: impl Into<String>) -> bool {
        if token.is_cancelled() {
            return false;
        }
        self.append(run, line.into())
    }

    fn append(&self, run: &RunId, line: String) -> bool {
        debug!(target: "pipe", %run, %line, "console");
        self.console.send_if_modified(|console| match console.last_run.as_mut() {
            Some(current) if current.id == *run => {
                current.log.push(LogEntry { at: Utc::now(), line });
                true
            }
            _ => false,
        })
    }

    async fn pause(&self, token: &CancellationToken, delay: Duration) -> Result<(), PipeError> {
        tokio::select! {
            _ = token.cancelled() => Err(PipeError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    async fn guarded<T, F>(&self, token: &CancellationToken, work: F) -> Result<T, PipeError>
    where
        F: Future<Output = Result<T, PipeError>>,
    {
        tokio::select! {
            _ = token.cancelled() => Err(PipeError::Cancelled),
            result = work => result,
        }
    }

    async fn execute(
        &self,
        run: &RunId,
        token: &CancellationToken,
        pipe: &PipeDef,
    ) -> Result<(), PipeError> {
        self.log(run, token, format!("[System] Initializing Pipe: {}", pipe.name));

        // EXTRACT
        self.log(run, token, format!("[Extract] Capturing context from {}...", pipe.source));
        self.pause(token, self.timings.extract).await?;
        let context = self.guarded(token, self.extract(pipe)).await?;
        self.log(
            run,
            token,
            format!("[Extract] Success ({} chars)", context.chars().count()),
        );

        // TRANSFORM
        let payload = if pipe.is_thinking_mode {
            let budget_k = self.transform.thinking_budget() / 1024;
            self.log(
                run,
                token,
                format!(
                    "[Think] Routing to {} (Budget: {budget_k}k tokens)...",
                    self.transform.deep_model()
                ),
            );
            self.log(run, token, "[Think] Analyzing dependencies and second-order effects...");
            let text = self
                .guarded(token, self.think(&pipe.transform_prompt, &context))
                .await?;
            self.log(run, token, "[Think] Reasoning complete.");
            text
        } else {
            self.log(run, token, "[Transform] Applying prompt template...");
            self.pause(token, self.timings.transform).await?;
            pipe.template_text(&context)
        };

        // SWITCH
        self.log(run, token, format!("[Switch] Focusing tab: {}", pipe.target));
        self.guarded(token, async {
            self.switcher
                .focus(&pipe.target)
                .await
                .map(|_| ())
                .map_err(|cause| PipeError::Switch {
                    target: pipe.target.clone(),
                    cause,
                })
        })
        .await?;
        self.pause(token, self.timings.switch).await?;

        // INJECT
        self.log(run, token, "[Inject] Sending payload to Active Tab...");
        let delivery = self
            .guarded(token, async {
                self.bridge
                    .send(Command::inject(payload), Target::ActiveTab)
                    .await
                    .map_err(PipeError::from)
            })
            .await?;
        match delivery {
            Delivery::Dropped { reason } => {
                warn!(target: "pipe", %run, %reason, "inject not delivered");
                self.log(run, token, format!("[Warn] Payload not delivered: {reason}"));
            }
            Delivery::Delivered { response } => {
                if let Some(CommandResponse::Ack(ack)) = response {
                    if !ack.ok {
                        return Err(PipeError::Inject(ack.error.unwrap_or_default()));
                    }
                }
            }
        }

        // EXECUTE
        self.log(run, token, "[Execute] Triggering send event...");
        if pipe.auto_submit {
            let delivery = self
                .guarded(token, async {
                    self.bridge
                        .send(Command::SubmitInput, Target::ActiveTab)
                        .await
                        .map_err(PipeError::from)
                })
                .await?;
            if let Some(CommandResponse::Ack(ack)) = delivery.response() {
                if !ack.ok {
                    return Err(PipeError::Submit(ack.error.clone().unwrap_or_default()));
                }
            }
        }
        Ok(())
    }

    async fn extract(&self, pipe: &PipeDef) -> Result<String, PipeError> {
        if !pipe.reads_current() {
            self.switcher
                .focus(&pipe.source)
                .await
                .map_err(|err| PipeError::Extract {
                    origin: pipe.source.clone(),
                    reason: err.to_string(),
                })?;
        }
        let delivery = self
            .bridge
            .send(Command::GetPageContent, Target::ActiveTab)
            .await?;
        match delivery {
            Delivery::Delivered {
                response: Some(CommandResponse::PageContent { content }),
            } => Ok(content),
            Delivery::Dropped { reason } => Err(PipeError::Extract {
                origin: pipe.source.clone(),
                reason,
            }),
            Delivery::Delivered { .. } => Err(PipeError::Extract {
                origin: pipe.source.clone(),
                reason: "page returned no content".into(),
            }),
        }
    }

    async fn think(&self, prompt: &str, context: &str) -> Result<String, PipeError> {
        let call = self.transform.deep_transform(prompt, context);
        let text = match self.timings.transform_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| TransformError::Timeout(limit))??,
            None => call.await?,
        };
        if text.trim().is_empty() {
            return Err(TransformError::Empty.into());
        }
        Ok(text)
    }

    async fn finish(
        &self,
        run: &RunId,
        token: &CancellationToken,
        outcome: Result<(), PipeError>,
    ) -> PipeStatus {
        let status = match outcome {
            Ok(()) => PipeStatus::Success,
            Err(err) => {
                if token.is_cancelled() {
                    self.append(run, format!("[Error] Pipe failed: {}", PipeError::Cancelled));
                } else {
                    self.log(run, token, format!("[Error] Pipe failed: {err}"));
                }
                PipeStatus::Error
            }
        };
        self.console.send_modify(|console| {
            if let Some(current) = console.last_run.as_mut().filter(|current| current.id == *run) {
                current.status = status;
                console.status = status;
            }
        });
        match status {
            PipeStatus::Success => info!(target: "pipe", %run, "pipe succeeded"),
            _ => warn!(target: "pipe", %run, "pipe failed"),
        }

        if !token.is_cancelled() {
            let _ = self.pause(token, self.timings.settle).await;
        }
        self.reset(run, token);
        status
    }

    fn reset(&self, run: &RunId, token: &CancellationToken) {
        token.cancel();
        let mut active = self.active.lock();
        if active.as_ref() == Some(run) {
            *active = None;
            self.console.send_modify(|console| {
                console.status = PipeStatus::Idle;
                console.running_pipe = None;
            });
            debug!(target: "pipe", %run, "console reset to idle");
        }
    }
}
