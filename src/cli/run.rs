use anyhow::{bail, Context, Result};
use clap::Args;
use pipe_executor::{PipeConsole, PipeExecutor, PipeRun, PipeStatus, TriggerOutcome};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Pipe id from the catalog (see `synapse pipes`)
    pub pipe: String,

    /// Click the target page's send control after injecting
    #[arg(long)]
    pub auto_submit: bool,
}

#[derive(Serialize)]
struct RunReport {
    run: PipeRun,
    target_input: Option<String>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let catalog = ctx.catalog()?;
    let mut pipe = catalog.require(&args.pipe)?.clone();
    if args.auto_submit {
        pipe.auto_submit = true;
    }

    let session = ctx.session().await?;
    let executor = session.executor(ctx.transform(), ctx.config().stage_timings());
    let mut console = executor.subscribe();
    let handle = match executor.trigger(&pipe) {
        TriggerOutcome::Started { handle, .. } => handle,
        TriggerOutcome::Rejected { running } => bail!("pipe {running} is already running"),
    };

    let run = follow_console(&mut console, output == OutputFormat::Human, &pipe.id).await?;

    // Nothing else will trigger in this process, so skip the settle window.
    stop_executor(&executor, handle).await?;

    let Some(run) = run else {
        bail!("pipe {} produced no run record", pipe.id);
    };
    let status = run.status;
    let report = RunReport {
        target_input: session
            .browser()
            .page_for(&pipe.target)
            .map(|page| page.input_text()),
        run,
    };
    emit(output, &report, || {
        println!("Status: {}", report.run.status);
        if let Some(text) = &report.target_input {
            println!("--- {} input ---", pipe.target);
            println!("{text}");
        }
    })?;

    if status == PipeStatus::Error {
        bail!("pipe {} failed", pipe.id);
    }
    Ok(())
}

/// Echoes console lines until the run record is terminal. The console status
/// alone is not enough: it may already be back to IDLE after the settle reset.
async fn follow_console(
    console: &mut watch::Receiver<PipeConsole>,
    echo: bool,
    pipe_id: &str,
) -> Result<Option<PipeRun>> {
    let mut printed = 0;
    loop {
        let snapshot = console.borrow_and_update().clone();
        if echo {
            let lines = snapshot.lines();
            for line in lines.iter().skip(printed) {
                println!("{line}");
            }
            printed = lines.len();
        }
        if snapshot
            .last_run
            .as_ref()
            .is_some_and(|run| run.status.is_terminal())
        {
            return Ok(snapshot.last_run);
        }
        if console.changed().await.is_err() {
            bail!("pipe console closed before {pipe_id} finished");
        }
    }
}

async fn stop_executor(
    executor: &PipeExecutor,
    handle: JoinHandle<PipeStatus>,
) -> Result<PipeStatus> {
    executor.shutdown();
    handle.await.context("pipe task did not complete")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use command_bridge::BackendKind;
    use dom_injector::MockBrowser;
    use pipe_executor::{OfflineTransform, PipeCatalog, StageTimings};
    use selector_config::SelectorConfigStore;

    use crate::session::Session;

    fn quick_timings() -> StageTimings {
        StageTimings {
            extract: Duration::ZERO,
            transform: Duration::ZERO,
            switch: Duration::ZERO,
            settle: Duration::from_millis(1),
            transform_timeout: None,
        }
    }

    #[tokio::test]
    async fn console_follow_ends_after_the_settle_reset() {
        let session = Session::with_store(
            Arc::new(SelectorConfigStore::builtin()),
            MockBrowser::with_default_pages(),
            Some(BackendKind::Simulated),
        )
        .unwrap();
        let executor = session.executor(Arc::new(OfflineTransform), quick_timings());
        let mut console = executor.subscribe();
        let pipe = PipeCatalog::builtin().require("p3").unwrap().clone();

        let handle = match executor.trigger(&pipe) {
            TriggerOutcome::Started { handle, .. } => handle,
            TriggerOutcome::Rejected { .. } => panic!("rejected"),
        };
        assert_eq!(handle.await.unwrap(), PipeStatus::Success);
        assert_eq!(executor.console().status, PipeStatus::Idle);

        let run = tokio::time::timeout(
            Duration::from_secs(2),
            follow_console(&mut console, false, &pipe.id),
        )
        .await
        .expect("console follow returned")
        .unwrap()
        .expect("run record");
        assert_eq!(run.status, PipeStatus::Success);
    }

    #[tokio::test]
    async fn panicked_run_task_is_reported() {
        let session = Session::with_store(
            Arc::new(SelectorConfigStore::builtin()),
            MockBrowser::with_default_pages(),
            Some(BackendKind::Simulated),
        )
        .unwrap();
        let executor = session.executor(Arc::new(OfflineTransform), quick_timings());
        let handle: JoinHandle<PipeStatus> = tokio::spawn(async { panic!("stage blew up") });

        let err = stop_executor(&executor, handle).await.unwrap_err();
        assert!(err.to_string().contains("pipe task did not complete"));
    }
}
