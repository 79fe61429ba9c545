use anyhow::{bail, Context, Result};
use clap::Args;
use command_bridge::{Command, CommandResponse, Delivery, InjectionAck, Target};
use dom_injector::MockPage;
use serde::Serialize;
use tracing::info;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct InjectArgs {
    /// Page URL; pages other than the builtin chat sites get a generic textarea
    pub url: String,

    /// Text to place in the page's input box
    pub text: String,

    /// Also click the page's send control
    #[arg(long)]
    pub submit: bool,
}

#[derive(Serialize)]
struct InjectReport {
    url: String,
    inject: InjectionAck,
    submit: Option<InjectionAck>,
    input_text: String,
}

pub async fn cmd_inject(args: InjectArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let parsed = url::Url::parse(&args.url).with_context(|| format!("invalid URL {}", args.url))?;
    let host = parsed
        .host_str()
        .with_context(|| format!("{} has no host", args.url))?
        .to_string();

    let mut session = ctx.session().await?;
    let page = match session.browser().page_for(&host) {
        Some(page) => {
            session.switcher().focus(&host).await?;
            page
        }
        None => {
            info!(%host, "no builtin page for host; opening a generic one");
            let page = MockPage::generic(args.url.clone());
            session.open_page(page.clone())?;
            page
        }
    };

    let sidebar = session.sidebar();
    let inject = acknowledge(sidebar.send(Command::inject(args.text), Target::ActiveTab).await?)?;
    let submit = if args.submit && inject.ok {
        Some(acknowledge(
            sidebar.send(Command::SubmitInput, Target::ActiveTab).await?,
        )?)
    } else {
        None
    };

    let report = InjectReport {
        url: page.url().to_string(),
        input_text: page.input_text(),
        inject,
        submit,
    };
    emit(output, &report, || {
        match (&report.inject.selector, &report.inject.error) {
            (Some(selector), _) if report.inject.ok => {
                println!("Injected into {} via {}", report.url, selector)
            }
            (_, error) => println!(
                "Injection into {} failed: {}",
                report.url,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
        if let Some(submit) = &report.submit {
            println!("Submit: {}", if submit.ok { "clicked" } else { "failed" });
        }
    })?;

    if !report.inject.ok {
        bail!(
            "injection failed: {}",
            report.inject.error.as_deref().unwrap_or("unknown error")
        );
    }
    if report.submit.as_ref().is_some_and(|ack| !ack.ok) {
        bail!("submit failed");
    }
    Ok(())
}

fn acknowledge(delivery: Delivery) -> Result<InjectionAck> {
    match delivery {
        Delivery::Delivered {
            response: Some(CommandResponse::Ack(ack)),
        } => Ok(ack),
        Delivery::Delivered { .. } => bail!("page answered without an acknowledgement"),
        Delivery::Dropped { reason } => bail!("command not delivered: {reason}"),
    }
}
