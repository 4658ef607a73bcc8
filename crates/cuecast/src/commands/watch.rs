//! `watch`: run automation rules against live OBS events until Ctrl-C.

use std::sync::Arc;

use cuecast_api::StreamerBotClient;
use cuecast_core::{
    AutomationEngine, AutomationNotice, AutomationTarget, ConnectionClient, ConnectionState,
    ObsDispatcher,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    client: &ConnectionClient,
    resolved: &Resolved,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let path = args
        .rules
        .or_else(|| resolved.profile.rules.clone())
        .ok_or_else(|| CliError::Validation {
            field: "rules".into(),
            reason: "no rules file; pass --rules or set `rules` in the profile".into(),
        })?;
    let rules = cuecast_config::load_rules(&path)?;

    let bot = if args.no_streamerbot {
        None
    } else {
        connect_streamerbot(resolved).await?
    };

    let (retry, throttle) = cuecast_config::automation_config(&resolved.profile)?;
    let engine = AutomationEngine::new(
        Arc::new(ObsDispatcher::new(client.clone())),
        bot.clone().map(|b| b as Arc<dyn AutomationTarget>),
        retry,
        throttle,
    );
    let count = rules.len();
    engine.set_rules(rules).await;

    let color = output::should_color(&global.color);
    if !global.quiet {
        eprintln!(
            "Watching {count} rule(s) from {} (Ctrl-C to stop)",
            path.display()
        );
    }

    let mut notices = engine.notices();
    let mut states = client.state_changes();
    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let engine = engine.clone();
        let client = client.clone();
        let cancel = cancel.clone();
        async move { engine.run(client, cancel).await }
    });

    let outcome = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
            notice = notices.recv() => match notice {
                Ok(notice) => print_notice(&notice, global, color),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notice output lagged"),
                Err(RecvError::Closed) => break Ok(()),
            },
            state = states.recv() => match state {
                Ok(state) => {
                    if !global.quiet {
                        let ok = state == ConnectionState::Connected;
                        eprintln!("{} {state}", output::status_text("obs:", ok, color));
                    }
                    if state.is_terminal() {
                        break Err(CliError::NotConnected { state: state.to_string() });
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    cancel.cancel();
    let _ = runner.await;
    if let Some(bot) = bot {
        bot.disconnect().await;
    }

    let stats = engine.statistics().await;
    if !global.quiet {
        eprintln!(
            "{} rule(s), {} enabled, {} trigger(s)",
            stats.total_rules, stats.enabled_rules, stats.total_triggers
        );
    }
    outcome
}

/// Connect to Streamer.bot when the profile configures it. A failed
/// connect is logged and left to the engine's availability guard.
async fn connect_streamerbot(
    resolved: &Resolved,
) -> Result<Option<Arc<StreamerBotClient>>, CliError> {
    let Some(config) = cuecast_config::streamerbot_config(&resolved.profile)? else {
        return Ok(None);
    };
    let url = config.url.clone();
    let bot = Arc::new(StreamerBotClient::new(config));
    match bot.connect().await {
        Ok(()) => info!(%url, "connected to Streamer.bot"),
        Err(e) => warn!(%url, error = %e, "Streamer.bot unavailable"),
    }
    Ok(Some(bot))
}

fn print_notice(notice: &AutomationNotice, global: &GlobalOpts, color: bool) {
    if global.quiet {
        return;
    }
    let line = match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let ok = !matches!(
                notice,
                AutomationNotice::ActionFailed { .. } | AutomationNotice::ServiceUnavailable { .. }
            );
            let stamp = chrono::Local::now().format("%H:%M:%S").to_string();
            format!(
                "{} {}",
                output::dim(&stamp, color),
                output::status_text(&notice.to_string(), ok, color)
            )
        }
        ref format => output::render_single(format, notice, |_| String::new(), |_| String::new()),
    };
    output::print_output(&line, false);
}
