//! Command dispatch: bridges CLI args -> control plane -> output formatting.

pub mod actions;
pub mod call;
pub mod config_cmd;
pub mod status;
pub mod util;
pub mod watch;

use cuecast_core::ConnectionClient;
use tracing::debug;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Connect to OBS and run an OBS-bound command.
pub async fn dispatch(
    cmd: Command,
    mut resolved: Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // One-shot commands fail fast instead of retrying in the background.
    if !matches!(cmd, Command::Watch(_)) {
        resolved.client.auto_reconnect = false;
    }

    let client = ConnectionClient::new(resolved.client.clone());
    client.connect().await?;
    debug!(url = %resolved.client.url, "connected");

    let result = match cmd {
        Command::Status => status::handle(&client, global).await,
        Command::Call(args) => call::handle(&client, args, global).await,
        Command::Run(args) => actions::run(&client, &resolved, args, global).await,
        Command::Batch(args) => actions::batch(&client, &resolved, args, global).await,
        Command::Validate(args) => actions::validate(&client, &resolved, args, global).await,
        Command::Watch(args) => watch::handle(&client, &resolved, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };

    client.disconnect().await;
    result
}
