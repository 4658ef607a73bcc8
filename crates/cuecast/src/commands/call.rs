//! `call`: raw obs-websocket request passthrough.

use cuecast_core::ConnectionClient;
use serde_json::Value;

use crate::cli::{CallArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    client: &ConnectionClient,
    args: CallArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let data = args
        .data
        .as_deref()
        .map(|raw| util::parse_json_object("data", raw))
        .transpose()?;

    let response = client.call(&args.request_type, data).await?;

    // Raw responses have no table shape; show them as JSON.
    let format = match global.output {
        OutputFormat::Table => OutputFormat::Json,
        ref other => other.clone(),
    };
    let out = output::render_single(
        &format,
        &response,
        |_| String::new(),
        |v| match v {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
