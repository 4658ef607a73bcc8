//! `status`: snapshot of OBS plus recent changes.

use std::fmt::Write as _;

use cuecast_core::store::tracker;
use cuecast_core::{ConnectionClient, InputInfo, StateWithChanges};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct InputRow {
    #[tabled(rename = "Input")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

impl From<&InputInfo> for InputRow {
    fn from(i: &InputInfo) -> Self {
        Self {
            name: i.name.clone(),
            kind: i.kind.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(client: &ConnectionClient, global: &GlobalOpts) -> Result<(), CliError> {
    let state = client.state_with_changes().await?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &state,
        |s| detail(s, color),
        |s| s.snapshot.current_program_scene.clone().unwrap_or_default(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(state: &StateWithChanges, color: bool) -> String {
    let snap = &state.snapshot;
    let none = output::dim("(none)", color);
    let mut out = String::new();

    let program = snap.current_program_scene.as_deref().unwrap_or("(none)");
    let _ = writeln!(out, "{} {}", output::bold("Program:", color), program);
    let preview = snap
        .current_preview_scene
        .clone()
        .unwrap_or_else(|| output::dim("(studio mode off)", color));
    let _ = writeln!(out, "{} {}", output::bold("Preview:", color), preview);

    let scenes = if snap.scenes.is_empty() {
        none.clone()
    } else {
        snap.scenes.join(", ")
    };
    let _ = writeln!(
        out,
        "{} {}",
        output::bold(&format!("Scenes ({}):", snap.scenes.len()), color),
        scenes
    );

    let outputs = [
        ("Stream", snap.streaming),
        ("Record", snap.recording),
        ("Virtual cam", snap.virtual_cam),
        ("Replay buffer", snap.replay_buffer),
    ]
    .iter()
    .map(|(name, on)| {
        let word = if *on { "on" } else { "off" };
        format!("{name} {}", output::status_text(word, *on, color))
    })
    .collect::<Vec<_>>()
    .join("  ");
    let _ = writeln!(out, "{} {}", output::bold("Outputs:", color), outputs);

    if let Some(video) = &snap.video {
        let _ = writeln!(
            out,
            "{} {}x{} -> {}x{} @ {}/{} fps",
            output::bold("Video:", color),
            video.base_width,
            video.base_height,
            video.output_width,
            video.output_height,
            video.fps_numerator,
            video.fps_denominator,
        );
    }

    if !snap.inputs.is_empty() {
        let rows: Vec<InputRow> = snap.inputs.iter().map(InputRow::from).collect();
        let _ = writeln!(out, "\n{}", output::render_table(&rows));
    }

    if state.recent_changes.is_empty() {
        let _ = write!(out, "\n{} {}", output::bold("Recent changes:", color), none);
    } else {
        let _ = write!(out, "\n{}", output::bold("Recent changes:", color));
        for record in &state.recent_changes {
            let at = record.at.with_timezone(&chrono::Local).format("%H:%M:%S");
            let _ = write!(
                out,
                "\n  {} {}",
                output::dim(&at.to_string(), color),
                tracker::summary(&record.changes)
            );
        }
    }
    out
}
