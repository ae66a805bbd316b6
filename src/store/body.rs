//! Issue body rendering for rollout state.
//!
//! The body is a short progress summary for humans followed by the state as
//! a JSON blob inside an HTML comment, which GitHub does not render.

use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

use crate::rollout::RolloutState;

const STATE_PREFIX: &str = "<!-- ROLLOUT-STATE: ";
const STATE_SUFFIX: &str = " -->";

static STATE_BLOCK: OnceLock<Regex> = OnceLock::new();

fn state_block() -> &'static Regex {
    STATE_BLOCK.get_or_init(|| {
        Regex::new(r"(?s)<!--\s*ROLLOUT-STATE:\s*(\{.*?\})\s*-->").expect("valid state regex")
    })
}

/// Serialize state for embedding in an HTML comment.
///
/// `>` only ever occurs inside JSON strings, so escaping it keeps captured
/// validation output from closing the comment early.
pub fn encode_state(state: &RolloutState) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(state)?;
    Ok(json.replace('>', "\\u003e"))
}

/// Extract the embedded state. `None` when the body carries no state block.
pub fn decode_state(body: &str) -> Option<Result<RolloutState, serde_json::Error>> {
    let captures = state_block().captures(body)?;
    let json = captures.get(1)?.as_str();
    Some(serde_json::from_str(json))
}

pub fn render_body(name: &str, state: &RolloutState) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(body, "## Ring rollout `{name}`");
    let _ = writeln!(body);
    let _ = writeln!(body, "Source version: `{}`", state.source_version);
    let _ = writeln!(body);
    let _ = writeln!(body, "| Ring | Wait | Status |");
    let _ = writeln!(body, "|------|------|--------|");
    for (ring, wait) in state.wait_durations.iter().enumerate() {
        let status = ring_status(state, ring);
        let _ = writeln!(body, "| {ring} | {} | {status} |", humanize(wait.as_secs()));
    }
    let _ = writeln!(body);

    if let Some(reason) = &state.abort_reason {
        let _ = writeln!(body, "**Aborted:** {reason}");
        let _ = writeln!(body);
    } else if state.is_completed() {
        let _ = writeln!(body, "**Completed.**");
        let _ = writeln!(body);
    }

    let _ = writeln!(
        body,
        "Control labels: `abort`, `paused`, `fastlane`, `ignore-validation`."
    );
    let _ = writeln!(body);
    let _ = write!(body, "{STATE_PREFIX}{}{STATE_SUFFIX}", encode_state(state)?);
    Ok(body)
}

fn ring_status(state: &RolloutState, ring: usize) -> &'static str {
    if ring < state.current_ring {
        "✅ promoted"
    } else if ring == state.current_ring && state.aborted {
        "🛑 stopped"
    } else if ring == state.current_ring {
        "⏳ in progress"
    } else {
        "pending"
    }
}

fn humanize(seconds: u64) -> String {
    match seconds {
        0 => "none".to_string(),
        s if s % 3600 == 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}
