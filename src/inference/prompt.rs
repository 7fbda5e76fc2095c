//! Prompt rendering
//!
//! Flattens a structured transcript into the marker-delimited text the model was tuned on.

use crate::types::message::{Role, Turn};

/// Render `turns` followed by an open assistant marker.
///
/// Marker literals inside a turn's content are defanged so that they cannot
/// open a new turn in the flattened text.
pub fn render_prompt(turns: &[Turn]) -> String {
    let mut prompt = String::new();
    for turn in turns {
        prompt.push_str(turn.role.marker());
        prompt.push(' ');
        prompt.push_str(&defang_markers(&turn.content));
        prompt.push(' ');
    }
    prompt.push_str(Role::Assistant.marker());
    prompt
}

fn defang_markers(content: &str) -> String {
    let mut out = content.to_string();
    for (marker, plain) in [
        (Role::System.marker(), "<system>"),
        (Role::User.marker(), "<user>"),
        (Role::Assistant.marker(), "<assistant>"),
    ] {
        if out.contains(marker) {
            out = out.replace(marker, plain);
        }
    }
    out
}
