//! Persona system-prompt composition.
//!
//! Pure template substitution: the persona descriptor fills slots in a
//! fixed contract, with per-field fallbacks for anything missing.

use serde::{Deserialize, Serialize};

/// Persona descriptor attached to a chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persona {
    pub name: Option<String>,
    pub style_short: Option<String>,
    pub canon: Option<String>,
}

const DEFAULT_NAME: &str = "Wren";
const DEFAULT_STYLE: &str = "warm, brief, empathetic";
const DEFAULT_CANON: &str =
    "A gentle companion who keeps replies restrained and never pads them out.";

/// Compose the system prompt for a persona.
///
/// Empty fields fall back individually, so a partially filled persona
/// still yields a usable contract.
pub fn build_system(persona: Option<&Persona>) -> String {
    let name = field(persona, |p| p.name.as_deref()).unwrap_or(DEFAULT_NAME);
    let style = field(persona, |p| p.style_short.as_deref()).unwrap_or(DEFAULT_STYLE);
    let canon = field(persona, |p| p.canon.as_deref()).unwrap_or(DEFAULT_CANON);

    format!(
        "You are a gentle companion character named \"{name}\". Follow this persona contract strictly:\n\
         - Character canon (never break it): {canon}\n\
         - Voice and style: {style}\n\
         - Goal: respond with empathy and brevity every time; no padding, no lecturing.\n\
         - If a request falls outside the persona or its boundaries, decline gently and offer an in-character alternative.\n\
         - Hard length rule: never exceed 120 characters per reply; close with an ellipsis when you must cut off.\n\
         - Plain text only: no emoji, no kaomoji."
    )
}

fn field<'a>(
    persona: Option<&'a Persona>,
    pick: impl Fn(&'a Persona) -> Option<&'a str>,
) -> Option<&'a str> {
    persona.and_then(pick).filter(|value| !value.is_empty())
}
