//! Rendering of the admin directive log into personality text.
//!
//! The log is append-only. Resolution happens here, at prompt time: entries
//! are listed oldest to newest and the model is told that later entries
//! override earlier ones.

use aura_types::memory::Directive;

pub fn render_personality(persona: &str, directives: &[Directive]) -> String {
    let mut text = persona.trim().to_string();
    if directives.is_empty() {
        return text;
    }
    text.push_str(
        "\n\nSTANDING DIRECTIVES (oldest first; if two conflict, the newer one takes precedence):",
    );
    let mut ordered: Vec<&Directive> = directives.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    for (i, directive) in ordered.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, directive.instruction.trim()));
    }
    text
}
