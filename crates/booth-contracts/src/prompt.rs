use crate::selection::SelectionStore;

/// Identity-preservation directive; always the first clause of every prompt.
pub const IDENTITY_CLAUSE: &str = "--keep-face -- Preserve the exact face, expression, body shape, hairstyle, skin tone, and pose of the person in the reference photo. Do not alter their identity.";

const REALISM_CLAUSE: &str = "Ensure every garment fits naturally around the body with realistic fabric behavior, seams, and shadows. Integrate accessories so they follow perspective and anatomy.";

const RENDER_CLAUSE: &str = "Render a photorealistic vertical full-body fashion portrait with cohesive lighting and a believable environment.";

/// Substituted customization line when the user supplied no directives at all.
pub const FALLBACK_CUSTOMIZATION: &str =
    "Refresh the outfit to a contemporary, stylish look that suits the existing subject.";

/// Extra note passed down the Google chain: keep requested backgrounds
/// coherent and hold the vertical full-body framing.
pub const BACKGROUND_BLEND_NOTE: &str = "If a background or location is requested, blend it naturally with the subject. Always keep the frame vertical full body.";

/// Minimum trimmed length of the directive string before a render is allowed.
pub const MIN_DIRECTIVE_CHARS: usize = 3;

/// Serializes the selection store plus the two free-text fields into the
/// user-directive string: `"{label}: {value}"` per selection in insertion
/// order, then `"Additional direction: …"`, then the general outfit text
/// verbatim, joined with `"; "`.
pub fn compose_directives(
    selections: &SelectionStore,
    additional: &str,
    general_outfit: &str,
) -> String {
    let mut directives: Vec<String> = Vec::new();
    for selection in selections.list() {
        if selection.value.is_empty() {
            continue;
        }
        directives.push(format!("{}: {}", selection.label, selection.value));
    }
    let additional = additional.trim();
    if !additional.is_empty() {
        directives.push(format!("Additional direction: {additional}"));
    }
    let general_outfit = general_outfit.trim();
    if !general_outfit.is_empty() {
        directives.push(general_outfit.to_string());
    }
    directives.join("; ")
}

/// Whether the directive string is substantial enough to submit.
pub fn directives_submittable(directives: &str) -> bool {
    directives.trim().chars().count() >= MIN_DIRECTIVE_CHARS
}

/// Wraps the directive string with the fixed identity, realism, and rendering
/// clauses. The identity clause is always present and always first; an empty
/// directive string falls back to the generic contemporary-refresh line.
pub fn build_enhanced_prompt(directives: &str, extra_note: Option<&str>) -> String {
    let trimmed = directives.trim();
    let customization_line = if trimmed.is_empty() {
        FALLBACK_CUSTOMIZATION.to_string()
    } else {
        format!("Apply these wardrobe and styling directions: {trimmed}.")
    };
    let extra = extra_note
        .map(str::trim)
        .filter(|note| !note.is_empty())
        .map(|note| format!(" {note}"))
        .unwrap_or_default();
    [
        IDENTITY_CLAUSE.to_string(),
        customization_line,
        REALISM_CLAUSE.to_string(),
        format!("{RENDER_CLAUSE}{extra}"),
    ]
    .join(" ")
}
