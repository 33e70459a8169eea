//! Sub-artifacts: generated blocks (e.g. visualization code) anchored to a phrase in a
//! section's text.
//!
//! Generated sections request sub-artifacts inline with
//! `[visualize: <description>]<anchor>[/visualize]`. Markers are stripped before the
//! section is stored; the anchor text stays in place and the generated block is
//! inserted right after it.

use serde::{Deserialize, Serialize};

const MARKER_OPEN: &str = "[visualize:";
const MARKER_CLOSE: &str = "[/visualize]";

/// Response a generator gives when no sub-artifact should be produced.
pub const SKIP_SENTINEL: &str = "SKIP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationMarker {
    pub description: String,
    pub anchor_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubArtifact {
    pub description: String,
    pub anchor_text: String,
    pub generated_body: String,
}

impl SubArtifact {
    pub fn new(
        description: impl Into<String>,
        anchor_text: impl Into<String>,
        generated_body: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            anchor_text: anchor_text.into(),
            generated_body: generated_body.into(),
        }
    }

    fn render_block(&self) -> String {
        format!(
            "\n\n**Visualization:** {}\n\n```\n{}\n```\n",
            self.description.trim(),
            self.generated_body.trim_end()
        )
    }

    fn sort_key(&self) -> (&str, &str) {
        (&self.description, &self.generated_body)
    }
}

/// Strips visualization markers from `text`, keeping anchor text in place.
/// Unterminated markers are left untouched.
pub fn extract_markers(text: &str) -> (String, Vec<VisualizationMarker>) {
    let mut cleaned = String::with_capacity(text.len());
    let mut markers = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(MARKER_OPEN) {
        let after_open = &rest[start + MARKER_OPEN.len()..];
        let parsed = after_open.find(']').and_then(|desc_end| {
            let body = &after_open[desc_end + 1..];
            body.find(MARKER_CLOSE)
                .map(|anchor_end| (desc_end, anchor_end, body))
        });
        let Some((desc_end, anchor_end, body)) = parsed else {
            break;
        };

        let anchor = &body[..anchor_end];
        cleaned.push_str(&rest[..start]);
        cleaned.push_str(anchor);
        let description = after_open[..desc_end].trim();
        if !description.is_empty() && !anchor.trim().is_empty() {
            markers.push(VisualizationMarker {
                description: description.to_string(),
                anchor_text: anchor.to_string(),
            });
        }
        rest = &body[anchor_end + MARKER_CLOSE.len()..];
    }
    cleaned.push_str(rest);
    (cleaned, markers)
}

/// Body of the first fenced code block in `text`, without the info string.
/// Returns `None` for skip responses or when no non-empty block exists.
pub fn extract_fenced_code(text: &str) -> Option<String> {
    if text.trim() == SKIP_SENTINEL {
        return None;
    }
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    let code = body[..end].trim_end();
    (!code.trim().is_empty()).then(|| code.to_string())
}

/// Inserts each sub-artifact immediately after the first occurrence of its anchor.
///
/// Insertions are applied in descending anchor offset so earlier offsets stay valid.
/// Sub-artifacts whose anchor is missing (or empty) are appended at the end of the
/// section. The result does not depend on the order of `sub_artifacts`.
pub fn insert_sub_artifacts(section_text: &str, sub_artifacts: &[SubArtifact]) -> String {
    let mut anchored: Vec<(usize, &SubArtifact)> = Vec::new();
    let mut unanchored: Vec<&SubArtifact> = Vec::new();
    for sub in sub_artifacts {
        let offset = (!sub.anchor_text.is_empty())
            .then(|| section_text.find(&sub.anchor_text))
            .flatten();
        match offset {
            Some(start) => anchored.push((start + sub.anchor_text.len(), sub)),
            None => unanchored.push(sub),
        }
    }

    // Descending offset; ties ordered by content so the output is input-order independent.
    anchored.sort_by(|(a_off, a), (b_off, b)| {
        b_off.cmp(a_off).then_with(|| b.sort_key().cmp(&a.sort_key()))
    });
    unanchored.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut text = section_text.to_string();
    for (offset, sub) in anchored {
        text.insert_str(offset, &sub.render_block());
    }
    for sub in unanchored {
        text.push_str(&sub.render_block());
    }
    text
}
