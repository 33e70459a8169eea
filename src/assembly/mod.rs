//! Content assembler: owns the artifact being built and renders it.
//!
//! Sections are keyed by step index, so rendering is always in ascending step order
//! and a step can contribute at most once.

pub mod sub_artifact;

pub use sub_artifact::{
    extract_fenced_code, extract_markers, insert_sub_artifacts, SubArtifact, VisualizationMarker,
    SKIP_SENTINEL,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Shown in intermediate snapshots for sections not yet written.
pub const IN_PROGRESS_PLACEHOLDER: &str = "_[section in progress]_";

/// Shown for sections that were skipped or never reached.
pub const SKIPPED_PLACEHOLDER: &str = "_[section skipped: no content was produced for this step]_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum SectionBody {
    Pending,
    Written(String),
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    pub title: String,
    pub intro: Option<String>,
    pub sections: BTreeMap<usize, Section>,
    pub closing: Option<String>,
    pub sources: Vec<String>,
}

impl Artifact {
    /// Written sections in step order.
    pub fn ordered_sections(&self) -> Vec<(usize, &str)> {
        self.sections
            .iter()
            .filter_map(|(index, section)| match &section.body {
                SectionBody::Written(text) => Some((*index, text.as_str())),
                _ => None,
            })
            .collect()
    }

    fn render_with(&self, pending_text: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.title.trim().is_empty() {
            parts.push(format!("# {}", self.title.trim()));
        }
        if let Some(intro) = &self.intro {
            parts.push(intro.trim().to_string());
        }
        for section in self.sections.values() {
            let body = match &section.body {
                SectionBody::Written(text) => text.trim(),
                SectionBody::Skipped => SKIPPED_PLACEHOLDER,
                SectionBody::Pending => pending_text,
            };
            parts.push(format!("## {}\n\n{}", section.title, body).trim().to_string());
        }
        if let Some(closing) = &self.closing {
            parts.push(closing.trim().to_string());
        }
        if !self.sources.is_empty() {
            let list: Vec<String> = self.sources.iter().map(|s| format!("- {}", s)).collect();
            parts.push(format!("## Sources\n\n{}", list.join("\n")));
        }
        let mut rendered = parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        rendered.push('\n');
        rendered
    }
}

pub struct ContentAssembler {
    artifact: Artifact,
}

impl ContentAssembler {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            artifact: Artifact {
                title: title.into(),
                ..Artifact::default()
            },
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn into_artifact(self) -> Artifact {
        self.artifact
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.artifact.title = title.into();
    }

    pub fn set_intro(&mut self, intro: impl Into<String>) {
        let intro = intro.into();
        self.artifact.intro = (!intro.trim().is_empty()).then_some(intro);
    }

    pub fn set_closing(&mut self, closing: impl Into<String>) {
        let closing = closing.into();
        self.artifact.closing = (!closing.trim().is_empty()).then_some(closing);
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        if !source.trim().is_empty() && !self.artifact.sources.contains(&source) {
            self.artifact.sources.push(source);
        }
    }

    /// Lays out one pending section per step; existing sections are kept.
    pub fn set_structure<'a, I>(&mut self, steps: I)
    where
        I: IntoIterator<Item = (usize, &'a str)>,
    {
        for (index, title) in steps {
            self.artifact.sections.entry(index).or_insert_with(|| Section {
                title: title.to_string(),
                body: SectionBody::Pending,
            });
        }
    }

    /// Stores the text for `step_index`. Returns false (and logs) when the step already
    /// contributed a section.
    pub fn append_section(&mut self, step_index: usize, text: impl Into<String>) -> bool {
        let text = text.into();
        let section = self
            .artifact
            .sections
            .entry(step_index)
            .or_insert_with(|| Section {
                title: format!("Part {}", step_index + 1),
                body: SectionBody::Pending,
            });
        match section.body {
            SectionBody::Pending => {
                section.body = SectionBody::Written(text);
                true
            }
            _ => {
                warn!(step_index, "Section already assembled; ignoring repeat");
                false
            }
        }
    }

    /// Marks a pending section as skipped; written sections are left alone.
    pub fn mark_skipped(&mut self, step_index: usize) {
        if let Some(section) = self.artifact.sections.get_mut(&step_index) {
            if section.body == SectionBody::Pending {
                section.body = SectionBody::Skipped;
            }
        }
    }

    pub fn has_section(&self, step_index: usize) -> bool {
        matches!(
            self.artifact.sections.get(&step_index),
            Some(Section {
                body: SectionBody::Written(_),
                ..
            })
        )
    }

    /// Final rendering. Sections never written render as skipped, so the result holds
    /// no in-progress placeholder.
    pub fn render(&self) -> String {
        self.artifact.render_with(SKIPPED_PLACEHOLDER)
    }

    /// Intermediate rendering with in-progress placeholders for unwritten sections.
    pub fn render_snapshot(&self) -> String {
        self.artifact.render_with(IN_PROGRESS_PLACEHOLDER)
    }

    /// Summary of written sections for the generator: title plus the first
    /// `max_chars` characters of each.
    pub fn prior_context(&self, max_chars: usize) -> String {
        self.artifact
            .sections
            .values()
            .filter_map(|section| match &section.body {
                SectionBody::Written(text) => {
                    let text = text.trim();
                    let excerpt: String = text.chars().take(max_chars).collect();
                    let ellipsis = if text.chars().count() > max_chars { "..." } else { "" };
                    Some(format!("- {}: {}{}", section.title, excerpt, ellipsis))
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Intro block listing title suggestions.
pub fn title_suggestions_intro(titles: &[String]) -> String {
    if titles.len() < 2 {
        return String::new();
    }
    let list: Vec<String> = titles.iter().map(|t| format!("- {}", t)).collect();
    format!("**Suggested titles:**\n\n{}", list.join("\n"))
}
