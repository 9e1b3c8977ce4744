//! The bounded prompt context handed from the builder to the pipeline.

use std::fmt;

/// Context sections, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// Personality, directives and real-world context. Never dropped.
    Core,
    Memory,
    Summary,
    Thread,
    Search,
    /// The message being answered. Never dropped.
    Latest,
}

impl Section {
    fn heading(&self) -> Option<&'static str> {
        match self {
            Section::Core => None,
            Section::Memory => Some("FOCUSED CONTEXT (from my internal memory):"),
            Section::Summary => Some("WHAT I KNOW IN SUMMARY:"),
            Section::Search => Some("RECENT BLUESKY POSTS (from a live search):"),
            Section::Thread => Some("COMPLETE THREAD HISTORY:"),
            Section::Latest => Some("MOST RECENT MESSAGE THAT MENTIONED YOU:"),
        }
    }

    /// Separator between items of the same section.
    fn separator(&self) -> &'static str {
        match self {
            Section::Search => "\n---\n",
            Section::Core => "\n\n",
            _ => "\n",
        }
    }
}

/// Sections in the order they appear in the rendered prompt.
const RENDER_ORDER: [Section; 6] = [
    Section::Core,
    Section::Memory,
    Section::Summary,
    Section::Search,
    Section::Thread,
    Section::Latest,
];

/// One whole record. Items are dropped wholesale, never cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextItem {
    pub section: Section,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    items: Vec<ContextItem>,
    dropped: usize,
}

impl ContextBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: Section, text: impl Into<String>) {
        let text = text.into();
        if !text.trim().is_empty() {
            self.items.push(ContextItem { section, text });
        }
    }

    pub fn items(&self, section: Section) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(move |i| i.section == section)
            .map(|i| i.text.as_str())
    }

    pub fn has(&self, section: Section) -> bool {
        self.items.iter().any(|i| i.section == section)
    }

    /// Number of items removed to fit the budget.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn char_len(&self) -> usize {
        self.render().chars().count()
    }

    /// Drop low-priority items until the rendered block fits `max_chars`.
    ///
    /// Search excerpts go first (last excerpt first), then older thread
    /// posts (oldest first), then summaries, then memories. Pinned sections
    /// stay even if they alone exceed the budget.
    pub fn fit_to_budget(&mut self, max_chars: usize) {
        while self.char_len() > max_chars {
            let Some(index) = self.next_to_drop() else {
                tracing::warn!(
                    len = self.char_len(),
                    max_chars,
                    "Pinned context alone exceeds the budget"
                );
                return;
            };
            self.items.remove(index);
            self.dropped += 1;
        }
        if self.dropped > 0 {
            tracing::debug!(dropped = self.dropped, "Trimmed context to budget");
        }
    }

    fn next_to_drop(&self) -> Option<usize> {
        let last_of = |section: Section| self.items.iter().rposition(|i| i.section == section);
        let first_of = |section: Section| self.items.iter().position(|i| i.section == section);
        last_of(Section::Search)
            .or_else(|| first_of(Section::Thread))
            .or_else(|| last_of(Section::Summary))
            .or_else(|| last_of(Section::Memory))
    }

    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        for section in RENDER_ORDER {
            let texts: Vec<&str> = self.items(section).collect();
            if texts.is_empty() {
                continue;
            }
            let body = texts.join(section.separator());
            match section.heading() {
                Some(heading) => parts.push(format!("{heading}\n{body}")),
                None => parts.push(body),
            }
        }
        parts.join("\n\n")
    }
}

impl fmt::Display for ContextBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
