//! Rich-text facet detection for outgoing posts.
//!
//! Offsets are byte positions into the UTF-8 text, which is what the
//! network expects. Mention facets carry the handle; the client resolves it
//! to a DID when publishing.

use std::sync::LazyLock;

use aura_types::social::{ByteSlice, Facet, FacetFeature};
use regex::Regex;

static MENTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)+)")
        .expect("invalid mention regex")
});

static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("invalid link regex"));

/// Punctuation that ends a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '"', '\''];

/// Mention and link facets in `text`, ordered by position.
pub fn detect_facets(text: &str) -> Vec<Facet> {
    let mut facets = Vec::new();

    for caps in MENTION_PATTERN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        // `user@example.com` is an address, not a mention.
        let preceded_by_word = text[..whole.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if preceded_by_word {
            continue;
        }
        facets.push(Facet {
            index: ByteSlice {
                byte_start: whole.start(),
                byte_end: whole.end(),
            },
            feature: FacetFeature::Mention {
                handle: caps[1].to_lowercase(),
            },
        });
    }

    for found in LINK_PATTERN.find_iter(text) {
        let uri = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if uri.len() <= "https://".len() {
            continue;
        }
        facets.push(Facet {
            index: ByteSlice {
                byte_start: found.start(),
                byte_end: found.start() + uri.len(),
            },
            feature: FacetFeature::Link { uri: uri.to_string() },
        });
    }

    // Handles inside a URL path are part of the link.
    let links: Vec<ByteSlice> = facets
        .iter()
        .filter(|f| matches!(f.feature, FacetFeature::Link { .. }))
        .map(|f| f.index)
        .collect();
    facets.retain(|f| match f.feature {
        FacetFeature::Mention { .. } => !links
            .iter()
            .any(|l| f.index.byte_start >= l.byte_start && f.index.byte_start < l.byte_end),
        FacetFeature::Link { .. } => true,
    });

    facets.sort_by_key(|f| f.index.byte_start);
    facets
}
