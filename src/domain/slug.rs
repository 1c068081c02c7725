//! Slug and tag normalization.

use std::collections::BTreeSet;

/// Slug returned when nothing survives slugification
pub const EMPTY_SLUG: &str = "note";

/// Normalized tags. A `BTreeSet` keeps storage order-independent and
/// iteration sorted, which is the serialization order.
pub type TagSet = BTreeSet<String>;

fn is_allowed(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || c == '-'
        || c == '_'
        || ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Lowercase, map disallowed characters to `-`, collapse runs, trim edges.
fn hyphenate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.to_lowercase().chars() {
        let mapped = if is_allowed(c) { c } else { '-' };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

/// URL/filename-safe form of a title. Never empty.
pub fn slugify(title: &str) -> String {
    let slug = hyphenate(title.trim());
    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

/// Normalize one tag. May return an empty string, which callers drop.
pub fn normalize_tag(tag: &str) -> String {
    let lowered = tag.trim().to_lowercase();
    hyphenate(lowered.trim_start_matches('#'))
}

/// Normalize, drop empties, dedupe.
pub fn normalize_tags<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| normalize_tag(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect()
}
