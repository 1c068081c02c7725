//! Frontmatter block parsing and rendering.
//!
//! A block is delimited by `---` lines and holds `key: value` lines. `tags`
//! is special-cased: a bracketed, comma-separated list (`["a", "b"]`), a bare
//! single value, or an indented `- item` list on the following lines.
//!
//! Parsing is two-stage. [`parse_block`] is a strict tokenizer that requires
//! the block to open on the first line; [`parse_loose`] is a regex fallback
//! that tolerates leading blank lines and a wrapping code fence.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::fingerprint::ContentFingerprint;
use super::slug::{normalize_tags, TagSet};

/// Block delimiter line
pub const DELIMITER: &str = "---";

/// Recognized metadata keys, in serialization order
pub const KEY_ORDER: [&str; 8] = [
    "title",
    "slug",
    "date",
    "source_type",
    "source_id",
    "input_hash",
    "generated_at",
    "tags",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrontmatterError {
    #[error("document does not start with a '---' line")]
    MissingOpening,

    #[error("frontmatter block opened on line 1 is never closed")]
    Unterminated,
}

/// Recognized frontmatter fields. Unknown keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontmatterMeta {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub date: Option<String>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub input_hash: Option<String>,
    pub generated_at: Option<String>,
    pub tags: TagSet,
}

impl FrontmatterMeta {
    /// True when no recognized key carried a value
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.slug.is_none()
            && self.date.is_none()
            && self.source_type.is_none()
            && self.source_id.is_none()
            && self.input_hash.is_none()
            && self.generated_at.is_none()
            && self.tags.is_empty()
    }

    /// Embedded input fingerprint, if any
    pub fn fingerprint(&self) -> Option<ContentFingerprint> {
        self.input_hash.as_deref().and_then(ContentFingerprint::parse)
    }

    fn set(&mut self, key: &str, value: String) {
        if value.is_empty() {
            return;
        }
        let slot = match key {
            "title" => &mut self.title,
            "slug" => &mut self.slug,
            "date" => &mut self.date,
            "source_type" => &mut self.source_type,
            "source_id" => &mut self.source_id,
            "input_hash" => &mut self.input_hash,
            "generated_at" => &mut self.generated_at,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Render the block in [`KEY_ORDER`], delimiters included, no trailing newline.
    ///
    /// Absent scalar keys are skipped; `tags` is always written.
    pub fn render(&self) -> String {
        let mut lines = vec![DELIMITER.to_string()];
        let scalars = [
            ("title", self.title.as_deref().map(quote)),
            ("slug", self.slug.clone()),
            ("date", self.date.clone()),
            ("source_type", self.source_type.clone()),
            ("source_id", self.source_id.clone()),
            ("input_hash", self.input_hash.clone()),
            ("generated_at", self.generated_at.clone()),
        ];
        for (key, value) in scalars {
            if let Some(value) = value {
                lines.push(format!("{}: {}", key, value));
            }
        }
        let tags: Vec<String> = self.tags.iter().map(|t| quote(t)).collect();
        lines.push(format!("tags: [{}]", tags.join(", ")));
        lines.push(DELIMITER.to_string());
        lines.join("\n")
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Strip one layer of matching quotes, undoing `quote` for double quotes.
pub fn unquote(raw: &str) -> String {
    let value = raw.trim();
    if value.len() >= 2 {
        if value.starts_with('"') && value.ends_with('"') {
            return value[1..value.len() - 1]
                .replace("\\\"", "\"")
                .replace("\\\\", "\\");
        }
        if value.starts_with('\'') && value.ends_with('\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Split a tags value into raw items, quotes stripped.
pub fn split_tag_list(raw: &str) -> Vec<String> {
    let inner = raw.trim();
    let inner = inner.strip_prefix('[').unwrap_or(inner);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_string()
        })
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_fields(lines: &[&str]) -> FrontmatterMeta {
    let mut meta = FrontmatterMeta::default();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        if key == "tags" {
            let mut raw = split_tag_list(value);
            if value.is_empty() {
                // Indented block list
                while i < lines.len() {
                    let Some(item) = lines[i].trim_start().strip_prefix("- ") else {
                        break;
                    };
                    raw.push(unquote(item));
                    i += 1;
                }
            }
            meta.tags.extend(normalize_tags(raw));
        } else {
            meta.set(&key, unquote(value));
        }
    }
    meta
}

/// Strict parse. The first line (after an optional BOM) must be `---` and the
/// block must be closed by another `---` line.
///
/// Returns the metadata and the body after the block, leading whitespace removed.
pub fn parse_block(text: &str) -> Result<(FrontmatterMeta, &str), FrontmatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');

    let first = lines.next().ok_or(FrontmatterError::MissingOpening)?;
    if first.trim() != DELIMITER {
        return Err(FrontmatterError::MissingOpening);
    }

    let mut offset = first.len();
    let mut block = Vec::new();
    for line in lines {
        offset += line.len();
        if line.trim() == DELIMITER {
            return Ok((parse_fields(&block), text[offset..].trim_start()));
        }
        block.push(line.trim_end_matches(['\r', '\n']));
    }

    Err(FrontmatterError::Unterminated)
}

fn loose_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A\s*(```[A-Za-z]*[ \t]*\r?\n)?---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)")
            .expect("static regex")
    })
}

/// Regex fallback for blocks that do not start on the first line.
///
/// A code fence opened right before the block is closed off the end of the body.
pub fn parse_loose(text: &str) -> Option<(FrontmatterMeta, &str)> {
    let caps = loose_block_regex().captures(text)?;
    let block = caps.get(2)?.as_str();
    let lines: Vec<&str> = block.lines().collect();
    let mut body = text[caps.get(0)?.end()..].trim_start();
    if caps.get(1).is_some() {
        let trimmed = body.trim_end();
        if let Some(stripped) = trimmed.strip_suffix("```") {
            body = stripped.trim_end();
        }
    }
    Some((parse_fields(&lines), body))
}

/// Strict parse, then loose, then "no frontmatter": the whole text is body.
pub fn extract_frontmatter(text: &str) -> (FrontmatterMeta, &str) {
    match parse_block(text) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(%err, "strict frontmatter parse failed, trying loose extraction");
            parse_loose(text).unwrap_or_else(|| (FrontmatterMeta::default(), text))
        }
    }
}

/// Fingerprint embedded in a document's frontmatter
pub fn embedded_fingerprint(text: &str) -> Option<ContentFingerprint> {
    extract_frontmatter(text).0.fingerprint()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_parse() {
        let text = "---\ntitle: \"Parser Fix\"\ntags: [\"bugfix\", 'Rust']\nstatus: done\n---\n\n## Body\n";
        let (meta, body) = parse_block(text).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Parser Fix"));
        assert_eq!(meta.tags.iter().collect::<Vec<_>>(), vec!["bugfix", "rust"]);
        assert_eq!(body, "## Body\n");
    }

    #[test]
    fn test_strict_parse_errors() {
        assert_eq!(
            parse_block("# Title\n").unwrap_err(),
            FrontmatterError::MissingOpening
        );
        assert_eq!(
            parse_block("---\ntitle: x\nno end").unwrap_err(),
            FrontmatterError::Unterminated
        );
    }

    #[test]
    fn test_keys_are_case_insensitive_and_values_may_contain_colons() {
        let (meta, _) = parse_block("---\nTitle: Fix: the parser\n---\n").unwrap();
        assert_eq!(meta.title.as_deref(), Some("Fix: the parser"));
    }

    #[test]
    fn test_block_list_tags() {
        let text = "---\ntitle: x\ntags:\n  - One\n  - \"Two Words\"\nslug: x\n---\n";
        let (meta, _) = parse_block(text).unwrap();
        assert_eq!(meta.tags.iter().collect::<Vec<_>>(), vec!["one", "two-words"]);
        assert_eq!(meta.slug.as_deref(), Some("x"));
    }

    #[test]
    fn test_bare_tag_value() {
        let (meta, _) = parse_block("---\ntags: test\n---\n").unwrap();
        assert!(meta.tags.contains("test"));
    }

    #[test]
    fn test_loose_parse_with_leading_blank_lines() {
        let text = "\n\n---\ntitle: Late Block\n---\nBody";
        assert!(parse_block(text).is_err());
        let (meta, body) = parse_loose(text).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Late Block"));
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_loose_parse_inside_code_fence() {
        let text = "```markdown\n---\ntitle: Fenced\n---\n## Body\n```\n";
        let (meta, body) = extract_frontmatter(text);
        assert_eq!(meta.title.as_deref(), Some("Fenced"));
        assert_eq!(body, "## Body");
    }

    #[test]
    fn test_no_frontmatter_returns_whole_text() {
        let (meta, body) = extract_frontmatter("# Just a header\nNo frontmatter here.");
        assert!(meta.is_empty());
        assert_eq!(body, "# Just a header\nNo frontmatter here.");
    }

    #[test]
    fn test_render_fixed_order() {
        let meta = FrontmatterMeta {
            title: Some("Say \"hi\"".to_string()),
            slug: Some("say-hi".to_string()),
            date: Some("2023-01-01".to_string()),
            source_type: Some("manual".to_string()),
            source_id: Some("local".to_string()),
            input_hash: Some("abc".to_string()),
            generated_at: Some("2023-01-01T00:00:00.000000+00:00".to_string()),
            tags: normalize_tags(["b", "a"]),
        };
        let rendered = meta.render();
        let keys: Vec<&str> = rendered
            .lines()
            .filter_map(|l| l.split_once(':').map(|(k, _)| k))
            .collect();
        assert_eq!(keys, KEY_ORDER.to_vec());
        assert!(rendered.contains("title: \"Say \\\"hi\\\"\""));
        assert!(rendered.contains("tags: [\"a\", \"b\"]"));

        let (parsed, _) = parse_block(&format!("{}\n", rendered)).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_embedded_fingerprint() {
        let text = "---\ntitle: Old\ninput_hash: deadbeef\n---\nOld content";
        assert_eq!(embedded_fingerprint(text).unwrap().as_str(), "deadbeef");
        assert!(embedded_fingerprint("no block").is_none());
    }
}
