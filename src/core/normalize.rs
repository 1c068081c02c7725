//! Turn generated text into a standardized report document.
//!
//! Normalization never fails: when the model under-delivers, the document is
//! rebuilt around a placeholder skeleton and flagged as not standardized.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::domain::frontmatter::{extract_frontmatter, split_tag_list, FrontmatterMeta};
use crate::domain::report::{is_placeholder_slug, ReportKind, RAW_OUTPUT_HEADING, SENTINEL_TAG};
use crate::domain::slug::{normalize_tags, slugify, TagSet};
use crate::domain::{ContentFingerprint, SourceType};

/// Leading lines scanned for `Title:`/`Tags:` fields
const LEADING_FIELD_LINES: usize = 6;

/// Lines scanned for a late `Tags:` field
const TAG_SCAN_LINES: usize = 12;

/// Per-run facts the normalizer stamps into the document
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub kind: ReportKind,
    pub date: NaiveDate,
    /// Rendered after the kind in default titles: the date, or the week and its range
    pub label: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub input_hash: ContentFingerprint,
    pub generated_at: DateTime<Utc>,
}

impl NormalizeContext {
    pub fn daily(
        date: NaiveDate,
        source_type: SourceType,
        source_id: impl Into<String>,
        input_hash: ContentFingerprint,
    ) -> Self {
        Self {
            kind: ReportKind::Daily,
            date,
            label: date.format("%Y-%m-%d").to_string(),
            source_type,
            source_id: source_id.into(),
            input_hash,
            generated_at: Utc::now(),
        }
    }
}

/// A finished document and what was resolved while building it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub document: String,
    pub meta: FrontmatterMeta,
    /// Real slug and real tags were found
    pub standardized: bool,
    /// The body was replaced by the placeholder skeleton
    pub skeleton: bool,
}

impl Normalized {
    pub fn slug(&self) -> &str {
        self.meta.slug.as_deref().unwrap_or_default()
    }

    /// `{dir(default)}/{date}-{slug}.md`, or `default` itself for placeholder slugs
    pub fn output_path(&self, default: &Path) -> PathBuf {
        let slug = self.slug();
        if is_placeholder_slug(slug) {
            return default.to_path_buf();
        }
        let date = self.meta.date.as_deref().unwrap_or_default();
        let name = format!("{}-{}.md", date, slug);
        match default.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Fields the model emitted as plain lines instead of frontmatter
#[derive(Debug, Default, PartialEq, Eq)]
struct LeadingFields {
    title: Option<String>,
    tags: TagSet,
}

fn field_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    name.trim().eq_ignore_ascii_case(key).then(|| value.trim())
}

fn parse_tag_field(value: &str) -> TagSet {
    normalize_tags(split_tag_list(value))
}

/// Consume leading `Title:`/`Tags:` lines, then fall back to the first `# `
/// heading for the title and any `Tags:` line near the top.
fn take_leading_fields(body: &str) -> (LeadingFields, String) {
    let lines: Vec<&str> = body.lines().collect();
    let mut fields = LeadingFields::default();

    let mut consumed = 0;
    for line in lines.iter().take(LEADING_FIELD_LINES) {
        if let Some(value) = field_value(line, "title") {
            if !value.is_empty() {
                fields.title = Some(value.to_string());
            }
        } else if let Some(value) = field_value(line, "tags") {
            fields.tags = parse_tag_field(value);
        } else {
            break;
        }
        consumed += 1;
    }
    let rest = &lines[consumed..];

    if fields.title.is_none() {
        fields.title = rest
            .iter()
            .find_map(|line| line.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }
    if fields.tags.is_empty() {
        if let Some(value) = rest
            .iter()
            .take(TAG_SCAN_LINES)
            .find_map(|line| field_value(line, "tags"))
        {
            fields.tags = parse_tag_field(value);
        }
    }

    (fields, rest.join("\n").trim_start().to_string())
}

/// Every required heading appears as an exact line, in order.
pub fn has_required_sections(body: &str, kind: ReportKind) -> bool {
    let required = kind.required_sections();
    let mut next = 0;
    for line in body.lines() {
        if next < required.len() && line.trim_end() == required[next] {
            next += 1;
        }
    }
    next == required.len()
}

/// Placeholder skeleton with the raw text kept under an appendix heading
pub fn skeleton(kind: ReportKind, label: &str, raw: &str) -> String {
    let mut out = format!("# {}\n", kind.default_title(label));
    for heading in kind.required_sections() {
        out.push_str(&format!("\n{}\n{}\n", heading, kind.placeholder_line(heading)));
    }
    out.push_str(&format!("\n---\n\n{}\n{}\n", RAW_OUTPUT_HEADING, raw));
    out
}

/// Build the final document from generated text.
pub fn normalize(raw_text: &str, ctx: &NormalizeContext) -> Normalized {
    let (model_meta, body) = extract_frontmatter(raw_text);
    let (leading, body) = take_leading_fields(body);

    let title = model_meta.title.clone().or(leading.title);

    let slug = match (model_meta.slug.as_deref(), title.as_deref()) {
        (Some(explicit), _) => slugify(explicit),
        (None, Some(title)) => slugify(title),
        (None, None) => ctx.kind.default_slug().to_string(),
    };

    let mut tags = if model_meta.tags.is_empty() {
        leading.tags
    } else {
        model_meta.tags
    };
    let has_real_tags = !tags.is_empty();
    if !has_real_tags {
        tags.insert(SENTINEL_TAG.to_string());
    }

    let standardized = has_real_tags && !is_placeholder_slug(&slug);

    let complete = has_required_sections(&body, ctx.kind);
    let body = if complete {
        body
    } else {
        tracing::debug!(kind = ?ctx.kind, "Required sections missing, using skeleton");
        skeleton(ctx.kind, &ctx.label, raw_text)
    };

    let meta = FrontmatterMeta {
        title: Some(title.unwrap_or_else(|| ctx.kind.default_title(&ctx.label))),
        slug: Some(slug),
        date: Some(ctx.date.format("%Y-%m-%d").to_string()),
        source_type: Some(ctx.source_type.to_string()),
        source_id: Some(ctx.source_id.clone()),
        input_hash: Some(ctx.input_hash.to_string()),
        generated_at: Some(
            ctx.generated_at
                .to_rfc3339_opts(SecondsFormat::Micros, false),
        ),
        tags,
    };

    let mut document = format!("{}\n\n{}", meta.render(), body.trim_end());
    document.push('\n');

    Normalized {
        document,
        meta,
        standardized,
        skeleton: !complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frontmatter::parse_block;

    const COMPLETE_BODY: &str = "## What I Did Today\n- wrote code\n\n## Problems / Blockers\n- none\n\n## Root Cause\n- N/A\n\n## Attempts & Fixes\n- patched\n\n## Key Learnings\n- tests help\n\n## Metrics\n- 3 commits\n\n## Next Steps (Tomorrow)\n- [ ] ship\n";

    fn ctx() -> NormalizeContext {
        let mut ctx = NormalizeContext::daily(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            SourceType::Manual,
            "local",
            ContentFingerprint::of_text("notes"),
        );
        ctx.generated_at = DateTime::parse_from_rfc3339("2023-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        ctx
    }

    #[test]
    fn test_title_without_slug_derives_filename() {
        let raw = format!("---\ntitle: My Great Day\ntags: [daily]\n---\n{}", COMPLETE_BODY);
        let out = normalize(&raw, &ctx());

        assert_eq!(out.slug(), "my-great-day");
        assert!(out.standardized);
        assert_eq!(
            out.output_path(Path::new("content/daily/2023/1/2023-01-01-generated.md")),
            PathBuf::from("content/daily/2023/1/2023-01-01-my-great-day.md")
        );
    }

    #[test]
    fn test_plain_text_uses_default_path_and_sentinel() {
        let out = normalize("just some text without structure", &ctx());

        assert_eq!(out.slug(), "daily-report");
        assert!(!out.standardized);
        assert!(out.skeleton);
        assert_eq!(out.meta.tags.iter().collect::<Vec<_>>(), vec!["untagged"]);
        let default = Path::new("out/2023-01-01-generated.md");
        assert_eq!(out.output_path(default), default.to_path_buf());
        assert_eq!(out.meta.title.as_deref(), Some("Daily Report - 2023-01-01"));
    }

    #[test]
    fn test_skeleton_keeps_raw_text() {
        let out = normalize("# Parser Fix\nFixed the tokenizer.", &ctx());

        assert!(out.skeleton);
        assert!(out.document.contains("## Metrics\n- N/A\n"));
        assert!(out.document.contains("## Next Steps (Tomorrow)\n- [ ] N/A\n"));
        assert!(out
            .document
            .contains("---\n\n### Raw Model Output\n# Parser Fix\nFixed the tokenizer.\n"));
        // Title came from the heading even though the skeleton replaced the body
        assert_eq!(out.meta.title.as_deref(), Some("Parser Fix"));
        assert_eq!(out.slug(), "parser-fix");
    }

    #[test]
    fn test_skeleton_appendix_keeps_model_frontmatter() {
        let raw = "---\ntitle: Half Day\ntags: [wip]\n---\nTitle: Extra\n## What I Did Today\n- half";
        let out = normalize(raw, &ctx());

        assert!(out.skeleton);
        let (_, appendix) = out.document.split_once("### Raw Model Output\n").unwrap();
        assert_eq!(appendix, format!("{}\n", raw));
        // Metadata is still taken from the model frontmatter
        assert_eq!(out.meta.title.as_deref(), Some("Half Day"));
        assert_eq!(out.meta.tags.iter().cloned().collect::<Vec<_>>(), vec!["wip"]);
    }

    #[test]
    fn test_leading_fields_are_consumed() {
        let raw = format!(
            "Title: Parser Fix\nTags: Bugfix, #Rust, parser\n# Daily Report - 2023-01-01\n\n{}",
            COMPLETE_BODY
        );
        let out = normalize(&raw, &ctx());

        assert!(out.standardized);
        assert!(!out.skeleton);
        assert_eq!(
            out.meta.tags.iter().cloned().collect::<Vec<_>>(),
            vec!["bugfix", "parser", "rust"]
        );
        let (_, body) = parse_block(&out.document).unwrap();
        assert!(body.starts_with("# Daily Report - 2023-01-01\n"));
        assert!(!body.contains("Title: Parser Fix"));
    }

    #[test]
    fn test_sections_out_of_order_fall_back() {
        let body = COMPLETE_BODY.replace("## Root Cause", "## Root Cause (moved)")
            + "\n## Root Cause\n- late\n";
        assert!(!has_required_sections(&body, ReportKind::Daily));
        assert!(has_required_sections(COMPLETE_BODY, ReportKind::Daily));
        assert!(!has_required_sections(COMPLETE_BODY, ReportKind::Weekly));
    }

    #[test]
    fn test_frontmatter_is_rebuilt_in_order() {
        let raw = format!(
            "---\ntags: [\"b\", \"a\"]\nslug: Parser Fix\ntitle: Parser \"Fix\"\nauthor: model\n---\n{}",
            COMPLETE_BODY
        );
        let out = normalize(&raw, &ctx());
        let header: Vec<&str> = out.document.lines().take(10).collect();
        let hash_line = format!("input_hash: {}", ContentFingerprint::of_text("notes"));

        assert_eq!(
            header,
            vec![
                "---",
                "title: \"Parser \\\"Fix\\\"\"",
                "slug: parser-fix",
                "date: 2023-01-01",
                "source_type: manual",
                "source_id: local",
                hash_line.as_str(),
                "generated_at: 2023-01-01T10:00:00.000000+00:00",
                "tags: [\"a\", \"b\"]",
                "---",
            ]
        );
        assert!(!out.document.contains("author"));

        let (meta, _) = parse_block(&out.document).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Parser \"Fix\""));
    }

    #[test]
    fn test_document_ends_with_single_newline() {
        let raw = format!("---\ntitle: X\ntags: [a]\n---\n{}\n\n\n", COMPLETE_BODY);
        let out = normalize(&raw, &ctx());
        assert!(out.document.ends_with("- [ ] ship\n"));
        assert!(!out.document.ends_with("\n\n"));
    }

    #[test]
    fn test_placeholder_slug_with_tags_needs_review() {
        let raw = format!("---\ntitle: !!!\ntags: [x]\n---\n{}", COMPLETE_BODY);
        let out = normalize(&raw, &ctx());
        assert_eq!(out.slug(), "note");
        assert!(!out.standardized);
    }

    #[test]
    fn test_weekly_skeleton_headings() {
        let text = skeleton(ReportKind::Weekly, "2023-W01 (2023-01-01 to 2023-01-07)", "raw");
        assert!(text.starts_with("# Weekly Report - 2023-W01 (2023-01-01 to 2023-01-07)\n"));
        assert!(text.contains("## Next Week Plan\n- N/A\n"));
        assert!(has_required_sections(&text, ReportKind::Weekly));
    }
}
