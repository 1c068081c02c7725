//! Prompt pairs sent to the text-generation endpoint.

use chrono::NaiveDate;

use super::report::SourceType;

/// Built-in system prompt for daily reports
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a rigorous technical writing assistant.
Turn rough notes into ONE structured daily report in Markdown with a YAML frontmatter block.

Output requirements:
1) Start with a YAML frontmatter block exactly like this:
---
title: "Short Summary Title"
slug: "short-summary-title"
tags: ["tag1", "tag2"]
status: "completed"
---

2) Follow with the report content using this exact section order:
   - ## What I Did Today
   - ## Problems / Blockers
   - ## Root Cause
   - ## Attempts & Fixes
   - ## Key Learnings
   - ## Metrics
   - ## Next Steps (Tomorrow)

3) Keep it concise and factual.
4) The 'slug' in frontmatter should be a URL-friendly version of the title (lowercase, dashes only).
5) If information is missing, write "N/A" for that bullet.
6) Return only final answer. Do not include reasoning or thinking process.
"#;

/// Built-in system prompt for weekly reports
pub const DEFAULT_WEEKLY_SYSTEM_PROMPT: &str = r#"You are a rigorous technical writing assistant.
Summarize one week of daily reports into a concise weekly report in Markdown.

Output requirements:
1) Use this exact section order:
   - ## Weekly Highlights
   - ## Progress by Area
   - ## Problems / Blockers
   - ## Risks
   - ## Key Learnings
   - ## Next Week Plan
   - ## Metrics
2) Keep it concise and factual.
3) If information is missing, write "N/A" for that bullet.
4) Keep language in the same language as input notes when possible.
5) Return only final answer. Do not include reasoning or thinking process.
"#;

/// System and user instructions for one generation call. Built per run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// User prompt for a daily report
pub fn daily_user_prompt(
    raw_notes: &str,
    source_type: SourceType,
    source_id: &str,
    date: NaiveDate,
) -> String {
    format!(
        "Date: {date}
Source: {source_type}:{source_id}

Raw notes:
{raw_notes}

Please generate a structured daily report in Markdown.
At the very top, include two single-line fields:
Title: <short, specific title>
Tags: <comma-separated, 2-6 tags>
Add a title line after that: '# Daily Report - {date}'.
Use the required section order exactly.
Use bullet lists in each section.
"
    )
}
