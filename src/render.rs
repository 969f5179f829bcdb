// src/render.rs
//! Digest rendering: a pure items-to-HTML function plus a save helper.
//! Rendering happens strictly after the quality gate; nothing here feeds
//! back into scoring.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use html_escape::encode_text;

use crate::pipeline::SummarizedItem;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Morning Digest</title>
    <style>
        body {
            margin: 0;
            padding: 0;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background-color: #f5f5f5;
            color: #1a1a1a;
            line-height: 1.6;
        }
        .container { max-width: 600px; margin: 0 auto; background-color: #ffffff; }
        .header {
            background: linear-gradient(135deg, #1a237e 0%, #3949ab 100%);
            padding: 40px 30px;
            text-align: center;
        }
        .header h1 { margin: 0; color: #ffffff; font-size: 28px; font-weight: 300; letter-spacing: 1px; }
        .header .date {
            color: rgba(255,255,255,0.8);
            font-size: 14px;
            margin-top: 10px;
            text-transform: uppercase;
            letter-spacing: 2px;
        }
        .content { padding: 40px 30px; }
        .story { margin-bottom: 40px; padding-bottom: 40px; border-bottom: 1px solid #e0e0e0; }
        .story:last-child { border-bottom: none; margin-bottom: 0; padding-bottom: 0; }
        .category {
            display: inline-block;
            font-size: 11px;
            font-weight: 600;
            text-transform: uppercase;
            letter-spacing: 1.5px;
            color: #3949ab;
            margin-bottom: 12px;
            padding: 4px 12px;
            background: #e8eaf6;
            border-radius: 4px;
        }
        .story h2 { margin: 0 0 18px 0; font-size: 20px; font-weight: 600; line-height: 1.35; }
        .story h2 a { color: #1a1a1a; text-decoration: none; }
        .story h2 a:hover { color: #3949ab; }
        .executive-summary { font-size: 15px; line-height: 1.7; color: #333; margin: 18px 0; }
        .significance {
            margin: 20px 0;
            padding: 14px 18px;
            background: #e3f2fd;
            border-left: 4px solid #2196f3;
            font-size: 14px;
            line-height: 1.6;
            color: #1565c0;
        }
        .significance strong { color: #0d47a1; display: block; margin-bottom: 6px; }
        .discussion-synthesis {
            margin: 20px 0 0 0;
            padding: 16px 18px;
            background: #fff8e1;
            border-left: 4px solid #ffc107;
        }
        .discussion-synthesis-header {
            font-size: 12px;
            font-weight: 600;
            color: #e65100;
            text-transform: uppercase;
            letter-spacing: 0.5px;
            margin-bottom: 10px;
        }
        .discussion-synthesis-text { font-size: 14px; line-height: 1.6; color: #555; }
        .source { font-size: 12px; color: #888; margin-top: 18px; }
        .source a { color: #3949ab; text-decoration: none; border-bottom: 1px solid #c5cae9; }
        .footer {
            padding: 30px;
            text-align: center;
            background-color: #fafafa;
            border-top: 1px solid #e0e0e0;
        }
        .footer p { margin: 0; font-size: 13px; color: #888; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Morning Digest</h1>
            <div class="date">%DATE%</div>
        </div>
        <div class="content">
%STORIES%
        </div>
        <div class="footer">
            <p>%COUNT% stories, curated automatically</p>
        </div>
    </div>
</body>
</html>
"#;

/// Render one selected item as a story card.
fn format_story(item: &SummarizedItem) -> String {
    let c = &item.candidate;
    let origin = c.origin.label().to_uppercase();
    let category = c.category().to_uppercase();
    let badge = if category.is_empty() {
        origin
    } else {
        format!("{origin} · {category}")
    };

    let mut html = format!(
        r#"<div class="story">
    <span class="category">{badge}</span>
    <h2><a href="{url}">{title}</a></h2>
    <div class="executive-summary">{summary}</div>
    <div class="significance">
        <strong>Why this matters:</strong>
        {significance}
    </div>
"#,
        badge = encode_text(&badge),
        url = encode_text(&c.url),
        title = encode_text(&c.title),
        summary = encode_text(&item.executive_summary),
        significance = encode_text(&item.significance),
    );

    if let Some(synthesis) = &item.discussion_synthesis {
        html.push_str(&format!(
            r#"    <div class="discussion-synthesis">
        <div class="discussion-synthesis-header">Discussion synthesis</div>
        <div class="discussion-synthesis-text">{}</div>
    </div>
"#,
            encode_text(synthesis)
        ));
    }

    html.push_str(&format!(
        "    <p class=\"source\">Read more at <a href=\"{}\">{}</a></p>\n</div>",
        encode_text(&c.url),
        encode_text(c.origin.label()),
    ));
    html
}

/// Pure function from selected items to the digest document.
pub fn render_digest(items: &[SummarizedItem], display_date: &str) -> String {
    let stories = items.iter().map(format_story).collect::<Vec<_>>().join("\n");
    PAGE_TEMPLATE
        .replace("%DATE%", &encode_text(display_date))
        .replace("%STORIES%", &stories)
        .replace("%COUNT%", &items.len().to_string())
}

/// Write the digest under `dir` as `{file_date}.html`.
pub fn save_digest(html: &str, dir: &Path, file_date: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating output dir {}", dir.display()))?;
    let path = dir.join(format!("{file_date}.html"));
    fs::write(&path, html).with_context(|| format!("writing digest {}", path.display()))?;
    Ok(path)
}
