use std::collections::HashSet;

use crate::foundation::error::{GraphicsError, GraphicsResult};

const FORBIDDEN_HTML_TAGS: &[&str] = &["<script", "<iframe", "<object", "<embed", "<link"];
const FORBIDDEN_SCHEME_LITERALS: &[&str] = &["javascript:", "data:", "file:"];

/// Conservative CSS normalization run before validation.
///
/// Collapses whitespace/comments and defensively strips `@import` rules and `</style>` breakouts
/// so that a removable pattern cannot alias around [`validate_template`]. This does not replace
/// validation: the sanitized output is still run through `validate_template` afterwards.
pub fn sanitize_css(css: &str) -> String {
    let without_comments = strip_block_comments(css);
    let without_imports = strip_at_import_rules(&without_comments);
    let without_style_breakout = without_imports.replace("</style>", "").replace("</STYLE>", "");
    collapse_whitespace(&without_style_breakout)
}

fn strip_block_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let bytes = css.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            if let Some(end) = css[i + 2..].find("*/") {
                i += 2 + end + 2;
                continue;
            }
            // Unterminated comment: drop the remainder rather than leak it.
            break;
        }
        let ch = css[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn strip_at_import_rules(css: &str) -> String {
    let lower = css.to_ascii_lowercase();
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    let mut lower_rest = lower.as_str();
    while let Some(pos) = lower_rest.find("@import") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos..];
        let lower_after = &lower_rest[pos..];
        let end = after.find(';').map(|i| i + 1).unwrap_or(after.len());
        rest = &after[end..];
        lower_rest = &lower_after[end..];
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut prev_ws = false;
    for ch in css.chars() {
        if ch.is_whitespace() {
            if !prev_ws {
                out.push(' ');
            }
            prev_ws = true;
        } else {
            out.push(ch);
            prev_ws = false;
        }
    }
    out.trim().to_string()
}

/// Validate an HTML/CSS template against the safe subset and return its `asset://` references.
///
/// Fails with [`GraphicsError::TemplateRejected`] per `spec.md` §4.1's rule list.
pub fn validate_template(html: &str, css: &str) -> GraphicsResult<HashSet<String>> {
    let html_lower = html.to_ascii_lowercase();

    for tag in FORBIDDEN_HTML_TAGS {
        if html_lower.contains(tag) {
            return Err(GraphicsError::template_rejected(format!(
                "forbidden tag '{tag}' in template HTML"
            )));
        }
    }

    if contains_inline_event_handler(&html_lower) {
        return Err(GraphicsError::template_rejected(
            "inline event handler attribute in template HTML",
        ));
    }

    for source in [html, css] {
        let lower = source.to_ascii_lowercase();
        for scheme in FORBIDDEN_SCHEME_LITERALS {
            if lower.contains(scheme) {
                return Err(GraphicsError::template_rejected(format!(
                    "disallowed URL scheme '{scheme}'"
                )));
            }
        }
        if let Some(scheme) = find_disallowed_absolute_scheme(&lower) {
            return Err(GraphicsError::template_rejected(format!(
                "disallowed absolute URL scheme '{scheme}://'"
            )));
        }
    }

    let css_lower = css.to_ascii_lowercase();
    if css_lower.contains("</style>") {
        return Err(GraphicsError::template_rejected(
            "'</style>' breakout inside CSS",
        ));
    }
    if css_lower.contains("@import") {
        return Err(GraphicsError::template_rejected(
            "'@import' is not permitted in CSS",
        ));
    }

    Ok(extract_asset_ids(html, css))
}

/// Scan for `on<word>=` inline event handler attributes (`onclick=`, `onerror=`, ...).
fn contains_inline_event_handler(html_lower: &str) -> bool {
    let bytes = html_lower.as_bytes();
    let mut i = 0usize;
    while let Some(rel) = html_lower[i..].find("on") {
        let start = i + rel;
        let mut j = start + 2;
        let mut saw_word_char = false;
        while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
            saw_word_char = true;
            j += 1;
        }
        if saw_word_char {
            let mut k = j;
            while k < bytes.len() && bytes[k] == b' ' {
                k += 1;
            }
            if k < bytes.len() && bytes[k] == b'=' {
                let preceding_is_word_boundary =
                    start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
                if preceding_is_word_boundary {
                    return true;
                }
            }
        }
        i = start + 2;
        if i >= bytes.len() {
            break;
        }
    }
    false
}

/// Find the first `scheme://` prefix whose scheme is not `asset`.
fn find_disallowed_absolute_scheme(lower: &str) -> Option<String> {
    let mut idx = 0usize;
    while let Some(rel) = lower[idx..].find("://") {
        let pos = idx + rel;
        let scheme_start = lower[..pos]
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'))
            .map(|i| i + 1)
            .unwrap_or(0);
        let scheme = &lower[scheme_start..pos];
        if !scheme.is_empty() && scheme != "asset" {
            return Some(scheme.to_string());
        }
        idx = pos + 3;
    }
    None
}

fn extract_asset_ids(html: &str, css: &str) -> HashSet<String> {
    let mut ids = HashSet::new();
    for source in [html, css] {
        let mut rest = source;
        while let Some(rel) = rest.find("asset://") {
            let after = &rest[rel + "asset://".len()..];
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
                .unwrap_or(after.len());
            if end > 0 {
                ids.insert(after[..end].to_string());
            }
            rest = &after[end..];
        }
    }
    ids
}

#[cfg(test)]
#[path = "../../tests/unit/sanitizer/template.rs"]
mod tests;
