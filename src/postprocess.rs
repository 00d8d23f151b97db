//! Rendering-profile cleanup of converted Markdown.
//!
//! The converter's output is correct but noisy for the target viewer:
//! wrapper `<div>`s, `<colgroup>` markup and table attributes that GitHub
//! ignores, raw `<img>` tags where Markdown syntax reads better, and
//! document links still pointing at `.htm` files. Complex tables the
//! converter emits as raw embedded HTML are left as-is; restructuring them
//! into pipe-table syntax is out of scope.

use regex::Regex;

/// Post-processing rule set, per target Markdown viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderProfile {
    /// GitHub-flavored viewers.
    #[default]
    Github,
    /// Converter output untouched apart from whitespace normalization.
    Raw,
}

/// Whitespace normalization applied to every profile.
pub fn normalize_markdown(md: &str) -> String {
    let mut text = md.replace("\r\n", "\n");
    text = text.trim_start_matches('\n').to_string();

    let blank_run_re = Regex::new(r"\n{4,}").unwrap();
    text = blank_run_re.replace_all(&text, "\n\n\n").to_string();

    text
}

/// Apply the profile's rewrites on top of [`normalize_markdown`].
pub fn postprocess(md: &str, profile: RenderProfile) -> String {
    let text = normalize_markdown(md);
    match profile {
        RenderProfile::Github => postprocess_for_github(&text),
        RenderProfile::Raw => text,
    }
}

fn postprocess_for_github(md: &str) -> String {
    // Drop lines that are nothing but a div wrapper
    let div_only_re = Regex::new(r"(?i)^\s*</?div>\s*$").unwrap();
    let mut text = md
        .lines()
        .filter(|line| !div_only_re.is_match(line))
        .collect::<Vec<_>>()
        .join("\n");

    let colgroup_re = Regex::new(r"(?is)<colgroup\b.*?</colgroup\s*>").unwrap();
    text = colgroup_re.replace_all(&text, "").to_string();

    let col_re = Regex::new(r"(?i)<col\b[^>]*>").unwrap();
    text = col_re.replace_all(&text, "").to_string();

    let table_re = Regex::new(r"(?i)<table\b[^>]*>").unwrap();
    text = table_re.replace_all(&text, "<table>").to_string();

    // Markdown image syntax renders inside HTML tables too, and reads better
    let img_re = Regex::new(r#"(?i)<img\b[^>]*\bsrc\s*=\s*"([^"]+)"[^>]*>"#).unwrap();
    text = img_re.replace_all(&text, "![](${1})").to_string();

    // <p> wrappers are common in the converter's HTML table output
    let p_open_re = Regex::new(r"(?i)<p\b[^>]*>").unwrap();
    text = p_open_re.replace_all(&text, "").to_string();
    let p_close_re = Regex::new(r"(?i)</p\s*>").unwrap();
    text = p_close_re.replace_all(&text, "").to_string();

    // Internal document links follow the source tree into its new layout
    let md_link_re = Regex::new(r"\]\(([^)]+)\)").unwrap();
    text = md_link_re
        .replace_all(&text, |caps: &regex::Captures| {
            match rewrite_doc_link(&caps[1]) {
                Some(target) => format!("]({})", target),
                None => caps[0].to_string(),
            }
        })
        .to_string();

    let anchor_re = Regex::new(r#"(?i)<a href="([^"]+)">"#).unwrap();
    text = anchor_re
        .replace_all(&text, |caps: &regex::Captures| {
            match rewrite_doc_link(&caps[1]) {
                Some(target) => format!(r#"<a href="{}">"#, target),
                None => caps[0].to_string(),
            }
        })
        .to_string();

    let blank_run_re = Regex::new(r"\n{4,}").unwrap();
    text = blank_run_re.replace_all(&text, "\n\n\n").to_string();

    text.trim().to_string() + "\n"
}

/// Map a relative `.htm`/`.html` link onto the mirrored Markdown tree,
/// keeping any fragment. External and non-document links return `None`.
fn rewrite_doc_link(href: &str) -> Option<String> {
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("mailto:")
    {
        return None;
    }

    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };

    let path_lower = path.to_ascii_lowercase();
    let stem_len = if path_lower.ends_with(".html") {
        path.len() - 5
    } else if path_lower.ends_with(".htm") {
        path.len() - 4
    } else {
        return None;
    };

    let mut target = format!("{}.md", &path[..stem_len]);
    if let Some(fragment) = fragment {
        target.push('#');
        target.push_str(fragment);
    }
    Some(target)
}
