//! Pre-conversion cleanup of Word/WinCHM HTML.
//!
//! The export tool wraps everything in inline styles, `<span>` soup and
//! Office VML markup that general-purpose converters turn into noise.
//! Stripping it before conversion gives far cleaner Markdown than trying to
//! repair the converter's output afterwards.

use regex::Regex;

/// Remove `<style>`/`<script>` blocks and HTML comments wholesale.
pub fn strip_heavy_blocks(html: &str) -> String {
    let mut text = html.to_string();

    let style_re = Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap();
    text = style_re.replace_all(&text, "").to_string();

    let script_re = Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap();
    text = script_re.replace_all(&text, "").to_string();

    let comment_re = Regex::new(r"(?s)<!--.*?-->").unwrap();
    text = comment_re.replace_all(&text, "").to_string();

    text
}

/// Make Word-exported HTML converter-friendly:
/// - drop Office VML namespace tags (`<v:...>`, `<o:...>`, `<w:...>`)
/// - remove `<span>` wrappers, keeping their content
/// - strip attributes from common structural tags
/// - shrink `<img>` to only its `src`, `<a>` to only its `href`
pub fn sanitize_export_html(html: &str) -> String {
    let mut text = html.to_string();

    let vml_re = Regex::new(r"(?i)</?(?:v|o|w):[^>]*>").unwrap();
    text = vml_re.replace_all(&text, "").to_string();

    let span_open_re = Regex::new(r"(?i)<span\b[^>]*>").unwrap();
    text = span_open_re.replace_all(&text, "").to_string();

    let span_close_re = Regex::new(r"(?i)</span\s*>").unwrap();
    text = span_close_re.replace_all(&text, "").to_string();

    let tag_attr_re = Regex::new(
        r"(?i)<(div|p|table|thead|tbody|tfoot|tr|td|th|colgroup|col|h[1-6]|ul|ol|li)\b[^>]*>",
    )
    .unwrap();
    text = tag_attr_re.replace_all(&text, "<${1}>").to_string();

    let img_re = Regex::new(r"(?i)<img\b[^>]*>").unwrap();
    let img_src_re = Regex::new(r#"(?i)src\s*=\s*"([^"]+)""#).unwrap();
    text = img_re
        .replace_all(&text, |caps: &regex::Captures| {
            match img_src_re.captures(&caps[0]) {
                Some(src) => format!(r#"<img src="{}">"#, &src[1]),
                None => "<img>".to_string(),
            }
        })
        .to_string();

    let anchor_re = Regex::new(r"(?i)<a\b[^>]*>").unwrap();
    let anchor_href_re = Regex::new(r#"(?i)href\s*=\s*"([^"]+)""#).unwrap();
    text = anchor_re
        .replace_all(&text, |caps: &regex::Captures| {
            match anchor_href_re.captures(&caps[0]) {
                Some(href) => format!(r#"<a href="{}">"#, &href[1]),
                None => "<a>".to_string(),
            }
        })
        .to_string();

    text
}

/// Full pre-conversion pipeline.
pub fn clean_for_conversion(html: &str) -> String {
    sanitize_export_html(&strip_heavy_blocks(html))
}
