//! Consolidation of image assets referenced by the produced Markdown.
//!
//! Runs after every document has been converted: each image reference is
//! resolved against its source document's directory, the file is copied once
//! into the flat assets root, and the reference is rewritten to the relative
//! path from the Markdown file to the copy. Same-named images from different
//! source subdirectories get numbered suffixes so neither overwrites the
//! other.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "svg"];

/// Tracks which source images have been copied and under what name.
pub struct AssetCatalog {
    assets_root: PathBuf,
    /// Canonical source path -> consolidated filename under the assets root.
    mapping: HashMap<PathBuf, String>,
    used_names: HashSet<String>,
    pub copied: usize,
}

/// One document's Markdown after reference rewriting.
pub struct RewriteOutcome {
    pub markdown: String,
    pub changed: bool,
    pub warnings: Vec<String>,
}

impl AssetCatalog {
    pub fn new(assets_root: PathBuf) -> Self {
        Self {
            assets_root,
            mapping: HashMap::new(),
            used_names: HashSet::new(),
            copied: 0,
        }
    }

    /// Copy `source` into the assets root (once per distinct file) and
    /// return the consolidated filename.
    fn consolidate(&mut self, source: &Path) -> std::io::Result<String> {
        if let Some(name) = self.mapping.get(source) {
            return Ok(name.clone());
        }

        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "asset".to_string());

        let mut target_name = filename.clone();
        let mut counter = 1;
        while self.used_names.contains(&target_name) {
            let stem = Path::new(&filename)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            target_name = match Path::new(&filename).extension() {
                Some(ext) => format!("{}_{}.{}", stem, counter, ext.to_string_lossy()),
                None => format!("{}_{}", stem, counter),
            };
            counter += 1;
        }

        fs::copy(source, self.assets_root.join(&target_name))?;
        self.copied += 1;

        self.used_names.insert(target_name.clone());
        self.mapping.insert(source.to_path_buf(), target_name.clone());
        Ok(target_name)
    }
}

/// Rewrite every image reference in one document, copying assets as needed.
///
/// Handles both `![alt](src)` and residual `<img src="...">` forms. External
/// URLs, `data:` URIs and viewer-chrome references under `template/` are
/// left untouched; references to files that do not exist produce a warning
/// and keep their original text.
pub fn rewrite_image_references(
    catalog: &mut AssetCatalog,
    markdown: &str,
    source_doc: &Path,
    output_doc: &Path,
) -> RewriteOutcome {
    let mut warnings = Vec::new();

    let md_img_re = Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap();
    let text = md_img_re
        .replace_all(markdown, |caps: &regex::Captures| {
            match resolve_reference(catalog, &caps[2], source_doc, output_doc, &mut warnings) {
                Some(new_ref) => format!("![{}]({})", &caps[1], new_ref),
                None => caps[0].to_string(),
            }
        })
        .to_string();

    let html_img_re = Regex::new(r#"(?i)(<img\b[^>]*?\bsrc\s*=\s*")([^"]+)(")"#).unwrap();
    let text = html_img_re
        .replace_all(&text, |caps: &regex::Captures| {
            match resolve_reference(catalog, &caps[2], source_doc, output_doc, &mut warnings) {
                Some(new_ref) => format!("{}{}{}", &caps[1], new_ref, &caps[3]),
                None => caps[0].to_string(),
            }
        })
        .to_string();

    RewriteOutcome {
        changed: text != markdown,
        markdown: text,
        warnings,
    }
}

fn resolve_reference(
    catalog: &mut AssetCatalog,
    raw: &str,
    source_doc: &Path,
    output_doc: &Path,
    warnings: &mut Vec<String>,
) -> Option<String> {
    if is_external(raw) {
        return None;
    }
    if is_nav_asset(raw) {
        log::debug!("skipping viewer-chrome asset: {}", raw);
        return None;
    }

    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let normalized = decoded.replace('\\', "/");

    if !has_image_extension(&normalized) {
        return None;
    }

    let source_dir = source_doc.parent().unwrap_or_else(|| Path::new(""));
    let candidate = source_dir.join(&normalized);
    let candidate = match fs::canonicalize(&candidate) {
        Ok(path) if path.is_file() => path,
        _ => {
            let message = format!(
                "image {} referenced from {} not found in source tree",
                raw,
                source_doc.display()
            );
            log::warn!("{}", message);
            warnings.push(message);
            return None;
        }
    };

    match catalog.consolidate(&candidate) {
        Ok(name) => {
            let target = catalog.assets_root.join(name);
            let output_dir = output_doc.parent().unwrap_or_else(|| Path::new(""));
            let rel = relative_to(output_dir, &target);
            // keep the link URL-safe; spaces are the only thing the export
            // tool actually puts in image filenames
            Some(rel.to_string_lossy().replace('\\', "/").replace(' ', "%20"))
        }
        Err(e) => {
            let message = format!("failed to copy {}: {}", candidate.display(), e);
            log::warn!("{}", message);
            warnings.push(message);
            None
        }
    }
}

fn is_external(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("//")
        || lower.starts_with("data:")
}

fn is_nav_asset(reference: &str) -> bool {
    let normalized = reference.replace('\\', "/").to_ascii_lowercase();
    normalized.starts_with("template/")
        || normalized.starts_with("template2/")
        || normalized.contains("/template/")
        || normalized.contains("/template2/")
}

fn has_image_extension(reference: &str) -> bool {
    Path::new(reference)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Relative path from `from_dir` to `target`; both must share a root (in
/// practice both are canonical absolute paths under the working tree).
pub(crate) fn relative_to(from_dir: &Path, target: &Path) -> PathBuf {
    let from: Vec<_> = from_dir.components().collect();
    let to: Vec<_> = target.components().collect();

    let mut common = 0;
    while common < from.len() && common < to.len() && from[common] == to[common] {
        common += 1;
    }

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for comp in &to[common..] {
        rel.push(comp);
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let src = base.join("src");
        let docs = base.join("docs");
        let assets = base.join("assets");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&docs).unwrap();
        fs::create_dir_all(&assets).unwrap();
        (dir, src, docs, assets)
    }

    #[test]
    fn test_relative_to_sibling_tree() {
        let rel = relative_to(
            Path::new("/work/docs/chapter1"),
            Path::new("/work/assets/logo.png"),
        );
        assert_eq!(rel, Path::new("../../assets/logo.png"));
    }

    #[test]
    fn test_relative_to_same_dir() {
        let rel = relative_to(Path::new("/work/docs"), Path::new("/work/docs/a.png"));
        assert_eq!(rel, Path::new("a.png"));
    }

    #[test]
    fn test_rewrites_markdown_image_and_copies() {
        let (_dir, src, docs, assets) = setup();
        fs::create_dir_all(src.join("chapter1/images")).unwrap();
        fs::write(src.join("chapter1/images/logo.png"), b"png-bytes").unwrap();

        let mut catalog = AssetCatalog::new(assets.clone());
        let outcome = rewrite_image_references(
            &mut catalog,
            "![logo](images/logo.png)",
            &src.join("chapter1/intro.html"),
            &docs.join("chapter1/intro.md"),
        );

        assert!(outcome.changed);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.markdown, "![logo](../../assets/logo.png)");
        assert!(assets.join("logo.png").is_file());
        assert_eq!(catalog.copied, 1);
    }

    #[test]
    fn test_same_source_copied_once() {
        let (_dir, src, docs, assets) = setup();
        fs::create_dir_all(src.join("images")).unwrap();
        fs::write(src.join("images/pic.png"), b"x").unwrap();

        let mut catalog = AssetCatalog::new(assets);
        let md = "![a](images/pic.png)\n\n![b](images/pic.png)";
        let outcome = rewrite_image_references(
            &mut catalog,
            md,
            &src.join("page.html"),
            &docs.join("page.md"),
        );

        assert_eq!(catalog.copied, 1);
        assert_eq!(
            outcome.markdown,
            "![a](../assets/pic.png)\n\n![b](../assets/pic.png)"
        );
    }

    #[test]
    fn test_name_collision_gets_numbered_suffix() {
        let (_dir, src, docs, assets) = setup();
        fs::create_dir_all(src.join("a")).unwrap();
        fs::create_dir_all(src.join("b")).unwrap();
        fs::write(src.join("a/logo.png"), b"first").unwrap();
        fs::write(src.join("b/logo.png"), b"second").unwrap();

        let mut catalog = AssetCatalog::new(assets.clone());
        rewrite_image_references(
            &mut catalog,
            "![](logo.png)",
            &src.join("a/one.html"),
            &docs.join("a/one.md"),
        );
        let outcome = rewrite_image_references(
            &mut catalog,
            "![](logo.png)",
            &src.join("b/two.html"),
            &docs.join("b/two.md"),
        );

        assert_eq!(catalog.copied, 2);
        assert_eq!(fs::read(assets.join("logo.png")).unwrap(), b"first");
        assert_eq!(fs::read(assets.join("logo_1.png")).unwrap(), b"second");
        assert!(outcome.markdown.contains("logo_1.png"));
    }

    #[test]
    fn test_missing_image_warns_and_keeps_reference() {
        let (_dir, src, docs, assets) = setup();

        let mut catalog = AssetCatalog::new(assets);
        let outcome = rewrite_image_references(
            &mut catalog,
            "![gone](images/gone.png)",
            &src.join("page.html"),
            &docs.join("page.md"),
        );

        assert!(!outcome.changed);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("gone.png"));
        assert_eq!(outcome.markdown, "![gone](images/gone.png)");
    }

    #[test]
    fn test_external_and_data_references_untouched() {
        let (_dir, src, docs, assets) = setup();

        let mut catalog = AssetCatalog::new(assets);
        let md = "![](https://example.com/x.png) ![](data:image/png;base64,AAAA) ![](//cdn/x.png)";
        let outcome = rewrite_image_references(
            &mut catalog,
            md,
            &src.join("page.html"),
            &docs.join("page.md"),
        );

        assert!(!outcome.changed);
        assert!(outcome.warnings.is_empty());
        assert_eq!(catalog.copied, 0);
    }

    #[test]
    fn test_template_chrome_skipped_silently() {
        let (_dir, src, docs, assets) = setup();

        let mut catalog = AssetCatalog::new(assets);
        let outcome = rewrite_image_references(
            &mut catalog,
            "![](template/nav_up.png)",
            &src.join("page.html"),
            &docs.join("page.md"),
        );

        assert!(!outcome.changed);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_html_img_src_rewritten() {
        let (_dir, src, docs, assets) = setup();
        fs::create_dir_all(src.join("images")).unwrap();
        fs::write(src.join("images/chart.gif"), b"gif").unwrap();

        let mut catalog = AssetCatalog::new(assets);
        let outcome = rewrite_image_references(
            &mut catalog,
            r#"<td><img src="images/chart.gif"></td>"#,
            &src.join("page.html"),
            &docs.join("page.md"),
        );

        assert_eq!(outcome.markdown, r#"<td><img src="../assets/chart.gif"></td>"#);
    }

    #[test]
    fn test_percent_encoded_reference_resolves() {
        let (_dir, src, docs, assets) = setup();
        fs::create_dir_all(src.join("images")).unwrap();
        fs::write(src.join("images/two words.png"), b"x").unwrap();

        let mut catalog = AssetCatalog::new(assets.clone());
        let outcome = rewrite_image_references(
            &mut catalog,
            "![](images/two%20words.png)",
            &src.join("page.html"),
            &docs.join("page.md"),
        );

        assert_eq!(catalog.copied, 1);
        assert!(assets.join("two words.png").is_file());
        assert!(outcome.changed);
    }

    #[test]
    fn test_non_image_reference_untouched() {
        let (_dir, src, docs, assets) = setup();

        let mut catalog = AssetCatalog::new(assets);
        let outcome = rewrite_image_references(
            &mut catalog,
            "![](download/manual.pdf)",
            &src.join("page.html"),
            &docs.join("page.md"),
        );

        assert!(!outcome.changed);
        assert!(outcome.warnings.is_empty());
    }
}
