//! Import run orchestration.
//!
//! Single pass over the export tree: every HTML document goes through
//! decode → sanitize → convert → post-process and lands at its mirrored
//! path under the docs root. Only after the full set of documents exists
//! does the asset phase copy referenced images and rewrite the references
//! (the rewrite targets depend on every produced document being in place).
//!
//! A broken document never aborts the batch; failures are collected in the
//! report so a human can re-run or fix just those files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::assets::{rewrite_image_references, AssetCatalog};
use crate::convert::MarkdownConverter;
use crate::encoding::decode_html;
use crate::error::{ImportError, Result};
use crate::postprocess::postprocess;
use crate::sanitize::clean_for_conversion;

pub use crate::postprocess::RenderProfile;

/// Everything a run needs. Paths may be relative to the working directory.
pub struct ImportOptions {
    pub source_root: PathBuf,
    pub docs_root: PathBuf,
    pub assets_root: PathBuf,
    pub profile: RenderProfile,
    /// Delete both output roots before writing.
    pub clean: bool,
    pub converter: MarkdownConverter,
}

impl ImportOptions {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            docs_root: PathBuf::from("docs"),
            assets_root: PathBuf::from("assets"),
            profile: RenderProfile::default(),
            clean: false,
            converter: MarkdownConverter::new(),
        }
    }
}

/// One document that could not be converted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFailure {
    /// Path relative to the source root.
    pub path: String,
    pub reason: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub converted: usize,
    pub assets_copied: usize,
    pub failures: Vec<DocumentFailure>,
    pub asset_warnings: Vec<String>,
}

impl ImportReport {
    /// True when every document converted and every image reference resolved.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.asset_warnings.is_empty()
    }
}

/// Run the import. Configuration problems fail fast before anything is
/// written; per-document and per-asset problems are collected in the report.
pub async fn run_import(options: &ImportOptions) -> Result<ImportReport> {
    let source_root = fs::canonicalize(&options.source_root)
        .map_err(|_| ImportError::SourceNotFound(options.source_root.clone()))?;
    if !source_root.is_dir() {
        return Err(ImportError::SourceNotFound(options.source_root.clone()));
    }

    // The clean step must never be able to reach the source tree, and the
    // source tree must never receive output; reject overlap in either
    // direction before touching anything.
    for output in [&options.docs_root, &options.assets_root] {
        let absolute = absolute_path(output)?;
        if absolute.starts_with(&source_root) || source_root.starts_with(&absolute) {
            return Err(ImportError::OutputOverlapsSource {
                output: absolute,
                source_root: source_root,
            });
        }
    }

    if !options.converter.is_available().await {
        return Err(ImportError::ConverterUnavailable(
            options.converter.program().to_string(),
        ));
    }

    let documents = collect_documents(&source_root);
    if documents.is_empty() {
        return Err(ImportError::NoDocuments(source_root));
    }

    if options.clean {
        for root in [&options.docs_root, &options.assets_root] {
            if root.exists() {
                fs::remove_dir_all(root)?;
            }
        }
    }
    fs::create_dir_all(&options.docs_root)?;
    fs::create_dir_all(&options.assets_root)?;
    let docs_root = fs::canonicalize(&options.docs_root)?;
    let assets_root = fs::canonicalize(&options.assets_root)?;

    let mut report = ImportReport::default();
    let mut produced: Vec<(PathBuf, PathBuf)> = Vec::new();

    for source_path in &documents {
        let relative = source_path.strip_prefix(&source_root).unwrap_or(source_path);
        let output_path = docs_root.join(relative).with_extension("md");

        match convert_document(options, source_path).await {
            Ok(markdown) => {
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&output_path, markdown)?;
                log::info!("converted {}", relative.display());
                report.converted += 1;
                produced.push((source_path.clone(), output_path));
            }
            Err(reason) => {
                log::warn!("skipping {}: {}", source_path.display(), reason);
                report.failures.push(DocumentFailure {
                    path: relative.display().to_string(),
                    reason,
                });
            }
        }
    }

    let mut catalog = AssetCatalog::new(assets_root);
    for (source_path, output_path) in &produced {
        let markdown = fs::read_to_string(output_path)?;
        let outcome = rewrite_image_references(&mut catalog, &markdown, source_path, output_path);
        if outcome.changed {
            fs::write(output_path, outcome.markdown)?;
        }
        report.asset_warnings.extend(outcome.warnings);
    }
    report.assets_copied = catalog.copied;

    Ok(report)
}

/// The per-document pipeline; any error here skips the document only.
async fn convert_document(
    options: &ImportOptions,
    path: &Path,
) -> std::result::Result<String, String> {
    let bytes = fs::read(path).map_err(|e| format!("read failed: {}", e))?;

    let decoded = decode_html(&bytes);
    if decoded.had_errors {
        return Err(format!(
            "malformed {} byte sequence",
            decoded.encoding.name()
        ));
    }

    let cleaned = clean_for_conversion(&decoded.text);
    let markdown = options
        .converter
        .convert(&cleaned)
        .await
        .map_err(|e| e.to_string())?;

    Ok(postprocess(&markdown, options.profile))
}

/// Enumerate source documents in sorted order (sorted so collision renaming
/// in the asset phase is reproducible run to run).
fn collect_documents(source_root: &Path) -> Vec<PathBuf> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(source_root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let relative = path.strip_prefix(source_root).unwrap_or(path);
        if should_skip(relative) {
            continue;
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        if matches!(extension.as_deref(), Some("htm") | Some("html")) {
            documents.push(path.to_path_buf());
        }
    }

    documents
}

/// Skip rules for the export tree: the viewer template directories and the
/// per-chapter `header.htm` chrome inside `*.files` directories are not
/// content.
fn should_skip(relative: &Path) -> bool {
    if let Some(std::path::Component::Normal(first)) = relative.components().next() {
        let first = first.to_string_lossy().to_lowercase();
        if first == "template" || first == "template2" {
            return true;
        }
    }

    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name == "header.htm" {
        if let Some(parent) = relative.parent().and_then(|p| p.file_name()) {
            if parent.to_string_lossy().to_lowercase().ends_with(".files") {
                return true;
            }
        }
    }

    false
}

/// Best-effort absolute form of a path that may not exist yet.
fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
