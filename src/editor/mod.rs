pub mod merge;

use crate::editor::merge::{MergeError, MANIFEST_KEY_ORDER};
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Check short and long suffixes, like `foo.bar.tar.gz` and `foo.gz`.
pub fn has_any_suffix(name: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|suffix| name.ends_with(suffix))
}

/// A YAML file eligible for merging. `*.patch.yaml` and `*.patch.yml` files
/// are overlays of their own and are never merged into.
pub fn is_yaml_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };

    if has_any_suffix(name, &[".patch.yaml", ".patch.yml"]) {
        debug!("Skipping patch file: {}", path.display());
        return false;
    }

    has_any_suffix(name, &[".yaml", ".yml"])
}

/// Check if a path exists and is a regular file.
pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Copy a single file.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest)
        .with_context(|| format!("could not copy {} to {}", src.display(), dest.display()))?;
    Ok(())
}

/// Merge two YAML files and return the merged document as text.
/// The overlay file's values win on conflicting keys.
pub fn merge_files(base: &Path, overlay: &Path) -> Result<String> {
    let base_text = fs::read_to_string(base)
        .with_context(|| format!("could not read file {}", base.display()))?;
    let overlay_text = fs::read_to_string(overlay)
        .with_context(|| format!("could not read file {}", overlay.display()))?;

    let base_doc = merge::parse_document(&base.display().to_string(), &base_text)?;
    let overlay_doc = merge::parse_document(&overlay.display().to_string(), &overlay_text)?;

    let merged = merge::merge_documents(&base_doc, &overlay_doc, MANIFEST_KEY_ORDER)?;

    Ok(serde_yaml::to_string(&merged).map_err(MergeError::Encode)?)
}

/// Merge `overlay` into `target` in place, creating missing directories.
/// A missing or empty target takes the overlay content as a plain copy.
pub fn merge_file_in_place(target: &Path, overlay: &Path) -> Result<()> {
    if let Some(dir) = target.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            debug!("Directory '{}' not found, creating it.", dir.display());
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
    }

    let merged = if file_exists(target) && has_document_content(target)? {
        merge_files(target, overlay)?
    } else {
        debug!(
            "File '{}' missing or empty, copying {} as-is.",
            target.display(),
            overlay.display()
        );
        fs::read_to_string(overlay)
            .with_context(|| format!("could not read file {}", overlay.display()))?
    };

    fs::write(target, merged)
        .with_context(|| format!("could not write merged file {}", target.display()))?;

    Ok(())
}

/// Merge an overlay file into every YAML file under `root`, in place.
pub fn apply_overlay_recursively(root: &Path, overlay: &Path) -> Result<()> {
    let overlay_text = fs::read_to_string(overlay)
        .with_context(|| format!("could not read file {}", overlay.display()))?;
    let overlay_doc = merge::parse_document(&overlay.display().to_string(), &overlay_text)?;

    for entry in WalkDir::new(root) {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !is_yaml_file(path) {
            debug!("Skipping non-YAML file: {}", path.display());
            continue;
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read file {}", path.display()))?;
        let doc = merge::parse_document(&path.display().to_string(), &text)?;
        let merged = merge::merge_documents(&doc, &overlay_doc, MANIFEST_KEY_ORDER)?;
        let merged_text = serde_yaml::to_string(&merged).map_err(MergeError::Encode)?;

        fs::write(path, merged_text)
            .with_context(|| format!("could not write merged file {}", path.display()))?;
        debug!("Applied overlay to: {}", path.display());
    }

    Ok(())
}

/// Copy a template tree into a target tree. A YAML file that already exists
/// at the destination is merged with the incoming template version instead of
/// being overwritten; everything else is a plain copy.
pub fn sync_dir(source: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        fs::create_dir_all(target)
            .with_context(|| format!("failed to create directory {}", target.display()))?;
    }

    for entry in WalkDir::new(source) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .expect("walkdir entries start with the walk root");
        if rel.as_os_str().is_empty() {
            continue;
        }

        let dest = target.join(rel);

        if entry.path().is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("failed to create directory {}", dest.display()))?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        if is_yaml_file(entry.path()) && file_exists(&dest) {
            debug!(
                "YAML file exists at {}, merging with {}.",
                dest.display(),
                entry.path().display()
            );
            let merged = merge_files(&dest, entry.path())?;
            fs::write(&dest, merged)
                .with_context(|| format!("could not write merged file {}", dest.display()))?;
        } else {
            copy_file(entry.path(), &dest)?;
        }
    }

    Ok(())
}

// An empty file parses to a null document, which has no root mapping to merge
fn has_document_content(path: &Path) -> Result<bool> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read file {}", path.display()))?;
    Ok(!text.trim().is_empty())
}
