//! Built-in `inventory` function
//!
//! Counts the files of each contrast folder of a subject. Useful to check a
//! dataset layout before running real analyses on it.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::{JobContext, SubjectTest};
use crate::models::{JobResult, MetricsTable};

/// Per-contrast file counts
pub struct InventoryTest;

#[derive(Debug, Default, PartialEq, Eq)]
struct FolderStats {
    files: u64,
    bytes: u64,
    nifti: u64,
}

impl SubjectTest for InventoryTest {
    fn name(&self) -> &str {
        "inventory"
    }

    fn description(&self) -> &str {
        "Count files, bytes and NIfTI images per contrast folder (params: contrasts to require)"
    }

    fn run(&self, subject: &Path, parameters: &str, _ctx: &JobContext) -> Result<JobResult> {
        let mut contrasts: Vec<String> = list_dirs(subject)?;
        contrasts.sort();

        let required: Vec<&str> = parameters.split_whitespace().collect();
        let mut metrics = MetricsTable::new();
        let mut missing = Vec::new();

        if !required.is_empty() {
            for contrast in &required {
                if contrasts.iter().any(|c| c == contrast) {
                    let stats = folder_stats(&subject.join(contrast))?;
                    push_stats(&mut metrics, contrast, &stats);
                } else {
                    missing.push(*contrast);
                    push_stats(&mut metrics, contrast, &FolderStats::default());
                }
            }
        } else if contrasts.is_empty() {
            let stats = folder_stats(subject)?;
            push_stats(&mut metrics, ".", &stats);
        } else {
            for contrast in &contrasts {
                let stats = folder_stats(&subject.join(contrast))?;
                push_stats(&mut metrics, contrast, &stats);
            }
        }

        if missing.is_empty() {
            Ok(JobResult::success(metrics))
        } else {
            Ok(JobResult::new(
                1,
                format!("Missing contrast folders: {}", missing.join(", ")),
                metrics,
            ))
        }
    }
}

fn push_stats(metrics: &mut MetricsTable, contrast: &str, stats: &FolderStats) {
    metrics.push_row([
        ("contrast", serde_json::Value::from(contrast)),
        ("files", stats.files.into()),
        ("bytes", stats.bytes.into()),
        ("nifti", stats.nifti.into()),
    ]);
}

fn list_dirs(path: &Path) -> Result<Vec<String>> {
    let mut dirs = Vec::new();
    for entry in
        fs::read_dir(path).with_context(|| format!("Failed to read {}", path.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.path().is_dir() {
            dirs.push(name);
        }
    }
    Ok(dirs)
}

fn folder_stats(path: &Path) -> Result<FolderStats> {
    let mut stats = FolderStats::default();
    for entry in
        fs::read_dir(path).with_context(|| format!("Failed to read {}", path.display()))?
    {
        let entry = entry?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            let sub = folder_stats(&entry_path)?;
            stats.files += sub.files;
            stats.bytes += sub.bytes;
            stats.nifti += sub.nifti;
        } else {
            stats.files += 1;
            stats.bytes += entry.metadata()?.len();
            if is_nifti(&entry_path) {
                stats.nifti += 1;
            }
        }
    }
    Ok(stats)
}

fn is_nifti(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}
