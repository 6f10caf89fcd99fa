//! Dataset enumeration
//!
//! A dataset is a directory holding one folder per subject:
//!
//! ```text
//! data/
//!   sub-01/
//!   sub-02/
//!     t1/
//!     t2/
//!   sub-03/
//! ```

use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use crate::error::{Result, RunnerError};
use crate::models::{Subject, SubjectList};

/// List the subject folders of a dataset
///
/// Every direct subdirectory whose name does not start with `.` is a
/// subject. Files are skipped. Order is whatever the directory listing
/// returns. Finding no subject at all is a configuration error.
pub fn enumerate(root: &Path) -> Result<SubjectList> {
    if !root.is_dir() {
        error!("Dataset directory not found: {}", root.display());
        return Err(RunnerError::DatasetNotFound(root.to_path_buf()));
    }

    let absolute_root = root.canonicalize()?;
    let mut subjects = Vec::new();

    for entry in fs::read_dir(&absolute_root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if name.starts_with('.') {
            debug!("Skipping hidden entry {}", name);
            continue;
        }

        let path = entry.path();
        if !path.is_dir() {
            debug!("Skipping non-directory entry {}", name);
            continue;
        }

        subjects.push(Subject::new(name, path));
    }

    let subjects = SubjectList::new(root, subjects);
    if subjects.is_empty() {
        let err = RunnerError::NoSubjects(root.to_path_buf());
        error!("{}", err);
        return Err(err);
    }

    info!("Found {} subjects in {}", subjects.len(), root.display());
    Ok(subjects)
}
