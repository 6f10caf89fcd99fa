//! Subjects, jobs and job results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::MetricsTable;

/// One subject folder of a dataset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub path: PathBuf,
}

impl Subject {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

/// Subjects of a dataset in directory-listing order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectList {
    root: PathBuf,
    subjects: Vec<Subject>,
}

impl SubjectList {
    pub fn new(root: impl Into<PathBuf>, subjects: Vec<Subject>) -> Self {
        Self {
            root: root.into(),
            subjects,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Full subject paths, index-aligned with `names()`
    #[cfg(test)]
    pub fn paths(&self) -> Vec<&Path> {
        self.subjects.iter().map(|s| s.path.as_path()).collect()
    }

    /// Bare subject names, index-aligned with `paths()`
    pub fn names(&self) -> Vec<&str> {
        self.subjects.iter().map(|s| s.name.as_str()).collect()
    }
}

/// One invocation of a function on one subject
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Submission index within the run
    pub index: usize,
    pub function: String,
    pub subject: Subject,
    pub parameters: String,
}

impl Job {
    /// Build one job per subject with the same function and parameters
    pub fn for_subjects(function: &str, subjects: &SubjectList, parameters: &str) -> Vec<Job> {
        subjects
            .subjects()
            .iter()
            .enumerate()
            .map(|(index, subject)| Job {
                index,
                function: function.to_string(),
                subject: subject.clone(),
                parameters: parameters.to_string(),
            })
            .collect()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} on {}", self.index, self.function, self.subject.name)
    }
}

/// Outcome of one job: status code, free-form output and metrics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: i32,
    pub output: String,
    pub metrics: MetricsTable,
}

impl JobResult {
    pub fn new(status: i32, output: impl Into<String>, metrics: MetricsTable) -> Self {
        Self {
            status,
            output: output.into(),
            metrics,
        }
    }

    /// Status 0 with no output
    pub fn success(metrics: MetricsTable) -> Self {
        Self::new(0, "", metrics)
    }
}
