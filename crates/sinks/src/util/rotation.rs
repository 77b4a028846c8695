//! Size-based rotation of the log file chain
//!
//! The chain is the primary file plus numbered generations next to it:
//!
//! ```text
//! logs/
//! ├── herald.log      # generation 0, currently written
//! ├── herald.log.1    # previous file
//! └── herald.log.2    # oldest kept generation (max_files = 3)
//! ```
//!
//! Rotating deletes the oldest generation and shifts every other one up by
//! one, oldest first, so no rename ever overwrites a file that still has to
//! move. Steps whose source file does not exist are skipped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Whether a file of `current_size` bytes has reached the threshold
#[inline]
pub fn should_rotate(current_size: u64, max_size: u64) -> bool {
    current_size >= max_size
}

/// Path of generation `generation` in the chain rooted at `path`
///
/// Generation 0 is the bare path, generation `k` is `path.k`.
pub fn generation_path(path: &Path, generation: usize) -> PathBuf {
    if generation == 0 {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

/// A single filesystem operation of a rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationStep {
    /// Remove the oldest generation
    Delete(PathBuf),
    /// Shift a generation one step older
    Rename { from: PathBuf, to: PathBuf },
}

impl RotationStep {
    /// File the step operates on
    pub fn source(&self) -> &Path {
        match self {
            Self::Delete(path) => path,
            Self::Rename { from, .. } => from,
        }
    }

    fn apply(&self) -> io::Result<()> {
        match self {
            Self::Delete(path) => fs::remove_file(path),
            Self::Rename { from, to } => fs::rename(from, to),
        }
    }

    fn op(&self) -> &'static str {
        match self {
            Self::Delete(_) => "delete",
            Self::Rename { .. } => "rename",
        }
    }
}

/// Compute the moves for one rotation, oldest generation first
///
/// With `max_files == 1` the plan is a single delete of the primary file.
pub fn plan_rotation(path: &Path, max_files: usize) -> Vec<RotationStep> {
    let max_files = max_files.max(1);

    (0..max_files)
        .rev()
        .map(|i| {
            if i == max_files - 1 {
                RotationStep::Delete(generation_path(path, i))
            } else {
                RotationStep::Rename {
                    from: generation_path(path, i),
                    to: generation_path(path, i + 1),
                }
            }
        })
        .collect()
}

/// Rotation failure
///
/// Carries the first step that failed; later steps were still attempted.
#[derive(Debug, Error)]
#[error("rotation failed to {op} '{}' ({failed} of {total} steps failed): {source}", path.display())]
pub struct RotationError {
    pub op: &'static str,
    pub path: PathBuf,
    pub failed: usize,
    pub total: usize,
    #[source]
    pub source: io::Error,
}

/// Summary of an executed plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Steps that touched the filesystem
    pub applied: usize,
    /// Steps skipped because their source did not exist
    pub skipped: usize,
}

/// Execute a plan against the filesystem
///
/// Best effort: a failing step does not stop the remaining ones. The first
/// failure is returned once every step has been attempted.
pub fn execute(plan: &[RotationStep]) -> Result<RotationReport, RotationError> {
    let mut report = RotationReport::default();
    let mut first_error: Option<(usize, io::Error)> = None;
    let mut failed = 0;

    for (idx, step) in plan.iter().enumerate() {
        match step.source().try_exists() {
            Ok(false) => {
                report.skipped += 1;
                continue;
            }
            Ok(true) => {}
            Err(e) => {
                failed += 1;
                first_error.get_or_insert((idx, e));
                continue;
            }
        }

        match step.apply() {
            Ok(()) => report.applied += 1,
            // Raced with another process rotating the same chain
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.skipped += 1,
            Err(e) => {
                failed += 1;
                first_error.get_or_insert((idx, e));
            }
        }
    }

    match first_error {
        None => Ok(report),
        Some((idx, source)) => Err(RotationError {
            op: plan[idx].op(),
            path: plan[idx].source().to_path_buf(),
            failed,
            total: plan.len(),
            source,
        }),
    }
}

/// Size policy bound to one chain
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    path: PathBuf,
    max_size_bytes: u64,
    max_files: usize,
}

impl RotationPolicy {
    pub fn new(path: impl Into<PathBuf>, max_size_bytes: u64, max_files: usize) -> Self {
        Self {
            path: path.into(),
            max_size_bytes,
            max_files: max_files.max(1),
        }
    }

    /// Primary file of the chain
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Whether a primary file of `current_size` bytes must be rotated
    pub fn should_rotate(&self, current_size: u64) -> bool {
        should_rotate(current_size, self.max_size_bytes)
    }

    /// Whether appending `incoming` bytes to a primary file of
    /// `current_size` bytes must start a new generation first
    ///
    /// An empty file always takes the record, so a record larger than the
    /// threshold is written whole.
    pub fn rotates_before(&self, current_size: u64, incoming: u64) -> bool {
        current_size > 0 && self.should_rotate(current_size.saturating_add(incoming))
    }

    /// Moves for one rotation of this chain
    pub fn plan(&self) -> Vec<RotationStep> {
        plan_rotation(&self.path, self.max_files)
    }

    /// Plan and execute one rotation
    ///
    /// The caller must have closed its handle on the primary file.
    pub fn rotate(&self) -> Result<RotationReport, RotationError> {
        let report = execute(&self.plan())?;
        sync_parent_dir(&self.path);
        Ok(report)
    }
}

/// Make the renames durable. Failures are only worth a debug line: the
/// files themselves are intact either way.
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let Err(e) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
            tracing::debug!(dir = %parent.display(), error = %e, "directory sync after rotation failed");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(test)]
#[path = "rotation_test.rs"]
mod rotation_test;
