use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Forward-slash delimited path of an object inside a container.
///
/// Names taken from a listing are kept byte for byte, so a key always
/// addresses the object it was listed as. Keys built from a local walk are
/// normalised by [`ObjectKey::from_relative_path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap a raw object name. Returns `None` for blank names.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let key = raw.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// Key for `path` relative to the walk `root`, with the platform
    /// separator replaced by `/`. `None` if `path` is not under `root`,
    /// is `root` itself, or is not valid UTF-8.
    pub fn from_relative_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Self::new(parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Local path of this key under `base`.
    ///
    /// `None` when a segment would leave `base` (`..`) or is otherwise not a
    /// plain file name.
    pub fn to_local_path(&self, base: &Path) -> Option<PathBuf> {
        let mut path = base.to_path_buf();
        for segment in self.segments().filter(|s| !s.is_empty() && *s != ".") {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => path.push(part),
                _ => return None,
            }
        }
        Some(path)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a run does, as requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Upload {
        source: PathBuf,
        container: String,
    },
    Download {
        container: String,
        destination: PathBuf,
    },
    Delete {
        container: String,
    },
    List {
        container: Option<String>,
    },
}

impl Operation {
    pub fn container(&self) -> Option<&str> {
        match self {
            Operation::Upload { container, .. }
            | Operation::Download { container, .. }
            | Operation::Delete { container } => Some(container.as_str()),
            Operation::List { container } => container.as_deref(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Upload { .. } => "upload",
            Operation::Download { .. } => "download",
            Operation::Delete { .. } => "delete",
            Operation::List { .. } => "list",
        }
    }
}

/// A job that was abandoned.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub key: ObjectKey,
    pub error: String,
}

/// Outcome of one worker's loop.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub succeeded: u64,
    pub bytes: u64,
    pub failed: Vec<JobFailure>,
}

impl WorkerReport {
    pub fn record_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.bytes += bytes;
    }

    pub fn record_failure(&mut self, key: ObjectKey, error: impl fmt::Display) {
        self.failed.push(JobFailure {
            key,
            error: error.to_string(),
        });
    }
}

/// Aggregated outcome of a run, available once every worker has exited.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub succeeded: u64,
    pub bytes: u64,
    pub failed: Vec<JobFailure>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn merge(&mut self, worker: WorkerReport) {
        self.succeeded += worker.succeeded;
        self.bytes += worker.bytes;
        self.failed.extend(worker.failed);
    }

    /// Jobs that reached a worker, successful or not.
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed.len() as u64
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
