use std::fmt;
use std::path::PathBuf;

/// One discovered artifact to be handed to an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Report (or archive) the tool is pointed at
    pub artifact: PathBuf,
    /// Target name as given on the command line, e.g. `P2IM/CNC`
    pub target: String,
    /// Position of the artifact in the target's sorted discovery order
    pub ordinal: usize,
}

impl Job {
    pub fn new(artifact: PathBuf, target: impl Into<String>, ordinal: usize) -> Self {
        Self {
            artifact,
            target: target.into(),
            ordinal,
        }
    }

    /// 1-based run-group number used in output names
    pub fn run_number(&self) -> usize {
        self.ordinal + 1
    }

    /// File name of the artifact, lossily converted
    pub fn file_name(&self) -> String {
        self.artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.target, self.artifact.display())
    }
}
