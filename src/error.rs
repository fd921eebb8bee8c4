use std::fmt::{self, Display};
use std::io;
use std::path::{Path, PathBuf};

/// Provides `SimError` and maps to other errors to
/// convert to a `SimError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A city's static edge set was set up a second time.
    DoubleInitialization(String),
    /// A state was committed without a pending evaluation.
    ProtocolViolation(String),
    /// A probability outside [0, 1] or a non-positive duration.
    InvalidParameter(String),
    /// A city group was defined with conflicting lockdown thresholds.
    InconsistentDefinition(String),
    /// A reference to an undefined city or state name.
    UnknownReference(String),
    DuplicateDefinition(String),
    ParseError(String),
    SnapshotMismatch { expected: usize, found: usize },
    /// Wraps an error raised while opening or reading an input or output file.
    InFile {
        file: PathBuf,
        source: Box<SimError>,
    },
    /// Wraps an error raised while reading a row of an input table.
    AtLine {
        file: PathBuf,
        line: usize,
        source: Box<SimError>,
    },
}

impl SimError {
    /// Attaches the file and 1-based line number of the row that caused this error.
    #[must_use]
    pub fn at_line(self, file: &Path, line: usize) -> Self {
        SimError::AtLine {
            file: file.to_path_buf(),
            line,
            source: Box::new(self),
        }
    }

    /// Attaches the path of the file that could not be opened, read or written.
    #[must_use]
    pub fn in_file(self, file: &Path) -> Self {
        SimError::InFile {
            file: file.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// Strips any `AtLine` or `InFile` wrappers and returns the underlying error.
    pub fn root_cause(&self) -> &SimError {
        match self {
            SimError::AtLine { source, .. } | SimError::InFile { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::IoError(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::JsonError(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::CSVError(error)
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::IoError(error) => Some(error),
            SimError::JsonError(error) => Some(error),
            SimError::CSVError(error) => Some(error),
            SimError::AtLine { source, .. } | SimError::InFile { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::IoError(error) => write!(f, "I/O error: {error}"),
            SimError::JsonError(error) => write!(f, "JSON error: {error}"),
            SimError::CSVError(error) => write!(f, "CSV error: {error}"),
            SimError::DoubleInitialization(message)
            | SimError::ProtocolViolation(message)
            | SimError::InvalidParameter(message)
            | SimError::InconsistentDefinition(message)
            | SimError::UnknownReference(message)
            | SimError::DuplicateDefinition(message)
            | SimError::ParseError(message) => write!(f, "{message}"),
            SimError::SnapshotMismatch { expected, found } => write!(
                f,
                "snapshot has {found} rows but the population has {expected} people"
            ),
            SimError::InFile { file, source } => write!(f, "'{}': {source}", file.display()),
            SimError::AtLine { file, line, source } => {
                write!(f, "'{}' line {line}: {source}", file.display())
            }
        }
    }
}
