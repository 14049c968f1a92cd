use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum EngineError {
    /// I/O error reading a file.
    Io { path: PathBuf, source: std::io::Error },

    /// An `#include` directive named a file that could not be resolved
    /// against the including file's directory or any search folder.
    IncludeNotFound { name: String, from: PathBuf },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::IncludeNotFound { name, from } => {
                write!(f, "Could not resolve #include \"{}\" from {}", name, from.display())
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Read a UTF-8 file into a String (Result-based).
pub fn read_to_string_result(path: &std::path::Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
