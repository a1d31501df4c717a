use std::{error::Error, fmt, path::PathBuf};

#[derive(Debug)]
pub enum FileSystemError {
    File {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    Directory {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    NotADirectory {
        path: PathBuf,
    },

    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::File {
                path,
                action,
                source,
            } => {
                write!(f, "Failed to {action} file `{}`: {source}", path.display())
            }
            FileSystemError::Directory {
                path,
                action,
                source,
            } => {
                write!(
                    f,
                    "Failed to {action} directory `{}`: {source}",
                    path.display()
                )
            }
            FileSystemError::NotADirectory { path } => {
                write!(f, "`{}` exists but is not a directory", path.display())
            }
            FileSystemError::Rename { from, to, source } => {
                write!(
                    f,
                    "Failed to rename `{}` to `{}`: {source}",
                    from.display(),
                    to.display()
                )
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileSystemError::File { source, .. }
            | FileSystemError::Directory { source, .. }
            | FileSystemError::Rename { source, .. } => Some(source),
            FileSystemError::NotADirectory { .. } => None,
        }
    }
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
