//! Connection descriptor parsing.
//!
//! Accepts SQLAlchemy-style SQLite URIs:
//!
//! | descriptor                      | target                         |
//! |---------------------------------|--------------------------------|
//! | `sqlite://`                     | in-memory database             |
//! | `sqlite:///:memory:`            | in-memory database             |
//! | `sqlite:///notifications.db`    | file relative to the cwd       |
//! | `sqlite:////var/lib/app/db.db`  | absolute file path             |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::SessionError;

const SQLITE_SCHEME: &str = "sqlite://";
const MEMORY_PATH: &str = ":memory:";

/// Backing store named by a connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// In-memory database owned by one engine.
    Memory,
    /// Database file on disk.
    File(PathBuf),
}

impl ConnectionDescriptor {
    pub fn parse(uri: &str) -> Result<Self, SessionError> {
        let uri = uri.trim();
        let rest = uri.strip_prefix(SQLITE_SCHEME).ok_or_else(|| {
            SessionError::InvalidDescriptor(format!("unsupported scheme in '{uri}'"))
        })?;

        if rest.is_empty() {
            return Ok(Self::Memory);
        }

        // The host part must be empty: `sqlite://host/...` is meaningless.
        let path = rest.strip_prefix('/').ok_or_else(|| {
            SessionError::InvalidDescriptor(format!("expected 'sqlite:///<path>', got '{uri}'"))
        })?;

        match path {
            "" => Err(SessionError::InvalidDescriptor(format!(
                "missing database path in '{uri}'"
            ))),
            MEMORY_PATH => Ok(Self::Memory),
            p if p.contains('?') => Err(SessionError::InvalidDescriptor(format!(
                "query options are not supported in '{uri}'"
            ))),
            p => Ok(Self::File(PathBuf::from(p))),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// Path handed to SQLite for a file descriptor.
///
/// SQLite treats any filename starting with `file:` as a URI, so such
/// relative paths are anchored to the working directory.
pub(crate) fn open_path(path: &Path) -> PathBuf {
    if path.is_relative() && path.to_string_lossy().starts_with("file:") {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "{SQLITE_SCHEME}/{MEMORY_PATH}"),
            Self::File(path) => write!(f, "{SQLITE_SCHEME}/{}", path.display()),
        }
    }
}
