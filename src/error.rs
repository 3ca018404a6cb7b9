use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::format::MIN_CONTAINER_LEN;

#[derive(Debug, Error)]
pub enum UnsealError {
    #[error("malformed container: {len} bytes, need at least {min}", min = MIN_CONTAINER_LEN)]
    MalformedContainer { len: usize },

    #[error("Invalid password or corrupted data")]
    AuthenticationFailed,

    #[error("failed to {action} '{}'", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UnsealError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        UnsealError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
