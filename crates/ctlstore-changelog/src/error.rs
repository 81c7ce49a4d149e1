use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("changelog write line contains a newline or exceeds the rotation size")]
    InvalidLine,

    #[error("changelog path did not appear within the startup grace period")]
    PathNeverAppeared,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, ChangelogError>;
