use std::path::PathBuf;

/// Failures surfaced to callers. Everything here is reported before any
/// rendering begins, except `Cancelled` which leaves the film partially
/// written. Failed light or BSRDF samples are not errors; they just end the
/// affected path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found: {0}")]
    FileMissing(PathBuf),

    #[error("malformed scene: {0}")]
    MalformedScene(String),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to build acceleration structure: {0}")]
    Build(String),

    #[error("render cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
