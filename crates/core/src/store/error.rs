use std::error::Error;
use std::fmt;

/// What went wrong in a store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The backing storage could not be reached.
    Unavailable,
    /// The path is not a key this store can hold, e.g. it lies outside the site.
    InvalidPath,
    /// The row exists but its content could not be decoded.
    Corrupted,
}

impl StoreErrorKind {
    fn describe(self) -> &'static str {
        match self {
            StoreErrorKind::Unavailable => "store unavailable while reading",
            StoreErrorKind::InvalidPath => "path is not part of the store",
            StoreErrorKind::Corrupted => "corrupted content at",
        }
    }
}

/// Failure of a content or link store call, tied to the path it was made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    kind: StoreErrorKind,
    path: String,
    detail: Option<String>,
}

impl StoreError {
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self { kind: StoreErrorKind::InvalidPath, path: path.into(), detail: None }
    }

    pub fn unavailable(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { kind: StoreErrorKind::Unavailable, path: path.into(), detail: Some(detail.into()) }
    }

    pub fn corrupted(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { kind: StoreErrorKind::Corrupted, path: path.into(), detail: Some(detail.into()) }
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// The path the failing call was made for.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.kind.describe(), self.path)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StoreError::invalid_path("ftp://x/a"), "path is not part of the store \"ftp://x/a\"")]
    #[case(
        StoreError::unavailable("http://x/a", "connection reset"),
        "store unavailable while reading \"http://x/a\": connection reset"
    )]
    #[case(
        StoreError::corrupted("http://x/b", "bad cell"),
        "corrupted content at \"http://x/b\": bad cell"
    )]
    fn messages_name_the_path(#[case] error: StoreError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    fn accessors_expose_kind_path_and_detail() {
        let error = StoreError::unavailable("http://x/a", "timeout");
        assert_eq!(error.kind(), StoreErrorKind::Unavailable);
        assert_eq!(error.path(), "http://x/a");
        assert_eq!(error.detail(), Some("timeout"));
        assert_eq!(StoreError::invalid_path("p").detail(), None);
    }
}
