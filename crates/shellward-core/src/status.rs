//! Status codes reported by filesystem operations.

use std::io;

use serde::{Deserialize, Serialize};

/// Outcome of a filesystem operation, as reported to a status sink.
///
/// Sub-results are combined with [`FileSystemStatusCode::worst_of`] rather
/// than bitwise flags, so a composite result is always exactly one code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, strum::Display,
)]
pub enum FileSystemStatusCode {
    #[default]
    Success,
    #[strum(to_string = "In progress")]
    InProgress,
    Unauthorized,
    #[strum(to_string = "Not found")]
    NotFound,
    #[strum(to_string = "Already exists")]
    AlreadyExists,
    #[strum(to_string = "Not a file")]
    NotAFile,
    #[strum(to_string = "Not a folder")]
    NotAFolder,
    #[strum(to_string = "Name too long")]
    NameTooLong,
    #[strum(to_string = "In use")]
    InUse,
    #[strum(to_string = "Read only")]
    ReadOnly,
    Generic,
}

impl FileSystemStatusCode {
    /// Check if this code means the operation completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Check if this code is a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Success | Self::InProgress)
    }

    /// Whether this failure is recovered by retrying through the helper process.
    pub fn wants_elevation(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::ReadOnly)
    }

    fn severity(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::InProgress => 1,
            Self::Generic => 2,
            Self::ReadOnly => 3,
            Self::InUse => 4,
            Self::NameTooLong => 5,
            Self::NotAFolder => 6,
            Self::NotAFile => 7,
            Self::AlreadyExists => 8,
            Self::NotFound => 9,
            Self::Unauthorized => 10,
        }
    }

    /// Merge two sub-results into the more severe one.
    ///
    /// Any failure outranks `InProgress`, which outranks `Success`. Among
    /// failures, `Unauthorized` ranks highest and `Generic` lowest; ties keep
    /// `self`.
    pub fn worst_of(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Reduce any number of sub-results. An empty input is a success.
    pub fn reduce(codes: impl IntoIterator<Item = Self>) -> Self {
        codes.into_iter().fold(Self::Success, Self::worst_of)
    }

    /// Translate an I/O error into a status code.
    pub fn from_io_error(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => return Self::Unauthorized,
            io::ErrorKind::NotFound => return Self::NotFound,
            io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty => {
                return Self::AlreadyExists;
            }
            io::ErrorKind::NotADirectory => return Self::NotAFolder,
            io::ErrorKind::IsADirectory => return Self::NotAFile,
            io::ErrorKind::ReadOnlyFilesystem => return Self::ReadOnly,
            io::ErrorKind::ResourceBusy | io::ErrorKind::ExecutableFileBusy => {
                return Self::InUse;
            }
            _ => {}
        }

        match error.raw_os_error() {
            // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
            #[cfg(windows)]
            Some(32) | Some(33) => Self::InUse,
            // ERROR_FILENAME_EXCED_RANGE
            #[cfg(windows)]
            Some(206) => Self::NameTooLong,
            // ENAMETOOLONG
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Some(36) => Self::NameTooLong,
            #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
            Some(63) => Self::NameTooLong,
            _ => Self::Generic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_of_prefers_failure() {
        use FileSystemStatusCode::*;

        assert_eq!(Success.worst_of(InProgress), InProgress);
        assert_eq!(InProgress.worst_of(Generic), Generic);
        assert_eq!(Generic.worst_of(Unauthorized), Unauthorized);
        assert_eq!(NotFound.worst_of(Success), NotFound);
    }

    #[test]
    fn test_reduce() {
        use FileSystemStatusCode::*;

        assert_eq!(FileSystemStatusCode::reduce([]), Success);
        assert_eq!(FileSystemStatusCode::reduce([Success, Success]), Success);
        assert_eq!(
            FileSystemStatusCode::reduce([Success, InUse, Generic]),
            InUse
        );
    }

    #[test]
    fn test_from_io_error() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            FileSystemStatusCode::from_io_error(&denied),
            FileSystemStatusCode::Unauthorized
        );

        let missing = io::Error::new(io::ErrorKind::NotFound, "missing");
        assert_eq!(
            FileSystemStatusCode::from_io_error(&missing),
            FileSystemStatusCode::NotFound
        );

        let other = io::Error::other("boom");
        assert_eq!(
            FileSystemStatusCode::from_io_error(&other),
            FileSystemStatusCode::Generic
        );
    }

    #[test]
    fn test_failure_predicates() {
        assert!(FileSystemStatusCode::Success.is_success());
        assert!(!FileSystemStatusCode::InProgress.is_failure());
        assert!(FileSystemStatusCode::ReadOnly.is_failure());
        assert!(FileSystemStatusCode::ReadOnly.wants_elevation());
        assert!(!FileSystemStatusCode::InUse.wants_elevation());
    }
}
