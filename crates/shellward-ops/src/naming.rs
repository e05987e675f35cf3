//! File name validation.

use shellward_core::FileSystemStatusCode;
use thiserror::Error;

const RESTRICTED_CHARACTERS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];
const RESTRICTED_CHARACTERS_WITH_STREAMS: [char; 8] = ['\\', '/', '*', '?', '"', '<', '>', '|'];

const RESTRICTED_FILE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Why a name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,
    #[error("Name cannot contain '{0}'")]
    RestrictedCharacter(char),
    #[error("'{0}' is a reserved name")]
    ReservedName(String),
    #[error("'{0}' refers to a directory, not a name")]
    RelativeName(String),
    #[error("Name is {len} bytes, which exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },
}

impl NameError {
    /// Status code reported for this rejection.
    pub fn status_code(&self) -> FileSystemStatusCode {
        match self {
            Self::TooLong { .. } => FileSystemStatusCode::NameTooLong,
            _ => FileSystemStatusCode::Generic,
        }
    }
}

/// Characters not allowed in a name. `:` is allowed when alternate data
/// streams are visible.
pub fn restricted_characters(alternate_streams_visible: bool) -> &'static [char] {
    if alternate_streams_visible {
        &RESTRICTED_CHARACTERS_WITH_STREAMS
    } else {
        &RESTRICTED_CHARACTERS
    }
}

/// Check if `name` contains any restricted character.
pub fn contains_restricted_characters(name: &str, alternate_streams_visible: bool) -> bool {
    first_restricted_character(name, alternate_streams_visible).is_some()
}

fn first_restricted_character(name: &str, alternate_streams_visible: bool) -> Option<char> {
    let restricted = restricted_characters(alternate_streams_visible);
    name.chars().find(|c| restricted.contains(c))
}

/// Check if `name` is a reserved device name, alone or followed by an extension.
pub fn contains_restricted_file_name(name: &str) -> bool {
    RESTRICTED_FILE_NAMES.iter().any(|reserved| {
        name.len() >= reserved.len()
            && name.is_char_boundary(reserved.len())
            && name[..reserved.len()].eq_ignore_ascii_case(reserved)
            && (name.len() == reserved.len() || name[reserved.len()..].starts_with('.'))
    })
}

/// Remove every restricted character from `name`.
pub fn filter_restricted_characters(name: &str, alternate_streams_visible: bool) -> String {
    let restricted = restricted_characters(alternate_streams_visible);
    name.chars().filter(|c| !restricted.contains(c)).collect()
}

/// Validate a name for a new or renamed item.
pub fn validate_filename(
    name: &str,
    alternate_streams_visible: bool,
    max_len: usize,
) -> Result<(), NameError> {
    if name.trim().is_empty() {
        return Err(NameError::Empty);
    }

    if let Some(c) = first_restricted_character(name, alternate_streams_visible) {
        return Err(NameError::RestrictedCharacter(c));
    }

    if name.trim_end() == "." || name.trim_end() == ".." {
        return Err(NameError::RelativeName(name.to_string()));
    }

    if contains_restricted_file_name(name) {
        return Err(NameError::ReservedName(name.to_string()));
    }

    if name.len() > max_len {
        return Err(NameError::TooLong {
            len: name.len(),
            max: max_len,
        });
    }

    Ok(())
}
