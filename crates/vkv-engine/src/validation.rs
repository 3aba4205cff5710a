//! Key path and custom metadata validation
//!
//! A key path is non-empty and made of `/`-separated segments, none of
//! which is empty, `.` or `..`.
//!
//! Above [`MAX_CUSTOM_METADATA_KEYS`] entries validation stops at the count
//! check. At or below it, every entry is checked and every violation is
//! reported:
//! - 0 < length of key <= [`MAX_CUSTOM_METADATA_KEY_LENGTH`]
//! - 0 < length of value <= [`MAX_CUSTOM_METADATA_VALUE_LENGTH`]
//! - keys and values contain only printable characters
//!
//! Lengths are measured in bytes. Printable excludes control, whitespace
//! other than the ASCII space, format (Cf), private-use and noncharacter code
//! points. Code points unassigned in the Unicode version at hand are not
//! detected and pass as printable.

use std::collections::BTreeMap;
use std::fmt;

pub const MAX_CUSTOM_METADATA_KEYS: usize = 64;
pub const MAX_CUSTOM_METADATA_KEY_LENGTH: usize = 128;
pub const MAX_CUSTOM_METADATA_VALUE_LENGTH: usize = 512;

const VALIDATION_ERROR_PREFIX: &str = "custom_metadata validation failed";

/// Every violation found in one validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<String>,
}

impl ValidationErrors {
    /// Individual violation messages
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "{} {} occurred:", self.errors.len(), noun)?;
        for error in &self.errors {
            write!(f, "\n\t* {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Reason `path` cannot name a key, `None` when it is well formed
pub fn validate_path(path: &str) -> Option<String> {
    if path.is_empty() {
        return Some("missing path".to_string());
    }
    let malformed = path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    malformed.then(|| {
        format!(
            "invalid path {:?}: segments must not be empty, '.' or '..'",
            path
        )
    })
}

/// Validate a custom metadata map.
pub fn validate_custom_metadata(
    custom_metadata: &BTreeMap<String, String>,
) -> Result<(), ValidationErrors> {
    let key_count = custom_metadata.len();
    if key_count > MAX_CUSTOM_METADATA_KEYS {
        return Err(ValidationErrors {
            errors: vec![format!(
                "{}: payload must contain at most {} keys, provided {}",
                VALIDATION_ERROR_PREFIX, MAX_CUSTOM_METADATA_KEYS, key_count
            )],
        });
    }

    let mut errors = Vec::new();

    for (key, value) in custom_metadata {
        let key_len = key.len();
        if key_len == 0 || key_len > MAX_CUSTOM_METADATA_KEY_LENGTH {
            errors.push(format!(
                "{}: length of key {:?} is {} but must be 0 < len(key) <= {}",
                VALIDATION_ERROR_PREFIX, key, key_len, MAX_CUSTOM_METADATA_KEY_LENGTH
            ));
        }

        let value_len = value.len();
        if value_len == 0 || value_len > MAX_CUSTOM_METADATA_VALUE_LENGTH {
            errors.push(format!(
                "{}: length of value for key {:?} is {} but must be 0 < len(value) <= {}",
                VALIDATION_ERROR_PREFIX, key, value_len, MAX_CUSTOM_METADATA_VALUE_LENGTH
            ));
        }

        if !is_printable(key) {
            // The raw form helps spot the offending key in logs
            errors.push(format!(
                "{}: key {:?} ({}) contains unprintable characters",
                VALIDATION_ERROR_PREFIX, key, key
            ));
        }

        if !is_printable(value) {
            errors.push(format!(
                "{}: value for key {:?} contains unprintable characters",
                VALIDATION_ERROR_PREFIX, key
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { errors })
    }
}

/// True when every character is graphic or the ASCII space
pub fn is_printable(s: &str) -> bool {
    s.chars().all(is_printable_char)
}

fn is_printable_char(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control()
        || c.is_whitespace()
        || is_format_char(c)
        || is_private_use_char(c)
        || is_noncharacter(c))
}

fn is_private_use_char(c: char) -> bool {
    matches!(
        c,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

/// U+FDD0..U+FDEF and the last two code points of every plane
fn is_noncharacter(c: char) -> bool {
    let cp = c as u32;
    (0xFDD0..=0xFDEF).contains(&cp) || cp & 0xFFFE == 0xFFFE
}

/// Unicode general category Cf
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}
