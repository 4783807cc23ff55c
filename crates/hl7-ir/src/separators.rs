//! HL7 v2 encoding characters and escape sequence handling
//!
//! The field separator comes from MSH-1 and the remaining encoding
//! characters from MSH-2, in the order component, repetition, escape,
//! sub-component (`^~\&` by default).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default HL7 encoding characters (when MSH-2 is the standard `^~\&`)
pub const DEFAULT_FIELD_SEPARATOR: char = '|';
pub const DEFAULT_COMPONENT_SEPARATOR: char = '^';
pub const DEFAULT_REPETITION_SEPARATOR: char = '~';
pub const DEFAULT_ESCAPE_CHARACTER: char = '\\';
pub const DEFAULT_SUB_COMPONENT_SEPARATOR: char = '&';

/// Separators of one message, shared read-only by every check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Separators {
    /// Field separator (default '|')
    pub field: char,
    /// Component separator (default '^')
    pub component: char,
    /// Sub-component separator (default '&')
    pub sub_component: char,
    /// Repetition separator (default '~')
    pub repetition: char,
    /// Escape character (default '\')
    pub escape: char,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            field: DEFAULT_FIELD_SEPARATOR,
            component: DEFAULT_COMPONENT_SEPARATOR,
            sub_component: DEFAULT_SUB_COMPONENT_SEPARATOR,
            repetition: DEFAULT_REPETITION_SEPARATOR,
            escape: DEFAULT_ESCAPE_CHARACTER,
        }
    }
}

impl Separators {
    /// Build separators from MSH-1 and MSH-2
    ///
    /// # Errors
    ///
    /// Returns an error when fewer than four encoding characters are given
    /// or when two separators share the same character.
    pub fn from_encoding(field: char, encoding: &str) -> Result<Self> {
        let chars: Vec<char> = encoding.chars().collect();
        if chars.len() < 4 {
            return Err(Error::invalid_separators(
                encoding,
                "expected at least four encoding characters",
            ));
        }

        let separators = Self {
            field,
            component: chars[0],
            repetition: chars[1],
            escape: chars[2],
            sub_component: chars[3],
        };

        let all = separators.all();
        for (i, c) in all.iter().enumerate() {
            if all[i + 1..].contains(c) {
                return Err(Error::invalid_separators(
                    encoding,
                    format!("character '{c}' is used by more than one separator"),
                ));
            }
        }

        Ok(separators)
    }

    /// Build separators from the leading `|^~\&` notation
    ///
    /// # Errors
    ///
    /// Returns an error when the notation is too short or ambiguous.
    pub fn from_notation(notation: &str) -> Result<Self> {
        let mut chars = notation.chars();
        let field = chars
            .next()
            .ok_or_else(|| Error::invalid_separators(notation, "empty encoding notation"))?;
        Self::from_encoding(field, chars.as_str())
    }

    /// The `|^~\&` notation of these separators
    #[must_use]
    pub fn notation(&self) -> String {
        [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.sub_component,
        ]
        .iter()
        .collect()
    }

    fn all(&self) -> [char; 5] {
        [
            self.field,
            self.component,
            self.sub_component,
            self.repetition,
            self.escape,
        ]
    }

    /// Check if a character separates structure (escape excluded)
    #[must_use]
    pub fn is_structural(&self, c: char) -> bool {
        c == self.field || c == self.component || c == self.sub_component || c == self.repetition
    }

    /// Check whether a value contains a literal field, component,
    /// sub-component or repetition separator
    #[must_use]
    pub fn has_unescaped_separator(&self, value: &str) -> bool {
        value.chars().any(|c| self.is_structural(c))
    }

    /// Replace `\F\`, `\S\`, `\T\`, `\R\` and `\E\` by the characters they stand for
    ///
    /// Unknown or unterminated sequences are kept verbatim.
    #[must_use]
    pub fn unescape(&self, value: &str) -> String {
        if !value.contains(self.escape) {
            return value.to_string();
        }

        let mut result = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find(self.escape) {
            result.push_str(&rest[..start]);
            let after = &rest[start + self.escape.len_utf8()..];

            let Some(end) = after.find(self.escape) else {
                result.push_str(&rest[start..]);
                return result;
            };

            let replacement = match &after[..end] {
                "F" => Some(self.field),
                "S" => Some(self.component),
                "T" => Some(self.sub_component),
                "R" => Some(self.repetition),
                "E" => Some(self.escape),
                _ => None,
            };

            let consumed = start + self.escape.len_utf8() + end + self.escape.len_utf8();
            match replacement {
                Some(c) => result.push(c),
                None => result.push_str(&rest[start..consumed]),
            }
            rest = &rest[consumed..];
        }

        result.push_str(rest);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_separators() {
        let sep = Separators::default();
        assert_eq!(sep.field, '|');
        assert_eq!(sep.component, '^');
        assert_eq!(sep.repetition, '~');
        assert_eq!(sep.escape, '\\');
        assert_eq!(sep.sub_component, '&');
        assert_eq!(sep.notation(), "|^~\\&");
    }

    #[test]
    fn test_from_notation() {
        let sep = Separators::from_notation("#*!@$").unwrap();
        assert_eq!(sep.field, '#');
        assert_eq!(sep.component, '*');
        assert_eq!(sep.repetition, '!');
        assert_eq!(sep.escape, '@');
        assert_eq!(sep.sub_component, '$');
    }

    #[test]
    fn test_from_encoding_rejects_short_and_duplicate() {
        assert!(Separators::from_encoding('|', "^~").is_err());
        assert!(Separators::from_encoding('|', "^^\\&").is_err());
        assert!(Separators::from_encoding('^', "^~\\&").is_err());
        assert!(Separators::from_notation("").is_err());
    }

    #[test]
    fn test_unescape_separators() {
        let sep = Separators::default();
        assert_eq!(sep.unescape("AB\\F\\CD"), "AB|CD");
        assert_eq!(sep.unescape("A\\S\\B\\T\\C\\R\\D\\E\\E"), "A^B&C~D\\E");
        assert_eq!(sep.unescape("plain"), "plain");
    }

    #[test]
    fn test_unescape_keeps_unknown_sequences() {
        let sep = Separators::default();
        assert_eq!(sep.unescape("A\\H\\B"), "A\\H\\B");
        assert_eq!(sep.unescape("A\\X0D\\B"), "A\\X0D\\B");
        assert_eq!(sep.unescape("trailing\\F"), "trailing\\F");
    }

    #[test]
    fn test_unescape_with_custom_escape() {
        let sep = Separators::from_notation("|^~#&").unwrap();
        assert_eq!(sep.unescape("1#F#2"), "1|2");
        assert_eq!(sep.unescape("1\\F\\2"), "1\\F\\2");
    }

    #[test]
    fn test_has_unescaped_separator() {
        let sep = Separators::default();
        assert!(sep.has_unescaped_separator("A|B"));
        assert!(sep.has_unescaped_separator("A^B"));
        assert!(sep.has_unescaped_separator("A&B"));
        assert!(sep.has_unescaped_separator("A~B"));
        assert!(!sep.has_unescaped_separator("A\\F\\B"));
        assert!(!sep.has_unescaped_separator("plain text"));
    }
}
