//! Qualified-code addressing: `namespace:code`, with bare codes
//! defaulting to the reserved [`GLOBAL_NAMESPACE`].
//!
//! Every namespace-qualified operation on the registry goes through
//! [`QualifiedCode::parse`], so the facade layer and the top-level
//! operations share a single addressing rule.

use crate::error::{Error, Result};

/// The reserved namespace that bare (unqualified) codes resolve to.
///
/// Created eagerly at registry construction, so an unqualified code
/// always addresses a namespace that exists.
pub const GLOBAL_NAMESPACE: &str = "global";

/// A qualified code split into its namespace and code parts.
///
/// The split happens on the *first* `:`; anything after it, including
/// further colons, belongs to the code.
///
/// # Examples
///
/// ```
/// use ctxbus::{GLOBAL_NAMESPACE, QualifiedCode};
///
/// let q = QualifiedCode::parse("ui:theme").unwrap();
/// assert_eq!(q.namespace(), "ui");
/// assert_eq!(q.code(), "theme");
///
/// let bare = QualifiedCode::parse("theme").unwrap();
/// assert_eq!(bare.namespace(), GLOBAL_NAMESPACE);
/// assert_eq!(bare.code(), "theme");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifiedCode<'a> {
    namespace: &'a str,
    code: &'a str,
}

impl<'a> QualifiedCode<'a> {
    /// Parse a qualified code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the input is empty, or if
    /// either part around the first `:` is empty.
    pub fn parse(input: &'a str) -> Result<Self> {
        match input.split_once(':') {
            None => {
                if input.is_empty() {
                    return Err(Error::InvalidArgument("empty code".to_string()));
                }
                Ok(Self {
                    namespace: GLOBAL_NAMESPACE,
                    code: input,
                })
            }
            Some((namespace, code)) => {
                if namespace.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "empty namespace in qualified code {input:?}"
                    )));
                }
                if code.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "empty code in qualified code {input:?}"
                    )));
                }
                Ok(Self { namespace, code })
            }
        }
    }

    /// The namespace part, or [`GLOBAL_NAMESPACE`] for bare codes.
    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    /// The code part: a data key for change-channel operations, an
    /// event code for command-channel operations.
    pub fn code(&self) -> &'a str {
        self.code
    }
}

/// Validate a namespace identifier for `create_namespace`.
///
/// Identifiers must be non-empty ASCII alphanumeric, matching the
/// addressing convention external bindings parse (`namespace:code`).
pub(crate) fn validate_namespace(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidArgument(format!(
            "namespace identifier must be non-empty ASCII alphanumeric, got {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_code_resolves_to_global() {
        let q = QualifiedCode::parse("theme").expect("bare code should parse");
        assert_eq!(q.namespace(), GLOBAL_NAMESPACE);
        assert_eq!(q.code(), "theme");
    }

    #[test]
    fn qualified_code_splits_namespace_and_code() {
        let q = QualifiedCode::parse("ui:theme").expect("qualified code should parse");
        assert_eq!(q.namespace(), "ui");
        assert_eq!(q.code(), "theme");
    }

    #[test]
    fn split_happens_on_first_colon_only() {
        let q = QualifiedCode::parse("ui:theme:dark").expect("should parse");
        assert_eq!(q.namespace(), "ui");
        assert_eq!(q.code(), "theme:dark", "remainder after first colon is the code");
    }

    #[test]
    fn empty_input_is_invalid() {
        let err = QualifiedCode::parse("").expect_err("empty input should fail");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn empty_namespace_part_is_invalid() {
        let err = QualifiedCode::parse(":theme").expect_err("should fail");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn empty_code_part_is_invalid() {
        let err = QualifiedCode::parse("ui:").expect_err("should fail");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn validate_accepts_alphanumeric() {
        assert!(validate_namespace("ui2").is_ok());
        assert!(validate_namespace("Global").is_ok());
    }

    #[test]
    fn validate_rejects_empty_and_punctuation() {
        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("my ns").is_err());
        assert!(validate_namespace("ns:x").is_err());
        assert!(validate_namespace("ns.data").is_err());
    }
}
