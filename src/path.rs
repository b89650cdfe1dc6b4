//! Dotted-path addressing for external bindings:
//! `namespace:code.segment[.segment...]`.
//!
//! Bindings project a nested value out of a namespace's data by walking
//! object keys after the first one. Unlike bare qualified codes, the
//! path form requires an explicit namespace and restricts every part to
//! ASCII alphanumeric, so a malformed binding string fails at setup
//! rather than silently watching the wrong key.

use serde_json::Value;

use crate::error::{Error, Result};

/// A parsed `namespace:code.seg1.seg2` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedPath<'a> {
    namespace: &'a str,
    code: &'a str,
    segments: Vec<&'a str>,
}

fn is_part(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric())
}

impl<'a> QualifiedPath<'a> {
    /// Parse a dotted path.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] unless the input is of the form
    /// `namespace:code` followed by zero or more `.segment` parts, each
    /// part non-empty ASCII alphanumeric.
    ///
    /// # Examples
    ///
    /// ```
    /// use ctxbus::QualifiedPath;
    ///
    /// let path = QualifiedPath::parse("user:profile.address.city").unwrap();
    /// assert_eq!(path.namespace(), "user");
    /// assert_eq!(path.code(), "profile");
    /// assert_eq!(path.segments(), ["address", "city"]);
    /// ```
    pub fn parse(input: &'a str) -> Result<Self> {
        let invalid = || {
            Error::InvalidArgument(format!(
                "expected namespace:code[.segment...] with alphanumeric parts, got {input:?}"
            ))
        };

        let (namespace, rest) = input.split_once(':').ok_or_else(invalid)?;
        let mut parts = rest.split('.');
        let code = parts.next().ok_or_else(invalid)?;
        let segments: Vec<&str> = parts.collect();

        if !is_part(namespace) || !is_part(code) || !segments.iter().all(|s| is_part(s)) {
            return Err(invalid());
        }

        Ok(Self {
            namespace,
            code,
            segments,
        })
    }

    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    /// The data key within the namespace; the path's segments are
    /// projected out of the value stored under this key.
    pub fn code(&self) -> &'a str {
        self.code
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }
}

/// Walk `segments` through nested JSON objects.
///
/// Returns `None` as soon as a segment is missing or the current value
/// is not an object. An empty segment list returns `value` itself.
///
/// # Examples
///
/// ```
/// use ctxbus::project;
/// use serde_json::json;
///
/// let value = json!({ "address": { "city": "Oslo" } });
/// assert_eq!(project(&value, &["address", "city"]), Some(&json!("Oslo")));
/// assert_eq!(project(&value, &["address", "zip"]), None);
/// ```
pub fn project<'v, S: AsRef<str>>(value: &'v Value, segments: &[S]) -> Option<&'v Value> {
    let mut current = value;
    for segment in segments {
        current = current.as_object()?.get(segment.as_ref())?;
    }
    Some(current)
}
