//! Pagination options
//!
//! `read_size` is the page size of one HTTP round trip; `limit` caps the
//! number of documents a whole paginated sequence emits. Both are checked
//! before any request is issued.

use crate::error::{Error, Result};
use serde_json::Value;

/// Default page size.
pub const DEFAULT_READ_SIZE: usize = 50;

/// Validated pagination options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    read_size: usize,
    limit: Option<usize>,
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions {
            read_size: DEFAULT_READ_SIZE,
            limit: None,
        }
    }
}

fn positive(name: &str, value: i64) -> Result<usize> {
    if value <= 0 {
        return Err(Error::InvalidOptions(format!(
            "{} must be a positive integer, got {}",
            name, value
        )));
    }
    usize::try_from(value)
        .map_err(|_| Error::InvalidOptions(format!("{} is out of range: {}", name, value)))
}

fn positive_json(name: &str, value: &Value) -> Result<usize> {
    match value.as_i64() {
        Some(n) => positive(name, n),
        None => Err(Error::InvalidOptions(format!(
            "{} must be a positive integer, got {}",
            name, value
        ))),
    }
}

impl PageOptions {
    /// Validate raw option values.
    ///
    /// `None` selects the default (`read_size` 50, unbounded `limit`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOptions` for zero or negative values.
    pub fn new(read_size: Option<i64>, limit: Option<i64>) -> Result<Self> {
        let read_size = match read_size {
            Some(n) => positive("readSize", n)?,
            None => DEFAULT_READ_SIZE,
        };
        let limit = limit.map(|n| positive("limit", n)).transpose()?;
        Ok(PageOptions { read_size, limit })
    }

    /// Validate options given as a JSON object with `readSize` and `limit`.
    ///
    /// Absent or `null` members select the default. Floats, strings and
    /// other non-integer values are rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidOptions(format!(
                    "options must be an object, got {}",
                    other
                )))
            }
        };
        let mut options = Self::default();
        if let Some(v) = map.get("readSize").filter(|v| !v.is_null()) {
            options.read_size = positive_json("readSize", v)?;
        }
        if let Some(v) = map.get("limit").filter(|v| !v.is_null()) {
            options.limit = Some(positive_json("limit", v)?);
        }
        Ok(options)
    }

    /// Replace the page size.
    pub fn with_read_size(self, read_size: usize) -> Result<Self> {
        if read_size == 0 {
            return Err(Error::InvalidOptions(
                "readSize must be a positive integer, got 0".to_string(),
            ));
        }
        Ok(PageOptions { read_size, ..self })
    }

    /// Replace the logical limit.
    pub fn with_limit(self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidOptions(
                "limit must be a positive integer, got 0".to_string(),
            ));
        }
        Ok(PageOptions {
            limit: Some(limit),
            ..self
        })
    }

    /// Page size
    pub fn read_size(&self) -> usize {
        self.read_size
    }

    /// Logical limit, `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Size of the next page given how many documents may still be emitted.
    pub fn page_size(&self, remaining: Option<usize>) -> usize {
        match remaining {
            Some(r) => self.read_size.min(r),
            None => self.read_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = PageOptions::default();
        assert_eq!(options.read_size(), 50);
        assert_eq!(options.limit(), None);
        assert_eq!(PageOptions::new(None, None).unwrap(), options);
    }

    #[test]
    fn test_zero_and_negative_are_rejected() {
        assert!(PageOptions::new(Some(0), None).is_err());
        assert!(PageOptions::new(Some(-3), None).is_err());
        assert!(PageOptions::new(None, Some(0)).is_err());
        assert!(PageOptions::new(None, Some(-1)).is_err());
        assert!(PageOptions::default().with_limit(0).is_err());
        assert!(PageOptions::default().with_read_size(0).is_err());
    }

    #[test]
    fn test_from_json_accepts_integers() {
        let options = PageOptions::from_json(&json!({"readSize": 10, "limit": 25})).unwrap();
        assert_eq!(options.read_size(), 10);
        assert_eq!(options.limit(), Some(25));
    }

    #[test]
    fn test_from_json_rejects_non_integers() {
        for bad in [
            json!({"readSize": 2.5}),
            json!({"readSize": "10"}),
            json!({"readSize": true}),
            json!({"limit": 1.5}),
            json!({"limit": -4}),
            json!({"limit": 0}),
            json!([10]),
        ] {
            let err = PageOptions::from_json(&bad).unwrap_err();
            assert!(matches!(err, Error::InvalidOptions(_)), "{}", bad);
        }
    }

    #[test]
    fn test_from_json_null_members_use_defaults() {
        let options = PageOptions::from_json(&json!({"readSize": null, "limit": null})).unwrap();
        assert_eq!(options, PageOptions::default());
        assert_eq!(PageOptions::from_json(&Value::Null).unwrap(), options);
    }

    #[test]
    fn test_page_size_is_bounded_by_remaining() {
        let options = PageOptions::new(Some(50), None).unwrap();
        assert_eq!(options.page_size(None), 50);
        assert_eq!(options.page_size(Some(7)), 7);
        assert_eq!(options.page_size(Some(500)), 50);
    }

    proptest! {
        #[test]
        fn prop_page_size_never_exceeds_either_bound(read_size in 1i64..1000, remaining in 1usize..1000) {
            let options = PageOptions::new(Some(read_size), None).unwrap();
            let p = options.page_size(Some(remaining));
            prop_assert!(p <= read_size as usize);
            prop_assert!(p <= remaining);
            prop_assert!(p >= 1);
        }

        #[test]
        fn prop_non_positive_limit_is_rejected(limit in i64::MIN..=0) {
            prop_assert!(PageOptions::new(None, Some(limit)).is_err());
        }
    }
}
