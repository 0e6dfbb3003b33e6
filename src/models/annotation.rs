//! Text spans and located annotations.

use serde::{Deserialize, Serialize};

use super::Location;
use crate::error::{Error, Result};

/// A half-open byte range `[start, end)` in a UTF-8 text plus its literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

impl Span {
    pub fn new(start: usize, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            start,
            end: start + value.len(),
            value,
        }
    }

    /// Span covering the first occurrence of `value` in `text`.
    pub fn find(text: &str, value: &str) -> Option<Self> {
        text.find(value).map(|start| Span::new(start, value))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check bounds, char boundaries and that the value matches the text.
    pub fn validate(&self, text: &str) -> Result<()> {
        let malformed = |reason: &str| Error::MalformedSpan {
            start: self.start,
            end: self.end,
            reason: reason.to_string(),
        };

        if self.end <= self.start {
            return Err(malformed("end must be greater than start"));
        }
        if self.end > text.len() {
            return Err(malformed("range exceeds text length"));
        }
        match text.get(self.start..self.end) {
            None => Err(malformed("range is not on a character boundary")),
            Some(slice) if slice != self.value => Err(malformed("value does not match text")),
            Some(_) => Ok(()),
        }
    }
}

/// A span paired with its disambiguated location.
///
/// Equality is by span (start, end, value) and location id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationAnnotation {
    #[serde(flatten)]
    pub span: Span,
    pub location: Location,
}

impl LocationAnnotation {
    pub fn new(span: Span, location: Location) -> Self {
        Self { span, location }
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn end(&self) -> usize {
        self.span.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationType;

    #[test]
    fn test_span_new_and_find() {
        let text = "Flights from Zürich to Paris";
        let span = Span::find(text, "Paris").unwrap();
        assert_eq!(&text[span.start..span.end], "Paris");
        // multi-byte characters shift byte offsets
        let zurich = Span::find(text, "Zürich").unwrap();
        assert_eq!(zurich.len(), 7);
        assert!(span.validate(text).is_ok());
        assert!(zurich.validate(text).is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let text = "Zürich";
        let empty = Span { start: 2, end: 2, value: String::new() };
        let beyond = Span { start: 0, end: 99, value: "x".into() };
        let split_char = Span { start: 0, end: 2, value: "Z".into() };
        let mismatch = Span { start: 0, end: 1, value: "z".into() };
        for span in [empty, beyond, split_char, mismatch] {
            assert!(matches!(span.validate(text), Err(Error::MalformedSpan { .. })));
        }
    }

    #[test]
    fn test_overlaps() {
        let a = Span::new(0, "New York");
        let b = Span::new(4, "York");
        let c = Span::new(8, " City");
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_annotation_equality_uses_location_id() {
        let span = Span::new(0, "Paris");
        let a = LocationAnnotation::new(span.clone(), Location::new(1, "Paris", LocationType::City));
        let b = LocationAnnotation::new(span.clone(), Location::new(1, "Paris, FR", LocationType::City));
        let c = LocationAnnotation::new(span, Location::new(2, "Paris", LocationType::City));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
