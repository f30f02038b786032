use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::engine::record::Record;
use crate::{Error, Result};

/// A per-field match rule, decided when the descriptor is built.
///
/// Missing-field behavior differs by variant:
/// - [`Matcher::Literal`] and [`Matcher::Pattern`] treat an absent field as a
///   non-match.
/// - [`Matcher::Predicate`] is handed the raw field value, so an absent field
///   is a lookup fault ([`Error::MissingField`]).
#[derive(Clone)]
pub enum Matcher {
    /// Strict equality against the field's value.
    Literal(Value),
    /// Regex search over the field's string value. Non-string values never
    /// match; anchor with `^` for prefix semantics.
    Pattern(Regex),
    /// Arbitrary unary test over the field's value.
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn literal(value: impl Into<Value>) -> Self {
        Matcher::Literal(value.into())
    }

    pub fn pattern(regex: Regex) -> Self {
        Matcher::Pattern(regex)
    }

    /// Compiles `pattern` into a [`Matcher::Pattern`].
    pub fn pattern_str(pattern: &str) -> Result<Self> {
        Ok(Matcher::Pattern(Regex::new(pattern)?))
    }

    pub fn predicate(test: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Matcher::Predicate(Arc::new(test))
    }

    fn matches(&self, field: &str, record: &Record) -> Result<bool> {
        match self {
            Matcher::Literal(expected) => Ok(record.get(field) == Some(expected)),
            Matcher::Pattern(regex) => Ok(record
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s))),
            Matcher::Predicate(test) => {
                let value = record
                    .get(field)
                    .ok_or_else(|| Error::MissingField(field.to_string()))?;
                Ok(test(value))
            }
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(value) => write!(f, "{value}"),
            Matcher::Pattern(regex) => write!(f, "/{regex}/"),
            Matcher::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}

/// A field-to-matcher mapping used to select records.
///
/// A record matches a descriptor iff every field/matcher pair succeeds
/// (logical AND, short-circuiting on the first failure). The empty
/// descriptor matches every record.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    fields: BTreeMap<String, Matcher>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field/matcher pair, replacing any previous matcher for the
    /// same field.
    pub fn field(mut self, name: impl Into<String>, matcher: Matcher) -> Self {
        self.fields.insert(name.into(), matcher);
        self
    }

    /// Builds a descriptor of literal-equality matchers.
    pub fn literals<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut desc = Self::new();
        for (name, value) in pairs {
            desc = desc.field(name, Matcher::Literal(value));
        }
        desc
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Evaluates every matcher against `record`.
    pub fn matches(&self, record: &Record) -> Result<bool> {
        for (field, matcher) in &self.fields {
            if !matcher.matches(field, record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, matcher)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {matcher:?}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_descriptor_matches_everything() {
        let desc = Descriptor::new();
        assert!(desc.matches(&record(json!({"this": "that"}))).unwrap());
        assert!(desc.matches(&record(json!({}))).unwrap());
    }

    #[test]
    fn test_literal_matcher_compares_strictly() {
        let desc = Descriptor::new().field("n", Matcher::literal(1));
        assert!(desc.matches(&record(json!({"n": 1}))).unwrap());
        assert!(!desc.matches(&record(json!({"n": "1"}))).unwrap());
        assert!(!desc.matches(&record(json!({"n": 2}))).unwrap());
    }

    #[test]
    fn test_literal_matcher_treats_missing_field_as_non_match() {
        let desc = Descriptor::new().field("this", Matcher::literal("that"));
        assert!(!desc.matches(&record(json!({"that": "this"}))).unwrap());
    }

    #[test]
    fn test_pattern_matcher_only_matches_strings() {
        let desc = Descriptor::new().field("this", Matcher::pattern_str("^t.*").unwrap());
        assert!(desc.matches(&record(json!({"this": "that"}))).unwrap());
        assert!(!desc.matches(&record(json!({"this": "foo"}))).unwrap());
        assert!(!desc.matches(&record(json!({"this": 7}))).unwrap());
        assert!(!desc.matches(&record(json!({"other": "that"}))).unwrap());
    }

    #[test]
    fn test_predicate_matcher_faults_on_missing_field() {
        let desc = Descriptor::new().field(
            "this",
            Matcher::predicate(|v| v.as_str().is_some_and(|s| s.starts_with('t'))),
        );
        assert!(desc.matches(&record(json!({"this": "that"}))).unwrap());

        let err = desc.matches(&record(json!({"that": "this"}))).unwrap_err();
        assert!(matches!(err, Error::MissingField(f) if f == "this"));
    }

    #[test]
    fn test_descriptor_is_a_logical_and() {
        let desc = Descriptor::new()
            .field("this", Matcher::literal("that"))
            .field("that", Matcher::literal("foo"));
        assert!(desc
            .matches(&record(json!({"this": "that", "that": "foo"})))
            .unwrap());
        assert!(!desc
            .matches(&record(json!({"this": "that", "that": "bar"})))
            .unwrap());
    }

    #[test]
    fn test_descriptor_renders_for_error_messages() {
        let desc = Descriptor::new()
            .field("this", Matcher::literal("that"))
            .field("n", Matcher::pattern_str("t.*").unwrap());
        assert_eq!(desc.to_string(), r#"{n: /t.*/, this: "that"}"#);
    }
}
