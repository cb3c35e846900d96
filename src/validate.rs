//! Validation of converted values.

use crate::convert::Value;
use crate::errors::DeclarationError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// An executable validation rule.
///
/// Pattern sources are compiled when the rule is built, so a `Validator`
/// is always ready to run.
#[derive(Clone)]
pub enum Validator {
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
    Pattern(Regex),
}

impl Validator {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Validator::Predicate(Arc::new(f))
    }

    /// Compile a pattern source.
    pub fn pattern(source: &str) -> Result<Self, DeclarationError> {
        Regex::new(source)
            .map(Validator::Pattern)
            .map_err(|e| DeclarationError::InvalidValidation(format!("{}: {}", source, e)))
    }

    /// Normalize a declared rule. Only pattern strings are accepted.
    pub fn from_json(rule: &serde_json::Value) -> Result<Self, DeclarationError> {
        match rule {
            serde_json::Value::String(source) => Validator::pattern(source),
            serde_json::Value::Null => Err(DeclarationError::InvalidValidation(
                "validation rule cannot be nil".to_string(),
            )),
            other => Err(DeclarationError::InvalidValidation(format!(
                "only a predicate or a pattern can be used to validate, got {}",
                other
            ))),
        }
    }

    /// Run the rule.
    ///
    /// Patterns match against the display form of scalars and are applied to
    /// every element of a list and every value of a map.
    pub fn check(&self, value: &Value) -> bool {
        match self {
            Validator::Predicate(f) => f(value),
            Validator::Pattern(re) => match value {
                Value::List(items) => items.iter().all(|item| self.check(item)),
                Value::Map(map) => map.values().all(|item| self.check(item)),
                scalar => re.is_match(&scalar.to_string()),
            },
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Predicate(_) => f.write_str("Predicate(..)"),
            Validator::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
        }
    }
}

impl TryFrom<&str> for Validator {
    type Error = DeclarationError;

    fn try_from(source: &str) -> Result<Self, Self::Error> {
        Validator::pattern(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches_scalar() {
        let validator = Validator::pattern(r"^\d+$").unwrap();
        assert!(validator.check(&Value::Str("123".into())));
        assert!(validator.check(&Value::Int(9)));
        assert!(!validator.check(&Value::Str("12a".into())));
    }

    #[test]
    fn test_pattern_applies_to_each_element() {
        let validator = Validator::pattern("^[a-z]+$").unwrap();
        assert!(validator.check(&Value::List(vec!["a".into(), "bc".into()])));
        assert!(!validator.check(&Value::List(vec!["a".into(), "B".into()])));
    }

    #[test]
    fn test_predicate() {
        let validator = Validator::predicate(|v| v.as_int().map_or(false, |i| i > 0));
        assert!(validator.check(&Value::Int(3)));
        assert!(!validator.check(&Value::Int(-3)));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            Validator::pattern("("),
            Err(DeclarationError::InvalidValidation(_))
        ));
    }

    #[test]
    fn test_unsupported_rule_shape() {
        assert!(matches!(
            Validator::from_json(&serde_json::json!(42)),
            Err(DeclarationError::InvalidValidation(_))
        ));
        assert!(matches!(
            Validator::from_json(&serde_json::Value::Null),
            Err(DeclarationError::InvalidValidation(_))
        ));
    }

    #[test]
    fn test_string_rule_is_normalized() {
        let validator = Validator::from_json(&serde_json::json!("^a")).unwrap();
        assert!(matches!(validator, Validator::Pattern(_)));
        assert!(validator.check(&Value::Str("abc".into())));
    }
}
