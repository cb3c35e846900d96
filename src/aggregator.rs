//! Raise-or-collect handling of parse errors.

use crate::errors::{ErrorKind, ParseError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How parse errors are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort the parse with the first error.
    #[default]
    FailFast,
    /// Keep parsing and report every error at the end.
    CollectAll,
}

impl ErrorPolicy {
    /// Policy for a `raise_if_missing` style flag.
    pub fn from_raise(raise: bool) -> Self {
        if raise {
            ErrorPolicy::FailFast
        } else {
            ErrorPolicy::CollectAll
        }
    }
}

/// Report key of errors not tied to a parameter. No parameter may use it.
pub const GENERAL_BUCKET: &str = "messages";

/// Errors grouped by parameter name and error kind.
///
/// Errors not tied to a parameter go to a general list under
/// [`GENERAL_BUCKET`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    #[serde(flatten)]
    parameters: IndexMap<String, IndexMap<ErrorKind, String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    messages: Vec<IndexMap<ErrorKind, String>>,
}

impl ErrorReport {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.messages.is_empty()
    }

    /// Total number of recorded errors.
    pub fn len(&self) -> usize {
        self.parameters.values().map(IndexMap::len).sum::<usize>() + self.messages.len()
    }

    /// Errors recorded against `parameter`, by kind.
    pub fn get(&self, parameter: &str) -> Option<&IndexMap<ErrorKind, String>> {
        self.parameters.get(parameter)
    }

    pub fn contains(&self, parameter: &str, kind: ErrorKind) -> bool {
        self.get(parameter)
            .map_or(false, |errors| errors.contains_key(&kind))
    }

    /// Errors with no associated parameter.
    pub fn messages(&self) -> &[IndexMap<ErrorKind, String>] {
        &self.messages
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &IndexMap<ErrorKind, String>)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every recorded error as a flat list of messages, in recording order
    /// per parameter.
    pub fn all_messages(&self) -> Vec<&str> {
        self.parameters
            .values()
            .flat_map(|errors| errors.values())
            .chain(self.messages.iter().flat_map(|errors| errors.values()))
            .map(String::as_str)
            .collect()
    }
}

/// Sink for parse errors, owned by a single parse.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    policy: ErrorPolicy,
    report: ErrorReport,
}

impl ErrorAggregator {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            report: ErrorReport::default(),
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Record an already constructed error.
    ///
    /// Under [`ErrorPolicy::FailFast`] the error is returned unchanged so the
    /// caller can propagate it with `?`.
    pub fn record(&mut self, error: ParseError, parameter: Option<&str>) -> Result<(), ParseError> {
        if self.policy == ErrorPolicy::FailFast {
            return Err(error);
        }

        let kind = error.kind();
        debug!(?kind, ?parameter, message = error.message(), "collected parse error");
        let entry = IndexMap::from([(kind, error.message().to_string())]);
        match parameter {
            Some(name) => self
                .report
                .parameters
                .entry(name.to_string())
                .or_default()
                .extend(entry),
            None => self.report.messages.push(entry),
        }
        Ok(())
    }

    /// Record an error of `kind` built from `message`.
    pub fn record_kind(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
        parameter: Option<&str>,
    ) -> Result<(), ParseError> {
        self.record(ParseError::new(kind, message), parameter)
    }

    pub fn report(&self) -> &ErrorReport {
        &self.report
    }

    pub fn into_report(self) -> ErrorReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_fast_returns_error() {
        let mut aggregator = ErrorAggregator::new(ErrorPolicy::FailFast);
        let result = aggregator.record_kind(ErrorKind::InvalidOption, "invalid option --x", None);
        assert_eq!(
            result,
            Err(ParseError::InvalidOption("invalid option --x".into()))
        );
        assert!(aggregator.report().is_empty());
    }

    #[test]
    fn test_fail_fast_passes_instance_through() {
        let mut aggregator = ErrorAggregator::new(ErrorPolicy::FailFast);
        let error = ParseError::MissingArgument("argument network must be provided".into());
        assert_eq!(aggregator.record(error.clone(), Some("network")), Err(error));
    }

    #[test]
    fn test_collect_keys_by_parameter_and_kind() {
        let mut aggregator = ErrorAggregator::new(ErrorPolicy::CollectAll);
        aggregator
            .record_kind(ErrorKind::MissingArgument, "missing", Some("network"))
            .unwrap();
        let report = aggregator.into_report();
        assert!(report.contains("network", ErrorKind::MissingArgument));
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_collect_merges_kinds() {
        let mut aggregator = ErrorAggregator::new(ErrorPolicy::CollectAll);
        aggregator
            .record_kind(ErrorKind::InvalidConversionArgument, "bad int", Some("port"))
            .unwrap();
        aggregator
            .record_kind(ErrorKind::Validation, "out of range", Some("port"))
            .unwrap();
        let report = aggregator.into_report();
        let errors = report.get("port").unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[&ErrorKind::InvalidConversionArgument], "bad int");
        assert_eq!(errors[&ErrorKind::Validation], "out of range");
    }

    #[test]
    fn test_collect_general_messages() {
        let mut aggregator = ErrorAggregator::new(ErrorPolicy::CollectAll);
        aggregator
            .record_kind(ErrorKind::InvalidOption, "invalid option --bogus", None)
            .unwrap();
        let report = aggregator.into_report();
        assert_eq!(report.messages().len(), 1);
        assert_eq!(report.all_messages(), vec!["invalid option --bogus"]);
    }

    #[test]
    fn test_report_serializes_by_tag() {
        let mut aggregator = ErrorAggregator::new(ErrorPolicy::CollectAll);
        aggregator
            .record_kind(ErrorKind::MissingArgument, "missing", Some("network"))
            .unwrap();
        let json = serde_json::to_string(aggregator.report()).unwrap();
        assert_eq!(json, r#"{"network":{"missing_argument":"missing"}}"#);

        aggregator
            .record_kind(ErrorKind::InvalidOption, "invalid option --x", None)
            .unwrap();
        let json = serde_json::to_string(aggregator.report()).unwrap();
        assert_eq!(
            json,
            r#"{"network":{"missing_argument":"missing"},"messages":[{"invalid_option":"invalid option --x"}]}"#
        );
    }

    #[test]
    fn test_policy_from_raise() {
        assert_eq!(ErrorPolicy::from_raise(true), ErrorPolicy::FailFast);
        assert_eq!(ErrorPolicy::from_raise(false), ErrorPolicy::CollectAll);
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::FailFast);
    }
}
