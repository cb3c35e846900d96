//! Parsing of raw arguments against declared parameters.

use crate::aggregator::{ErrorAggregator, ErrorPolicy, ErrorReport};
use crate::convert::{Conversion, ConversionError, ConversionRegistry, Value};
use crate::errors::{ErrorKind, ParseError};
use crate::parameter::{Parameter, ParameterKind, Parameters};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::iter::Peekable;
use std::slice::Iter;
use tracing::{debug, trace};

/// Knobs for a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSettings {
    pub policy: ErrorPolicy,
    /// Introduces long options; alone it ends option parsing.
    pub long_prefix: String,
    /// Introduces short options and bundles of them.
    pub short_prefix: String,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            policy: ErrorPolicy::FailFast,
            long_prefix: "--".to_string(),
            short_prefix: "-".to_string(),
        }
    }
}

impl ParseSettings {
    pub fn collect_all() -> Self {
        Self {
            policy: ErrorPolicy::CollectAll,
            ..Self::default()
        }
    }
}

/// Outcome of a parse.
///
/// Under [`ErrorPolicy::CollectAll`] the values are best effort and
/// [`errors`](Parsed::errors) lists everything that went wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parsed {
    values: IndexMap<String, Value>,
    errors: ErrorReport,
    remaining: Vec<String>,
}

impl Parsed {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Resolved values in declaration order.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn errors(&self) -> &ErrorReport {
        &self.errors
    }

    /// Positional tokens no argument could take.
    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_values(self) -> IndexMap<String, Value> {
        self.values
    }
}

/// Parses argument vectors against a fixed set of parameters.
///
/// An engine only borrows its parameters and registry, so one engine can
/// serve any number of parses, including from several threads.
#[derive(Debug, Clone)]
pub struct Engine<'a> {
    parameters: &'a Parameters,
    registry: &'a ConversionRegistry,
    settings: ParseSettings,
}

impl<'a> Engine<'a> {
    pub fn new(parameters: &'a Parameters, registry: &'a ConversionRegistry) -> Self {
        Self {
            parameters,
            registry,
            settings: ParseSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ParseSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.settings.policy = policy;
        self
    }

    pub fn settings(&self) -> &ParseSettings {
        &self.settings
    }

    /// Parse `args` with `env` as the environment snapshot.
    pub fn parse(&self, args: &[String], env: &HashMap<String, String>) -> Result<Parsed, ParseError> {
        parse_args(self.parameters, self.registry, &self.settings, args, env)
    }
}

/// Parse `args` and `env` against `parameters`.
///
/// Under [`ErrorPolicy::FailFast`] the first error is returned. Under
/// [`ErrorPolicy::CollectAll`] this always returns `Ok` and errors are
/// reported in [`Parsed::errors`].
pub fn parse_args(
    parameters: &Parameters,
    registry: &ConversionRegistry,
    settings: &ParseSettings,
    args: &[String],
    env: &HashMap<String, String>,
) -> Result<Parsed, ParseError> {
    let mut parser = Parser::new(parameters, registry, settings);
    parser.parse(args, env)
}

/// One raw occurrence of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Raw {
    Value(String),
    /// A flag, or an option whose optional value was left out.
    Present,
}

#[derive(Debug)]
struct Occurrences<'a> {
    parameter: &'a Parameter,
    raws: Vec<Raw>,
}

/// Internal parser state.
struct Parser<'a> {
    parameters: &'a Parameters,
    registry: &'a ConversionRegistry,
    settings: &'a ParseSettings,
    aggregator: ErrorAggregator,
    occurrences: IndexMap<String, Occurrences<'a>>,
    positionals: Vec<String>,
    remaining: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(
        parameters: &'a Parameters,
        registry: &'a ConversionRegistry,
        settings: &'a ParseSettings,
    ) -> Self {
        Self {
            parameters,
            registry,
            settings,
            aggregator: ErrorAggregator::new(settings.policy),
            occurrences: IndexMap::new(),
            positionals: Vec::new(),
            remaining: Vec::new(),
        }
    }

    fn parse(&mut self, args: &[String], env: &HashMap<String, String>) -> Result<Parsed, ParseError> {
        let mut args_iter = args.iter().peekable();
        let mut parsing_options = true;

        while let Some(arg) = args_iter.next() {
            if parsing_options && arg == &self.settings.long_prefix {
                // Everything after the separator is positional
                parsing_options = false;
                continue;
            }

            if parsing_options && self.is_long(arg) {
                self.parse_long_option(arg, &mut args_iter)?;
            } else if parsing_options && self.is_short(arg) {
                self.parse_short_options(arg, &mut args_iter)?;
            } else if parsing_options && self.parse_keyword(arg) {
                continue;
            } else {
                trace!(token = %arg, "positional");
                self.positionals.push(arg.clone());
            }
        }

        self.assign_positionals()?;
        self.resolve_environment(env);
        self.check_value_arity()?;

        let values = self.resolve_values()?;
        let errors = std::mem::take(&mut self.aggregator).into_report();
        Ok(Parsed {
            values,
            errors,
            remaining: std::mem::take(&mut self.remaining),
        })
    }

    fn is_long(&self, arg: &str) -> bool {
        let prefix = &self.settings.long_prefix;
        arg.starts_with(prefix.as_str()) && arg.len() > prefix.len()
    }

    fn is_short(&self, arg: &str) -> bool {
        let prefix = &self.settings.short_prefix;
        arg.starts_with(prefix.as_str())
            && arg.len() > prefix.len()
            && !looks_like_number(&arg[prefix.len()..])
    }

    /// `name=value` where `name` is a declared keyword.
    fn is_keyword(&self, arg: &str) -> bool {
        arg.split_once('=').map_or(false, |(name, _)| {
            self.parameters
                .keywords()
                .iter()
                .any(|p| p.effective_variable() == name)
        })
    }

    /// Consume the next token as a value unless it introduces an option or
    /// assigns a keyword.
    fn take_value<'b>(&self, args_iter: &mut Peekable<Iter<'b, String>>) -> Option<&'b String> {
        let next = args_iter.peek()?;
        if next.as_str() == self.settings.long_prefix
            || self.is_long(next)
            || self.is_short(next)
            || self.is_keyword(next)
        {
            return None;
        }
        args_iter.next()
    }

    /// Consume the value tokens of one occurrence of `option`.
    fn take_values(&self, option: &Parameter, args_iter: &mut Peekable<Iter<String>>) -> Vec<String> {
        let limit = values_per_occurrence(option);
        let mut values = Vec::new();
        while limit.map_or(true, |max| values.len() < max) {
            match self.take_value(args_iter) {
                Some(value) => values.push(value.clone()),
                None => break,
            }
        }
        values
    }

    fn push(&mut self, parameter: &'a Parameter, raw: Raw) {
        trace!(parameter = parameter.name(), ?raw, "occurrence");
        self.occurrences
            .entry(parameter.name().to_string())
            .or_insert_with(|| Occurrences {
                parameter,
                raws: Vec::new(),
            })
            .raws
            .push(raw);
    }

    fn parse_long_option(
        &mut self,
        arg: &str,
        args_iter: &mut Peekable<Iter<String>>,
    ) -> Result<(), ParseError> {
        let settings = self.settings;
        let long_prefix = settings.long_prefix.as_str();
        let option_str = &arg[long_prefix.len()..];

        // Check for --option=value format
        let (switch, inline_value) = match option_str.split_once('=') {
            Some((name, value)) => (format!("{}{}", long_prefix, name), Some(value)),
            None => (arg.to_string(), None),
        };

        let parameters = self.parameters;
        let Some(option) = parameters
            .options()
            .iter()
            .find(|p| p.effective_long(long_prefix).as_deref() == Some(switch.as_str()))
        else {
            debug!(%switch, "unmatched long option");
            return self
                .aggregator
                .record_kind(ErrorKind::InvalidOption, format!("invalid option {}", switch), None);
        };

        if option.is_flag() {
            let raw = inline_value.map_or(Raw::Present, |v| Raw::Value(v.to_string()));
            self.push(option, raw);
            return Ok(());
        }

        let values = match inline_value {
            Some(v) => vec![v.to_string()],
            None => self.take_values(option, args_iter),
        };
        self.push_option_values(option, &switch, values)
    }

    fn parse_short_options(
        &mut self,
        arg: &str,
        args_iter: &mut Peekable<Iter<String>>,
    ) -> Result<(), ParseError> {
        let settings = self.settings;
        let short_prefix = settings.short_prefix.as_str();
        let body = &arg[short_prefix.len()..];
        let parameters = self.parameters;

        for (i, c) in body.char_indices() {
            let switch = format!("{}{}", short_prefix, c);
            let Some(option) = parameters
                .options()
                .iter()
                .find(|p| p.short_name() == Some(switch.as_str()))
            else {
                debug!(%switch, token = arg, "unmatched short option");
                // The rest of the bundle cannot be interpreted reliably
                return self.aggregator.record_kind(
                    ErrorKind::InvalidOption,
                    format!("invalid option {}", switch),
                    None,
                );
            };

            if option.is_flag() {
                self.push(option, Raw::Present);
                continue;
            }

            // The value is either the rest of this token (-ofile.txt, -o=file.txt)
            // or the next token
            let rest = &body[i + c.len_utf8()..];
            let rest = rest.strip_prefix('=').unwrap_or(rest);
            let values = if !rest.is_empty() {
                vec![rest.to_string()]
            } else {
                self.take_values(option, args_iter)
            };
            return self.push_option_values(option, &switch, values);
        }

        Ok(())
    }

    fn push_option_values(
        &mut self,
        option: &'a Parameter,
        switch: &str,
        values: Vec<String>,
    ) -> Result<(), ParseError> {
        if values.is_empty() {
            if option.argument_optional() {
                self.push(option, Raw::Present);
                return Ok(());
            }
            return self.aggregator.record_kind(
                ErrorKind::MissingArgument,
                format!("option {} requires an argument", switch),
                Some(option.name()),
            );
        }
        for value in values {
            self.push(option, Raw::Value(value));
        }
        Ok(())
    }

    /// Record `name=value` when `name` is a declared keyword.
    fn parse_keyword(&mut self, arg: &str) -> bool {
        let Some((name, value)) = arg.split_once('=') else {
            return false;
        };
        let parameters = self.parameters;
        match parameters
            .keywords()
            .iter()
            .find(|p| p.effective_variable() == name)
        {
            Some(keyword) => {
                self.push(keyword, Raw::Value(value.to_string()));
                true
            }
            None => false,
        }
    }

    /// Bind positional tokens to arguments in declaration order.
    ///
    /// A variadic argument takes everything except what the arguments after
    /// it need to reach their minimum arity.
    fn assign_positionals(&mut self) -> Result<(), ParseError> {
        let arguments = self.parameters.arguments();
        let positionals = std::mem::take(&mut self.positionals);
        let mut cursor = 0;

        for (i, argument) in arguments.iter().enumerate() {
            let available = positionals.len() - cursor;
            let arity = argument.get_arity();
            let take = match arity.max() {
                Some(max) => max.min(available),
                None => {
                    let reserved: usize = arguments[i + 1..]
                        .iter()
                        .map(|a| a.get_arity().min())
                        .sum();
                    available.saturating_sub(reserved)
                }
            };
            if take == 0 {
                continue;
            }

            for value in &positionals[cursor..cursor + take] {
                self.push(argument, Raw::Value(value.clone()));
            }
            cursor += take;

            if !arity.accepts(take) {
                self.aggregator.record_kind(
                    ErrorKind::InvalidArity,
                    arity_message(argument, take),
                    Some(argument.name()),
                )?;
            }
        }

        for leftover in &positionals[cursor..] {
            self.remaining.push(leftover.clone());
            self.aggregator.record_kind(
                ErrorKind::UnexpectedArgument,
                format!("unexpected argument '{}'", leftover),
                None,
            )?;
        }

        Ok(())
    }

    /// Check value counts of multi-value options, keywords and environment
    /// variables.
    fn check_value_arity(&mut self) -> Result<(), ParseError> {
        let parameters = self.parameters;
        for parameter in parameters
            .options()
            .iter()
            .chain(parameters.keywords())
            .chain(parameters.environments())
        {
            let arity = parameter.get_arity();
            if !arity.is_multiple() {
                continue;
            }
            let count = match self.occurrences.get(parameter.name()) {
                Some(occ) if std::ptr::eq(occ.parameter, parameter) => occ.raws.len(),
                _ => continue,
            };
            if !arity.accepts(count) {
                self.aggregator.record_kind(
                    ErrorKind::InvalidArity,
                    arity_message(parameter, count),
                    Some(parameter.name()),
                )?;
            }
        }
        Ok(())
    }

    /// Read environment-bound parameters not already given on the command line.
    fn resolve_environment(&mut self, env: &HashMap<String, String>) {
        let parameters = self.parameters;
        for parameter in parameters.environments() {
            if self.occurrences.contains_key(parameter.name()) {
                debug!(
                    parameter = parameter.name(),
                    "command line value takes precedence over environment"
                );
                continue;
            }
            let variable = parameter.effective_variable();
            let Some(raw) = env.get(&variable) else {
                continue;
            };
            debug!(parameter = parameter.name(), %variable, "read from environment");

            let splits = parameter.is_multiple()
                && !parameter.conversion().map_or(false, Conversion::is_list);
            if splits {
                let registry = self.registry;
                let delimiter = registry.delimiters().list.as_str();
                for piece in raw.split(delimiter).map(str::trim).filter(|p| !p.is_empty()) {
                    self.push(parameter, Raw::Value(piece.to_string()));
                }
            } else {
                self.push(parameter, Raw::Value(raw.clone()));
            }
        }
    }

    /// Convert, permit-check and validate occurrences, then apply defaults and
    /// the required check, in declaration order.
    fn resolve_values(&mut self) -> Result<IndexMap<String, Value>, ParseError> {
        let mut values = IndexMap::new();
        let mut seen = HashSet::new();
        let parameters = self.parameters;

        for parameter in parameters.iter() {
            let name = parameter.name();
            if let Some(occurrences) = self.occurrences.shift_remove(name) {
                seen.insert(name.to_string());
                if let Some(value) = self.resolve_occurrences(&occurrences)? {
                    values.insert(name.to_string(), value);
                }
                continue;
            }
            if seen.contains(name) || values.contains_key(name) {
                continue;
            }

            if let Some(default) = parameter.default_value() {
                values.insert(name.to_string(), default.clone());
            } else if parameter.is_flag() {
                values.insert(name.to_string(), Value::Bool(false));
            } else if parameter.is_multiple() && parameter.get_arity().min() == 0 {
                values.insert(name.to_string(), Value::List(Vec::new()));
            } else if parameter.is_required() {
                self.aggregator.record_kind(
                    ErrorKind::MissingArgument,
                    format!("{} must be provided", describe(parameter)),
                    Some(name),
                )?;
            }
        }

        Ok(values)
    }

    /// Resolve one parameter's occurrences into a value.
    ///
    /// Returns `None` when any occurrence failed; the failures are recorded.
    fn resolve_occurrences(&mut self, occurrences: &Occurrences<'a>) -> Result<Option<Value>, ParseError> {
        let parameter = occurrences.parameter;
        let mut converted = Vec::with_capacity(occurrences.raws.len());
        let mut failed = false;

        for raw in &occurrences.raws {
            let value = match raw {
                // A bare switch carries no user value to check
                Raw::Present => {
                    converted.push(Value::Bool(true));
                    continue;
                }
                Raw::Value(s) => match self.convert(parameter, s)? {
                    Some(value) => value,
                    None => {
                        failed = true;
                        continue;
                    }
                },
            };

            if !self.check_permitted(parameter, &value)? || !self.check_valid(parameter, &value)? {
                failed = true;
                continue;
            }
            converted.push(value);
        }

        if failed {
            return Ok(None);
        }
        Ok(combine(parameter, converted))
    }

    fn convert(&mut self, parameter: &Parameter, raw: &str) -> Result<Option<Value>, ParseError> {
        let Some(conversion) = parameter.conversion() else {
            return Ok(Some(Value::Str(raw.to_string())));
        };
        match self.registry.convert(conversion, raw) {
            Ok(value) => Ok(Some(value)),
            Err(ConversionError::Unsupported(key)) => {
                self.aggregator.record_kind(
                    ErrorKind::UnsupportedConversion,
                    format!("unsupported conversion '{}' for {}", key, describe(parameter)),
                    Some(parameter.name()),
                )?;
                Ok(None)
            }
            Err(ConversionError::InvalidArgument { value, target }) => {
                self.aggregator.record_kind(
                    ErrorKind::InvalidConversionArgument,
                    format!(
                        "cannot convert value '{}' into '{}' for {}",
                        value,
                        target,
                        describe(parameter)
                    ),
                    Some(parameter.name()),
                )?;
                Ok(None)
            }
        }
    }

    fn check_permitted(&mut self, parameter: &Parameter, value: &Value) -> Result<bool, ParseError> {
        let Some(permit) = parameter.permitted() else {
            return Ok(true);
        };
        let rejected = match value {
            Value::List(items) => items.iter().find(|item| !permit.contains(item)),
            Value::Map(map) => map.values().find(|item| !permit.contains(item)),
            scalar => (!permit.contains(scalar)).then_some(scalar),
        };
        let Some(rejected) = rejected else {
            return Ok(true);
        };
        let choices: Vec<String> = permit.iter().map(Value::to_string).collect();
        self.aggregator.record_kind(
            ErrorKind::UnpermittedArgument,
            format!(
                "unpermitted value '{}' for {}: choose from {}",
                rejected,
                describe(parameter),
                choices.join(", ")
            ),
            Some(parameter.name()),
        )?;
        Ok(false)
    }

    fn check_valid(&mut self, parameter: &Parameter, value: &Value) -> Result<bool, ParseError> {
        match parameter.validator() {
            Some(validator) if !validator.check(value) => {
                self.aggregator.record_kind(
                    ErrorKind::Validation,
                    format!("value '{}' fails validation for {}", value, describe(parameter)),
                    Some(parameter.name()),
                )?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}

/// Fold converted values into the parameter's value.
///
/// List conversions flatten and map conversions merge, in encounter order.
/// Otherwise multi-value parameters yield a list and single-value parameters
/// keep the last value.
fn combine(parameter: &Parameter, converted: Vec<Value>) -> Option<Value> {
    match parameter.conversion() {
        Some(conversion) if conversion.is_map() => {
            let mut merged = IndexMap::new();
            for value in converted {
                if let Value::Map(map) = value {
                    merged.extend(map);
                }
            }
            Some(Value::Map(merged))
        }
        Some(conversion) if conversion.is_list() => Some(Value::List(
            converted
                .into_iter()
                .flat_map(|value| match value {
                    Value::List(items) => items,
                    other => vec![other],
                })
                .collect(),
        )),
        _ if parameter.is_multiple() => Some(Value::List(converted)),
        _ => converted.into_iter().last(),
    }
}

/// How many value tokens one occurrence of `option` may take, `None` meaning
/// up to the next option, keyword or separator.
///
/// A single-value option with a list or map conversion gathers its items
/// from the following tokens as well.
fn values_per_occurrence(option: &Parameter) -> Option<usize> {
    let collects = option
        .conversion()
        .map_or(false, |c| c.is_list() || c.is_map());
    match option.get_arity().max() {
        Some(1) if collects => None,
        max => max,
    }
}

/// How error messages refer to a parameter.
fn describe(parameter: &Parameter) -> String {
    match parameter.kind() {
        ParameterKind::Option => {
            let switch = parameter
                .long_name()
                .or_else(|| parameter.short_name())
                .map(str::to_string)
                .unwrap_or_else(|| format!("--{}", parameter.name().replace('_', "-")));
            format!("option {}", switch)
        }
        ParameterKind::Environment => {
            format!("environment variable {}", parameter.effective_variable())
        }
        kind => format!("{} '{}'", kind.label(), parameter.name()),
    }
}

fn arity_message(parameter: &Parameter, count: usize) -> String {
    let arity = parameter.get_arity();
    let expected = match arity.max() {
        Some(n) => format!("{} {}", n, times(n)),
        None => format!("at least {} {}", arity.min(), times(arity.min())),
    };
    format!(
        "expected {} to appear {} but appeared {} {}",
        describe(parameter),
        expected,
        count,
        times(count)
    )
}

fn times(n: usize) -> &'static str {
    if n == 1 {
        "time"
    } else {
        "times"
    }
}

/// Negative numbers such as `-5` or `-0.5` are values, never short options.
fn looks_like_number(body: &str) -> bool {
    body.starts_with(|c: char| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
}
