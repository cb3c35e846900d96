//! The parameter model: arguments, options, keywords and environment
//! variables, and the collection that holds them.

use crate::aggregator::GENERAL_BUCKET;
use crate::arity::Arity;
use crate::convert::{Conversion, Value};
use crate::errors::DeclarationError;
use crate::validate::Validator;
use serde::{Deserialize, Serialize};

/// The kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// A positional argument, bound by order.
    Argument,
    /// A flag or value option introduced by a short or long form.
    Option,
    /// A `name=value` token.
    Keyword,
    /// A variable read from the environment snapshot.
    #[serde(rename = "env", alias = "environment")]
    Environment,
}

impl ParameterKind {
    pub fn label(self) -> &'static str {
        match self {
            ParameterKind::Argument => "argument",
            ParameterKind::Option => "option",
            ParameterKind::Keyword => "keyword",
            ParameterKind::Environment => "environment variable",
        }
    }
}

/// A declared parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    kind: ParameterKind,
    name: String,
    arity: Arity,
    required: bool,
    convert: Option<Conversion>,
    validate: Option<Validator>,
    default: Option<Value>,
    hidden: bool,
    desc: Option<String>,
    permit: Option<Vec<Value>>,
    short: Option<String>,
    long: Option<String>,
    variable: Option<String>,
}

impl Parameter {
    /// Create a parameter of `kind`. Arguments start out required, every
    /// other kind starts out optional.
    pub fn new(kind: ParameterKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            arity: Arity::ONE,
            required: kind == ParameterKind::Argument,
            convert: None,
            validate: None,
            default: None,
            hidden: false,
            desc: None,
            permit: None,
            short: None,
            long: None,
            variable: None,
        }
    }

    pub fn argument(name: impl Into<String>) -> Self {
        Self::new(ParameterKind::Argument, name)
    }

    pub fn option(name: impl Into<String>) -> Self {
        Self::new(ParameterKind::Option, name)
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(ParameterKind::Keyword, name)
    }

    pub fn environment(name: impl Into<String>) -> Self {
        Self::new(ParameterKind::Environment, name)
    }

    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn convert(mut self, conversion: Conversion) -> Self {
        self.convert = Some(conversion);
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate = Some(validator);
        self
    }

    /// Set the default. Defaults are used as given and never converted.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn permit<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.permit = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Short form, e.g. `-d` or `-d string`.
    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    /// Long form, e.g. `--driver`, `--driver string` or `--color [when]`.
    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    /// Keyword token name or environment key.
    pub fn variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_arity(&self) -> Arity {
        self.arity
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_multiple(&self) -> bool {
        self.arity.is_multiple()
    }

    pub fn conversion(&self) -> Option<&Conversion> {
        self.convert.as_ref()
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validate.as_ref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn description(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn permitted(&self) -> Option<&[Value]> {
        self.permit.as_deref()
    }

    /// Declared short form, including any placeholder.
    pub fn short_form(&self) -> Option<&str> {
        self.short.as_deref()
    }

    /// Declared long form, including any placeholder.
    pub fn long_form(&self) -> Option<&str> {
        self.long.as_deref()
    }

    /// Short switch without its placeholder, e.g. `-d`.
    pub fn short_name(&self) -> Option<&str> {
        self.short.as_deref().map(|s| split_placeholder(s).0)
    }

    /// Long switch without its placeholder, e.g. `--driver`.
    pub fn long_name(&self) -> Option<&str> {
        self.long.as_deref().map(|s| split_placeholder(s).0)
    }

    /// The long switch used for matching.
    ///
    /// Options declaring neither a short nor a long form fall back to the
    /// dashed name under `long_prefix`.
    pub fn effective_long(&self, long_prefix: &str) -> Option<String> {
        if let Some(long) = self.long_name() {
            return Some(long.to_string());
        }
        if self.kind == ParameterKind::Option && self.short.is_none() {
            return Some(format!("{}{}", long_prefix, self.name.replace('_', "-")));
        }
        None
    }

    /// Keyword token name or environment key, with per-kind fallbacks.
    pub fn effective_variable(&self) -> String {
        if let Some(ref variable) = self.variable {
            return variable.clone();
        }
        match self.kind {
            ParameterKind::Environment => self.name.to_uppercase().replace('-', "_"),
            _ => self.name.replace('_', "-"),
        }
    }

    /// Whether the option's forms declare a value placeholder.
    pub fn argument_required(&self) -> bool {
        self.placeholders()
            .any(|placeholder| !is_optional_placeholder(placeholder))
    }

    /// Whether the option's value is optional, e.g. `--color [when]`.
    pub fn argument_optional(&self) -> bool {
        !self.argument_required() && self.placeholders().any(is_optional_placeholder)
    }

    /// An option that takes no value.
    pub fn is_flag(&self) -> bool {
        self.kind == ParameterKind::Option
            && !self.argument_required()
            && !self.argument_optional()
    }

    fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.short
            .iter()
            .chain(self.long.iter())
            .map(|form| split_placeholder(form).1)
            .filter(|placeholder| !placeholder.is_empty())
    }
}

/// Split `--driver string` or `--driver=string` into switch and placeholder.
fn split_placeholder(form: &str) -> (&str, &str) {
    let form = form.trim();
    match form.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(idx) => (&form[..idx], form[idx + 1..].trim()),
        None => (form, ""),
    }
}

fn shares_name(a: ParameterKind, b: ParameterKind) -> bool {
    matches!(
        (a, b),
        (ParameterKind::Keyword, ParameterKind::Environment)
            | (ParameterKind::Environment, ParameterKind::Keyword)
    )
}

fn is_optional_placeholder(placeholder: &str) -> bool {
    placeholder.starts_with('[') && placeholder.ends_with(']')
}

/// Declared parameters, one insertion-ordered collection per kind.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    arguments: Vec<Parameter>,
    options: Vec<Parameter>,
    keywords: Vec<Parameter>,
    environments: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, rejecting duplicates within its kind.
    ///
    /// A name may be shared across kinds only by a keyword and an
    /// environment variable, which then resolve to one value.
    pub fn add(&mut self, parameter: Parameter) -> Result<(), DeclarationError> {
        if parameter.name == GENERAL_BUCKET {
            return Err(DeclarationError::ParameterConflict(format!(
                "'{}' is reserved for errors not tied to a parameter",
                GENERAL_BUCKET
            )));
        }

        let siblings = self.of_kind(parameter.kind());
        if siblings.iter().any(|p| p.name == parameter.name) {
            return Err(DeclarationError::ParameterConflict(format!(
                "already declared {} '{}'",
                parameter.kind().label(),
                parameter.name
            )));
        }

        if let Some(other) = self
            .iter()
            .find(|p| p.name == parameter.name && !shares_name(p.kind, parameter.kind))
        {
            return Err(DeclarationError::ParameterConflict(format!(
                "{} '{}' reuses the name of {} '{}'",
                parameter.kind().label(),
                parameter.name,
                other.kind().label(),
                other.name
            )));
        }

        match parameter.kind() {
            ParameterKind::Option => {
                for form in [parameter.short_name(), parameter.long_name()]
                    .into_iter()
                    .flatten()
                {
                    if let Some(other) = siblings
                        .iter()
                        .find(|p| p.short_name() == Some(form) || p.long_name() == Some(form))
                    {
                        return Err(DeclarationError::ParameterConflict(format!(
                            "option '{}' reuses '{}' from option '{}'",
                            parameter.name, form, other.name
                        )));
                    }
                }
            }
            ParameterKind::Keyword | ParameterKind::Environment => {
                let variable = parameter.effective_variable();
                if let Some(other) = siblings
                    .iter()
                    .find(|p| p.effective_variable() == variable)
                {
                    return Err(DeclarationError::ParameterConflict(format!(
                        "{} '{}' reuses '{}' from '{}'",
                        parameter.kind().label(),
                        parameter.name,
                        variable,
                        other.name
                    )));
                }
            }
            ParameterKind::Argument => {}
        }

        self.of_kind_mut(parameter.kind()).push(parameter);
        Ok(())
    }

    /// Chaining form of [`add`](Parameters::add).
    pub fn with(mut self, parameter: Parameter) -> Result<Self, DeclarationError> {
        self.add(parameter)?;
        Ok(self)
    }

    pub fn arguments(&self) -> &[Parameter] {
        &self.arguments
    }

    pub fn options(&self) -> &[Parameter] {
        &self.options
    }

    pub fn keywords(&self) -> &[Parameter] {
        &self.keywords
    }

    pub fn environments(&self) -> &[Parameter] {
        &self.environments
    }

    pub fn of_kind(&self, kind: ParameterKind) -> &[Parameter] {
        match kind {
            ParameterKind::Argument => &self.arguments,
            ParameterKind::Option => &self.options,
            ParameterKind::Keyword => &self.keywords,
            ParameterKind::Environment => &self.environments,
        }
    }

    fn of_kind_mut(&mut self, kind: ParameterKind) -> &mut Vec<Parameter> {
        match kind {
            ParameterKind::Argument => &mut self.arguments,
            ParameterKind::Option => &mut self.options,
            ParameterKind::Keyword => &mut self.keywords,
            ParameterKind::Environment => &mut self.environments,
        }
    }

    /// Every parameter: arguments, then keywords, options and environment
    /// variables.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.arguments
            .iter()
            .chain(self.keywords.iter())
            .chain(self.options.iter())
            .chain(self.environments.iter())
    }

    pub fn len(&self) -> usize {
        self.arguments.len() + self.options.len() + self.keywords.len() + self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
