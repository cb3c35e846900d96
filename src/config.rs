//! JSON declaration documents for declap.

use crate::aggregator::ErrorPolicy;
use crate::arity::{Arity, ArityExpr};
use crate::convert::{Conversion, ConversionRegistry, Delimiters, Value};
use crate::errors::DeclarationError;
use crate::parameter::{Parameter, ParameterKind, Parameters};
use crate::parser::ParseSettings;
use crate::validate::Validator;
use serde::Deserialize;

/// The default prefix for shell export names.
pub const DEFAULT_PREFIX: &str = "DECLAP_";

/// Declaration of a single parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamConfig {
    /// The name of the parameter (the key in parse results)
    pub name: String,
    /// The kind of parameter
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    /// Arity: an integer, an integer string, or a wildcard such as "*"
    pub arity: Option<ArityExpr>,
    /// Overrides the per-kind required default
    pub required: Option<bool>,
    /// Shorthand for `"required": false`
    #[serde(default)]
    pub optional: bool,
    /// Conversion key, e.g. "int" or "map_of_sym_to_int"
    pub convert: Option<String>,
    /// Validation pattern
    pub validate: Option<serde_json::Value>,
    /// Default value, used as given
    pub default: Option<serde_json::Value>,
    /// Allowed values
    pub permit: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub hidden: bool,
    pub desc: Option<String>,
    /// Short form, options only (e.g. "-d" or "-d string")
    pub short: Option<String>,
    /// Long form, options only (e.g. "--driver string")
    pub long: Option<String>,
    /// Keyword token or environment key
    pub variable: Option<String>,
}

/// Top-level declaration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name of the program
    pub name: Option<String>,
    /// Description of the program
    pub description: Option<String>,
    /// Version of the program
    pub version: Option<String>,
    /// Shell export prefix (default: "DECLAP_")
    pub prefix: Option<String>,
    /// Whether parse errors abort or are collected
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    pub long_prefix: Option<String>,
    pub short_prefix: Option<String>,
    pub list_delimiter: Option<String>,
    pub map_delimiter: Option<String>,
    pub pair_delimiter: Option<String>,
    /// Parameter declarations, in order
    #[serde(default)]
    pub parameters: Vec<ParamConfig>,
}

impl Config {
    /// Parse a JSON string into a Config.
    pub fn from_json(json: &str) -> Result<Config, DeclarationError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        self.parameters().map(|_| ())
    }

    /// Build the parameter collection.
    ///
    /// Declaration mistakes are returned immediately.
    pub fn parameters(&self) -> Result<Parameters, DeclarationError> {
        let settings = self.settings();
        Self::validate_settings(&settings)?;

        let mut parameters = Parameters::new();
        for param in &self.parameters {
            parameters.add(param.to_parameter(&settings)?)?;
        }
        Ok(parameters)
    }

    pub fn settings(&self) -> ParseSettings {
        let defaults = ParseSettings::default();
        ParseSettings {
            policy: self.error_policy,
            long_prefix: self.long_prefix.clone().unwrap_or(defaults.long_prefix),
            short_prefix: self.short_prefix.clone().unwrap_or(defaults.short_prefix),
        }
    }

    /// The built-in registry with this document's delimiters.
    pub fn registry(&self) -> ConversionRegistry {
        let defaults = Delimiters::default();
        ConversionRegistry::new().with_delimiters(Delimiters {
            list: self.list_delimiter.clone().unwrap_or(defaults.list),
            map: self.map_delimiter.clone().unwrap_or(defaults.map),
            pair: self.pair_delimiter.clone().unwrap_or(defaults.pair),
        })
    }

    /// Get the effective prefix, using the default if none is set.
    pub fn effective_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    fn validate_settings(settings: &ParseSettings) -> Result<(), DeclarationError> {
        if settings.short_prefix.is_empty() || settings.long_prefix.is_empty() {
            return Err(DeclarationError::InvalidDeclaration(
                "option prefixes cannot be empty".to_string(),
            ));
        }
        if settings.short_prefix == settings.long_prefix {
            return Err(DeclarationError::InvalidDeclaration(format!(
                "short and long prefix are both '{}'",
                settings.long_prefix
            )));
        }
        Ok(())
    }
}

impl ParamConfig {
    /// Normalize this declaration into a [`Parameter`].
    pub fn to_parameter(&self, settings: &ParseSettings) -> Result<Parameter, DeclarationError> {
        self.validate_fields(settings)?;

        let mut parameter = Parameter::new(self.kind, self.name.clone());

        if let Some(ref arity) = self.arity {
            parameter = parameter.arity(Arity::resolve(Some(arity))?);
        }
        match (self.required, self.optional) {
            (Some(true), true) => {
                return Err(DeclarationError::InvalidDeclaration(format!(
                    "'{}' cannot be both required and optional",
                    self.name
                )));
            }
            (Some(true), false) => parameter = parameter.required(),
            (Some(false), _) | (None, true) => parameter = parameter.optional(),
            (None, false) => {}
        }
        if let Some(ref convert) = self.convert {
            parameter = parameter.convert(Conversion::parse(convert));
        }
        if let Some(ref rule) = self.validate {
            parameter = parameter.validate(Validator::from_json(rule)?);
        }
        if let Some(default) = self.default.as_ref().and_then(Value::from_json) {
            parameter = parameter.default(default);
        }
        if let Some(ref permit) = self.permit {
            parameter = parameter.permit(permit.iter().filter_map(Value::from_json));
        }
        if self.hidden {
            parameter = parameter.hidden();
        }
        if let Some(ref desc) = self.desc {
            parameter = parameter.desc(desc.clone());
        }
        if let Some(ref short) = self.short {
            parameter = parameter.short(short.clone());
        }
        if let Some(ref long) = self.long {
            parameter = parameter.long(long.clone());
        }
        if let Some(ref variable) = self.variable {
            parameter = parameter.variable(variable.clone());
        }

        Ok(parameter)
    }

    /// Check fields against the parameter kind.
    fn validate_fields(&self, settings: &ParseSettings) -> Result<(), DeclarationError> {
        if self.name.trim().is_empty() {
            return Err(DeclarationError::InvalidDeclaration(
                "parameter name cannot be empty".to_string(),
            ));
        }

        if self.kind != ParameterKind::Option {
            for (field, present) in [("short", self.short.is_some()), ("long", self.long.is_some())] {
                if present {
                    return Err(self.misplaced(field));
                }
            }
        }
        if matches!(self.kind, ParameterKind::Argument | ParameterKind::Option)
            && self.variable.is_some()
        {
            return Err(self.misplaced("variable"));
        }

        if let Some(ref short) = self.short {
            let switch = short.split(|c: char| c == '=' || c.is_whitespace()).next().unwrap_or("");
            let letter = switch.strip_prefix(settings.short_prefix.as_str());
            let mut chars = letter.map(str::chars).into_iter().flatten();
            let valid = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic());
            if !valid {
                return Err(DeclarationError::InvalidDeclaration(format!(
                    "invalid short option '{}': must be '{}' followed by a single ASCII letter",
                    short, settings.short_prefix
                )));
            }
        }
        if let Some(ref long) = self.long {
            if !long.starts_with(settings.long_prefix.as_str()) || long.len() <= settings.long_prefix.len() {
                return Err(DeclarationError::InvalidDeclaration(format!(
                    "invalid long option '{}': must start with '{}'",
                    long, settings.long_prefix
                )));
            }
        }

        if let Some(ref permit) = self.permit {
            if permit.is_empty() {
                return Err(DeclarationError::InvalidDeclaration(format!(
                    "'permit' on '{}' is empty: must have at least one value",
                    self.name
                )));
            }
        }

        Ok(())
    }

    fn misplaced(&self, field: &str) -> DeclarationError {
        DeclarationError::InvalidDeclaration(format!(
            "'{}' cannot be used on {} '{}'",
            field,
            self.kind.label(),
            self.name
        ))
    }
}
