//! declap - Declarative command-line parameter parsing.
//!
//! Parameters (positional arguments, options, keywords and environment
//! variables) are declared with their arity, conversion, validation and
//! defaults. The parsing engine matches a raw argument vector and an
//! environment snapshot against them and produces typed values, either
//! failing on the first error or collecting every error into a report.

pub mod aggregator;
pub mod arity;
pub mod config;
pub mod convert;
pub mod errors;
pub mod output;
pub mod parameter;
pub mod parser;
pub mod validate;

pub use aggregator::{ErrorAggregator, ErrorPolicy, ErrorReport};
pub use arity::{Arity, ArityExpr};
pub use config::{Config, ParamConfig};
pub use convert::{Conversion, ConversionError, ConversionRegistry, Delimiters, Value};
pub use errors::{DeclarationError, ErrorKind, ParseError};
pub use output::{render_errors, render_json, render_shell};
pub use parameter::{Parameter, ParameterKind, Parameters};
pub use parser::{parse_args, Engine, ParseSettings, Parsed};
pub use validate::Validator;
