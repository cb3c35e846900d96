//! Rendering of parse outcomes as JSON or shell export statements.

use crate::parser::Parsed;
use anyhow::Result;

/// Escape a string for safe use in a shell double-quoted context.
///
/// Escapes: $, `, \, ", and !
fn escape_shell_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '$' => escaped.push_str("\\$"),
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '!' => escaped.push_str("\\!"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Convert a parameter name to a valid shell variable name.
///
/// Converts to uppercase and replaces hyphens with underscores.
fn to_shell_var_name(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

/// Render values and errors as pretty-printed JSON.
pub fn render_json(parsed: &Parsed) -> Result<String> {
    Ok(serde_json::to_string_pretty(parsed)?)
}

/// Render values as shell `export` statements, in declaration order.
///
/// A parse with errors renders as [`render_errors`] instead, so sourcing the
/// output never half-applies a failed parse.
pub fn render_shell(parsed: &Parsed, prefix: &str) -> String {
    if !parsed.is_valid() {
        return render_errors(&parsed.errors().all_messages());
    }

    let mut output = String::new();
    for (name, value) in parsed.values() {
        let var_name = format!("{}{}", prefix, to_shell_var_name(name));
        let escaped_value = escape_shell_value(&value.to_string());
        output.push_str(&format!("export {}=\"{}\"\n", var_name, escaped_value));
    }
    output
}

/// Render error messages that print to stderr and exit 1 when sourced.
pub fn render_errors(messages: &[&str]) -> String {
    let mut output = String::new();
    for message in messages {
        output.push_str(&format!(
            "echo \"declap: {}\" >&2\n",
            escape_shell_value(message)
        ));
    }
    output.push_str("exit 1\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ErrorPolicy;
    use crate::arity::Arity;
    use crate::convert::{Conversion, ConversionRegistry};
    use crate::parameter::{Parameter, Parameters};
    use crate::parser::Engine;
    use std::collections::HashMap;

    fn parse(parameters: &Parameters, input: &[&str]) -> Parsed {
        let registry = ConversionRegistry::new();
        let args: Vec<String> = input.iter().map(|s| s.to_string()).collect();
        Engine::new(parameters, &registry)
            .with_policy(ErrorPolicy::CollectAll)
            .parse(&args, &HashMap::new())
            .unwrap()
    }

    fn single(parameter: Parameter) -> Parameters {
        Parameters::new().with(parameter).unwrap()
    }

    #[test]
    fn test_basic_output() {
        let parameters = Parameters::new()
            .with(Parameter::option("verbose").short("-v"))
            .unwrap()
            .with(Parameter::option("output").long("--output file"))
            .unwrap();
        let parsed = parse(&parameters, &["-v", "--output", "file.txt"]);
        let output = render_shell(&parsed, "DECLAP_");

        assert!(output.contains("export DECLAP_OUTPUT=\"file.txt\""));
        assert!(output.contains("export DECLAP_VERBOSE=\"true\""));
    }

    #[test]
    fn test_escape_dollar() {
        let parsed = parse(&single(Parameter::argument("value")), &["$HOME/path"]);
        let output = render_shell(&parsed, "DECLAP_");

        assert!(output.contains("export DECLAP_VALUE=\"\\$HOME/path\""));
    }

    #[test]
    fn test_escape_backtick() {
        let parsed = parse(&single(Parameter::argument("cmd")), &["`whoami`"]);
        let output = render_shell(&parsed, "DECLAP_");

        assert!(output.contains("export DECLAP_CMD=\"\\`whoami\\`\""));
    }

    #[test]
    fn test_complex_escaping() {
        let parsed = parse(
            &single(Parameter::argument("complex")),
            &["$var \"quoted\" `cmd` \\path!"],
        );
        let output = render_shell(&parsed, "TEST_");

        assert!(
            output.contains("export TEST_COMPLEX=\"\\$var \\\"quoted\\\" \\`cmd\\` \\\\path\\!\"")
        );
    }

    #[test]
    fn test_escape_newline() {
        let parsed = parse(&single(Parameter::argument("text")), &["line1\nline2"]);
        let output = render_shell(&parsed, "DECLAP_");

        assert!(output.contains("export DECLAP_TEXT=\"line1\\nline2\""));
    }

    #[test]
    fn test_hyphenated_name() {
        let parsed = parse(&single(Parameter::argument("my-option")), &["value"]);
        let output = render_shell(&parsed, "DECLAP_");

        assert!(output.contains("export DECLAP_MY_OPTION=\"value\""));
    }

    #[test]
    fn test_list_value() {
        let parsed = parse(
            &single(Parameter::argument("files").arity(Arity::ZERO_OR_MORE)),
            &["a", "b"],
        );
        let output = render_shell(&parsed, "X_");

        assert_eq!(output, "export X_FILES=\"a,b\"\n");
    }

    #[test]
    fn test_errors_render_as_exit() {
        let parsed = parse(&single(Parameter::argument("network")), &[]);
        let output = render_shell(&parsed, "DECLAP_");

        assert!(output.contains("echo \"declap: argument 'network' must be provided\" >&2"));
        assert!(output.ends_with("exit 1\n"));
        assert!(!output.contains("export"));
    }

    #[test]
    fn test_render_errors_escapes_special_chars() {
        let output = render_errors(&["bad value: $HOME `test`"]);
        assert!(output.contains("\\$HOME"));
        assert!(output.contains("\\`test\\`"));
        assert!(output.contains("exit 1"));
    }

    #[test]
    fn test_render_json() {
        let parameters = single(
            Parameter::option("port")
                .long("--port n")
                .convert(Conversion::parse("int")),
        );
        let parsed = parse(&parameters, &["--port", "8080"]);
        let json: serde_json::Value = serde_json::from_str(&render_json(&parsed).unwrap()).unwrap();

        assert_eq!(json["values"]["port"], 8080);
        assert_eq!(json["errors"], serde_json::json!({}));
        assert_eq!(json["remaining"], serde_json::json!([]));
    }

    #[test]
    fn test_render_json_errors() {
        let parsed = parse(&single(Parameter::argument("network")), &[]);
        let json: serde_json::Value = serde_json::from_str(&render_json(&parsed).unwrap()).unwrap();

        assert_eq!(
            json["errors"]["network"]["missing_argument"],
            "argument 'network' must be provided"
        );
    }
}
