//! End-to-end parsing from JSON declarations.

use declap::{Config, DeclarationError, Engine, ErrorKind, ErrorPolicy, ParseError, Parsed, Value};
use std::collections::HashMap;

fn args(s: &[&str]) -> Vec<String> {
    s.iter().map(|s| s.to_string()).collect()
}

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn run(json: &str, input: &[&str], vars: &[(&str, &str)]) -> Result<Parsed, ParseError> {
    let config = Config::from_json(json).unwrap();
    let parameters = config.parameters().unwrap();
    let registry = config.registry();
    Engine::new(&parameters, &registry)
        .with_settings(config.settings())
        .parse(&args(input), &env(vars))
}

const NETWORK: &str = r#"{
    "name": "network-create",
    "parameters": [
        {"type": "argument", "name": "network"},
        {"type": "option", "name": "driver", "short": "-d", "long": "--driver string", "default": "bridge"},
        {"type": "option", "name": "label", "long": "--label list", "arity": "*"},
        {"type": "option", "name": "attachable", "long": "--attachable"},
        {"type": "option", "name": "subnet", "long": "--subnet=cidr",
         "validate": "^\\d+\\.\\d+\\.\\d+\\.\\d+/\\d+$"},
        {"type": "keyword", "name": "mtu", "convert": "int"},
        {"type": "env", "name": "mtu", "variable": "NET_MTU", "convert": "int"}
    ]
}"#;

fn collecting(json: &str) -> String {
    json.replacen('{', r#"{"error_policy": "collect_all","#, 1)
}

#[test]
fn test_argument_only() {
    let parsed = run(NETWORK, &["my-net"], &[]).unwrap();
    assert_eq!(parsed.get("network"), Some(&Value::from("my-net")));
    assert!(parsed.is_valid());
}

#[test]
fn test_option_default_applies() {
    let parsed = run(NETWORK, &["my-net"], &[]).unwrap();
    assert_eq!(parsed.get("driver"), Some(&Value::from("bridge")));
    assert_eq!(parsed.get("attachable"), Some(&Value::Bool(false)));
    assert_eq!(parsed.get("label"), Some(&Value::List(Vec::new())));
    assert!(!parsed.contains("subnet"));
}

#[test]
fn test_option_short_value() {
    let parsed = run(NETWORK, &["-d", "overlay", "my-net"], &[]).unwrap();
    assert_eq!(parsed.get("driver"), Some(&Value::from("overlay")));
}

#[test]
fn test_missing_argument_collected() {
    let parsed = run(&collecting(NETWORK), &[], &[]).unwrap();
    assert!(parsed.errors().contains("network", ErrorKind::MissingArgument));
    assert!(!parsed.contains("network"));
}

#[test]
fn test_bogus_long_option() {
    let parsed = run(&collecting(NETWORK), &["my-net", "--bogus"], &[]).unwrap();
    let general = parsed.errors().messages();
    assert_eq!(general.len(), 1);
    assert!(general[0].contains_key(&ErrorKind::InvalidOption));

    assert!(matches!(
        run(NETWORK, &["my-net", "--bogus"], &[]),
        Err(ParseError::InvalidOption(_))
    ));
}

#[test]
fn test_multiple_option_keeps_order() {
    let parsed = run(
        NETWORK,
        &["my-net", "--label", "c", "--label", "a", "--label=b"],
        &[],
    )
    .unwrap();
    assert_eq!(
        parsed.get("label"),
        Some(&Value::List(vec!["c".into(), "a".into(), "b".into()]))
    );
}

#[test]
fn test_variadic_option_takes_following_values() {
    let parsed = run(NETWORK, &["--label", "a", "b", "c", "--", "my-net"], &[]).unwrap();
    assert_eq!(
        parsed.get("label"),
        Some(&Value::List(vec!["a".into(), "b".into(), "c".into()]))
    );
    assert_eq!(parsed.get("network"), Some(&Value::from("my-net")));
    assert!(parsed.remaining().is_empty());
}

#[test]
fn test_shared_name_across_argument_and_option_is_rejected() {
    let json = r#"{"parameters": [
        {"type": "argument", "name": "target", "convert": "int"},
        {"type": "option", "name": "target", "long": "--target name"}
    ]}"#;
    let config = Config::from_json(json).unwrap();
    assert!(matches!(
        config.parameters(),
        Err(DeclarationError::ParameterConflict(_))
    ));
}

#[test]
fn test_keyword_beats_environment() {
    let parsed = run(NETWORK, &["my-net", "mtu=1400"], &[("NET_MTU", "9000")]).unwrap();
    assert_eq!(parsed.get("mtu"), Some(&Value::Int(1400)));

    let parsed = run(NETWORK, &["my-net"], &[("NET_MTU", "9000")]).unwrap();
    assert_eq!(parsed.get("mtu"), Some(&Value::Int(9000)));
}

#[test]
fn test_bad_environment_value() {
    let parsed = run(&collecting(NETWORK), &["my-net"], &[("NET_MTU", "big")]).unwrap();
    assert!(parsed
        .errors()
        .contains("mtu", ErrorKind::InvalidConversionArgument));
}

#[test]
fn test_validation_pattern() {
    let parsed = run(NETWORK, &["my-net", "--subnet", "10.0.0.0/24"], &[]).unwrap();
    assert_eq!(parsed.get("subnet"), Some(&Value::from("10.0.0.0/24")));

    let parsed = run(&collecting(NETWORK), &["my-net", "--subnet=nope"], &[]).unwrap();
    assert!(parsed.errors().contains("subnet", ErrorKind::Validation));
}

#[test]
fn test_collect_all_reports_every_problem() {
    let parsed = run(
        &collecting(NETWORK),
        &["--bogus", "--subnet", "x", "mtu=high"],
        &[],
    )
    .unwrap();
    let errors = parsed.errors();
    assert_eq!(errors.messages().len(), 1);
    assert!(errors.contains("subnet", ErrorKind::Validation));
    assert!(errors.contains("mtu", ErrorKind::InvalidConversionArgument));
    assert!(errors.contains("network", ErrorKind::MissingArgument));
    assert_eq!(parsed.get("driver"), Some(&Value::from("bridge")));
}

#[test]
fn test_fail_fast_stops_at_first() {
    let result = run(NETWORK, &["--bogus", "--subnet", "x"], &[]);
    assert_eq!(
        result,
        Err(ParseError::InvalidOption("invalid option --bogus".to_string()))
    );
}

#[test]
fn test_map_conversion_from_declaration() {
    let json = r#"{"parameters": [
        {"type": "option", "name": "limits", "long": "--limits map", "convert": "map_of_sym_to_int"}
    ]}"#;
    let parsed = run(json, &["--limits", "a:1,b:2"], &[]).unwrap();
    let Some(Value::Map(map)) = parsed.get("limits") else {
        panic!("expected a map");
    };
    let entries: Vec<_> = map.iter().collect();
    assert_eq!(
        entries,
        vec![
            (&"a".to_string(), &Value::Int(1)),
            (&"b".to_string(), &Value::Int(2))
        ]
    );
}

#[test]
fn test_custom_delimiters_from_declaration() {
    let json = r#"{
        "list_delimiter": ";",
        "parameters": [{"type": "argument", "name": "ports", "convert": "int_list"}]
    }"#;
    let parsed = run(json, &["80;443"], &[]).unwrap();
    assert_eq!(
        parsed.get("ports"),
        Some(&Value::List(vec![Value::Int(80), Value::Int(443)]))
    );
}

#[test]
fn test_permit_from_declaration() {
    let json = r#"{"error_policy": "collect_all", "parameters": [
        {"type": "option", "name": "level", "long": "--level n", "convert": "int", "permit": [1, 2, 3]}
    ]}"#;
    let parsed = run(json, &["--level", "2"], &[]).unwrap();
    assert_eq!(parsed.get("level"), Some(&Value::Int(2)));

    let parsed = run(json, &["--level", "7"], &[]).unwrap();
    assert!(parsed
        .errors()
        .contains("level", ErrorKind::UnpermittedArgument));
}

#[test]
fn test_unsupported_conversion_is_a_parse_error() {
    let json = r#"{"parameters": [{"type": "argument", "name": "id", "convert": "uuid"}]}"#;
    assert!(matches!(
        run(json, &["x"], &[]),
        Err(ParseError::UnsupportedConversion(_))
    ));
}

#[test]
fn test_policy_override() {
    let config = Config::from_json(NETWORK).unwrap();
    let parameters = config.parameters().unwrap();
    let registry = config.registry();
    let parsed = Engine::new(&parameters, &registry)
        .with_settings(config.settings())
        .with_policy(ErrorPolicy::CollectAll)
        .parse(&args(&[]), &env(&[]))
        .unwrap();
    assert!(!parsed.is_valid());
}
