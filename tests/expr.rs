use std::collections::BTreeMap;

use v2scrape::domain::expr::{evaluate_condition, Condition, ExprError};
use v2scrape::domain::value::{FieldSource, Value};

#[derive(Default)]
struct Fields(BTreeMap<String, Value>);

impl Fields {
    fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }
}

impl FieldSource for Fields {
    fn field_value(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

fn proxy() -> Fields {
    let mut params = BTreeMap::new();
    params.insert("sni".to_string(), "cdn.example.com".to_string());
    params.insert("type".to_string(), "ws".to_string());
    Fields::default()
        .with("protocol", "vless")
        .with("host", "1.2.3.4")
        .with("port", Value::Int(443))
        .with("name", "vless-1.2.3.4-443")
        .with("params", Value::Map(params))
}

#[test]
fn port_equality_handles_missing_field() {
    let hit = Fields::default().with("port", Value::Int(8080));
    let miss = Fields::default().with("port", Value::Int(80));
    let absent = Fields::default().with("host", "example.com");

    assert!(evaluate_condition("port == 8080", &hit));
    assert!(!evaluate_condition("port == 8080", &miss));
    assert!(!evaluate_condition("port == 8080", &absent));
}

#[test]
fn missing_field_is_an_evaluation_error() {
    let c = Condition::compile("port == 8080").unwrap();
    let err = c.eval(&Fields::default()).unwrap_err();
    assert_eq!(err, ExprError::UnknownName("port".to_string()));
    assert!(!c.matches(&Fields::default()));
}

#[test]
fn boolean_connectives_and_membership() {
    let r = proxy();
    assert!(evaluate_condition("protocol == 'vless' and port == 443", &r));
    assert!(evaluate_condition("protocol == 'trojan' or port > 400", &r));
    assert!(evaluate_condition("not protocol == 'ss'", &r));
    assert!(evaluate_condition("'1.2' in host", &r));
    assert!(evaluate_condition("'sni' in params and 'path' not in params", &r));
    assert!(!evaluate_condition("protocol != 'vless'", &r));
}

#[test]
fn chained_comparison() {
    let r = proxy();
    assert!(evaluate_condition("400 < port <= 443", &r));
    assert!(!evaluate_condition("1 < port < 443", &r));
}

#[test]
fn map_access_by_attribute_and_subscript() {
    let r = proxy();
    assert!(evaluate_condition("params.sni == 'cdn.example.com'", &r));
    assert!(evaluate_condition("params['type'] == 'ws'", &r));
    // Missing key is an error, which filters the record out.
    assert!(!evaluate_condition("params.fp == 'chrome'", &r));
}

#[test]
fn helper_functions() {
    let r = proxy();
    assert!(evaluate_condition("len(host) == 7", &r));
    assert!(evaluate_condition("int('8' + '0') == 80", &r));
    assert!(evaluate_condition("str(port) == '443'", &r));
    assert!(evaluate_condition(r"re_fullmatch(r'\d+\.\d+\.\d+\.\d+', host)", &r));
    assert!(!evaluate_condition("re_fullmatch('1.2', host)", &r));
    assert!(evaluate_condition("re_search('example', params.sni)", &r));
    assert!(evaluate_condition("re_fullmatch('44.', port)", &r));
}

#[test]
fn arithmetic_follows_floor_semantics() {
    let r = Fields::default().with("n", Value::Int(-7));
    assert!(evaluate_condition("n // 2 == -4", &r));
    assert!(evaluate_condition("n % 3 == 2", &r));
    assert!(evaluate_condition("-n * 2 + 1 == 15", &r));
    assert!(!evaluate_condition("n // 0 == 0", &r));
}

#[test]
fn unknown_functions_are_rejected() {
    let c = Condition::compile("__import__('os')").unwrap();
    assert_eq!(
        c.eval(&proxy()).unwrap_err(),
        ExprError::UnknownFunction("__import__".to_string())
    );
    assert!(!evaluate_condition("open('x')", &proxy()));
}

#[test]
fn wrong_arity_is_reported() {
    let c = Condition::compile("len(host, port)").unwrap();
    assert!(matches!(
        c.eval(&proxy()),
        Err(ExprError::Arity { expected: 1, got: 2, .. })
    ));
}

#[test]
fn syntax_errors_fail_to_compile() {
    for src in ["port ==", "(port == 1", "port === 1", "'unterminated"] {
        assert!(
            matches!(Condition::compile(src), Err(ExprError::Syntax(_))),
            "source {src:?}"
        );
    }
    assert!(!evaluate_condition("port ==", &proxy()));
}

#[test]
fn comparing_incompatible_types_does_not_match() {
    let r = proxy();
    assert!(!evaluate_condition("host > 5", &r));
    assert!(evaluate_condition("host != 5", &r));
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let ok = format!("{}port{} == 443", "(".repeat(40), ")".repeat(40));
    assert!(evaluate_condition(&ok, &proxy()));

    let sources = [
        format!("{}1{}", "(".repeat(100), ")".repeat(100)),
        format!("{}True", "not ".repeat(500)),
        format!("{}1", "-".repeat(500)),
        format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000)),
        format!("1{}", " + 1".repeat(600)),
    ];
    for src in &sources {
        assert!(
            matches!(Condition::compile(src), Err(ExprError::Syntax(_))),
            "source of {} bytes",
            src.len()
        );
        assert!(!evaluate_condition(src, &proxy()));
    }
}

#[test]
fn literal_regex_patterns_compile_once() {
    let c = Condition::compile(concat!(
        r"re_fullmatch(r'\d+(\.\d+){3}', host) and re_search('example', params.sni)",
        " and not re_search('example', name)",
    ))
    .unwrap();
    assert_eq!(c.regex_count(), 2);
    assert!(c.matches(&proxy()));
    assert!(c.matches(&proxy()));

    let dynamic = Condition::compile("re_search(protocol, name)").unwrap();
    assert_eq!(dynamic.regex_count(), 0);
    assert!(dynamic.matches(&proxy()));

    let broken = Condition::compile("re_search('(', host)").unwrap();
    assert_eq!(broken.regex_count(), 1);
    assert!(matches!(broken.eval(&proxy()), Err(ExprError::Regex(_))));
}
