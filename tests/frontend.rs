//! Black-box coverage of the crate's top-level [`puppetdb_query::parse`] entry point: the
//! empty-query short-circuit and the `json`/raw output modes.

use pretty_assertions::assert_eq;
use puppetdb_query::{parse, CompileError, Mode, Output, Value};

#[test]
fn empty_source_is_null() {
    assert_eq!(parse("", Mode::Nodes, true).unwrap(), Output::Null);
    assert_eq!(parse("", Mode::Nodes, false).unwrap(), Output::Null);
}

#[test]
fn json_output_matches_compact_serde_json_encoding() {
    let out = parse("foo=bar", Mode::Nodes, true).unwrap();
    let expected = serde_json::to_string(&serde_json::json!([
        "in", "certname",
        ["extract", "certname",
         ["select_fact_contents",
          ["and",
           ["=", "path", ["foo"]],
           ["=", "value", "bar"]]]]
    ]))
    .unwrap();
    assert_eq!(out, Output::Json(expected));
}

#[test]
fn raw_value_output_round_trips_through_json_identically() {
    let Output::Value(value) = parse("foo=bar", Mode::Nodes, false).unwrap() else {
        panic!("expected Output::Value");
    };
    let Output::Json(json) = parse("foo=bar", Mode::Nodes, true).unwrap() else {
        panic!("expected Output::Json");
    };
    assert_eq!(serde_json::to_string(&value).unwrap(), json);
}

#[test]
fn lex_errors_surface_with_their_byte_offset() {
    let err = parse("foo=bar $", Mode::Nodes, false).unwrap_err();
    match err {
        CompileError::Lex(e) => assert_eq!(e.offset, 8),
        other => panic!("expected CompileError::Lex, got {other:?}"),
    }
}

#[test]
fn parse_errors_surface_at_end_of_input() {
    let err = parse("foo=", Mode::Nodes, false).unwrap_err();
    match err {
        CompileError::Parse(e) => assert_eq!(e.offset, None),
        other => panic!("expected CompileError::Parse, got {other:?}"),
    }
}

#[test]
fn eval_errors_surface_for_an_unparseable_date() {
    let err = parse(r#"foo<@"not a date""#, Mode::Nodes, false).unwrap_err();
    assert!(matches!(err, CompileError::Eval(_)));
}

#[test]
fn mode_none_is_reachable_through_the_front_door() {
    let out = parse("class[apache]", Mode::None, false).unwrap();
    match out {
        Output::Value(Value::List(items)) => assert_eq!(items[0], Value::str("and")),
        other => panic!("unexpected {other:?}"),
    }
}
