//! Lowers the AST produced by [`crate::parser`] into the target PuppetDB query language.
//!
//! The traversal threads a small *context stack* rather than keeping any state on an evaluator
//! struct: every lowering function takes `&mut Vec<Context>` and pushes/pops around the subtree it
//! descends into, so the whole module is a set of free functions, trivially reentrant and free of
//! interior mutability (§4.3.1).

use crate::ast::{
    Comparison, ComparisonRhs, Identifier, IdentValue, IdentifierPath, Literal, Node, Query,
    Resource, Subquery,
};
use crate::error::EvalError;

/// Which PuppetDB endpoint a compiled query targets. The bottom entry of the context stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Nodes,
    Facts,
    Resources,
    None,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Nodes => "nodes",
            Mode::Facts => "facts",
            Mode::Resources => "resources",
            Mode::None => "none",
        }
    }
}

/// A tag on the context stack governing how the node currently being lowered behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    Mode(Mode),
    Subquery,
    Resources,
    Regexp,
}

impl Context {
    fn label(&self) -> &str {
        match self {
            Context::Mode(m) => m.as_str(),
            Context::Subquery => "subquery",
            Context::Resources => "resources",
            Context::Regexp => "regexp",
        }
    }
}

/// The target value produced by lowering: a tagged sum serialising (via `#[serde(untagged)]`) to
/// a plain JSON scalar or array, matching PuppetDB's native AST wire format.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }
}

/// Lowers a parsed [`Query`] under the given target `mode`. Returns `None` for an empty query
/// (the caller maps that to its own "null output" representation).
pub fn evaluate(query: &Query, mode: Mode) -> Result<Option<Value>, EvalError> {
    let Some(node) = &query.expression else {
        return Ok(None);
    };
    let mut ctx = vec![Context::Mode(mode)];
    log::trace!("evaluating under mode {:?}", mode);
    Ok(Some(lower_node(node, &mut ctx)?))
}

/// Lowers a single [`IdentifierPath`] in isolation, as used by
/// [`crate::facts::query_fact_contents`] to turn each requested fact path into a filter clause
/// without going through a full `Query`.
pub fn lower_path(path: &IdentifierPath, mode: Mode) -> Value {
    let mut ctx = vec![Context::Mode(mode)];
    lower_identifier_path(path, &mut ctx)
}

fn lower_node(node: &Node, ctx: &mut Vec<Context>) -> Result<Value, EvalError> {
    match node {
        Node::And(l, r) => Ok(Value::List(vec![
            Value::str("and"),
            lower_node(l, ctx)?,
            lower_node(r, ctx)?,
        ])),
        Node::Or(l, r) => Ok(Value::List(vec![
            Value::str("or"),
            lower_node(l, ctx)?,
            lower_node(r, ctx)?,
        ])),
        Node::Not(inner) => Ok(Value::List(vec![Value::str("not"), lower_node(inner, ctx)?])),
        Node::Parenthesized(inner) | Node::Block(inner) => lower_node(inner, ctx),
        Node::Comparison(c) => lower_comparison(c, ctx),
        Node::Subquery(s) => lower_subquery(s, ctx),
        Node::Resource(r) => lower_resource(r, ctx),
        Node::RegexpNodeMatch(path) => Ok(lower_regexp_node_match(path, ctx)),
    }
}

fn wrap(from_mode: &str, to_mode: &str, inner: Value) -> Value {
    if from_mode == "none" {
        return inner;
    }
    Value::List(vec![
        Value::str("in"),
        Value::str("certname"),
        Value::List(vec![
            Value::str("extract"),
            Value::str("certname"),
            Value::List(vec![Value::str(format!("select_{to_mode}")), inner]),
        ]),
    ])
}

fn comparison(op: &str, left: Value, right: Value) -> Value {
    match op.strip_prefix('!') {
        Some(tail) => Value::List(vec![
            Value::str("not"),
            Value::List(vec![Value::str(tail), left, right]),
        ]),
        None => Value::List(vec![Value::str(op), left, right]),
    }
}

fn lower_comparison(c: &Comparison, ctx: &mut Vec<Context>) -> Result<Value, EvalError> {
    let right = lower_rhs(&c.right)?;
    match ctx.last() {
        Some(Context::Subquery) => {
            let left = unwrap_singleton(lower_identifier_path(&c.left, ctx));
            Ok(comparison(&c.op, left, right))
        }
        Some(Context::Resources) => {
            let components = match lower_identifier_path(&c.left, ctx) {
                Value::List(v) => v,
                other => vec![other],
            };
            let first = components.into_iter().next().expect("path is never empty");
            let field = if first == Value::Str("tag".to_string()) {
                Value::str("tag")
            } else {
                Value::List(vec![Value::str("parameter"), first])
            };
            Ok(comparison(&c.op, field, right))
        }
        _ => {
            let lowered_left = lower_identifier_path(&c.left, ctx);
            let mode_label = match ctx.last() {
                Some(Context::Mode(m)) => m.as_str(),
                _ => "none",
            };
            let inner = Value::List(vec![
                Value::str("and"),
                lowered_left,
                comparison(&c.op, Value::str("value"), right),
            ]);
            Ok(wrap(mode_label, "fact_contents", inner))
        }
    }
}

fn unwrap_singleton(v: Value) -> Value {
    match v {
        Value::List(mut items) if items.len() == 1 => items.pop().expect("len checked above"),
        other => other,
    }
}

fn lower_subquery(s: &Subquery, ctx: &mut Vec<Context>) -> Result<Value, EvalError> {
    log::trace!("entering subquery '{}', context depth {}", s.endpoint, ctx.len());
    ctx.push(Context::Subquery);
    let inner = lower_node(&s.expr, ctx);
    ctx.pop();
    let inner = inner?;
    let outer_label = ctx.last().map(Context::label).unwrap_or("none").to_string();
    Ok(wrap(&outer_label, &format!("{}s", s.endpoint), inner))
}

fn lower_resource(r: &Resource, ctx: &mut Vec<Context>) -> Result<Value, EvalError> {
    log::trace!("entering resource '{}', context depth {}", r.res_type, ctx.len());
    ctx.push(Context::Resources);
    let is_regexp = r.title.is_regexp();
    let cap_type = capitalize_class(&r.res_type);
    let title = if !is_regexp && r.res_type.eq_ignore_ascii_case("class") {
        Value::str(capitalize_class(&plain_identifier_text(&r.title)))
    } else {
        lower_identifier(&r.title, ctx)
    };
    let title_op = if is_regexp { "~" } else { "=" };

    let mut conjuncts = vec![
        Value::List(vec![Value::str("="), Value::str("type"), Value::str(cap_type)]),
        Value::List(vec![Value::str(title_op), Value::str("title"), title]),
        Value::List(vec![
            Value::str("="),
            Value::str("exported"),
            Value::Bool(r.exported),
        ]),
    ];
    if let Some(parameters) = &r.parameters {
        match lower_node(parameters, ctx) {
            Ok(v) => conjuncts.push(v),
            Err(e) => {
                ctx.pop();
                return Err(e);
            }
        }
    }
    ctx.pop();

    let mut and_list = vec![Value::str("and")];
    and_list.extend(conjuncts);
    let outer_label = ctx.last().map(Context::label).unwrap_or("none").to_string();
    Ok(wrap(&outer_label, "resources", Value::List(and_list)))
}

fn lower_regexp_node_match(path: &IdentifierPath, ctx: &mut Vec<Context>) -> Value {
    ctx.push(Context::Regexp);
    let joined = match lower_identifier_path(path, ctx) {
        Value::Str(s) => s,
        other => unreachable!("identifier path under Regexp context always yields a Str: {other:?}"),
    };
    ctx.pop();
    // The path join above already escapes each component; this second pass over the whole joined
    // string is what turns its `.` separators into literal-dot regex syntax.
    let escaped = escape_regex(&joined);
    Value::List(vec![Value::str("~"), Value::str("certname"), Value::str(escaped)])
}

fn lower_identifier_path(path: &IdentifierPath, ctx: &mut Vec<Context>) -> Value {
    match ctx.last() {
        Some(Context::Subquery) | Some(Context::Resources) => Value::List(
            path.components()
                .iter()
                .map(|c| lower_identifier(c, ctx))
                .collect(),
        ),
        Some(Context::Regexp) => {
            let joined = path
                .components()
                .iter()
                .map(|c| value_as_path_segment(lower_identifier(c, ctx)))
                .collect::<Vec<_>>()
                .join(".");
            Value::Str(joined)
        }
        _ => {
            if path.any_regexp() {
                ctx.push(Context::Regexp);
                let list = Value::List(
                    path.components()
                        .iter()
                        .map(|c| lower_identifier(c, ctx))
                        .collect(),
                );
                ctx.pop();
                Value::List(vec![Value::str("~>"), Value::str("path"), list])
            } else {
                let list = Value::List(
                    path.components()
                        .iter()
                        .map(|c| lower_identifier(c, ctx))
                        .collect(),
                );
                Value::List(vec![Value::str("="), Value::str("path"), list])
            }
        }
    }
}

fn lower_identifier(ident: &Identifier, ctx: &[Context]) -> Value {
    match ident {
        Identifier::Plain(IdentValue::Str(s)) => {
            if matches!(ctx.last(), Some(Context::Regexp)) {
                Value::str(escape_regex(s))
            } else {
                Value::str(s.clone())
            }
        }
        Identifier::Plain(IdentValue::Int(n)) => Value::Int(*n),
        Identifier::Regexp(pattern) => Value::str(pattern.clone()),
    }
}

fn value_as_path_segment(v: Value) -> String {
    match v {
        Value::Str(s) => s,
        Value::Int(n) => n.to_string(),
        other => unreachable!("path components only ever lower to Str or Int: {other:?}"),
    }
}

fn plain_identifier_text(ident: &Identifier) -> String {
    match ident {
        Identifier::Plain(IdentValue::Str(s)) => s.clone(),
        Identifier::Plain(IdentValue::Int(n)) => n.to_string(),
        Identifier::Regexp(s) => s.clone(),
    }
}

fn lower_rhs(rhs: &ComparisonRhs) -> Result<Value, EvalError> {
    match rhs {
        ComparisonRhs::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
        ComparisonRhs::Literal(Literal::Int(n)) => Ok(Value::Int(*n)),
        ComparisonRhs::Literal(Literal::Float(f)) => Ok(Value::Float(*f)),
        ComparisonRhs::Literal(Literal::Str(s)) => Ok(Value::Str(s.clone())),
        ComparisonRhs::Date(text) => parse_date(text).map(Value::Str),
    }
}

/// Accepts `"Sep 9, 2014"`-style, RFC 2822, and RFC 3339/ISO 8601 input; always emits UTC with
/// second precision.
fn parse_date(text: &str) -> Result<String, EvalError> {
    use chrono::{DateTime, NaiveDate, Utc};

    const FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc).format(FMT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.with_timezone(&Utc).format(FMT).to_string());
    }
    for pattern in ["%b %-d, %Y", "%B %-d, %Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, pattern) {
            let dt = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
            return Ok(dt.format(FMT).to_string());
        }
    }
    Err(EvalError::InvalidDate {
        text: text.to_string(),
    })
}

/// Escapes `. \ + * ? ( ) [ ] { } | ^ $` with a leading backslash (§4.3.5's sibling rule for
/// regexp-context identifiers, and the outer pass in [`lower_regexp_node_match`]).
fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '.' | '\\' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Splits on `::`, upper-cases the first (ASCII) character of each segment, rejoins with `::`.
/// Idempotent: re-capitalising an already-capitalised name is a no-op.
fn capitalize_class(name: &str) -> String {
    name.split("::")
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}
