//! PuppetDB-facing helpers built on top of the core compiler (§6.1, §9).
//!
//! `query_facts` and `query_fact_contents` depend only on the small [`PuppetDbClient`] trait, so
//! the query-building and result-grouping logic here is unit-testable with an in-memory fake and
//! never touches a socket.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::{CompileError, PuppetDbError, QueryError};
use crate::evaluator::{self, Mode, Value};
use crate::lexer::Lexer;
use crate::parser;
use crate::Output;

/// The one collaborator interface the core depends on for live queries. A real caller supplies an
/// adapter over its HTTP client of choice; tests use an in-memory fake.
pub trait PuppetDbClient {
    fn facts(&self, query_json: &str) -> Result<Json, PuppetDbError>;
    fn fact_contents(&self, query_json: &str) -> Result<Json, PuppetDbError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactsResult {
    Raw(Json),
    Grouped(HashMap<String, HashMap<String, Json>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactContentsResult {
    Raw(Json),
    Grouped(HashMap<String, HashMap<String, Json>>),
}

pub fn query_facts(
    pdb: &impl PuppetDbClient,
    source: &str,
    facts: &[String],
    raw: bool,
) -> Result<FactsResult, QueryError> {
    let compiled = compile_value(source, Mode::Facts)?;
    let query = combine(compiled, fact_filter(facts));
    let query_json = render(query);
    log::debug!("querying facts: {query_json}");
    let result = pdb.facts(&query_json)?;
    Ok(if raw {
        FactsResult::Raw(result)
    } else {
        FactsResult::Grouped(group_rows(&result, |obj| {
            let certname = obj.get("certname")?.as_str()?.to_string();
            let name = obj.get("name")?.as_str()?.to_string();
            Some((certname, name))
        }))
    })
}

pub fn query_fact_contents(
    pdb: &impl PuppetDbClient,
    source: &str,
    facts: &[String],
    raw: bool,
) -> Result<FactContentsResult, QueryError> {
    let compiled = compile_value(source, Mode::Facts)?;
    let filter = fact_contents_filter(facts)?;
    let query = combine(compiled, filter);
    let query_json = render(query);
    log::debug!("querying fact_contents: {query_json}");
    let result = pdb.fact_contents(&query_json)?;
    Ok(if raw {
        FactContentsResult::Raw(result)
    } else {
        FactContentsResult::Grouped(group_rows(&result, |obj| {
            let certname = obj.get("certname")?.as_str()?.to_string();
            let path = obj
                .get("path")?
                .as_array()?
                .iter()
                .map(json_scalar_to_string)
                .collect::<Vec<_>>()
                .join(".");
            Some((certname, path))
        }))
    })
}

fn compile_value(source: &str, mode: Mode) -> Result<Option<Value>, CompileError> {
    match crate::parse(source, mode, false)? {
        Output::Null => Ok(None),
        Output::Value(v) => Ok(Some(v)),
        Output::Json(_) => unreachable!("json=false never returns Output::Json"),
    }
}

fn combine(source_query: Option<Value>, filter: Option<Value>) -> Option<Value> {
    match (source_query, filter) {
        (Some(s), Some(f)) => Some(Value::List(vec![Value::str("and"), s, f])),
        (Some(s), None) => Some(s),
        (None, Some(f)) => Some(f),
        (None, None) => None,
    }
}

fn render(query: Option<Value>) -> String {
    match query {
        Some(v) => serde_json::to_string(&v).expect("Value always serialises"),
        None => "null".to_string(),
    }
}

/// A fact name wrapped in `/`...`/` is a regex match against the `name` field; otherwise an exact
/// match (§6.1).
fn fact_filter_clause(name: &str) -> Value {
    if name.len() >= 2 && name.starts_with('/') && name.ends_with('/') {
        let pattern = &name[1..name.len() - 1];
        Value::List(vec![Value::str("~"), Value::str("name"), Value::str(pattern)])
    } else {
        Value::List(vec![Value::str("="), Value::str("name"), Value::str(name)])
    }
}

fn fact_filter(facts: &[String]) -> Option<Value> {
    if facts.is_empty() {
        return None;
    }
    let mut list = vec![Value::str("or")];
    list.extend(facts.iter().map(|f| fact_filter_clause(f)));
    Some(Value::List(list))
}

/// Each `facts` entry is parsed as a standalone identifier path (not a full query) and lowered
/// under `Mode::Facts`, then the per-path clauses are combined with `or` (§6.1).
fn fact_contents_filter(facts: &[String]) -> Result<Option<Value>, CompileError> {
    if facts.is_empty() {
        return Ok(None);
    }
    let mut clauses = Vec::with_capacity(facts.len());
    for entry in facts {
        let tokens = Lexer::new(entry).lex()?;
        let path = parser::parse_identifier_path(tokens)?;
        clauses.push(evaluator::lower_path(&path, Mode::Facts));
    }
    let mut list = vec![Value::str("or")];
    list.extend(clauses);
    Ok(Some(Value::List(list)))
}

fn group_rows(
    rows: &Json,
    key_of: impl Fn(&serde_json::Map<String, Json>) -> Option<(String, String)>,
) -> HashMap<String, HashMap<String, Json>> {
    let mut out: HashMap<String, HashMap<String, Json>> = HashMap::new();
    let Json::Array(items) = rows else {
        return out;
    };
    for item in items {
        let Json::Object(obj) = item else { continue };
        let Some((group, field)) = key_of(obj) else {
            continue;
        };
        let value = obj.get("value").cloned().unwrap_or(Json::Null);
        out.entry(group).or_default().insert(field, value);
    }
    out
}

fn json_scalar_to_string(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeClient {
        facts_response: Json,
        fact_contents_response: Json,
    }

    impl PuppetDbClient for FakeClient {
        fn facts(&self, _query_json: &str) -> Result<Json, PuppetDbError> {
            Ok(self.facts_response.clone())
        }

        fn fact_contents(&self, _query_json: &str) -> Result<Json, PuppetDbError> {
            Ok(self.fact_contents_response.clone())
        }
    }

    #[test]
    fn query_facts_groups_by_certname_then_fact_name() {
        let pdb = FakeClient {
            facts_response: json!([
                {"certname": "a.example.com", "name": "os", "value": "linux"},
                {"certname": "a.example.com", "name": "arch", "value": "x86_64"},
                {"certname": "b.example.com", "name": "os", "value": "bsd"},
            ]),
            fact_contents_response: json!([]),
        };
        let result = query_facts(&pdb, "", &["os".to_string()], false).unwrap();
        match result {
            FactsResult::Grouped(grouped) => {
                assert_eq!(grouped["a.example.com"]["os"], json!("linux"));
                assert_eq!(grouped["a.example.com"]["arch"], json!("x86_64"));
                assert_eq!(grouped["b.example.com"]["os"], json!("bsd"));
            }
            other => panic!("expected Grouped, got {other:?}"),
        }
    }

    #[test]
    fn query_facts_raw_passes_through_untouched() {
        let pdb = FakeClient {
            facts_response: json!([{"certname": "a", "name": "os", "value": "linux"}]),
            fact_contents_response: json!([]),
        };
        let result = query_facts(&pdb, "", &[], true).unwrap();
        assert_eq!(
            result,
            FactsResult::Raw(json!([{"certname": "a", "name": "os", "value": "linux"}]))
        );
    }

    #[test]
    fn regex_delimited_fact_name_builds_match_clause() {
        let clause = fact_filter_clause("/^os_/");
        assert_eq!(
            clause,
            Value::List(vec![Value::str("~"), Value::str("name"), Value::str("^os_")])
        );
    }

    #[test]
    fn query_fact_contents_groups_by_certname_then_dotted_path() {
        let pdb = FakeClient {
            facts_response: json!([]),
            fact_contents_response: json!([
                {"certname": "a.example.com", "path": ["os", "family"], "value": "RedHat"},
            ]),
        };
        let result = query_fact_contents(&pdb, "", &["os.family".to_string()], false).unwrap();
        match result {
            FactContentsResult::Grouped(grouped) => {
                assert_eq!(grouped["a.example.com"]["os.family"], json!("RedHat"));
            }
            other => panic!("expected Grouped, got {other:?}"),
        }
    }
}
