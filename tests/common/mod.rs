//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use narrator::executor::{QueryExecutor, QueryFailure, QueryResult, Scalar, Table};
use narrator::narrative::{NarrativeError, NarrativeResult, NarrativeSynthesizer};
use narrator::sink::{Record, Sink, SinkResult};

// ============================================================================
// Scripted executor
// ============================================================================

/// Replays queued answers in order and records every query it receives.
pub struct ScriptedExecutor {
    answers: Mutex<VecDeque<QueryResult<Table>>>,
    pub queries: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(answers: Vec<QueryResult<Table>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            queries: Mutex::new(vec![]),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, query: &str) -> QueryResult<Table> {
        self.queries.lock().unwrap().push(query.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryFailure::Malformed("script exhausted".into())))
    }
}

/// Table with a single `[Key]` column.
pub fn keys_table(keys: &[&str]) -> Table {
    let mut table = Table::new(["[Key]"]);
    for key in keys {
        table.push_row(vec![Scalar::from(*key)]);
    }
    table
}

// ============================================================================
// Fact cube
// ============================================================================

/// Answers bootstrap and ranking queries from an in-memory fact table.
///
/// Reads back what the generated query asks for: the grouping columns, the
/// bound `t_keys`, the `[RankM] <= N` cutoff and the rank order. Composite
/// keys are the plain concatenation of the group's dimension values.
pub struct FactCube {
    dims: Vec<String>,
    facts: Vec<(Vec<String>, f64)>,
    fail_on_call: Option<usize>,
    pub queries: Mutex<Vec<String>>,
}

impl FactCube {
    pub fn new(dims: &[&str]) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            facts: vec![],
            fail_on_call: None,
            queries: Mutex::new(vec![]),
        }
    }

    pub fn fact(mut self, values: &[&str], amount: f64) -> Self {
        assert_eq!(values.len(), self.dims.len());
        self.facts
            .push((values.iter().map(|v| v.to_string()).collect(), amount));
        self
    }

    /// Fail the n-th query (0-based) with a service error.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Leading arguments after `prefix` that name known dimensions.
    fn grouping(&self, query: &str, prefix: &str) -> Vec<usize> {
        let Some(start) = query.find(prefix) else {
            return vec![];
        };
        query[start + prefix.len()..]
            .split(", ")
            .map_while(|arg| self.dims.iter().position(|d| d == arg))
            .collect()
    }

    /// Sum of the metric per distinct value tuple over `levels`.
    fn groups(&self, levels: &[usize]) -> Vec<(Vec<String>, f64)> {
        let mut out: Vec<(Vec<String>, f64)> = vec![];
        for (values, amount) in &self.facts {
            let tuple: Vec<String> = levels.iter().map(|&i| values[i].clone()).collect();
            match out.iter_mut().find(|(t, _)| *t == tuple) {
                Some((_, total)) => *total += amount,
                None => out.push((tuple, *amount)),
            }
        }
        out
    }

    fn bootstrap(&self, parents: &[usize]) -> Table {
        let mut columns: Vec<String> = parents.iter().map(|&i| self.dims[i].clone()).collect();
        columns.push("[Direction]".into());
        columns.push("[Key]".into());
        let mut table = Table::new(columns);
        for (tuple, total) in self.groups(parents) {
            let mut row: Vec<Scalar> = tuple.iter().map(|v| Scalar::from(v.as_str())).collect();
            row.push(Scalar::from(if total >= 0.0 { "DESC" } else { "ASC" }));
            row.push(Scalar::from(tuple.concat().as_str()));
            table.push_row(row);
        }
        table
    }

    fn ranking(&self, query: &str, levels: &[usize]) -> Table {
        let parents = &levels[..levels.len() - 1];
        let allowed = bound_keys(query);
        let depth = rank_cutoff(query);
        let dynamic = query.contains("IF([Direction] = \"DESC\"");
        let explicit_asc = query.contains(", ASC, DENSE") && !dynamic;

        let mut columns: Vec<String> = levels.iter().map(|&i| self.dims[i].clone()).collect();
        columns.push("[Sales]".into());
        columns.push("[Key]".into());
        let mut table = Table::new(columns);

        let children = self.groups(levels);
        for (parent, parent_total) in self.groups(parents) {
            let parent_key = parent.concat();
            if !allowed.contains(&parent_key) {
                continue;
            }
            let ascending = if dynamic {
                parent_total < 0.0
            } else {
                explicit_asc
            };

            let mut rows: Vec<(&Vec<String>, f64)> = children
                .iter()
                .filter(|(t, _)| t[..parents.len()] == parent[..])
                .map(|(t, v)| (t, *v))
                .collect();
            rows.sort_by(|a, b| {
                let ord = a.1.total_cmp(&b.1);
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });

            // Dense rank over distinct metric values.
            let mut rank = 0;
            let mut last: Option<f64> = None;
            for (tuple, value) in rows {
                if last != Some(value) {
                    rank += 1;
                    last = Some(value);
                }
                if rank > depth {
                    break;
                }
                let mut row: Vec<Scalar> =
                    tuple.iter().map(|v| Scalar::from(v.as_str())).collect();
                row.push(Scalar::from(value));
                let child_key = format!("{}{}", parent_key, tuple[parents.len()]);
                row.push(Scalar::from(child_key.as_str()));
                table.push_row(row);
            }
        }
        table
    }
}

/// Keys bound by `VAR t_keys = {...}`; none when the var is absent.
fn bound_keys(query: &str) -> Vec<String> {
    let Some(start) = query.find("VAR t_keys = {") else {
        return vec![];
    };
    let rest = &query[start + "VAR t_keys = {".len()..];
    let end = rest.find('}').unwrap_or(rest.len());
    rest[..end]
        .split(", ")
        .map(|k| k.trim_matches('"').replace("\"\"", "\""))
        .filter(|k| !k.is_empty())
        .collect()
}

/// `N` from `[RankM] <= N`.
fn rank_cutoff(query: &str) -> usize {
    let start = query.find("[RankM] <= ").expect("ranking query has a cutoff") + "[RankM] <= ".len();
    query[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|n| n.parse().ok())
        .expect("numeric cutoff")
}

#[async_trait]
impl QueryExecutor for FactCube {
    async fn execute(&self, query: &str) -> QueryResult<Table> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.to_string());
            queries.len() - 1
        };
        if self.fail_on_call == Some(call) {
            return Err(QueryFailure::service("DatasetExecuteQueriesError", "boom"));
        }

        if query.contains("rankingTable") {
            let levels = self.grouping(query, "SUMMARIZE(rankingTable, ");
            Ok(self.ranking(query, &levels))
        } else {
            let parents = self.grouping(query, "SUMMARIZECOLUMNS(");
            Ok(self.bootstrap(&parents))
        }
    }
}

/// Region / Store / Aisle sales used across the drill tests.
///
/// Region totals: East 60, West -15. East stores: E1 40, E2 15, E3 5.
/// West stores: W1 -10, W2 -8, W3 3 (W1 and W2 are the biggest losses).
pub fn retail_cube() -> FactCube {
    FactCube::new(&["Region", "Store", "Aisle"])
        .fact(&["East", "E1", "A"], 30.0)
        .fact(&["East", "E1", "B"], 10.0)
        .fact(&["East", "E2", "A"], 15.0)
        .fact(&["East", "E3", "A"], 5.0)
        .fact(&["West", "W1", "A"], -10.0)
        .fact(&["West", "W2", "A"], -8.0)
        .fact(&["West", "W2", "B"], 0.0)
        .fact(&["West", "W3", "A"], 3.0)
}

// ============================================================================
// Narrative synthesizer
// ============================================================================

/// Echoes a numbered narrative per call and records its inputs.
#[derive(Default)]
pub struct EchoSynthesizer {
    pub calls: Mutex<Vec<(String, String)>>,
    pub fail_after: Option<usize>,
}

impl EchoSynthesizer {
    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NarrativeSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, system_prompt: &str, text: &str) -> NarrativeResult<String> {
        let mut calls = self.calls.lock().unwrap();
        if self.fail_after == Some(calls.len()) {
            return Err(NarrativeError::Status {
                status: 429,
                body: "rate limited".into(),
            });
        }
        calls.push((system_prompt.to_string(), text.to_string()));
        let heading = text.lines().next().unwrap_or_default();
        Ok(format!("narrative {}: {}", calls.len(), heading))
    }
}

// ============================================================================
// Sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    pub rows: Mutex<Vec<(String, Record)>>,
}

impl Sink for RecordingSink {
    fn append_row(&self, destination: &str, record: &Record) -> SinkResult<()> {
        self.rows
            .lock()
            .unwrap()
            .push((destination.to_string(), record.clone()));
        Ok(())
    }
}
