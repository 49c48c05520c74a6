//! Level-by-level drill execution.
//!
//! The iterator walks adjacent dimension pairs. At each step it ranks the
//! children of the keys selected one level up, then hands the child keys
//! down. Each step depends on the previous step's output, so queries run
//! strictly one after another.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dax::SortDir;
use crate::executor::{QueryExecutor, QueryFailure, Table};

use super::dimensions::{DimensionList, Transition};
use super::error::{DrillError, DrillResult};
use super::ranking::{build_key_bootstrap, build_single_level, KeySet, RankDirection, RankSpec};

/// What to do when a query fails mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure on the level, continue with an empty key set.
    #[default]
    Degrade,
    /// Stop the run and return [`DrillError::Query`].
    Abort,
}

/// Inputs for one drill run.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillRequest {
    pub dimensions: DimensionList,
    pub drill_metric: String,
    pub rank_depth: u32,
    pub direction: RankDirection,
    pub filters: Option<String>,
    pub metrics: Vec<String>,
}

impl DrillRequest {
    pub fn new(dimensions: DimensionList, drill_metric: &str, rank_depth: u32) -> Self {
        Self {
            dimensions,
            drill_metric: drill_metric.into(),
            rank_depth,
            direction: RankDirection::Infer,
            filters: None,
            metrics: vec![],
        }
    }

    pub fn with_direction(mut self, direction: SortDir) -> Self {
        self.direction = RankDirection::Explicit(direction);
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.direction = RankDirection::Infer;
        self
    }

    pub fn with_filters(mut self, filters: &str) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn with_metric(mut self, metric: &str) -> Self {
        self.metrics.push(metric.into());
        self
    }

    /// Ranking spec for one transition.
    pub fn rank_spec(&self, transition: &Transition<'_>) -> RankSpec {
        RankSpec {
            dimensions: transition.parents.to_vec(),
            ranked_dimension: transition.ranked.to_string(),
            rank_depth: self.rank_depth,
            drill_metric: self.drill_metric.clone(),
            direction: self.direction,
            filters: self.filters.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// How a level's table came to be.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelOutcome {
    /// The ranking query answered.
    Ranked,
    /// A query for this level failed; the table is empty.
    Failed(QueryFailure),
    /// No parent keys reached this level; no query was issued.
    Starved,
}

/// One level's table plus the keys it hands to the next level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelResult {
    pub table: Table,
    pub keys: KeySet,
    pub outcome: LevelOutcome,
}

impl LevelResult {
    fn ranked(table: Table) -> Self {
        let keys = KeySet::new(table.key_values());
        Self {
            table,
            keys,
            outcome: LevelOutcome::Ranked,
        }
    }

    fn empty(outcome: LevelOutcome) -> Self {
        Self {
            table: Table::empty(),
            keys: KeySet::default(),
            outcome,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, LevelOutcome::Failed(_))
    }
}

/// A labelled level in the report.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelEntry {
    /// `"<parent> by <child>"`
    pub label: String,
    pub result: LevelResult,
}

impl LevelEntry {
    /// Text handed to narrative synthesis: label, blank line, JSON records.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.label, self.result.table.to_records())
    }
}

/// Ordered per-level results of one drill run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillReport {
    entries: Vec<LevelEntry>,
}

impl DrillReport {
    pub fn entries(&self) -> &[LevelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(|e| e.result.is_failed())
    }

    fn push(&mut self, label: String, result: LevelResult) {
        self.entries.push(LevelEntry { label, result });
    }
}

/// `(level index, current key set)`. `None` until the first level's keys
/// have been bootstrapped.
#[derive(Debug, Default)]
struct DrillState {
    level: usize,
    keys: Option<KeySet>,
}

impl DrillState {
    fn advance(&mut self, next: KeySet) {
        self.level += 1;
        self.keys = Some(next);
    }
}

/// Runs drill requests against an executor.
pub struct DrillIterator<'a, E: ?Sized> {
    executor: &'a E,
    policy: FailurePolicy,
}

impl<'a, E: QueryExecutor + ?Sized> DrillIterator<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self {
            executor,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Walk the hierarchy and collect one ranked table per transition.
    ///
    /// Fewer than two dimensions yields an empty report without touching
    /// the executor.
    pub async fn run(&self, request: &DrillRequest) -> DrillResult<DrillReport> {
        let mut report = DrillReport::default();

        if request.dimensions.len() < 2 {
            info!(
                dimensions = request.dimensions.len(),
                "fewer than two dimensions, nothing to drill"
            );
            return Ok(report);
        }
        if request.rank_depth == 0 {
            return Err(DrillError::InvalidRankDepth(0));
        }

        let mut state = DrillState::default();

        for transition in request.dimensions.transitions() {
            debug_assert_eq!(transition.index, state.level);
            let label = transition.label();
            info!(
                "Grouping: {:?} Ranking Top {}: {}",
                transition.parents, request.rank_depth, transition.ranked
            );

            let keys = match state.keys.take() {
                Some(keys) => keys,
                None => match self.bootstrap_keys(&transition, request).await? {
                    Ok(keys) => keys,
                    Err(failure) => {
                        self.record_failure(&mut report, &transition, label, failure)?;
                        state.advance(KeySet::default());
                        continue;
                    }
                },
            };

            if keys.is_empty() {
                warn!(level = transition.index, %label, "no parent keys, skipping level");
                report.push(label, LevelResult::empty(LevelOutcome::Starved));
                state.advance(KeySet::default());
                continue;
            }

            let query = request.rank_spec(&transition).build(&keys)?;
            debug!(level = transition.index, parents = keys.len(), "ranking query:\n{}", query);

            match self.executor.execute_query(&query).await {
                Ok(table) => {
                    let result = LevelResult::ranked(table);
                    info!(
                        level = transition.index,
                        rows = result.table.len(),
                        keys = result.keys.len(),
                        "level ranked"
                    );
                    let next = result.keys.clone();
                    report.push(label, result);
                    state.advance(next);
                }
                Err(failure) => {
                    self.record_failure(&mut report, &transition, label, failure)?;
                    state.advance(KeySet::default());
                }
            }
        }

        Ok(report)
    }

    /// Learn the top-level keys. The outer `Result` carries builder errors,
    /// the inner one the executor's answer.
    async fn bootstrap_keys(
        &self,
        transition: &Transition<'_>,
        request: &DrillRequest,
    ) -> DrillResult<Result<KeySet, QueryFailure>> {
        let query = build_key_bootstrap(
            transition.parents,
            &request.drill_metric,
            request.filters.as_deref(),
        )?;
        debug!("key bootstrap query:\n{}", query);

        Ok(self.executor.execute_query(&query).await.map(|table| {
            let keys = KeySet::new(table.key_values());
            info!(keys = keys.len(), "bootstrapped top-level keys");
            keys
        }))
    }

    fn record_failure(
        &self,
        report: &mut DrillReport,
        transition: &Transition<'_>,
        label: String,
        failure: QueryFailure,
    ) -> DrillResult<()> {
        match self.policy {
            FailurePolicy::Abort => Err(DrillError::Query {
                level: transition.index,
                label,
                source: failure,
            }),
            FailurePolicy::Degrade => {
                warn!(level = transition.index, %label, error = %failure, "query failed, level left empty");
                report.push(label, LevelResult::empty(LevelOutcome::Failed(failure)));
                Ok(())
            }
        }
    }
}

/// Run the flat grouping query over every dimension at once.
pub async fn single_level<E: QueryExecutor + ?Sized>(
    executor: &E,
    request: &DrillRequest,
) -> DrillResult<Table> {
    let query = build_single_level(
        request.dimensions.as_slice(),
        request.filters.as_deref(),
        &request.metrics,
    )?;
    info!("Grouping: {}", request.dimensions.joined());

    executor
        .execute_query(&query)
        .await
        .map_err(|source| DrillError::Query {
            level: 0,
            label: request.dimensions.joined(),
            source,
        })
}
