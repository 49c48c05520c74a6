//! Ranking query construction.
//!
//! Each drill level renders one query shaped like this:
//!
//! ```text
//! EVALUATE
//! VAR t_keys = {"East", "West"}                       -- allowed parent keys
//! VAR toptable = SUMMARIZECOLUMNS(parents, ...,       -- dynamic mode only:
//!                  "Direction", IF(m >= 0, ...),      --   direction per parent
//!                  "Key", <parent key>)
//! VAR topXtable = SUMMARIZECOLUMNS(parents, ranked,   -- candidate children
//!                  "Drill Metric", m, "Key", <parent key>)
//! VAR rankingTable = FILTER(ADDCOLUMNS(..., "RankM",  -- dense rank within
//!                  RANKX(FILTER(topXtable, [Key] = EARLIER([Key])), ...)),
//!                  [RankM] <= N && [Key] IN t_keys)   -- top-N, known parents
//! RETURN
//! CALCULATETABLE(SUMMARIZE(rankingTable, parents, ranked, metrics,
//!                  "Key", <child key>), filters)
//! ```
//!
//! An empty key set renders `FALSE()` in place of the membership test, so the
//! query matches no rows. Level 0 never binds an empty set: the iterator runs
//! [`build_key_bootstrap`] first to learn the top-level keys.

use crate::dax::{
    column, filter, func, if_else, lit_bool, lit_int, lit_str, named, rank_dense, raw, table_of,
    var, DaxQuery, Expr, ExprExt, SortDir,
};

use super::error::{DrillError, DrillResult};
use super::key::{compose_key, ComposedKey};

const KEYS_VAR: &str = "t_keys";
const TOP_VAR: &str = "toptable";
const TOPX_VAR: &str = "topXtable";
const RANKING_VAR: &str = "rankingTable";

const KEY_COL: &str = "Key";
const DIRECTION_COL: &str = "Direction";
const DRILL_METRIC_COL: &str = "Drill Metric";
const RANK_COL: &str = "RankM";

/// How children are ordered within a parent group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankDirection {
    /// Per parent: ascending when the drill metric is negative, else descending.
    #[default]
    Infer,
    /// The same order for every parent.
    Explicit(SortDir),
}

impl RankDirection {
    /// Short mode name for logs and sink records.
    pub fn mode_name(&self) -> &'static str {
        match self {
            RankDirection::Infer => "dynamic",
            RankDirection::Explicit(_) => "directional",
        }
    }
}

/// Composite keys selected at one level, carried into the next as a filter.
///
/// Insertion order is preserved; duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet(Vec<String>);

impl KeySet {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        let mut set = Vec::new();
        for key in keys {
            let key = key.into();
            if !set.contains(&key) {
                set.push(key);
            }
        }
        Self(set)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Constant table of string literals: `{"k1", "k2"}`.
    pub fn to_expr(&self) -> Expr {
        table_of(self.0.iter().map(|k| lit_str(k)).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for KeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Everything needed to render one level's ranking query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankSpec {
    /// Parent dimensions (prefix of the hierarchy up to the current level).
    pub dimensions: Vec<String>,
    /// Next dimension to drill into.
    pub ranked_dimension: String,
    /// Top-N per parent key.
    pub rank_depth: u32,
    /// Expression the children are ranked by.
    pub drill_metric: String,
    pub direction: RankDirection,
    /// Opaque predicate, passed through.
    pub filters: Option<String>,
    /// Opaque output aggregates, passed through.
    pub metrics: Vec<String>,
}

impl RankSpec {
    /// Render the ranking query for `keys` using this spec's direction policy.
    pub fn build(&self, keys: &KeySet) -> DrillResult<DaxQuery> {
        match self.direction {
            RankDirection::Infer => build_dynamic_ranking(self, keys),
            RankDirection::Explicit(dir) => build_directional_ranking(self, keys, dir),
        }
    }
}

/// Query listing every parent group's key and inferred direction.
///
/// Run once before level 0 to populate the initial key set.
pub fn build_key_bootstrap(
    dimensions: &[String],
    drill_metric: &str,
    filters: Option<&str>,
) -> DrillResult<DaxQuery> {
    let parent = compose_key(dimensions)?;
    Ok(DaxQuery::new(direction_table(
        dimensions,
        &raw(drill_metric),
        filter_expr(filters),
        &parent,
    )))
}

/// Ranking query whose order is inferred per parent from the metric's sign.
pub fn build_dynamic_ranking(spec: &RankSpec, keys: &KeySet) -> DrillResult<DaxQuery> {
    check_depth(spec.rank_depth)?;
    let parent = compose_key(&spec.dimensions)?;
    let metric = raw(&spec.drill_metric);
    let filters = filter_expr(spec.filters.as_deref());

    let peers = peer_rows();
    let rank = if_else(
        column(DIRECTION_COL).equals(lit_str(SortDir::Desc.as_str())),
        rank_dense(peers.clone(), metric.clone(), SortDir::Desc),
        rank_dense(peers, metric.clone(), SortDir::Asc),
    );
    let ranked_rows = func(
        "ADDCOLUMNS",
        vec![
            func("NATURALINNERJOIN", vec![var(TOPX_VAR), var(TOP_VAR)]),
            lit_str(RANK_COL),
            rank,
        ],
    );

    let query = bind_keys(DaxQuery::new(projection(spec, &parent, filters.clone())), keys)
        .with_var(
            TOP_VAR,
            direction_table(&spec.dimensions, &metric, filters.clone(), &parent),
        )
        .with_var(TOPX_VAR, candidate_table(spec, &metric, filters, &parent))
        .with_var(
            RANKING_VAR,
            filter(ranked_rows, keep_predicate(spec.rank_depth, keys)),
        );

    Ok(query)
}

/// Ranking query with one caller-chosen order for every parent.
pub fn build_directional_ranking(
    spec: &RankSpec,
    keys: &KeySet,
    direction: SortDir,
) -> DrillResult<DaxQuery> {
    check_depth(spec.rank_depth)?;
    let parent = compose_key(&spec.dimensions)?;
    let metric = raw(&spec.drill_metric);
    let filters = filter_expr(spec.filters.as_deref());

    let ranked_rows = func(
        "ADDCOLUMNS",
        vec![
            var(TOPX_VAR),
            lit_str(RANK_COL),
            rank_dense(peer_rows(), metric.clone(), direction),
        ],
    );

    let query = bind_keys(DaxQuery::new(projection(spec, &parent, filters.clone())), keys)
        .with_var(TOPX_VAR, candidate_table(spec, &metric, filters, &parent))
        .with_var(
            RANKING_VAR,
            filter(ranked_rows, keep_predicate(spec.rank_depth, keys)),
        );

    Ok(query)
}

/// Flat grouping over every dimension at once, no ranking.
pub fn build_single_level(
    dimensions: &[String],
    filters: Option<&str>,
    metrics: &[String],
) -> DrillResult<DaxQuery> {
    let key = compose_key(dimensions)?;

    let mut args: Vec<Expr> = dimensions.iter().map(|d| raw(d)).collect();
    args.extend(filter_expr(filters));
    args.extend(metrics.iter().map(|m| raw(m)));
    args.extend(named(KEY_COL, key.key));

    Ok(DaxQuery::new(func("SUMMARIZECOLUMNS", args)))
}

// =============================================================================
// Shared pieces
// =============================================================================

fn check_depth(depth: u32) -> DrillResult<()> {
    if depth == 0 {
        return Err(DrillError::InvalidRankDepth(depth));
    }
    Ok(())
}

/// Blank or whitespace-only filters are treated as absent.
fn filter_expr(filters: Option<&str>) -> Option<Expr> {
    filters.map(str::trim).filter(|f| !f.is_empty()).map(raw)
}

/// `IF(metric >= 0, "DESC", "ASC")`
fn inferred_direction(metric: &Expr) -> Expr {
    if_else(
        metric.clone().gte(lit_int(0)),
        lit_str(SortDir::Desc.as_str()),
        lit_str(SortDir::Asc.as_str()),
    )
}

/// Parent groups with their direction and key.
fn direction_table(
    dimensions: &[String],
    metric: &Expr,
    filters: Option<Expr>,
    parent: &ComposedKey,
) -> Expr {
    let mut args: Vec<Expr> = dimensions.iter().map(|d| raw(d)).collect();
    args.extend(filters);
    args.extend(named(DIRECTION_COL, inferred_direction(metric)));
    args.extend(named(KEY_COL, parent.key.clone()));
    func("SUMMARIZECOLUMNS", args)
}

/// Child candidates grouped by parents + ranked dimension, tagged with the
/// parent's key.
fn candidate_table(
    spec: &RankSpec,
    metric: &Expr,
    filters: Option<Expr>,
    parent: &ComposedKey,
) -> Expr {
    let mut args: Vec<Expr> = spec.dimensions.iter().map(|d| raw(d)).collect();
    args.push(raw(&spec.ranked_dimension));
    args.extend(filters);
    args.extend(named(DRILL_METRIC_COL, metric.clone()));
    args.extend(named(KEY_COL, parent.key.clone()));
    func("SUMMARIZECOLUMNS", args)
}

/// Candidate rows sharing the current row's parent key.
fn peer_rows() -> Expr {
    filter(
        var(TOPX_VAR),
        column(KEY_COL).equals(func("EARLIER", vec![column(KEY_COL)])),
    )
}

/// `[RankM] <= N && [Key] IN t_keys`, or `&& FALSE()` for an empty key set.
fn keep_predicate(depth: u32, keys: &KeySet) -> Expr {
    let membership = if keys.is_empty() {
        lit_bool(false)
    } else {
        column(KEY_COL).is_in(var(KEYS_VAR))
    };
    column(RANK_COL)
        .lte(lit_int(i64::from(depth)))
        .and(membership)
}

fn bind_keys(query: DaxQuery, keys: &KeySet) -> DaxQuery {
    if keys.is_empty() {
        query
    } else {
        query.with_var(KEYS_VAR, keys.to_expr())
    }
}

/// Final projection carrying the child-level key forward.
fn projection(spec: &RankSpec, parent: &ComposedKey, filters: Option<Expr>) -> Expr {
    let mut args = vec![var(RANKING_VAR)];
    args.extend(spec.dimensions.iter().map(|d| raw(d)));
    args.push(raw(&spec.ranked_dimension));
    args.extend(spec.metrics.iter().map(|m| raw(m)));
    args.extend(named(KEY_COL, parent.child_key(&spec.ranked_dimension)));

    let mut outer = vec![func("SUMMARIZE", args)];
    outer.extend(filters);
    func("CALCULATETABLE", outer)
}
