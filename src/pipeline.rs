//! End-to-end narrative run.
//!
//! ```text
//! RequestFile → DrillRequest → DrillIterator → DrillReport
//!     → narrate_report → Narration → Record → Sink
//! ```
//!
//! # Example
//!
//! ```ignore
//! use narrator::pipeline::{run_pipeline, PipelineOptions, RequestFile};
//!
//! let settings = Settings::load()?;
//! let options = PipelineOptions::from_settings(&settings)?;
//! let request = RequestFile::from_file("request.json")?.into_request(options.rank_depth)?;
//! let output = run_pipeline(&client, &llm, &CsvSink::new(), &request, &options).await?;
//! println!("{}", output.narration.summary);
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{NarrativeSettings, Settings, SettingsError};
use crate::dax::{DaxQuery, SortDir};
use crate::drill::{
    build_key_bootstrap, DimensionList, DrillError, DrillIterator, DrillReport, DrillRequest,
    FailurePolicy, KeySet,
};
use crate::executor::{QueryExecutor, QueryFailure};
use crate::narrative::{narrate_report, Narration, NarrativeError, NarrativeSynthesizer};
use crate::sink::{Record, Sink, SinkError};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to read request file {path}: {source}")]
    RequestRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request: {0}")]
    RequestParse(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection error: {0}")]
    Connect(#[from] QueryFailure),

    #[error("Drill error: {0}")]
    Drill(#[from] DrillError),

    #[error("Narrative error: {0}")]
    Narrative(#[from] NarrativeError),

    #[error("Failed to encode record field '{field}': {source}")]
    RecordEncode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

// ============================================================================
// Request file
// ============================================================================

/// Output aggregates, given either as one opaque fragment or a list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Metrics {
    One(String),
    Many(Vec<String>),
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::Many(vec![])
    }
}

impl Metrics {
    fn into_vec(self) -> Vec<String> {
        match self {
            Metrics::One(m) if m.trim().is_empty() => vec![],
            Metrics::One(m) => vec![m],
            Metrics::Many(ms) => ms,
        }
    }
}

/// Drill request as stored on disk.
///
/// ```json
/// {
///   "dimensions": ["'Geo'[Region]", "'Geo'[Store]"],
///   "drill_metric": "[Sales]",
///   "filters": "'Date'[Year] = 2024",
///   "metrics": "\"Sales\", [Sales]",
///   "direction": "desc"
/// }
/// ```
///
/// Omitting `direction` selects dynamic ranking.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestFile {
    pub dimensions: DimensionList,
    pub drill_metric: String,
    #[serde(default)]
    pub filters: Option<String>,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub rank_depth: Option<u32>,
}

impl RequestFile {
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::RequestRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Build the drill request, using `default_depth` when the file has none.
    pub fn into_request(self, default_depth: u32) -> PipelineResult<DrillRequest> {
        let mut request = DrillRequest::new(
            self.dimensions,
            &self.drill_metric,
            self.rank_depth.unwrap_or(default_depth),
        );
        if let Some(direction) = self.direction {
            let dir: SortDir = direction.parse().map_err(PipelineError::InvalidRequest)?;
            request = request.with_direction(dir);
        }
        if let Some(filters) = self.filters {
            request = request.with_filters(&filters);
        }
        for metric in self.metrics.into_vec() {
            request = request.with_metric(&metric);
        }
        Ok(request)
    }
}

// ============================================================================
// Options
// ============================================================================

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Default top-N when the request omits it.
    pub rank_depth: u32,
    pub policy: FailurePolicy,
    pub prompts: NarrativeSettings,
    /// Sink destination.
    pub destination: String,
    /// Fixed record timestamp; `None` stamps with the current time.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_parts(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> PipelineResult<Self> {
        let mut options = Self::from_parts(settings);
        options.destination = settings.sink.resolved_path()?.display().to_string();
        Ok(options)
    }

    fn from_parts(settings: &Settings) -> Self {
        Self {
            rank_depth: settings.drill.rank_depth,
            policy: settings.drill.on_query_failure,
            prompts: settings.narrative.clone(),
            destination: settings.sink.path.clone(),
            timestamp: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    pub report: DrillReport,
    pub narration: Narration,
    /// The row handed to the sink.
    pub record: Record,
}

/// Field names of the log row, in column order.
pub const RECORD_FIELDS: [&str; 7] = [
    "Timestamp",
    "Mode",
    "Dimensions",
    "Drill Metric",
    "Levels",
    "Narratives",
    "Summary",
];

/// Build the log row for a finished run.
pub fn build_record(
    request: &DrillRequest,
    report: &DrillReport,
    narration: &Narration,
    timestamp: DateTime<Utc>,
) -> PipelineResult<Record> {
    let [ts, mode, dims, metric, levels, narratives, summary] = RECORD_FIELDS;
    Ok(Record::new()
        .with(ts, timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
        .with(mode, request.direction.mode_name())
        .with(dims, request.dimensions.joined())
        .with(metric, request.drill_metric.as_str())
        .with(levels, encode_field(levels, &report.labels())?)
        .with(narratives, encode_field(narratives, &narration.narratives)?)
        .with(summary, narration.summary.as_str()))
}

/// JSON text for a list-valued record field.
fn encode_field<T: serde::Serialize + ?Sized>(
    field: &'static str,
    value: &T,
) -> PipelineResult<String> {
    serde_json::to_string(value).map_err(|source| PipelineError::RecordEncode { field, source })
}

// ============================================================================
// Pipeline
// ============================================================================

/// Drill, narrate, and append one record to the sink.
pub async fn run_pipeline<E, S, K>(
    executor: &E,
    synthesizer: &S,
    sink: &K,
    request: &DrillRequest,
    options: &PipelineOptions,
) -> PipelineResult<PipelineOutput>
where
    E: QueryExecutor + ?Sized,
    S: NarrativeSynthesizer + ?Sized,
    K: Sink + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id, mode = request.direction.mode_name());

    async move {
        info!(dimensions = %request.dimensions.joined(), "starting drill");
        let report = DrillIterator::new(executor)
            .with_policy(options.policy)
            .run(request)
            .await?;
        if report.has_failures() {
            warn!("one or more levels failed, narrating what was returned");
        }

        let narration = narrate_report(synthesizer, &report, &options.prompts).await?;

        let timestamp = options.timestamp.unwrap_or_else(Utc::now);
        let record = build_record(request, &report, &narration, timestamp)?;
        sink.append_row(&options.destination, &record)?;
        info!(destination = %options.destination, levels = report.len(), "run recorded");

        Ok(PipelineOutput {
            run_id,
            report,
            narration,
            record,
        })
    }
    .instrument(span)
    .await
}

/// Queries for one drill level, rendered without executing anything.
#[derive(Debug, Clone)]
pub struct RenderedLevel {
    pub label: String,
    /// Present for level 0, whose keys come from this query.
    pub bootstrap: Option<DaxQuery>,
    pub ranking: DaxQuery,
}

/// Render the queries a run would issue at `level` for the given keys.
pub fn render_level(
    request: &DrillRequest,
    level: usize,
    keys: &KeySet,
) -> PipelineResult<RenderedLevel> {
    let transitions = request.dimensions.len().saturating_sub(1);
    let transition = request
        .dimensions
        .transitions()
        .nth(level)
        .ok_or(DrillError::LevelOutOfRange { level, transitions })?;

    let bootstrap = if level == 0 {
        Some(build_key_bootstrap(
            transition.parents,
            &request.drill_metric,
            request.filters.as_deref(),
        )?)
    } else {
        None
    };
    let ranking = request.rank_spec(&transition).build(keys)?;

    Ok(RenderedLevel {
        label: transition.label(),
        bootstrap,
        ranking,
    })
}
