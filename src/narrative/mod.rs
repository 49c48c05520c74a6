//! Narrative synthesis over a drill report.
//!
//! Each report entry is rendered as `"<label>\n\n<JSON records>"` and sent to
//! a [`NarrativeSynthesizer`] with the level prompt. The per-level narratives
//! are then sent again, as a JSON array, with the summary prompt.

mod client;
mod error;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::NarrativeSettings;
use crate::drill::DrillReport;

pub use client::{ChatCompletionClient, ChatRequest, ChatResponse, Message};
pub use error::{NarrativeError, NarrativeResult};

/// Turns text into narrative prose.
#[async_trait]
pub trait NarrativeSynthesizer: Send + Sync {
    async fn synthesize(&self, system_prompt: &str, text: &str) -> NarrativeResult<String>;
}

#[async_trait]
impl<T: NarrativeSynthesizer + ?Sized> NarrativeSynthesizer for Box<T> {
    async fn synthesize(&self, system_prompt: &str, text: &str) -> NarrativeResult<String> {
        (**self).synthesize(system_prompt, text).await
    }
}

/// Narratives for one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Narration {
    /// One narrative per report entry, in drill order.
    pub narratives: Vec<String>,
    pub summary: String,
}

/// Narrate every level, then summarize.
///
/// An empty report yields no narratives and an empty summary without
/// calling the synthesizer.
pub async fn narrate_report<S: NarrativeSynthesizer + ?Sized>(
    synthesizer: &S,
    report: &DrillReport,
    prompts: &NarrativeSettings,
) -> NarrativeResult<Narration> {
    if report.is_empty() {
        return Ok(Narration::default());
    }

    let mut narratives = Vec::with_capacity(report.len());
    for entry in report.entries() {
        info!(level = %entry.label, "narrating level");
        let text = synthesizer
            .synthesize(&prompts.system_prompt, &entry.render())
            .await?;
        narratives.push(text);
    }

    let combined = serde_json::to_string(&narratives)?;
    info!(levels = narratives.len(), "summarizing narratives");
    let summary = synthesizer
        .synthesize(&prompts.summary_prompt, &combined)
        .await?;

    Ok(Narration {
        narratives,
        summary,
    })
}
