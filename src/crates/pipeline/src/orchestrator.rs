//! Pipeline orchestration.
//!
//! Fans out one task per sentence across all chunks, funnels per-stage
//! progress events into an mpsc channel, and enforces the all-or-nothing
//! gate between the temporal-commit phase and causal inference: if any
//! temporal fact failed to commit, no state-change event is written for
//! this input, because causal wiring matches facts by exact content.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use geocoder::{Geocoder, GeocoderConfig};
use graph_store::{GraphConfig, GraphStore};
use hypergraph::{Modification, TemporalFact};
use llm::{ChatClient, LlmConfig};

use crate::canonical::canonicalise_sentence;
use crate::classifier;
use crate::config::ModelConfig;
use crate::error::Result;
use crate::events::{ProgressEvent, Stage};
use crate::extract::{extract_facts, sanitise_fact};
use crate::modification::extract_modifications;
use crate::spatial::expand_fact;
use crate::state::{infer_causality, skeleton_events};
use crate::text::{clean_text, split_into_sentences, split_text_into_chunks};

/// Outcome totals for one processed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Facts that survived extraction and sanitation.
    pub facts_processed: usize,
    /// Facts whose graph write succeeded.
    pub succeeded: usize,
    /// Facts whose graph write failed.
    pub failed: usize,
    /// State-change events written after the causal phase.
    pub state_events_written: usize,
    /// Modifications applied to existing hyperedges.
    pub modifications_applied: usize,
}

#[derive(Default)]
struct SentenceOutcome {
    facts: Vec<TemporalFact>,
    succeeded: usize,
    failed: usize,
}

/// The ingestion pipeline: LLM client, geocoder, and (optionally) the
/// graph store. Without a store the stages still run and facts are only
/// counted, which keeps the pipeline usable for dry runs.
pub struct Pipeline {
    llm: ChatClient,
    geocoder: Geocoder,
    store: Option<GraphStore>,
    models: ModelConfig,
    llm_classification: bool,
}

impl Pipeline {
    pub fn new(
        llm: ChatClient,
        geocoder: Geocoder,
        store: Option<GraphStore>,
        models: ModelConfig,
    ) -> Self {
        Self {
            llm,
            geocoder,
            store,
            models,
            llm_classification: false,
        }
    }

    /// Construct from the environment: `OPENAI_API_KEY`, `NEO4J_*`,
    /// `MAPBOX_ACCESS_TOKEN`. A missing or unreachable graph store is
    /// logged and the pipeline runs without graph writes.
    pub async fn from_env() -> Result<Self> {
        let llm = ChatClient::new(LlmConfig::from_env()?)?;
        let geocoder = Geocoder::new(GeocoderConfig::from_env())?;
        let store = match GraphConfig::from_env() {
            Ok(config) => match GraphStore::connect(config).await {
                Ok(store) => Some(store),
                Err(error) => {
                    tracing::warn!(%error, "graph store unavailable, running without writes");
                    None
                }
            },
            Err(error) => {
                tracing::warn!(%error, "graph store not configured, running without writes");
                None
            }
        };
        Ok(Self::new(llm, geocoder, store, ModelConfig::default()))
    }

    /// Enable LLM refinement of the modification classifier.
    pub fn with_llm_classification(mut self, enabled: bool) -> Self {
        self.llm_classification = enabled;
        self
    }

    pub fn store(&self) -> Option<&GraphStore> {
        self.store.as_ref()
    }

    pub fn geocoder(&self) -> &Geocoder {
        &self.geocoder
    }

    pub fn llm(&self) -> &ChatClient {
        &self.llm
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    /// Run the full pipeline over one input text.
    ///
    /// Sentences run concurrently; events for one sentence arrive in stage
    /// order, and a failure in one sentence never cancels its siblings.
    pub async fn process_text(
        self: Arc<Self>,
        text: String,
        chunk_size: usize,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> PipelineReport {
        let (regular_text, modification_text) = classifier::classify(
            &self.llm,
            &self.models.classify,
            &text,
            self.llm_classification,
        )
        .await;
        if !modification_text.is_empty() {
            emit(
                &progress,
                ProgressEvent::info(format!(
                    "Detected modification sentences: {}",
                    preview(&modification_text)
                )),
            )
            .await;
        }

        let modifications = if modification_text.is_empty() {
            Vec::new()
        } else {
            match extract_modifications(
                &self.llm,
                &self.geocoder,
                &self.models.modification,
                &modification_text,
            )
            .await
            {
                Ok(modifications) => modifications,
                Err(error) => {
                    tracing::warn!(%error, "modification extraction failed");
                    emit(
                        &progress,
                        ProgressEvent::error(format!("Modification extraction failed: {error}")),
                    )
                    .await;
                    Vec::new()
                }
            }
        };

        // One task per sentence across every chunk; the LLM client is the
        // rate limiter.
        let fact_counter = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        for (chunk_index, chunk_text) in split_text_into_chunks(&regular_text, chunk_size) {
            let cleaned = clean_text(&chunk_text);
            for (sentence_index, sentence) in split_into_sentences(&cleaned).into_iter().enumerate()
            {
                tasks.spawn(Arc::clone(&self).process_sentence(
                    chunk_index,
                    sentence_index + 1,
                    sentence,
                    regular_text.clone(),
                    progress.clone(),
                    Arc::clone(&fact_counter),
                ));
            }
        }

        let mut all_facts: Vec<TemporalFact> = Vec::new();
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    succeeded += outcome.succeeded;
                    failed += outcome.failed;
                    all_facts.extend(outcome.facts);
                }
                Err(error) => {
                    tracing::warn!(%error, "sentence task panicked");
                    failed += 1;
                }
            }
        }
        let facts_processed = all_facts.len();

        let state_events_written = self
            .causal_phase(&text, &all_facts, succeeded, failed, &progress)
            .await;

        let modifications_applied = self.apply_modifications(&modifications, &progress).await;

        emit(
            &progress,
            ProgressEvent::complete(
                facts_processed,
                format!("Processing complete. Added {facts_processed} facts to the graph."),
            ),
        )
        .await;

        PipelineReport {
            facts_processed,
            succeeded,
            failed,
            state_events_written,
            modifications_applied,
        }
    }

    async fn process_sentence(
        self: Arc<Self>,
        chunk: usize,
        sentence_number: usize,
        sentence: String,
        full_context: String,
        progress: mpsc::Sender<ProgressEvent>,
        fact_counter: Arc<AtomicUsize>,
    ) -> SentenceOutcome {
        let mut outcome = SentenceOutcome::default();

        emit(
            &progress,
            ProgressEvent::stage(
                Stage::TemporalStart,
                chunk,
                sentence_number,
                format!("Expanding temporal facts for sentence {sentence_number}: {sentence}"),
            ),
        )
        .await;

        let canonical = canonicalise_sentence(
            &self.llm,
            &self.models.canonicalise,
            &sentence,
            &full_context,
            Utc::now(),
        )
        .await;

        emit(
            &progress,
            ProgressEvent::stage(
                Stage::TemporalDone,
                chunk,
                sentence_number,
                format!("Finished expanding the spatio-temporal facts for sentence {sentence_number}!"),
            ),
        )
        .await;

        let raw_facts = match extract_facts(&self.llm, &self.models.extract, &canonical).await {
            Ok(raw_facts) => raw_facts,
            Err(error) => {
                tracing::warn!(%error, sentence = %sentence, "structure extraction failed");
                return outcome;
            }
        };

        emit(
            &progress,
            ProgressEvent::stage(
                Stage::StructureDone,
                chunk,
                sentence_number,
                format!("Finished extracting the structured JSON for sentence {sentence_number}!"),
            ),
        )
        .await;

        for raw in raw_facts {
            let Some(raw) = sanitise_fact(raw) else {
                tracing::debug!(sentence = %sentence, "dropping placeholder fact");
                continue;
            };
            let fact = expand_fact(&self.geocoder, raw).await;

            emit(
                &progress,
                ProgressEvent::stage(
                    Stage::SpatialDone,
                    chunk,
                    sentence_number,
                    format!(
                        "Finished spatial context and coordinates extraction for sentence {sentence_number}"
                    ),
                ),
            )
            .await;

            match &self.store {
                Some(store) => match store.write_fact(&fact).await {
                    Ok(hyperedge_id) => {
                        outcome.succeeded += 1;
                        tracing::debug!(%hyperedge_id, "fact written");
                        emit(
                            &progress,
                            ProgressEvent::stage(
                                Stage::GraphDone,
                                chunk,
                                sentence_number,
                                format!(
                                    "Fact from sentence {sentence_number} successfully added to graph"
                                ),
                            ),
                        )
                        .await;
                    }
                    Err(error) => {
                        outcome.failed += 1;
                        tracing::warn!(%error, "graph write failed");
                        emit(
                            &progress,
                            ProgressEvent::stage(
                                Stage::GraphFailed,
                                chunk,
                                sentence_number,
                                format!("Graph write failed for sentence {sentence_number}: {error}"),
                            ),
                        )
                        .await;
                    }
                },
                // No store attached: count the fact as processed.
                None => outcome.succeeded += 1,
            }

            let count = fact_counter.fetch_add(1, Ordering::SeqCst) + 1;
            emit(
                &progress,
                ProgressEvent::fact_count(
                    count,
                    format!("Extracted spatio-temporal fact #{count}: {}", fact_preview(&fact)),
                ),
            )
            .await;
            outcome.facts.push(fact);
        }

        outcome
    }

    /// All-or-nothing gate, then causal inference and event writes.
    async fn causal_phase(
        &self,
        text: &str,
        facts: &[TemporalFact],
        succeeded: usize,
        failed: usize,
        progress: &mpsc::Sender<ProgressEvent>,
    ) -> usize {
        if facts.is_empty() {
            return 0;
        }
        if failed > 0 {
            tracing::warn!(failed, "temporal facts failed, skipping state fact extraction");
            emit(
                progress,
                ProgressEvent::info(format!(
                    "{failed} temporal facts failed to commit; skipping state fact extraction"
                )),
            )
            .await;
            return 0;
        }
        if succeeded == 0 {
            emit(
                progress,
                ProgressEvent::info(
                    "No temporal facts were committed; skipping state fact extraction".to_string(),
                ),
            )
            .await;
            return 0;
        }

        emit(
            progress,
            ProgressEvent::info(format!("Extracting state facts for {} temporal facts", facts.len())),
        )
        .await;
        let skeletons = skeleton_events(facts);
        let events = infer_causality(&self.llm, &self.models.causal, text, skeletons).await;

        let Some(store) = &self.store else {
            return 0;
        };
        let mut written = 0;
        for event in &events {
            match store.write_state_event(event).await {
                Ok(event_id) => {
                    written += 1;
                    tracing::debug!(%event_id, "state change event written");
                }
                Err(error) => {
                    tracing::warn!(%error, "state change event write failed");
                }
            }
        }
        emit(
            progress,
            ProgressEvent::info(format!("State fact extraction complete: {written} events written")),
        )
        .await;
        written
    }

    async fn apply_modifications(
        &self,
        modifications: &[Modification],
        progress: &mpsc::Sender<ProgressEvent>,
    ) -> usize {
        if modifications.is_empty() {
            return 0;
        }
        let Some(store) = &self.store else {
            return 0;
        };
        let mut applied = 0;
        for modification in modifications {
            match store.apply_modification(modification).await {
                Ok(()) => {
                    applied += 1;
                    emit(
                        progress,
                        ProgressEvent::info(format!(
                            "Applied modification to fact '{}'",
                            modification.affected_fact.relation_type
                        )),
                    )
                    .await;
                }
                Err(error) => {
                    tracing::warn!(%error, "modification failed");
                    emit(
                        progress,
                        ProgressEvent::error(format!("Modification failed: {error}")),
                    )
                    .await;
                }
            }
        }
        applied
    }
}

async fn emit(progress: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    // A closed channel means the consumer is gone; processing continues.
    let _ = progress.send(event).await;
}

fn preview(text: &str) -> String {
    const MAX: usize = 100;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}...", &text[..cut])
    }
}

fn fact_preview(fact: &TemporalFact) -> String {
    let subjects = if fact.subjects.is_empty() {
        "(unknown)".to_string()
    } else {
        fact.subjects.join(", ")
    };
    let objects = if fact.objects.is_empty() {
        "(none)".to_string()
    } else {
        fact.objects.join(", ")
    };
    format!("{subjects} {} {objects}", fact.relation_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::LlmConfig;

    fn offline_pipeline() -> Arc<Pipeline> {
        let llm = ChatClient::new(LlmConfig::new("test-key", "http://127.0.0.1:1"))
            .expect("client builds");
        let geocoder = Geocoder::new(GeocoderConfig {
            mapbox_token: None,
            mapbox_base_url: "http://127.0.0.1:1".into(),
            nominatim_base_url: "http://127.0.0.1:1".into(),
            ..GeocoderConfig::default()
        })
        .expect("geocoder builds");
        Arc::new(Pipeline::new(llm, geocoder, None, ModelConfig::default()))
    }

    #[tokio::test]
    async fn offline_run_still_emits_ordered_stage_events_and_completes() {
        let pipeline = offline_pipeline();
        let (tx, mut rx) = mpsc::channel(64);

        let report = Arc::clone(&pipeline)
            .process_text("John likes cats at home.".to_string(), 3, tx)
            .await;

        // Extraction cannot succeed without a reachable LLM, so no facts.
        assert_eq!(report.facts_processed, 0);
        assert_eq!(report.state_events_written, 0);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let stages: Vec<Option<Stage>> = events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Stage { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect();
        assert_eq!(stages, vec![Some(Stage::TemporalStart), Some(Stage::TemporalDone)]);
        assert!(matches!(events.last(), Some(ProgressEvent::Complete { count: 0, .. })));
    }

    #[tokio::test]
    async fn modification_sentences_are_detected_before_fanout() {
        let pipeline = offline_pipeline();
        let (tx, mut rx) = mpsc::channel(64);

        Arc::clone(&pipeline)
            .process_text(
                "Actually, John likes magazines, not books.".to_string(),
                3,
                tx,
            )
            .await;

        let mut saw_modification_info = false;
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::Info { message } = &event {
                if message.contains("modification sentences") {
                    saw_modification_info = true;
                }
            }
        }
        assert!(saw_modification_info);
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "x".repeat(300);
        let short = preview(&long);
        assert!(short.len() <= 104);
        assert!(short.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn fact_preview_reads_naturally() {
        let fact = TemporalFact {
            subjects: vec!["John".into()],
            objects: vec![],
            relation_type: "dies".into(),
            temporal_intervals: vec![],
            spatial_contexts: vec![],
        };
        assert_eq!(fact_preview(&fact), "John dies (none)");
    }
}
