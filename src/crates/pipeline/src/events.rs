//! Progress events emitted while a text is processed.
//!
//! One event per stage per sentence, in state-machine order within a
//! sentence; events from different sentences interleave freely. The stream
//! ends with exactly one `complete` (or an `error`).

use serde::{Deserialize, Serialize};

/// Per-sentence processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TemporalStart,
    TemporalDone,
    StructureDone,
    SpatialDone,
    GraphDone,
    GraphFailed,
}

/// A progress event, serialised as the SSE payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Info {
        message: String,
    },
    Stage {
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        chunk: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sentence: Option<usize>,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    Complete {
        message: String,
        count: usize,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn info(message: impl Into<String>) -> Self {
        ProgressEvent::Info {
            message: message.into(),
        }
    }

    /// A per-sentence stage event. `sentence` is 1-based for readability.
    pub fn stage(stage: Stage, chunk: usize, sentence: usize, message: impl Into<String>) -> Self {
        ProgressEvent::Stage {
            stage: Some(stage),
            chunk: Some(chunk),
            sentence: Some(sentence),
            message: message.into(),
            count: None,
        }
    }

    /// A running fact counter without a per-sentence stage.
    pub fn fact_count(count: usize, message: impl Into<String>) -> Self {
        ProgressEvent::Stage {
            stage: None,
            chunk: None,
            sentence: None,
            message: message.into(),
            count: Some(count),
        }
    }

    pub fn complete(count: usize, message: impl Into<String>) -> Self {
        ProgressEvent::Complete {
            message: message.into(),
            count,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_event_serialises_with_snake_case_tags() {
        let event = ProgressEvent::stage(Stage::TemporalStart, 0, 1, "Expanding sentence 1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage");
        assert_eq!(json["stage"], "temporal_start");
        assert_eq!(json["chunk"], 0);
        assert_eq!(json["sentence"], 1);
        assert!(json.get("count").is_none());
    }

    #[test]
    fn fact_counter_omits_stage_fields() {
        let event = ProgressEvent::fact_count(3, "Extracted fact #3");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage");
        assert!(json.get("stage").is_none());
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn complete_event_carries_the_count() {
        let json = serde_json::to_value(ProgressEvent::complete(7, "done")).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["count"], 7);
    }
}
