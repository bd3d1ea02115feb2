//! Flow submission payload
//!
//! A submission is what gets sent when a flow is pushed: the resolved flow
//! as JSON in the `flow` form field, plus any packaged code artifacts.
//! Resolution happens while the payload is prepared, so a broken flow never
//! reaches the network.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};

use crate::flow::{resolve, FlowDocument, ResolveError, ResolvedFlow};

/// Form field carrying the resolved flow
pub const FLOW_FIELD: &str = "flow";

const JSON_MIME: &str = "application/json";
const BINARY_MIME: &str = "application/octet-stream";

/// A packaged code artifact attached to a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Form field name (the file stem, which names the code action)
    pub field: String,
    /// File name reported to the server
    pub file_name: String,
    /// Raw file content
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Read an artifact from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid artifact path: {}", path.display()))?
            .to_string();
        let field = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name.as_str())
            .to_string();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read artifact: {}", path.display()))?;

        Ok(Self {
            field,
            file_name,
            bytes,
        })
    }
}

/// A resolved flow ready to be sent
#[derive(Debug, Clone)]
pub struct Submission {
    /// The resolved flow
    pub flow: ResolvedFlow,
    /// Serialized `flow` field
    pub flow_json: String,
    /// Attachments, in the order given
    pub artifacts: Vec<Artifact>,
}

/// Why a submission could not be prepared
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    /// The flow document is invalid
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// An artifact would be sent under the field reserved for the flow
    #[error("artifact '{file_name}' would replace the 'flow' field; rename the file")]
    ReservedField {
        /// File name of the offending artifact
        file_name: String,
    },
    /// The resolved flow could not be serialized
    #[error("Failed to serialize resolved flow: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Submission {
    /// Resolve `flow` and bundle it with `artifacts`.
    ///
    /// Fails before resolving if an artifact's field is `flow`.
    pub fn prepare(flow: &FlowDocument, artifacts: Vec<Artifact>) -> Result<Self, PrepareError> {
        if let Some(artifact) = artifacts.iter().find(|a| a.field == FLOW_FIELD) {
            return Err(PrepareError::ReservedField {
                file_name: artifact.file_name.clone(),
            });
        }

        let flow = resolve(flow)?;
        let flow_json = serde_json::to_string(&flow)?;

        Ok(Self {
            flow,
            flow_json,
            artifacts,
        })
    }

    /// Total payload size in bytes, before multipart framing
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.flow_json.len() + self.artifacts.iter().map(|a| a.bytes.len()).sum::<usize>()
    }

    /// Build the multipart form for the request body
    pub fn into_form(self) -> Result<Form> {
        let flow_part = Part::text(self.flow_json)
            .mime_str(JSON_MIME)
            .context("Invalid content type for flow field")?;
        let mut form = Form::new().part(FLOW_FIELD, flow_part);

        for artifact in self.artifacts {
            let part = Part::bytes(artifact.bytes)
                .file_name(artifact.file_name)
                .mime_str(BINARY_MIME)
                .context("Invalid content type for artifact")?;
            form = form.part(artifact.field, part);
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_flow() -> FlowDocument {
        serde_json::from_value(json!({
            "flowId": "f-1",
            "name": "orders",
            "trigger": {"type": "EVENT", "nextAction": "step1"},
            "actions": [{"name": "step1", "type": "CODE"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_prepare_serializes_resolved_flow() {
        let submission = Submission::prepare(&sample_flow(), vec![]).unwrap();

        let sent: serde_json::Value = serde_json::from_str(&submission.flow_json).unwrap();
        assert_eq!(sent["trigger"]["nextAction"]["name"], "step1");
        assert!(sent.get("actions").is_none());
        assert!(sent.get("flowId").is_none());
    }

    #[test]
    fn test_prepare_aborts_on_resolve_error() {
        let mut flow = sample_flow();
        flow.actions.clear();

        let err = Submission::prepare(&flow, vec![]).unwrap_err();
        assert!(matches!(
            err,
            PrepareError::Resolve(ResolveError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_artifact_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("step1.zip");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let artifact = Artifact::from_path(&path).unwrap();
        assert_eq!(artifact.field, "step1");
        assert_eq!(artifact.file_name, "step1.zip");
        assert_eq!(artifact.bytes, b"PK\x03\x04");
    }

    #[test]
    fn test_artifact_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = Artifact::from_path(temp_dir.path().join("nope.zip")).unwrap_err();
        assert!(err.to_string().contains("Failed to read artifact"));
    }

    #[test]
    fn test_payload_len_and_form() {
        let artifact = Artifact {
            field: "step1".to_string(),
            file_name: "step1.zip".to_string(),
            bytes: vec![0; 10],
        };
        let submission = Submission::prepare(&sample_flow(), vec![artifact]).unwrap();
        assert_eq!(submission.payload_len(), submission.flow_json.len() + 10);

        let form = submission.into_form().unwrap();
        assert!(!form.boundary().is_empty());
    }

    fn chain(count: usize) -> FlowDocument {
        let actions: Vec<serde_json::Value> = (0..count)
            .map(|i| json!({"name": format!("s{i}"), "type": "CODE", "nextAction": format!("s{}", i + 1)}))
            .chain(std::iter::once(json!({"name": format!("s{count}"), "type": "CODE"})))
            .collect();
        serde_json::from_value(json!({
            "trigger": {"type": "EVENT", "nextAction": "s0"},
            "actions": actions
        }))
        .unwrap()
    }

    #[test]
    fn test_prepare_rejects_deep_chain() {
        let err = Submission::prepare(&chain(10_000), vec![]).unwrap_err();
        assert!(matches!(
            err,
            PrepareError::Resolve(ResolveError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_prepare_deepest_allowed_chain() {
        let submission = Submission::prepare(&chain(crate::flow::MAX_DEPTH - 1), vec![]).unwrap();
        assert_eq!(submission.flow.action_count(), crate::flow::MAX_DEPTH);

        let copy = submission.clone();
        drop(submission);
        assert!(!copy.into_form().unwrap().boundary().is_empty());
    }

    #[test]
    fn test_prepare_rejects_artifact_named_flow() {
        let artifacts = vec![
            Artifact {
                field: "step1".to_string(),
                file_name: "step1.zip".to_string(),
                bytes: vec![1],
            },
            Artifact {
                field: FLOW_FIELD.to_string(),
                file_name: "flow.zip".to_string(),
                bytes: vec![2],
            },
        ];

        let err = Submission::prepare(&sample_flow(), artifacts).unwrap_err();
        assert!(matches!(
            &err,
            PrepareError::ReservedField { file_name } if file_name == "flow.zip"
        ));
        assert!(err.to_string().contains("'flow'"));
    }
}
