//! Build events as delivered by a live engine or a decoded build log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier value the engine uses for "not set".
pub const INVALID_ID: i32 = -1;

/// Nested identifiers correlating an event with its node, evaluation,
/// project, target and task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildEventContext {
    pub node_id: i32,
    pub evaluation_id: i32,
    pub project_instance_id: i32,
    pub project_context_id: i32,
    pub target_id: i32,
    pub task_id: i32,
}

impl Default for BuildEventContext {
    fn default() -> Self {
        Self {
            node_id: INVALID_ID,
            evaluation_id: INVALID_ID,
            project_instance_id: INVALID_ID,
            project_context_id: INVALID_ID,
            target_id: INVALID_ID,
            task_id: INVALID_ID,
        }
    }
}

impl BuildEventContext {
    /// The evaluation id, if the engine set one.
    pub const fn evaluation(&self) -> Option<i32> {
        if self.evaluation_id == INVALID_ID {
            None
        } else {
            Some(self.evaluation_id)
        }
    }
}

/// An item with its metadata (`<Compile Include="a.cs" Link="..."/>`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskItem {
    pub item_spec: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl TaskItem {
    pub fn new(item_spec: impl Into<String>) -> Self {
        Self {
            item_spec: item_spec.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    /// Metadata lookup ignoring ASCII case, as the engine does.
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Items of one type, in evaluation order.
pub type ItemGroup = Vec<TaskItem>;

/// A build event with its correlation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    #[serde(default)]
    pub context: BuildEventContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub kind: BuildEventKind,
}

impl BuildEvent {
    pub fn new(kind: BuildEventKind) -> Self {
        Self {
            context: BuildEventContext::default(),
            timestamp: None,
            kind,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: BuildEventContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The project this event belongs to, if it names one.
    pub fn project_path(&self) -> Option<&str> {
        match &self.kind {
            BuildEventKind::ProjectStarted { project_path, .. }
            | BuildEventKind::ProjectFinished { project_path, .. }
            | BuildEventKind::EvaluationFinished { project_path, .. }
            | BuildEventKind::TargetStarted { project_path, .. }
            | BuildEventKind::TargetFinished { project_path, .. }
            | BuildEventKind::TaskCommandLine { project_path, .. } => Some(project_path),
            BuildEventKind::BuildStarted
            | BuildEventKind::BuildFinished { .. }
            | BuildEventKind::Error { .. } => None,
        }
    }

    // Constructors used by tests and replay tooling.

    pub fn build_started() -> Self {
        Self::new(BuildEventKind::BuildStarted)
    }

    pub fn build_finished(success: bool) -> Self {
        Self::new(BuildEventKind::BuildFinished { success })
    }

    pub fn project_started(
        project_path: impl Into<String>,
        properties: &[(&str, &str)],
        items: BTreeMap<String, ItemGroup>,
    ) -> Self {
        Self::new(BuildEventKind::ProjectStarted {
            project_path: project_path.into(),
            properties: properties
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            items,
        })
    }

    pub fn project_finished(project_path: impl Into<String>, success: bool) -> Self {
        Self::new(BuildEventKind::ProjectFinished {
            project_path: project_path.into(),
            success,
        })
    }

    pub fn target_started(project_path: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self::new(BuildEventKind::TargetStarted {
            project_path: project_path.into(),
            target_name: target_name.into(),
        })
    }

    pub fn target_finished(
        project_path: impl Into<String>,
        target_name: impl Into<String>,
        outputs: Vec<TaskItem>,
    ) -> Self {
        Self::new(BuildEventKind::TargetFinished {
            project_path: project_path.into(),
            target_name: target_name.into(),
            outputs,
        })
    }

    pub fn task_command_line(
        project_path: impl Into<String>,
        task_name: impl Into<String>,
        command_line: impl Into<String>,
    ) -> Self {
        Self::new(BuildEventKind::TaskCommandLine {
            project_path: project_path.into(),
            task_name: task_name.into(),
            command_line: command_line.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(BuildEventKind::Error {
            message: message.into(),
        })
    }
}

/// The closed set of events the processor understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEventKind {
    BuildStarted,
    BuildFinished {
        success: bool,
    },
    /// Properties and items produced by evaluating a project, reported
    /// ahead of the builds that reuse the evaluation.
    EvaluationFinished {
        project_path: String,
        #[serde(default)]
        properties: BTreeMap<String, String>,
        #[serde(default)]
        items: BTreeMap<String, ItemGroup>,
    },
    ProjectStarted {
        project_path: String,
        #[serde(default)]
        properties: BTreeMap<String, String>,
        #[serde(default)]
        items: BTreeMap<String, ItemGroup>,
    },
    ProjectFinished {
        #[serde(default)]
        project_path: String,
        success: bool,
    },
    TargetStarted {
        project_path: String,
        target_name: String,
    },
    TargetFinished {
        project_path: String,
        target_name: String,
        #[serde(default)]
        outputs: Vec<TaskItem>,
    },
    TaskCommandLine {
        project_path: String,
        task_name: String,
        command_line: String,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = BuildEvent::task_command_line("/src/app/app.csproj", "Csc", "csc.exe a.cs")
            .with_timestamp(Utc::now());

        let json = serde_json::to_string(&event).unwrap();
        let parsed: BuildEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, event);
    }

    #[test]
    fn event_json_is_flat_and_tagged() {
        let event = BuildEvent::target_started("/src/app/app.csproj", "CoreCompile");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "target_started");
        assert_eq!(value["target_name"], "CoreCompile");
        assert_eq!(value["context"]["node_id"], INVALID_ID);
    }

    #[test]
    fn event_defaults_missing_context_and_collections() {
        let json = r#"{"type":"project_started","project_path":"/src/a.csproj"}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.context, BuildEventContext::default());
        assert_eq!(event.context.evaluation(), None);
        assert_eq!(event.project_path(), Some("/src/a.csproj"));
        match event.kind {
            BuildEventKind::ProjectStarted {
                properties, items, ..
            } => {
                assert!(properties.is_empty());
                assert!(items.is_empty());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn event_rejects_unknown_type() {
        let json = r#"{"type":"telemetry","name":"x"}"#;
        let result: Result<BuildEvent, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn partial_context_keeps_other_ids_invalid() {
        let json = r#"{"type":"build_started","context":{"evaluation_id":7}}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.context.evaluation(), Some(7));
        assert_eq!(event.context.node_id, INVALID_ID);
    }

    #[test]
    fn metadata_lookup_ignores_case() {
        let item = TaskItem::new("Newtonsoft.Json").with_metadata("Version", "13.0.3");
        assert_eq!(item.metadata_value("version"), Some("13.0.3"));
        assert_eq!(item.metadata_value("PrivateAssets"), None);
    }
}
