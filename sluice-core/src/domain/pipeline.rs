//! Pipeline domain types
//!
//! A pipeline definition is read from a YAML file at the root of the
//! repository being built. Each stage is bound to exactly one execution
//! backend; the backend is decided and validated here, at parse time, so
//! the runner never has to inspect stringly-typed fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default name of the definition file at the workspace root
pub const DEFINITION_FILE: &str = ".sluice.yaml";

/// Errors produced while turning definition text into a [`PipelineDefinition`]
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The document is not YAML of the expected shape
    #[error("invalid pipeline definition: {0}")]
    Syntax(String),

    /// A stage is structurally valid YAML but not a usable stage
    #[error("invalid stage '{stage}': {reason}")]
    InvalidStage { stage: String, reason: String },
}

impl From<serde_yaml::Error> for DefinitionError {
    fn from(err: serde_yaml::Error) -> Self {
        DefinitionError::Syntax(err.to_string())
    }
}

/// A named pipeline and its ordered stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub stages: Vec<Stage>,
}

/// One named unit of pipeline work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
}

/// Execution backend of a stage, carrying only the fields it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageKind {
    /// Shell commands run on the host, inside the workspace
    Local { script: Vec<String> },

    /// Shell commands run inside `image` with the workspace mounted
    Container { image: String, script: Vec<String> },

    /// Image update of a cluster deployment
    Deployment { target: String, new_image: String },
}

/// Discriminant of [`StageKind`], used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Local,
    Container,
    Deployment,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Container => write!(f, "container"),
            BackendKind::Deployment => write!(f, "deployment"),
        }
    }
}

impl StageKind {
    pub fn backend(&self) -> BackendKind {
        match self {
            StageKind::Local { .. } => BackendKind::Local,
            StageKind::Container { .. } => BackendKind::Container,
            StageKind::Deployment { .. } => BackendKind::Deployment,
        }
    }
}

impl Stage {
    pub fn backend(&self) -> BackendKind {
        self.kind.backend()
    }
}

impl PipelineDefinition {
    /// Parse a pipeline definition from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let raw: RawPipeline = serde_yaml::from_str(yaml)?;
        raw.try_into()
    }

    /// Get all stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

// =============================================================================
// File representation
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPipeline {
    name: String,
    #[serde(default)]
    stages: Vec<RawStage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStage {
    name: String,
    #[serde(default, rename = "type", alias = "kind")]
    stage_type: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, alias = "newImage")]
    new_image: Option<String>,
    #[serde(default)]
    script: Vec<String>,
}

impl TryFrom<RawPipeline> for PipelineDefinition {
    type Error = DefinitionError;

    fn try_from(raw: RawPipeline) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(DefinitionError::Syntax(
                "pipeline name cannot be empty".to_string(),
            ));
        }

        let stages = raw
            .stages
            .into_iter()
            .map(Stage::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: raw.name,
            stages,
        })
    }
}

impl TryFrom<RawStage> for Stage {
    type Error = DefinitionError;

    fn try_from(raw: RawStage) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| DefinitionError::InvalidStage {
            stage: raw.name.clone(),
            reason: reason.to_string(),
        };

        if raw.name.trim().is_empty() {
            return Err(invalid("stage name cannot be empty"));
        }

        let backend = match raw.stage_type.as_deref().map(str::trim) {
            Some("local") | Some("shell") | Some("process") => BackendKind::Local,
            Some("container") | Some("docker") | Some("podman") => BackendKind::Container,
            Some("kubernetes") | Some("k8s") | Some("deployment") => BackendKind::Deployment,
            Some(other) => {
                return Err(invalid(&format!("unknown stage type '{}'", other)));
            }
            None if non_blank(&raw.image).is_some() => BackendKind::Container,
            None => BackendKind::Local,
        };

        let kind = match backend {
            BackendKind::Local => StageKind::Local {
                script: checked_script(&raw.script).map_err(|r| invalid(&r))?,
            },
            BackendKind::Container => {
                let image = non_blank(&raw.image)
                    .ok_or_else(|| invalid("container stage requires 'image'"))?;
                StageKind::Container {
                    image,
                    script: checked_script(&raw.script).map_err(|r| invalid(&r))?,
                }
            }
            BackendKind::Deployment => {
                let target = non_blank(&raw.target)
                    .ok_or_else(|| invalid("deployment stage requires 'target'"))?;
                let new_image = non_blank(&raw.new_image)
                    .ok_or_else(|| invalid("deployment stage requires 'new_image'"))?;
                StageKind::Deployment { target, new_image }
            }
        };

        Ok(Self {
            name: raw.name,
            kind,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn checked_script(script: &[String]) -> Result<Vec<String>, String> {
    if script.is_empty() {
        return Err("'script' must list at least one command".to_string());
    }
    if let Some(idx) = script.iter().position(|c| c.trim().is_empty()) {
        return Err(format!("script command {} is blank", idx + 1));
    }
    Ok(script.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_stage() {
        let yaml = r#"
name: ci
stages:
  - name: build
    type: local
    script:
      - echo A
      - echo B
"#;
        let def = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.name, "ci");
        assert_eq!(def.stage_names(), vec!["build"]);
        assert_eq!(
            def.stages[0].kind,
            StageKind::Local {
                script: vec!["echo A".to_string(), "echo B".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_preserves_stage_order() {
        let yaml = r#"
name: ordered
stages:
  - { name: one, kind: local, script: ["true"] }
  - { name: two, image: "alpine:3", script: ["true"] }
  - { name: three, type: kubernetes, target: web, new_image: "web:2" }
"#;
        let def = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.stage_names(), vec!["one", "two", "three"]);
        assert_eq!(def.stages[0].backend(), BackendKind::Local);
        assert_eq!(def.stages[1].backend(), BackendKind::Container);
        assert_eq!(def.stages[2].backend(), BackendKind::Deployment);
    }

    #[test]
    fn test_untyped_stage_defaults() {
        let yaml = r#"
name: defaults
stages:
  - { name: in-image, image: "golang:1.21", script: ["go version"] }
  - { name: on-host, script: ["ls"] }
"#;
        let def = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(
            def.stages[0].kind,
            StageKind::Container {
                image: "golang:1.21".to_string(),
                script: vec!["go version".to_string()],
            }
        );
        assert_eq!(def.stages[1].backend(), BackendKind::Local);
    }

    #[test]
    fn test_deployment_stage_accepts_camel_case_image() {
        let yaml = r#"
name: deploy
stages:
  - name: rollout
    type: k8s
    target: api
    newImage: "registry/api:1.2"
"#;
        let def = PipelineDefinition::from_yaml(yaml).unwrap();
        assert_eq!(
            def.stages[0].kind,
            StageKind::Deployment {
                target: "api".to_string(),
                new_image: "registry/api:1.2".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_stage_list_is_valid() {
        let def = PipelineDefinition::from_yaml("name: nothing\nstages: []\n").unwrap();
        assert!(def.stages.is_empty());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(matches!(
            PipelineDefinition::from_yaml("- just\n- a list\n"),
            Err(DefinitionError::Syntax(_))
        ));
        assert!(matches!(
            PipelineDefinition::from_yaml("name: ci\nstages: 3\n"),
            Err(DefinitionError::Syntax(_))
        ));
        assert!(matches!(
            PipelineDefinition::from_yaml("name: ci\nstages:\n  - name: a\n    script: echo\n"),
            Err(DefinitionError::Syntax(_))
        ));
        assert!(matches!(
            PipelineDefinition::from_yaml("stages: []\n"),
            Err(DefinitionError::Syntax(_))
        ));
    }

    #[test]
    fn test_rejects_missing_backend_fields() {
        let missing_image = "name: ci\nstages:\n  - { name: b, type: docker, script: [\"make\"] }\n";
        match PipelineDefinition::from_yaml(missing_image) {
            Err(DefinitionError::InvalidStage { stage, reason }) => {
                assert_eq!(stage, "b");
                assert!(reason.contains("image"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let missing_target = "name: ci\nstages:\n  - { name: d, type: kubernetes, new_image: x }\n";
        assert!(matches!(
            PipelineDefinition::from_yaml(missing_target),
            Err(DefinitionError::InvalidStage { .. })
        ));

        let missing_script = "name: ci\nstages:\n  - { name: l, type: local }\n";
        assert!(matches!(
            PipelineDefinition::from_yaml(missing_script),
            Err(DefinitionError::InvalidStage { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_type_and_blank_commands() {
        let unknown = "name: ci\nstages:\n  - { name: x, type: lambda, script: [\"a\"] }\n";
        assert!(matches!(
            PipelineDefinition::from_yaml(unknown),
            Err(DefinitionError::InvalidStage { .. })
        ));

        let blank = "name: ci\nstages:\n  - { name: x, script: [\"a\", \"  \"] }\n";
        assert!(matches!(
            PipelineDefinition::from_yaml(blank),
            Err(DefinitionError::InvalidStage { .. })
        ));
    }
}
