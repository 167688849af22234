//! Wire format of the task bus.
//!
//! ```json
//! {"task": "generate-cache", "source": "integration/bricks", "target": "compiler",
//!  "data": {"kind": "incremental", "incremental": {"providers": ["bricks"]}}}
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::BusError;

/// Identity of the compiler orchestrator.
pub const COMPILER: &str = "compiler";
/// Broadcast target.
pub const ANY: &str = "any";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    GenerateCache,
    CacheGenerated,
    CodeEditorSaved,
    IntellisenseSaved,
    /// Anything else. Carried through, ignored by consumers.
    Other(String),
}

impl TaskKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GenerateCache => "generate-cache",
            Self::CacheGenerated => "cache-generated",
            Self::CodeEditorSaved => "code-editor.saved.done",
            Self::IntellisenseSaved => "intellisense-saved",
            Self::Other(name) => name,
        }
    }

    /// Signals that generated styles may have changed.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Self::CacheGenerated | Self::CodeEditorSaved | Self::IntellisenseSaved
        )
    }
}

impl From<String> for TaskKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "generate-cache" => Self::GenerateCache,
            "cache-generated" => Self::CacheGenerated,
            "code-editor.saved.done" => Self::CodeEditorSaved,
            "intellisense-saved" => Self::IntellisenseSaved,
            _ => Self::Other(name),
        }
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: TaskKind,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub data: Value,
}

impl TaskEnvelope {
    pub fn new(
        task: TaskKind,
        source: impl Into<String>,
        target: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            task,
            source: source.into(),
            target: target.into(),
            data,
        }
    }

    /// Incremental build request published by an editor integration.
    pub fn generate_cache(builder: &str) -> Self {
        Self::new(
            TaskKind::GenerateCache,
            format!("integration/{builder}"),
            COMPILER,
            json!({ "kind": "incremental", "incremental": { "providers": [builder] } }),
        )
    }

    /// Full rebuild request, e.g. at startup.
    pub fn full_build(source: &str) -> Self {
        Self::new(
            TaskKind::GenerateCache,
            source,
            COMPILER,
            json!({ "kind": "full" }),
        )
    }

    pub fn cache_generated(ready: &CacheReady) -> Self {
        Self::new(
            TaskKind::CacheGenerated,
            COMPILER,
            ANY,
            json!({
                "kind": ready.kind,
                "providers": ready.providers,
                "path": ready.path,
                "hash": ready.hash,
            }),
        )
    }

    pub fn is_for(&self, identity: &str) -> bool {
        self.target == identity || self.target == ANY
    }

    pub fn validate(&self) -> Result<(), BusError> {
        if self.source.is_empty() {
            return Err(BusError::Invalid("envelope has no source".into()));
        }
        if self.target.is_empty() {
            return Err(BusError::Invalid("envelope has no target".into()));
        }
        if self.source == self.target {
            return Err(BusError::Invalid(format!(
                "source and target are both `{}`",
                self.source
            )));
        }
        Ok(())
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    Incremental,
    Full,
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalScope {
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BuildCacheOptions {
    Incremental { incremental: IncrementalScope },
    Full,
}

impl BuildCacheOptions {
    pub fn kind(&self) -> BuildKind {
        match self {
            Self::Incremental { .. } => BuildKind::Incremental,
            Self::Full => BuildKind::Full,
        }
    }

    pub fn providers(&self) -> &[String] {
        match self {
            Self::Incremental { incremental } => &incremental.providers,
            Self::Full => &[],
        }
    }
}

/// `generate-cache` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateCache {
    #[serde(flatten)]
    pub options: BuildCacheOptions,
    /// Encoded design-system volume from the editor, if it sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
}

impl GenerateCache {
    pub fn validate(&self) -> Result<(), BusError> {
        match &self.options {
            BuildCacheOptions::Incremental { incremental } if incremental.providers.is_empty() => {
                Err(BusError::Invalid("incremental build without providers".into()))
            }
            _ => Ok(()),
        }
    }
}

/// `cache-generated` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheReady {
    pub kind: BuildKind,
    pub providers: Vec<String>,
    /// Storage path of the written cache.
    pub path: String,
    /// blake3 hex of the written content.
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_cache_shape() {
        let env = TaskEnvelope::generate_cache("bricks");
        let value: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "task": "generate-cache",
                "source": "integration/bricks",
                "target": "compiler",
                "data": {"kind": "incremental", "incremental": {"providers": ["bricks"]}},
            })
        );
        let request: GenerateCache = env.payload().unwrap();
        assert_eq!(request.options.providers(), ["bricks"]);
        assert!(request.volume.is_none());
        env.validate().unwrap();
    }

    #[test]
    fn test_full_request() {
        let env = TaskEnvelope::from_json(
            r#"{"task":"generate-cache","source":"ui","target":"compiler","data":{"kind":"full","volume":"e30="}}"#,
        )
        .unwrap();
        let request: GenerateCache = env.payload().unwrap();
        assert_eq!(request.options, BuildCacheOptions::Full);
        assert_eq!(request.volume.as_deref(), Some("e30="));

        let startup: GenerateCache = TaskEnvelope::full_build("serve").payload().unwrap();
        assert_eq!(startup.options, BuildCacheOptions::Full);
    }

    #[test]
    fn test_incremental_requires_providers() {
        let request: GenerateCache = serde_json::from_value(
            json!({"kind": "incremental", "incremental": {"providers": []}}),
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_unknown_task_is_kept() {
        let env = TaskEnvelope::from_json(r#"{"task":"ping","source":"a","target":"b"}"#).unwrap();
        assert_eq!(env.task, TaskKind::Other("ping".into()));
        assert_eq!(env.data, Value::Null);
        assert!(env.to_json().unwrap().contains(r#""task":"ping""#));
    }

    #[test]
    fn test_targeting() {
        let env = TaskEnvelope::generate_cache("oxygen");
        assert!(env.is_for(COMPILER));
        assert!(!env.is_for("ui-panel"));
        let ready = CacheReady {
            kind: BuildKind::Full,
            providers: vec![],
            path: "cache/windsync.css".into(),
            hash: "00".into(),
        };
        let broadcast = TaskEnvelope::cache_generated(&ready);
        assert!(broadcast.is_for("ui-panel"));
        assert_eq!(broadcast.payload::<CacheReady>().unwrap(), ready);
    }

    #[test]
    fn test_validate() {
        let mut env = TaskEnvelope::generate_cache("bricks");
        env.source.clear();
        assert!(env.validate().is_err());
        env.source = COMPILER.into();
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_completion_kinds() {
        assert!(TaskKind::CacheGenerated.is_completion());
        assert!(TaskKind::from("intellisense-saved".to_string()).is_completion());
        assert!(!TaskKind::GenerateCache.is_completion());
    }
}
