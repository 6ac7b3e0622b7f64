//! Build artifacts and the parallel-build fold.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Artifact type reported by the parallel builder.
pub const PARALLEL_BUILD_TYPE: &str = "parallel-build";

/// Location used when more than one sub-artifact exists.
pub const MULTIPLE_LOCATION: &str = "multiple";

/// Version marker used when no sub-artifact exists.
pub const NO_ARTIFACTS_VERSION: &str = "no-artifacts";

/// Artifact as returned by a `build` tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifact {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub timestamp: String,
    pub version: String,
}

impl Artifact {
    /// Stand-in for a successful build whose engine returned no payload.
    ///
    /// It has an empty location and is not counted by
    /// [`AggregateArtifact::fold`].
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "unknown".to_string(),
            ..Default::default()
        }
    }

    /// Whether this artifact points at something produced.
    pub fn is_produced(&self) -> bool {
        !self.location.is_empty()
    }
}

/// Combined artifact of a parallel build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateArtifact {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub timestamp: String,
    pub version: String,
    /// Produced sub-artifacts, in task order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl AggregateArtifact {
    /// Fold sub-artifacts into one.
    ///
    /// - zero produced: location `"."`, version `"no-artifacts"`
    /// - one produced: that artifact's location, version `"1-artifacts"`
    /// - more: location `"multiple"`, version `"<N>-artifacts"`
    pub fn fold(name: impl Into<String>, artifacts: Vec<Artifact>, at: DateTime<Utc>) -> Self {
        let produced: Vec<Artifact> = artifacts.into_iter().filter(Artifact::is_produced).collect();

        let (location, version) = match produced.as_slice() {
            [] => (".".to_string(), NO_ARTIFACTS_VERSION.to_string()),
            [single] => (single.location.clone(), "1-artifacts".to_string()),
            many => (MULTIPLE_LOCATION.to_string(), format!("{}-artifacts", many.len())),
        };

        Self {
            name: name.into(),
            kind: PARALLEL_BUILD_TYPE.to_string(),
            location,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            version,
            artifacts: produced,
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }
}
