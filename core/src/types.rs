//! Domain DTOs for the estimator API.
//!
//! # Design
//! Records are server-owned; the client only ever holds transient copies.
//! Each record has a matching `*Draft` type that doubles as the request
//! payload for both create and update (the backend replaces the whole record).
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch any schema drift between the two crates.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned record identifier. Opaque to the client: compared,
/// echoed back in paths and payloads, never interpreted.
///
/// Serializes as a string. Deserializes from a string or an integer, so
/// backends with numeric keys work unchanged. The empty id stands for
/// "not chosen yet" in drafts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<&str> for Id {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(d)? {
            Raw::Text(s) => Id(s),
            Raw::Unsigned(n) => Id(n.to_string()),
            Raw::Signed(n) => Id(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildingType {
    pub id: Id,
    pub name: String,
    pub description: String,
    /// Free text, only meaningful to the backend's estimator.
    pub estimation_formula: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Id,
    pub name: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub building_type_id: Id,
    pub area: f64,
    /// Absent until the backend has run an estimate at least once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    pub status: ProjectStatus,
}

/// Project lifecycle state. Written only by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    InProgress,
    Completed,
}

impl ProjectStatus {
    /// Badge text shown on project cards.
    pub fn label(self) -> &'static str {
        match self {
            ProjectStatus::Pending => "PENDING",
            ProjectStatus::InProgress => "IN PROGRESS",
            ProjectStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
        })
    }
}

/// Create/update payload for a building type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildingTypeDraft {
    pub name: String,
    pub description: String,
    pub estimation_formula: String,
}

/// Create/update payload for a material.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDraft {
    pub name: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub description: String,
}

/// Create/update payload for a project. `status` and `estimatedCost` are
/// deliberately absent: the client never writes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    /// Empty until a building type is picked; serialized as `""` then.
    pub building_type_id: Id,
    pub area: f64,
}

impl From<&BuildingType> for BuildingTypeDraft {
    fn from(r: &BuildingType) -> Self {
        Self {
            name: r.name.clone(),
            description: r.description.clone(),
            estimation_formula: r.estimation_formula.clone(),
        }
    }
}

impl From<&Material> for MaterialDraft {
    fn from(r: &Material) -> Self {
        Self {
            name: r.name.clone(),
            unit: r.unit.clone(),
            price_per_unit: r.price_per_unit,
            description: r.description.clone(),
        }
    }
}

impl From<&Project> for ProjectDraft {
    fn from(r: &Project) -> Self {
        Self {
            name: r.name.clone(),
            description: r.description.clone(),
            building_type_id: r.building_type_id.clone(),
            area: r.area,
        }
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
}

/// Returned by both auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}
