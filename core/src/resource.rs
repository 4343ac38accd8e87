//! The three server-owned resource kinds and what the generic screen needs
//! to know about each of them.
//!
//! # Design
//! [`Resource`] ties a record type to its cache key, REST path, form draft,
//! card rendering and display nouns. The screen, cache and client are written
//! once against this trait instead of once per resource.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{Collection, QueryCache};
use crate::error::ScreenError;
use crate::screen::{ResourceScreen, Screens};
use crate::types::{
    BuildingType, BuildingTypeDraft, Id, Material, MaterialDraft, Project, ProjectDraft,
};

/// Identifies one cached collection. One key per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    BuildingTypes,
    Materials,
    Projects,
}

impl CacheKey {
    pub const ALL: [CacheKey; 3] = [CacheKey::BuildingTypes, CacheKey::Materials, CacheKey::Projects];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheKey::BuildingTypes => "buildingTypes",
            CacheKey::Materials => "materials",
            CacheKey::Projects => "projects",
        }
    }

    /// Collection path on the backend, without a leading slash.
    pub fn path(self) -> &'static str {
        match self {
            CacheKey::BuildingTypes => "building-types",
            CacheKey::Materials => "materials",
            CacheKey::Projects => "projects",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKey {
    type Err = String;

    /// Accepts both the cache key and the REST path spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.path() == s)
            .ok_or_else(|| format!("unknown resource '{s}' (expected building-types, materials or projects)"))
    }
}

/// How a form field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Multiline,
    Number,
    /// Pick a record id from another cached collection.
    Select(CacheKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// JSON field name of the draft.
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

/// One choice of a select field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Editable subset of a record, mirrored into local state while a dialog is
/// open. `Default` is the blank create form.
pub trait FormDraft: Default + Clone + fmt::Debug + Serialize {
    fn schema() -> &'static [FieldSpec];

    /// Current value of `field`, formatted for an input box.
    fn get(&self, field: &str) -> Option<String>;

    fn set(&mut self, field: &str, value: &str) -> Result<(), ScreenError>;
}

/// Read-only rendering of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: Id,
    pub title: String,
    pub lines: Vec<String>,
    pub badge: Option<String>,
}

/// A server-owned record kind exposed over REST.
pub trait Resource: DeserializeOwned + Clone + fmt::Debug + 'static {
    type Draft: FormDraft + for<'a> From<&'a Self>;

    const KEY: CacheKey;
    /// Lower-case singular, used in prompts: "building type".
    const NOUN: &'static str;
    /// Title-case singular, used in dialog titles: "Building Type".
    const TITLE: &'static str;
    /// Screen heading: "Building Types".
    const HEADING: &'static str;
    /// Label of the per-record action button, if the resource has one.
    const RECORD_ACTION: Option<&'static str> = None;

    fn id(&self) -> &Id;
    fn label(&self) -> &str;
    fn card(&self) -> Card;

    fn collection(cache: &QueryCache) -> &Collection<Self>;
    fn collection_mut(cache: &mut QueryCache) -> &mut Collection<Self>;
    fn screen(screens: &Screens) -> &ResourceScreen<Self>;
    fn screen_mut(screens: &mut Screens) -> &mut ResourceScreen<Self>;
}

fn parse_number(field: &str, value: &str) -> Result<f64, ScreenError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ScreenError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Format an amount with thousands separators and at most three decimals.
pub fn format_amount(value: f64) -> String {
    let rounded = format!("{:.3}", value.abs());
    let (int, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac = frac.trim_end_matches('0');

    let mut out = String::with_capacity(rounded.len() + int.len() / 3 + 1);
    if value < 0.0 {
        out.push('-');
    }
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

// ---------------------------------------------------------------------------
// Building types
// ---------------------------------------------------------------------------

const BUILDING_TYPE_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "name", label: "Name", kind: FieldKind::Text },
    FieldSpec { name: "description", label: "Description", kind: FieldKind::Multiline },
    FieldSpec { name: "estimationFormula", label: "Estimation Formula", kind: FieldKind::Multiline },
];

impl FormDraft for BuildingTypeDraft {
    fn schema() -> &'static [FieldSpec] {
        BUILDING_TYPE_FIELDS
    }

    fn get(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "description" => Some(self.description.clone()),
            "estimationFormula" => Some(self.estimation_formula.clone()),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), ScreenError> {
        match field {
            "name" => self.name = value.to_string(),
            "description" => self.description = value.to_string(),
            "estimationFormula" => self.estimation_formula = value.to_string(),
            _ => return Err(ScreenError::UnknownField(field.to_string())),
        }
        Ok(())
    }
}

impl Resource for BuildingType {
    type Draft = BuildingTypeDraft;

    const KEY: CacheKey = CacheKey::BuildingTypes;
    const NOUN: &'static str = "building type";
    const TITLE: &'static str = "Building Type";
    const HEADING: &'static str = "Building Types";

    fn id(&self) -> &Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn card(&self) -> Card {
        Card {
            id: self.id.clone(),
            title: self.name.clone(),
            lines: vec![
                self.description.clone(),
                format!("Formula: {}", self.estimation_formula),
            ],
            badge: None,
        }
    }

    fn collection(cache: &QueryCache) -> &Collection<Self> {
        &cache.building_types
    }

    fn collection_mut(cache: &mut QueryCache) -> &mut Collection<Self> {
        &mut cache.building_types
    }

    fn screen(screens: &Screens) -> &ResourceScreen<Self> {
        &screens.building_types
    }

    fn screen_mut(screens: &mut Screens) -> &mut ResourceScreen<Self> {
        &mut screens.building_types
    }
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

const MATERIAL_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "name", label: "Name", kind: FieldKind::Text },
    FieldSpec { name: "unit", label: "Unit", kind: FieldKind::Text },
    FieldSpec { name: "pricePerUnit", label: "Price per Unit", kind: FieldKind::Number },
    FieldSpec { name: "description", label: "Description", kind: FieldKind::Multiline },
];

impl FormDraft for MaterialDraft {
    fn schema() -> &'static [FieldSpec] {
        MATERIAL_FIELDS
    }

    fn get(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "unit" => Some(self.unit.clone()),
            "pricePerUnit" => Some(self.price_per_unit.to_string()),
            "description" => Some(self.description.clone()),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), ScreenError> {
        match field {
            "name" => self.name = value.to_string(),
            "unit" => self.unit = value.to_string(),
            "pricePerUnit" => self.price_per_unit = parse_number(field, value)?,
            "description" => self.description = value.to_string(),
            _ => return Err(ScreenError::UnknownField(field.to_string())),
        }
        Ok(())
    }
}

impl Resource for Material {
    type Draft = MaterialDraft;

    const KEY: CacheKey = CacheKey::Materials;
    const NOUN: &'static str = "material";
    const TITLE: &'static str = "Material";
    const HEADING: &'static str = "Materials";

    fn id(&self) -> &Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn card(&self) -> Card {
        Card {
            id: self.id.clone(),
            title: self.name.clone(),
            lines: vec![
                format!("{} - ${}", self.unit, self.price_per_unit),
                self.description.clone(),
            ],
            badge: None,
        }
    }

    fn collection(cache: &QueryCache) -> &Collection<Self> {
        &cache.materials
    }

    fn collection_mut(cache: &mut QueryCache) -> &mut Collection<Self> {
        &mut cache.materials
    }

    fn screen(screens: &Screens) -> &ResourceScreen<Self> {
        &screens.materials
    }

    fn screen_mut(screens: &mut Screens) -> &mut ResourceScreen<Self> {
        &mut screens.materials
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

const PROJECT_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "name", label: "Name", kind: FieldKind::Text },
    FieldSpec { name: "description", label: "Description", kind: FieldKind::Multiline },
    FieldSpec {
        name: "buildingTypeId",
        label: "Building Type",
        kind: FieldKind::Select(CacheKey::BuildingTypes),
    },
    FieldSpec { name: "area", label: "Area (m²)", kind: FieldKind::Number },
];

impl FormDraft for ProjectDraft {
    fn schema() -> &'static [FieldSpec] {
        PROJECT_FIELDS
    }

    fn get(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "description" => Some(self.description.clone()),
            "buildingTypeId" => Some(self.building_type_id.to_string()),
            "area" => Some(self.area.to_string()),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), ScreenError> {
        match field {
            "name" => self.name = value.to_string(),
            "description" => self.description = value.to_string(),
            "buildingTypeId" => self.building_type_id = Id::new(value.trim()),
            "area" => self.area = parse_number(field, value)?,
            _ => return Err(ScreenError::UnknownField(field.to_string())),
        }
        Ok(())
    }
}

impl Resource for Project {
    type Draft = ProjectDraft;

    const KEY: CacheKey = CacheKey::Projects;
    const NOUN: &'static str = "project";
    const TITLE: &'static str = "Project";
    const HEADING: &'static str = "Projects";
    const RECORD_ACTION: Option<&'static str> = Some("Calculate Estimate");

    fn id(&self) -> &Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn card(&self) -> Card {
        let mut lines = vec![self.description.clone(), format!("Area: {} m²", self.area)];
        // A zero estimate is treated as "not estimated yet".
        if let Some(cost) = self.estimated_cost.filter(|c| *c != 0.0) {
            lines.push(format!("Estimated Cost: ${}", format_amount(cost)));
        }
        Card {
            id: self.id.clone(),
            title: self.name.clone(),
            lines,
            badge: Some(self.status.label().to_string()),
        }
    }

    fn collection(cache: &QueryCache) -> &Collection<Self> {
        &cache.projects
    }

    fn collection_mut(cache: &mut QueryCache) -> &mut Collection<Self> {
        &mut cache.projects
    }

    fn screen(screens: &Screens) -> &ResourceScreen<Self> {
        &screens.projects
    }

    fn screen_mut(screens: &mut Screens) -> &mut ResourceScreen<Self> {
        &mut screens.projects
    }
}
