//! CRM field mapping: a closed set of target Lead fields a CRM's source fields
//! may be mapped onto, validated at ingress rather than accepted as a
//! free-form attribute bag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use wireline_core::ids::OrgId;

/// Target fields a mapping entry's value may resolve to. `Metadata`
/// carries the destination key as its payload so one mapping can place
/// several source fields under distinct `metadata.*` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "target")]
pub enum MappingTarget {
    Stage,
    Tags,
    Score,
    Source,
    Metadata { key: String },
}

impl MappingTarget {
    pub fn describe(&self) -> String {
        match self {
            MappingTarget::Stage => "stage".to_string(),
            MappingTarget::Tags => "tags".to_string(),
            MappingTarget::Score => "score".to_string(),
            MappingTarget::Source => "source".to_string(),
            MappingTarget::Metadata { key } => format!("metadata.{key}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrmMapping {
    #[serde(default)]
    pub field_map: HashMap<String, MappingTarget>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Result of applying a mapping to a sample CRM record: the partial Lead
/// fields it would produce, or the source fields it could not place.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MappingPreview {
    pub stage: Option<String>,
    pub tags: Vec<String>,
    pub score: Option<f64>,
    pub source: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub unmapped_fields: Vec<String>,
}

/// Applies `mapping` to `sample` (a flat CRM record), producing the Lead
/// fields it maps onto. Pure — used by both the `/preview` endpoint and
/// the live `/v1/crm/leads/:id` ingestion path so they never disagree.
pub fn apply_mapping(mapping: &CrmMapping, sample: &serde_json::Map<String, serde_json::Value>) -> MappingPreview {
    let mut out = MappingPreview::default();
    for (source_field, value) in sample {
        let Some(target) = mapping.field_map.get(source_field) else {
            out.unmapped_fields.push(source_field.clone());
            continue;
        };
        match target {
            MappingTarget::Stage => {
                if let Some(s) = value.as_str() {
                    out.stage = Some(s.to_string());
                }
            }
            MappingTarget::Tags => match value {
                serde_json::Value::Array(items) => {
                    out.tags.extend(items.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()));
                }
                serde_json::Value::String(s) => out.tags.push(s.clone()),
                _ => {}
            },
            MappingTarget::Score => {
                if let Some(n) = value.as_f64() {
                    out.score = Some(n);
                }
            }
            MappingTarget::Source => {
                if let Some(s) = value.as_str() {
                    out.source = Some(s.to_string());
                }
            }
            MappingTarget::Metadata { key } => {
                out.metadata.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

pub type CrmMappingStore = dashmap::DashMap<OrgId, CrmMapping>;
