// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Business Key-Mapper
//!
//! Each business unit describes its hosts with its own raw field names (CSV
//! headers, CMDB attribute keys). A [`BusinessProfile`] renames the raw keys it
//! knows into canonical host attributes; everything else is kept as labeled
//! "others". Profiles live in a [`BusinessProfileRegistry`] built from the
//! `spec.businesses` section of the inventory config, so onboarding a business
//! is a config change.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure translation from raw records to [`HostRecord`]

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::host::{HostRecord, OtherField};

/// A raw host record exactly as it arrived from an import file or CMDB query
pub type RawRecord = HashMap<String, serde_json::Value>;

/// Canonical host attribute a raw key can be mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    Ip,
    Os,
    Site,
    Cabinet,
    MachineTag,
    Description,
}

impl CanonicalField {
    /// Empty values leave optional attributes unset
    fn assign(self, record: &mut HostRecord, value: String) {
        if self != CanonicalField::Name && value.is_empty() {
            return;
        }
        match self {
            CanonicalField::Name => record.name = value,
            CanonicalField::Ip => record.ip = Some(value),
            CanonicalField::Os => record.os = Some(value),
            CanonicalField::Site => record.site = Some(value),
            CanonicalField::Cabinet => record.cabinet = Some(value),
            CanonicalField::MachineTag => record.machine_tag = Some(value),
            CanonicalField::Description => record.description = Some(value),
        }
    }
}

/// Field mapping table for one business unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub business: String,

    /// raw key → canonical field
    #[serde(default)]
    pub fields: BTreeMap<String, CanonicalField>,

    /// raw key → human label for keys that land in "others"
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl BusinessProfile {
    pub fn maps_name(&self) -> bool {
        self.fields.values().any(|f| *f == CanonicalField::Name)
    }

    /// Translate one raw record into canonical form.
    ///
    /// Unknown keys become [`OtherField`]s ordered by key so the output is
    /// stable regardless of the source map's iteration order.
    pub fn map_record(&self, raw: &RawRecord) -> HostRecord {
        let mut record = HostRecord::new(String::new(), self.business.clone());

        let mut keys: Vec<&String> = raw.keys().collect();
        keys.sort();

        for key in keys {
            let value = flatten_value(&raw[key]);
            match self.fields.get(key) {
                Some(field) => field.assign(&mut record, value),
                None => record.others.push(OtherField {
                    label: self.labels.get(key).cloned().unwrap_or_else(|| key.clone()),
                    key: key.clone(),
                    value,
                }),
            }
        }

        record
    }
}

/// Render a raw JSON value as the single string the store keeps.
///
/// Arrays are comma-joined (nested values flattened the same way), strings are
/// taken verbatim, numbers and booleans keep their JSON text, `null` is empty.
pub fn flatten_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Registry of business profiles keyed by business unit
#[derive(Debug, Clone, Default)]
pub struct BusinessProfileRegistry {
    profiles: HashMap<String, BusinessProfile>,
}

impl BusinessProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = BusinessProfile>) -> Self {
        let mut registry = Self::new();
        for profile in profiles {
            registry.register(profile);
        }
        registry
    }

    /// Register or replace a profile
    pub fn register(&mut self, profile: BusinessProfile) {
        self.profiles.insert(profile.business.clone(), profile);
    }

    pub fn contains(&self, business: &str) -> bool {
        self.profiles.contains_key(business)
    }

    pub fn get(&self, business: &str) -> Option<&BusinessProfile> {
        self.profiles.get(business)
    }

    /// Map a single record; `None` when the business has no profile
    pub fn map_record(&self, business: &str, raw: &RawRecord) -> Option<HostRecord> {
        self.get(business).map(|profile| profile.map_record(raw))
    }

    /// Map a whole batch.
    ///
    /// An unregistered business yields an empty batch, never a partial one.
    pub fn map_batch(&self, business: &str, batch: &[RawRecord]) -> Vec<HostRecord> {
        match self.get(business) {
            Some(profile) => batch.iter().map(|raw| profile.map_record(raw)).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payments_profile() -> BusinessProfile {
        BusinessProfile {
            business: "payments".to_string(),
            fields: BTreeMap::from([
                ("hostname".to_string(), CanonicalField::Name),
                ("private_ip".to_string(), CanonicalField::Ip),
                ("os_version".to_string(), CanonicalField::Os),
                ("idc".to_string(), CanonicalField::Site),
            ]),
            labels: BTreeMap::from([("owner".to_string(), "Owner".to_string())]),
        }
    }

    fn raw(value: serde_json::Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_known_keys_are_renamed() {
        let profile = payments_profile();
        let record = profile.map_record(&raw(json!({
            "hostname": "pay-web-01",
            "private_ip": "10.1.0.4",
            "os_version": "CentOS 7.9",
            "idc": "sh-01"
        })));

        assert_eq!(record.name, "pay-web-01");
        assert_eq!(record.business, "payments");
        assert_eq!(record.ip.as_deref(), Some("10.1.0.4"));
        assert_eq!(record.os.as_deref(), Some("CentOS 7.9"));
        assert_eq!(record.site.as_deref(), Some("sh-01"));
        assert!(record.others.is_empty());
    }

    #[test]
    fn test_unknown_keys_become_labeled_others() {
        let profile = payments_profile();
        let record = profile.map_record(&raw(json!({
            "hostname": "pay-web-01",
            "owner": "alice",
            "rack_unit": 12
        })));

        assert_eq!(
            record.others,
            vec![
                OtherField {
                    label: "Owner".to_string(),
                    key: "owner".to_string(),
                    value: "alice".to_string(),
                },
                OtherField {
                    label: "rack_unit".to_string(),
                    key: "rack_unit".to_string(),
                    value: "12".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_multi_valued_fields_are_comma_joined() {
        assert_eq!(flatten_value(&json!(["app-a", "app-b", 3])), "app-a,app-b,3");
        assert_eq!(flatten_value(&json!(null)), "");
        assert_eq!(flatten_value(&json!(true)), "true");
    }

    #[test]
    fn test_unregistered_business_maps_to_nothing() {
        let registry = BusinessProfileRegistry::from_profiles([payments_profile()]);
        let batch = vec![raw(json!({"hostname": "h1"}))];

        assert!(registry.map_batch("logistics", &batch).is_empty());
        assert!(registry.map_record("logistics", &batch[0]).is_none());
        assert_eq!(registry.map_batch("payments", &batch).len(), 1);
    }

    #[test]
    fn test_profile_deserializes_from_yaml() {
        let yaml = r#"
business: payments
fields:
  hostname: name
  asset_tag: machine_tag
labels:
  owner: Owner
"#;
        let profile: BusinessProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.maps_name());
        assert_eq!(profile.fields["asset_tag"], CanonicalField::MachineTag);
    }
}
