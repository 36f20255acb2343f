// Copyright 2026 GattLink Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Advertisement filter matching.
//!
//! A filter set accepts an advertisement when any one of its filters
//! matches; within a filter, every stated dimension must hold.

use uuid::Uuid;

use crate::bluetooth::provider::Advertisement;
use crate::bluetooth::uuids;
use crate::error::BridgeError;
use crate::protocol::FilterSpec;

/// One compiled discovery filter.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    name: Option<String>,
    name_prefix: Option<String>,
    required_services: Vec<Uuid>,
}

impl ScanFilter {
    fn compile(spec: &FilterSpec) -> Result<Self, BridgeError> {
        if spec.manufacturer_data.is_some() {
            return Err(BridgeError::application(
                "filtering on manufacturerData is not supported",
            ));
        }
        if spec.service_data.is_some() {
            return Err(BridgeError::application(
                "filtering on serviceData is not supported",
            ));
        }

        let required_services = spec
            .services
            .iter()
            .map(uuids::parse_arg)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: spec.name.clone().filter(|name| !name.is_empty()),
            name_prefix: spec.name_prefix.clone().filter(|prefix| !prefix.is_empty()),
            required_services,
        })
    }

    fn is_empty(&self) -> bool {
        self.name.is_none() && self.name_prefix.is_none() && self.required_services.is_empty()
    }

    /// Whether an advertisement satisfies every stated dimension.
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        if let Some(name) = &self.name {
            if advertisement.local_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(prefix) = &self.name_prefix {
            match &advertisement.local_name {
                Some(local_name) if local_name.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }
        self.required_services
            .iter()
            .all(|service| advertisement.services.contains(service))
    }

    /// Services this filter requires of every match.
    pub fn required_services(&self) -> &[Uuid] {
        &self.required_services
    }
}

/// A non-empty, ordered collection of filters, matched as a logical OR.
#[derive(Debug, Clone)]
pub struct FilterSet {
    filters: Vec<ScanFilter>,
}

impl FilterSet {
    /// Compile client filter specifications. An empty set, or a set
    /// containing any filter with no usable dimension, is rejected.
    pub fn compile(specs: &[FilterSpec]) -> Result<Self, BridgeError> {
        if specs.is_empty() {
            return Err(BridgeError::invalid_params(
                "discovery requires at least one filter",
            ));
        }
        let filters = specs
            .iter()
            .map(ScanFilter::compile)
            .collect::<Result<Vec<_>, _>>()?;
        if filters.iter().any(ScanFilter::is_empty) {
            return Err(BridgeError::invalid_params(
                "filter must include a name, namePrefix, or services",
            ));
        }
        Ok(Self { filters })
    }

    /// Whether any filter in the set matches the advertisement.
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        self.filters
            .iter()
            .any(|filter| filter.matches(advertisement))
    }

    /// Every service UUID required by any filter in the set.
    pub fn required_services(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.filters
            .iter()
            .flat_map(|filter| filter.required_services().iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::provider::AdvertisementKind;
    use crate::bluetooth::uuids::from_short;
    use crate::error::{CODE_APPLICATION_ERROR, CODE_INVALID_PARAMS};
    use serde_json::json;

    fn specs(value: serde_json::Value) -> Vec<FilterSpec> {
        serde_json::from_value(value).unwrap()
    }

    fn advertisement(name: Option<&str>, services: &[u32]) -> Advertisement {
        Advertisement {
            peripheral: 1,
            local_name: name.map(str::to_string),
            rssi: -60,
            kind: AdvertisementKind::ConnectableUndirected,
            services: services.iter().map(|s| from_short(*s)).collect(),
        }
    }

    #[test]
    fn test_empty_set_rejected() {
        let err = FilterSet::compile(&[]).unwrap_err();
        assert_eq!(err.code(), CODE_INVALID_PARAMS);
    }

    #[test]
    fn test_empty_filter_rejects_whole_set() {
        let err = FilterSet::compile(&specs(json!([{ "name": "Hub" }, {}]))).unwrap_err();
        assert_eq!(err.code(), CODE_INVALID_PARAMS);

        // blank strings count as absent
        let err = FilterSet::compile(&specs(json!([{ "name": "", "namePrefix": "" }]))).unwrap_err();
        assert_eq!(err.code(), CODE_INVALID_PARAMS);
    }

    #[test]
    fn test_unsupported_dimensions_rejected() {
        let err =
            FilterSet::compile(&specs(json!([{ "manufacturerData": { "1": [] } }]))).unwrap_err();
        assert_eq!(err.code(), CODE_APPLICATION_ERROR);

        let err = FilterSet::compile(&specs(json!([{ "serviceData": {} }]))).unwrap_err();
        assert_eq!(err.code(), CODE_APPLICATION_ERROR);
    }

    #[test]
    fn test_name_match_is_exact() {
        let set = FilterSet::compile(&specs(json!([{ "name": "Hub" }]))).unwrap();
        assert!(set.matches(&advertisement(Some("Hub"), &[])));
        assert!(!set.matches(&advertisement(Some("Hub 2"), &[])));
        assert!(!set.matches(&advertisement(None, &[])));
    }

    #[test]
    fn test_name_prefix_match() {
        let set = FilterSet::compile(&specs(json!([{ "namePrefix": "Hub" }]))).unwrap();
        assert!(set.matches(&advertisement(Some("Hub 2"), &[])));
        assert!(!set.matches(&advertisement(Some("My Hub"), &[])));
        assert!(!set.matches(&advertisement(None, &[])));
    }

    #[test]
    fn test_required_services_all_present() {
        let set =
            FilterSet::compile(&specs(json!([{ "services": [0x180f, 0x180d] }]))).unwrap();
        assert!(set.matches(&advertisement(None, &[0x180d, 0x180f, 0x1800])));
        assert!(!set.matches(&advertisement(None, &[0x180f])));
    }

    #[test]
    fn test_filters_are_a_logical_or() {
        let set = FilterSet::compile(&specs(json!([
            { "name": "Hub" },
            { "services": [0x180f] }
        ])))
        .unwrap();
        assert!(set.matches(&advertisement(Some("Hub"), &[])));
        assert!(set.matches(&advertisement(Some("Other"), &[0x180f])));
        assert!(!set.matches(&advertisement(Some("Other"), &[])));
    }

    #[test]
    fn test_dimensions_combine_as_and() {
        let set = FilterSet::compile(&specs(json!([
            { "namePrefix": "Hub", "services": [0x180f] }
        ])))
        .unwrap();
        assert!(set.matches(&advertisement(Some("Hub 2"), &[0x180f])));
        assert!(!set.matches(&advertisement(Some("Hub 2"), &[])));
        assert!(!set.matches(&advertisement(Some("Other"), &[0x180f])));
    }

    #[test]
    fn test_required_services_collection() {
        let set = FilterSet::compile(&specs(json!([
            { "services": [0x180f] },
            { "services": ["180d"], "name": "Hub" }
        ])))
        .unwrap();
        let collected: Vec<_> = set.required_services().collect();
        assert_eq!(collected, vec![from_short(0x180f), from_short(0x180d)]);
    }
}
