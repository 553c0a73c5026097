/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Admission filtering for arriving descriptors.
//!
//! Filtering is metadata-only: the decision is a pure function of the
//! descriptor's source location and the configured rules, and no payload
//! is ever fetched to make it. That is the entire reason this stage is
//! cheap and sits before the expensive path.

use serde::{Deserialize, Serialize};

use crate::models::EventDescriptor;

/// One admission rule: a location prefix paired with a suffix.
///
/// Matching is case-sensitive exact string matching, not a pattern
/// language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub path_prefix: String,
    pub suffix: String,
}

impl FilterRule {
    pub fn new(path_prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            suffix: suffix.into(),
        }
    }

    fn matches(&self, location: &str) -> bool {
        location.starts_with(&self.path_prefix) && location.ends_with(&self.suffix)
    }
}

/// An OR-combined set of admission rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSet {
    rules: Vec<FilterRule>,
}

impl FilterSet {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    /// Returns true if the descriptor matches at least one rule.
    ///
    /// An empty rule set admits nothing.
    pub fn admit(&self, descriptor: &EventDescriptor) -> bool {
        admit(descriptor, &self.rules)
    }
}

/// Pure admission decision: the descriptor is admitted iff its source
/// location starts with a rule's prefix and ends with that rule's suffix,
/// for at least one rule.
pub fn admit(descriptor: &EventDescriptor, rules: &[FilterRule]) -> bool {
    rules.iter().any(|rule| rule.matches(&descriptor.location))
}
