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

//! Caller identity and pagination.
//!
//! Token validation and role checks happen at the network edge; by the time
//! a request reaches this library it carries a pre-verified [`Caller`].

use serde::{Deserialize, Serialize};

/// A verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Opaque stable identity string.
    pub id: String,
    /// Whether the caller holds the administrative role. Administrators
    /// may read jobs and results they do not own.
    pub admin: bool,
}

impl Caller {
    /// Creates a regular (non-administrative) caller.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: false,
        }
    }

    /// Creates an administrative caller.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: true,
        }
    }

    /// Returns true if this caller may read records owned by `owner`.
    pub fn can_read(&self, owner: &str) -> bool {
        self.admin || self.id == owner
    }
}

/// Offset pagination for list operations.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
