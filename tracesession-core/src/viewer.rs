// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Viewer flavors and pod resource profiles.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Viewer Types
// ============================================================================

/// The trace-viewer backend a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerType {
    /// Perfetto UI backed by a trace_processor shell
    Perfetto,
    /// TraceLens analysis UI
    #[serde(alias = "trace_lens")]
    Tracelens,
}

impl ViewerType {
    pub const ALL: [ViewerType; 2] = [ViewerType::Perfetto, ViewerType::Tracelens];

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "perfetto" => Some(ViewerType::Perfetto),
            "tracelens" | "trace_lens" | "trace-lens" => Some(ViewerType::Tracelens),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerType::Perfetto => "perfetto",
            ViewerType::Tracelens => "tracelens",
        }
    }

    /// Prefix for generated session ids.
    pub fn session_id_prefix(&self) -> &'static str {
        match self {
            ViewerType::Perfetto => "pfs",
            ViewerType::Tracelens => "tls",
        }
    }

    /// Path under which the viewer UI of a ready session is served.
    pub fn ui_path(&self, session_id: &str) -> String {
        format!("/api/v1/{}/sessions/{}/ui/", self.as_str(), session_id)
    }
}

impl fmt::Display for ViewerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Resource Profiles
// ============================================================================

/// Pod sizing tag stored with each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceProfile {
    Small,
    #[default]
    Medium,
    Large,
}

/// Human-facing description of a resource profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProfileInfo {
    pub value: ResourceProfile,
    pub label: String,
    pub description: String,
    pub memory: String,
    pub memory_bytes: u64,
    pub cpu: u32,
    pub is_default: bool,
}

const GIB: u64 = 1024 * 1024 * 1024;

impl ResourceProfile {
    pub const ALL: [ResourceProfile; 3] = [
        ResourceProfile::Small,
        ResourceProfile::Medium,
        ResourceProfile::Large,
    ];

    /// Parse a profile tag. Unknown tags are rejected rather than defaulted.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "small" => Some(ResourceProfile::Small),
            "medium" => Some(ResourceProfile::Medium),
            "large" => Some(ResourceProfile::Large),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceProfile::Small => "small",
            ResourceProfile::Medium => "medium",
            ResourceProfile::Large => "large",
        }
    }

    pub fn memory_bytes(&self) -> u64 {
        match self {
            ResourceProfile::Small => 4 * GIB,
            ResourceProfile::Medium => 8 * GIB,
            ResourceProfile::Large => 16 * GIB,
        }
    }

    pub fn cpu(&self) -> u32 {
        match self {
            ResourceProfile::Small => 1,
            ResourceProfile::Medium => 2,
            ResourceProfile::Large => 4,
        }
    }

    pub fn info(&self) -> ResourceProfileInfo {
        let (label, description) = match self {
            ResourceProfile::Small => ("Small", "Traces under 100 MB"),
            ResourceProfile::Medium => ("Medium", "Traces between 100 MB and 500 MB"),
            ResourceProfile::Large => ("Large", "Traces over 500 MB"),
        };
        ResourceProfileInfo {
            value: *self,
            label: label.to_string(),
            description: description.to_string(),
            memory: format!("{}Gi", self.memory_bytes() / GIB),
            memory_bytes: self.memory_bytes(),
            cpu: self.cpu(),
            is_default: *self == ResourceProfile::default(),
        }
    }
}

impl fmt::Display for ResourceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
