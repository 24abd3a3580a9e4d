// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Configuration types for snapshot analysis

use crate::heapdump::Reachability;
use serde::{Deserialize, Serialize};

/// Configuration for building a [`Snapshot`](crate::Snapshot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Weakest reachability of instances counted in allocation site
    /// statistics
    pub retained: Reachability,
    /// Log pass progress through `tracing`
    pub log_progress: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            retained: Reachability::Strong,
            log_progress: false,
        }
    }
}

impl SnapshotConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the weakest reachability counted in site statistics
    pub fn with_retained(mut self, retained: Reachability) -> Self {
        self.retained = retained;
        self
    }

    /// Enable or disable progress logging
    pub fn with_log_progress(mut self, enable: bool) -> Self {
        self.log_progress = enable;
        self
    }
}
