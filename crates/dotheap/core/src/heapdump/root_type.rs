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

//! GC root kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of an externally anchored GC root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootType {
    JniGlobal,
    JniLocal,
    JavaFrame,
    NativeStack,
    StickyClass,
    ThreadBlock,
    Monitor,
    Thread,
    InternedString,
    Debugger,
    VmInternal,
    Unknown,
    JniMonitor,
    Finalizing,
}

impl RootType {
    pub const ALL: [RootType; 14] = [
        RootType::JniGlobal,
        RootType::JniLocal,
        RootType::JavaFrame,
        RootType::NativeStack,
        RootType::StickyClass,
        RootType::ThreadBlock,
        RootType::Monitor,
        RootType::Thread,
        RootType::InternedString,
        RootType::Debugger,
        RootType::VmInternal,
        RootType::Unknown,
        RootType::JniMonitor,
        RootType::Finalizing,
    ];

    fn mask(self) -> u16 {
        1 << (self as u16)
    }

    pub fn name(self) -> &'static str {
        match self {
            RootType::JniGlobal => "JNI_GLOBAL",
            RootType::JniLocal => "JNI_LOCAL",
            RootType::JavaFrame => "JAVA_FRAME",
            RootType::NativeStack => "NATIVE_STACK",
            RootType::StickyClass => "STICKY_CLASS",
            RootType::ThreadBlock => "THREAD_BLOCK",
            RootType::Monitor => "MONITOR",
            RootType::Thread => "THREAD",
            RootType::InternedString => "INTERNED_STRING",
            RootType::Debugger => "DEBUGGER",
            RootType::VmInternal => "VM_INTERNAL",
            RootType::Unknown => "UNKNOWN",
            RootType::JniMonitor => "JNI_MONITOR",
            RootType::Finalizing => "FINALIZING",
        }
    }
}

impl fmt::Display for RootType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of root kinds an instance is anchored by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootTypes(u16);

impl RootTypes {
    pub fn insert(&mut self, root_type: RootType) {
        self.0 |= root_type.mask();
    }

    pub fn contains(&self, root_type: RootType) -> bool {
        self.0 & root_type.mask() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = RootType> + '_ {
        RootType::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_types_set() {
        let mut types = RootTypes::default();
        assert!(types.is_empty());

        types.insert(RootType::StickyClass);
        types.insert(RootType::JniGlobal);
        types.insert(RootType::StickyClass);

        assert!(!types.is_empty());
        assert!(types.contains(RootType::JniGlobal));
        assert!(!types.contains(RootType::Thread));
        assert_eq!(types.iter().collect::<Vec<_>>(), vec![RootType::JniGlobal, RootType::StickyClass]);
    }

    #[test]
    fn test_every_root_type_has_a_distinct_mask() {
        let mut types = RootTypes::default();
        for t in RootType::ALL {
            assert!(!types.contains(t));
            types.insert(t);
        }
        assert_eq!(types.iter().count(), RootType::ALL.len());
    }
}
