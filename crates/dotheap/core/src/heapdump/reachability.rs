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

//! Reachability classes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strongly an instance is reachable from the GC roots, strongest
/// first. `Ord` follows declaration order, so "weaker" means "greater".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Strong,
    Soft,
    Finalizer,
    Weak,
    Phantom,
    Unreachable,
}

impl Reachability {
    pub const ALL: [Reachability; 6] = [
        Reachability::Strong,
        Reachability::Soft,
        Reachability::Finalizer,
        Reachability::Weak,
        Reachability::Phantom,
        Reachability::Unreachable,
    ];

    /// True if this is at least as strong as `other`.
    pub fn not_weaker_than(self, other: Reachability) -> bool {
        self <= other
    }

    /// The weaker of the two.
    pub fn weakest(self, other: Reachability) -> Reachability {
        self.max(other)
    }

    pub fn name(self) -> &'static str {
        match self {
            Reachability::Strong => "strong",
            Reachability::Soft => "soft",
            Reachability::Finalizer => "finalizer",
            Reachability::Weak => "weak",
            Reachability::Phantom => "phantom",
            Reachability::Unreachable => "unreachable",
        }
    }

    /// Reachability implied by the `referent` field of an instance of the
    /// given `java.lang.ref` class, if the class is one of the reference
    /// base classes.
    pub fn of_reference_class(class_name: &str) -> Option<Reachability> {
        match class_name {
            "java.lang.ref.PhantomReference" => Some(Reachability::Phantom),
            "java.lang.ref.WeakReference" => Some(Reachability::Weak),
            "java.lang.ref.FinalizerReference" | "java.lang.ref.Finalizer" => Some(Reachability::Finalizer),
            "java.lang.ref.SoftReference" => Some(Reachability::Soft),
            _ => None,
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Reachability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reachability::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown reachability '{s}', expected one of strong, soft, finalizer, weak, phantom, unreachable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_strongest_first() {
        assert!(Reachability::Strong < Reachability::Soft);
        assert!(Reachability::Soft < Reachability::Finalizer);
        assert!(Reachability::Finalizer < Reachability::Weak);
        assert!(Reachability::Weak < Reachability::Phantom);
        assert!(Reachability::Phantom < Reachability::Unreachable);
    }

    #[test]
    fn test_not_weaker_than() {
        assert!(Reachability::Strong.not_weaker_than(Reachability::Soft));
        assert!(Reachability::Soft.not_weaker_than(Reachability::Soft));
        assert!(!Reachability::Weak.not_weaker_than(Reachability::Soft));
    }

    #[test]
    fn test_weakest() {
        assert_eq!(Reachability::Soft.weakest(Reachability::Weak), Reachability::Weak);
        assert_eq!(Reachability::Phantom.weakest(Reachability::Strong), Reachability::Phantom);
    }

    #[test]
    fn test_reference_classes() {
        assert_eq!(Reachability::of_reference_class("java.lang.ref.WeakReference"), Some(Reachability::Weak));
        assert_eq!(Reachability::of_reference_class("java.lang.ref.Finalizer"), Some(Reachability::Finalizer));
        assert_eq!(Reachability::of_reference_class("java.lang.ref.Reference"), None);
        assert_eq!(Reachability::of_reference_class("java.lang.Object"), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("soft".parse::<Reachability>().unwrap(), Reachability::Soft);
        assert_eq!("PHANTOM".parse::<Reachability>().unwrap(), Reachability::Phantom);
        assert!("sometimes".parse::<Reachability>().is_err());
    }
}
