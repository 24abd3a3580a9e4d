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

//! Shallow and retained sizes

use serde::Serialize;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// A byte count split into bytes on the managed heap and bytes of native
/// memory registered against an instance. Arithmetic saturates at
/// `u64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Size {
    pub java: u64,
    pub registered_native: u64,
}

impl Size {
    pub const ZERO: Size = Size { java: 0, registered_native: 0 };

    pub fn new(java: u64, registered_native: u64) -> Self {
        Self { java, registered_native }
    }

    pub fn total(&self) -> u64 {
        self.java.saturating_add(self.registered_native)
    }

    pub fn is_zero(&self) -> bool {
        self.java == 0 && self.registered_native == 0
    }
}

impl Add for Size {
    type Output = Size;

    fn add(self, other: Size) -> Size {
        Size {
            java: self.java.saturating_add(other.java),
            registered_native: self.registered_native.saturating_add(other.registered_native),
        }
    }
}

impl AddAssign for Size {
    fn add_assign(&mut self, other: Size) {
        *self = *self + other;
    }
}

impl Sum for Size {
    fn sum<I: Iterator<Item = Size>>(iter: I) -> Size {
        iter.fold(Size::ZERO, Add::add)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.registered_native == 0 {
            write!(f, "{}", self.java)
        } else {
            write!(f, "{} ({} + {} native)", self.total(), self.java, self.registered_native)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_arithmetic() {
        let mut size = Size::new(10, 0) + Size::new(5, 3);
        assert_eq!(size, Size::new(15, 3));
        assert_eq!(size.total(), 18);

        size += Size::new(1, 1);
        assert_eq!(size, Size::new(16, 4));
        assert!(!size.is_zero());
        assert!(Size::ZERO.is_zero());
    }

    #[test]
    fn test_size_arithmetic_saturates() {
        let mut size = Size::new(u64::MAX - 1, u64::MAX);
        size += Size::new(8, 1);
        assert_eq!(size, Size::new(u64::MAX, u64::MAX));
        assert_eq!(size.total(), u64::MAX);
    }

    #[test]
    fn test_size_sum() {
        let total: Size = [Size::new(1, 0), Size::new(2, 1), Size::new(3, 2)].into_iter().sum();
        assert_eq!(total, Size::new(6, 3));
    }

    #[test]
    fn test_size_display() {
        assert_eq!(Size::new(42, 0).to_string(), "42");
        assert_eq!(Size::new(42, 8).to_string(), "50 (42 + 8 native)");
    }
}
