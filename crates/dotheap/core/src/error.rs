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

//! Error types for heap graph construction

use crate::heapdump::InstanceId;
use thiserror::Error;

/// Errors raised while assembling a heap graph.
///
/// Analysis itself never fails: once a [`HeapGraph`](crate::HeapGraph) has
/// been built, every precondition the passes rely on has been checked.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Instance {0} declared more than once")]
    DuplicateInstance(InstanceId),
    #[error("Instance {0} is referenced but never declared")]
    MissingInstance(InstanceId),
    #[error("Unknown heap: {0}")]
    UnknownHeap(String),
    #[error("Instance {0} does not fit the {1}-slot instance arena")]
    TooManyInstances(InstanceId, usize),
    #[error("Site table is full")]
    TooManySites,
    #[error("Unknown allocation site: {0}")]
    UnknownSite(usize),
    #[error("Instance {0} is not a class object")]
    UnknownClass(InstanceId),
    #[error("Class {0} is its own superclass")]
    CyclicClassHierarchy(InstanceId),
    #[error("Instance {id} has {actual} field values but its class declares {expected}")]
    FieldCountMismatch { id: InstanceId, expected: usize, actual: usize },
    #[error("Malformed graph document: {0}")]
    Document(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GraphError::MissingInstance(InstanceId(0x2a));
        assert_eq!(err.to_string(), "Instance 0x2a is referenced but never declared");

        let err = GraphError::FieldCountMismatch { id: InstanceId(1), expected: 2, actual: 3 };
        assert_eq!(err.to_string(), "Instance 0x1 has 3 field values but its class declares 2");
    }

    #[test]
    fn test_document_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GraphError = parse.into();
        assert!(matches!(err, GraphError::Document(_)));
    }
}
