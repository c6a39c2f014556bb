// Copyright 2024 The Kubernetes Authors.
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

//! Base admission handler shared by the shoot plugins.

use super::interfaces::{Interface, Operation};
use std::collections::HashSet;

/// Handler records which operations a plugin reacts to.
///
/// Plugins embed a `Handler` and forward [`Interface::handles`] to it.
#[derive(Debug, Clone, Default)]
pub struct Handler {
    operations: HashSet<Operation>,
}

impl Handler {
    /// Create a handler for the given operations.
    pub fn new(operations: &[Operation]) -> Self {
        Self {
            operations: operations.iter().copied().collect(),
        }
    }

    /// Handler for `Create` and `Update`, which is what every shoot plugin needs.
    pub fn new_create_update() -> Self {
        Self::new(&[Operation::Create, Operation::Update])
    }
}

impl Interface for Handler {
    fn handles(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}
