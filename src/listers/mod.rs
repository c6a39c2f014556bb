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

//! Read-through cache interface the plugins look objects up in.
//!
//! Plugins only see the [`Lister`] trait. Whatever keeps the cache in sync with
//! the API server lives outside this crate; [`InMemoryStore`] is the
//! implementation used by tests and by embedders that preload objects.

use crate::api::core::{ApiObject, LabelSelector};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListerError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    /// The cache could not answer; callers treat this as an internal failure.
    #[error("lister unavailable: {0}")]
    Unavailable(String),
}

impl ListerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ListerError::NotFound { .. })
    }
}

/// Lister reads objects of one kind. Cluster-scoped kinds use the empty namespace.
pub trait Lister<T>: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> Result<T, ListerError>;

    fn list(&self, selector: &LabelSelector) -> Result<Vec<T>, ListerError>;
}

/// InMemoryStore is a map-backed lister keyed by `namespace/name`.
pub struct InMemoryStore<T> {
    kind: &'static str,
    objects: RwLock<BTreeMap<String, T>>,
}

fn key(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", namespace, name)
    }
}

impl<T: ApiObject + Clone> InMemoryStore<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// A store preloaded with `objects`.
    pub fn with_objects(kind: &'static str, objects: impl IntoIterator<Item = T>) -> Self {
        let map = objects
            .into_iter()
            .map(|obj| {
                let meta = obj.metadata();
                (key(&meta.namespace, &meta.name), obj)
            })
            .collect();
        Self {
            kind,
            objects: RwLock::new(map),
        }
    }

    /// Insert or replace an object.
    pub fn add(&self, obj: T) -> Result<(), ListerError> {
        let meta = obj.metadata();
        let k = key(&meta.namespace, &meta.name);
        self.objects
            .write()
            .map_err(|_| self.poisoned())?
            .insert(k, obj);
        Ok(())
    }

    pub fn delete(&self, namespace: &str, name: &str) -> Result<Option<T>, ListerError> {
        Ok(self
            .objects
            .write()
            .map_err(|_| self.poisoned())?
            .remove(&key(namespace, name)))
    }

    fn poisoned(&self) -> ListerError {
        ListerError::Unavailable(format!("{} store lock poisoned", self.kind))
    }
}

impl<T: ApiObject + Clone> Lister<T> for InMemoryStore<T> {
    fn get(&self, namespace: &str, name: &str) -> Result<T, ListerError> {
        self.objects
            .read()
            .map_err(|_| self.poisoned())?
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ListerError::NotFound {
                kind: self.kind.to_string(),
                name: name.to_string(),
            })
    }

    fn list(&self, selector: &LabelSelector) -> Result<Vec<T>, ListerError> {
        Ok(self
            .objects
            .read()
            .map_err(|_| self.poisoned())?
            .values()
            .filter(|obj| selector.matches(&obj.metadata().labels))
            .cloned()
            .collect())
    }
}
