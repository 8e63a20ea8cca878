//! Path-addressable JSON tree shared by the store backends.
//!
//! Paths are `/`-separated keys, leading and trailing slashes ignored; the
//! empty path is the root. Writing `null` removes the key. Missing
//! intermediate objects are created on write.

use serde_json::{Map, Value};

use crate::error::StoreError;

pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Debug, Clone, Default)]
pub(crate) struct JsonTree {
    root: Value,
}

impl JsonTree {
    pub(crate) fn new(root: Value) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> &Value {
        &self.root
    }

    pub(crate) fn get(&self, path: &str) -> Option<&Value> {
        segments(path)
            .into_iter()
            .try_fold(&self.root, |node, key| node.get(key))
            .filter(|v| !v.is_null())
    }

    pub(crate) fn set(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        let keys = segments(path);
        let Some((last, parents)) = keys.split_last() else {
            self.root = value;
            return Ok(());
        };

        let parent = Self::walk_mut(&mut self.root, parents, path)?;
        if value.is_null() {
            parent.remove(*last);
        } else {
            parent.insert((*last).to_string(), value);
        }
        Ok(())
    }

    pub(crate) fn update(&mut self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let keys = segments(path);
        let target = Self::walk_mut(&mut self.root, &keys, path)?;
        for (key, value) in fields {
            if value.is_null() {
                target.remove(&key);
            } else {
                target.insert(key, value);
            }
        }
        Ok(())
    }

    /// Descend to the object at `keys`, creating empty objects where absent.
    fn walk_mut<'a>(
        mut node: &'a mut Value,
        keys: &[&str],
        path: &str,
    ) -> Result<&'a mut Map<String, Value>, StoreError> {
        for key in keys {
            if node.is_null() {
                *node = Value::Object(Map::new());
            }
            let map = node.as_object_mut().ok_or_else(|| StoreError::InvalidPath {
                path: path.to_string(),
                reason: "descends through a non-object value",
            })?;
            node = map
                .entry((*key).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        node.as_object_mut().ok_or_else(|| StoreError::InvalidPath {
            path: path.to_string(),
            reason: "target is not an object",
        })
    }
}
