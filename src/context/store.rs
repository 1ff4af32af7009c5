//! Key-path addressed value store
//!
//! Both the bucket tree and the shared store of a [`ProcessingContext`]
//! are a `Store`: a JSON-like mapping where a value is addressed by a
//! sequence of string segments. Missing intermediate mappings are created on
//! write; reads never create anything except through [`Store::get_or_insert`].
//!
//! [`ProcessingContext`]: super::ProcessingContext

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("key path is empty")]
    EmptyKey,

    #[error("cannot descend into '{0}': value is not a mapping")]
    NotAMapping(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Store {
    root: Map<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Read a value; `None` when any segment is missing or a parent is
    /// not a mapping
    pub fn get<K: AsRef<str>>(&self, keys: &[K]) -> Option<&Value> {
        let (last, parents) = keys.split_last()?;
        let mut map = &self.root;
        for key in parents {
            map = map.get(key.as_ref())?.as_object()?;
        }
        map.get(last.as_ref())
    }

    pub fn get_mut<K: AsRef<str>>(&mut self, keys: &[K]) -> Option<&mut Value> {
        let (last, parents) = keys.split_last()?;
        let mut map = &mut self.root;
        for key in parents {
            map = map.get_mut(key.as_ref())?.as_object_mut()?;
        }
        map.get_mut(last.as_ref())
    }

    /// Return the value at `keys`, inserting `default` first when it is
    /// missing. The inserted value stays visible to later reads.
    pub fn get_or_insert<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        default: Value,
    ) -> Result<&mut Value, StoreError> {
        let (last, parents) = keys.split_last().ok_or(StoreError::EmptyKey)?;
        let map = Self::descend_creating(&mut self.root, parents)?;
        Ok(map.entry(last.as_ref()).or_insert(default))
    }

    /// Write a value, returning the one it replaced
    pub fn set<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        value: Value,
    ) -> Result<Option<Value>, StoreError> {
        let (last, parents) = keys.split_last().ok_or(StoreError::EmptyKey)?;
        let map = Self::descend_creating(&mut self.root, parents)?;
        Ok(map.insert(last.as_ref().to_string(), value))
    }

    /// Remove a value (and everything below it)
    pub fn remove<K: AsRef<str>>(&mut self, keys: &[K]) -> Option<Value> {
        let (last, parents) = keys.split_last()?;
        let mut map = &mut self.root;
        for key in parents {
            map = map.get_mut(key.as_ref())?.as_object_mut()?;
        }
        map.remove(last.as_ref())
    }

    /// List the key paths of every leaf below `prefix` (an empty prefix lists
    /// the whole store). Leaves are non-mapping values.
    pub fn leaf_paths<K: AsRef<str>>(&self, prefix: &[K]) -> Vec<Vec<String>> {
        let base: Vec<String> = prefix.iter().map(|k| k.as_ref().to_string()).collect();
        let mut paths = Vec::new();

        if base.is_empty() {
            Self::collect_leaves(&self.root, &base, &mut paths);
        } else {
            match self.get(prefix) {
                Some(Value::Object(map)) => Self::collect_leaves(map, &base, &mut paths),
                Some(_) => paths.push(base),
                None => {}
            }
        }

        paths
    }

    /// Borrow the whole tree
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    fn descend_creating<'a, K: AsRef<str>>(
        mut map: &'a mut Map<String, Value>,
        parents: &[K],
    ) -> Result<&'a mut Map<String, Value>, StoreError> {
        for key in parents {
            let key = key.as_ref();
            let slot = map
                .entry(key)
                .or_insert_with(|| Value::Object(Map::new()));
            map = match slot {
                Value::Object(inner) => inner,
                _ => return Err(StoreError::NotAMapping(key.to_string())),
            };
        }
        Ok(map)
    }

    fn collect_leaves(map: &Map<String, Value>, base: &[String], out: &mut Vec<Vec<String>>) {
        for (key, value) in map {
            let mut path = base.to_vec();
            path.push(key.clone());
            match value {
                Value::Object(inner) => Self::collect_leaves(inner, &path, out),
                _ => out.push(path),
            }
        }
    }
}
