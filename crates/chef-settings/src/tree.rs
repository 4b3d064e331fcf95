//! Recursive settings trees with explicit merge rules
//!
//! A [`SettingsTree`] maps string keys to [`SettingValue`]s, which may be
//! scalars, lists, or nested trees. Two merge operations are provided:
//!
//! - [`SettingsTree::reverse_merge`]: the receiver wins. Only absent keys are
//!   filled in, except `run_list` (concatenated, receiver first) and
//!   `chef_attributes` (reverse-merged recursively).
//! - [`SettingsTree::merge`]: the incoming tree wins. Nested trees are merged
//!   recursively and `run_list` is still concatenated.
//!
//! Both operations fail with [`Error::ConfigurationConflict`] when the same key
//! holds a nested tree on one side and anything else on the other. A failed
//! merge leaves the receiver untouched.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Key holding the ordered run list of role and recipe references.
pub const RUN_LIST_KEY: &str = "run_list";

/// Key holding node attributes handed to the configuration-management runtime.
pub const CHEF_ATTRIBUTES_KEY: &str = "chef_attributes";

/// A single value in a [`SettingsTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<SettingValue>),
    Tree(SettingsTree),
}

impl SettingValue {
    /// Name of this value's shape, as reported in conflict errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Tree(_) => "tree",
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as a float; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SettingValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&SettingsTree> {
        match self {
            Self::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut SettingsTree> {
        match self {
            Self::Tree(tree) => Some(tree),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Tree(tree) => write!(f, "{tree}"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u16> for SettingValue {
    fn from(value: u16) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for SettingValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<SettingsTree> for SettingValue {
    fn from(value: SettingsTree) -> Self {
        Self::Tree(value)
    }
}

impl<T: Into<SettingValue>> From<Vec<T>> for SettingValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SettingValue>, const N: usize> From<[T; N]> for SettingValue {
    fn from(value: [T; N]) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// A mergeable key/value configuration node.
///
/// Keys are kept sorted so that serialized output and iteration are
/// deterministic.
///
/// # Example
///
/// ```
/// use chef_settings::SettingsTree;
///
/// let mut facet = SettingsTree::new().with("instance_type", "m1.small");
/// let cluster = SettingsTree::new()
///     .with("instance_type", "m1.large")
///     .with("region", "us-east-1");
///
/// facet.reverse_merge(&cluster).unwrap();
/// assert_eq!(facet.get("instance_type").unwrap().as_str(), Some("m1.small"));
/// assert_eq!(facet.get("region").unwrap().as_str(), Some("us-east-1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsTree {
    entries: BTreeMap<String, SettingValue>,
}

impl SettingsTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut SettingValue> {
        self.entries.get_mut(key)
    }

    /// Look up a dotted path such as `chef_attributes.nginx.port`.
    pub fn get_path(&self, path: &str) -> Option<&SettingValue> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_tree()?.get(part)?;
        }
        Some(current)
    }

    /// Set a key, returning the previous value if there was one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Option<SettingValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, SettingValue> {
        self.entries.iter()
    }

    /// The ordered run list, or an empty list when none is set.
    pub fn run_list(&self) -> Result<Vec<String>> {
        match self.get(RUN_LIST_KEY) {
            Some(value) => run_list_items(value, RUN_LIST_KEY),
            None => Ok(Vec::new()),
        }
    }

    /// Append a role or recipe reference to the run list.
    pub fn push_run_list(&mut self, item: impl Into<String>) -> Result<()> {
        let entry = self
            .entries
            .entry(RUN_LIST_KEY.to_string())
            .or_insert_with(|| SettingValue::List(Vec::new()));
        match entry {
            SettingValue::List(items) => {
                items.push(SettingValue::String(item.into()));
                Ok(())
            }
            _ => Err(Error::RunListShape {
                path: RUN_LIST_KEY.to_string(),
            }),
        }
    }

    pub fn chef_attributes(&self) -> Option<&SettingsTree> {
        self.get(CHEF_ATTRIBUTES_KEY).and_then(SettingValue::as_tree)
    }

    /// Mutable access to `chef_attributes`, created empty when absent.
    pub fn chef_attributes_mut(&mut self) -> Result<&mut SettingsTree> {
        let entry = self
            .entries
            .entry(CHEF_ATTRIBUTES_KEY.to_string())
            .or_insert_with(|| SettingValue::Tree(SettingsTree::new()));
        let existing = entry.shape();
        match entry {
            SettingValue::Tree(tree) => Ok(tree),
            _ => Err(Error::ConfigurationConflict {
                path: CHEF_ATTRIBUTES_KEY.to_string(),
                existing,
                incoming: "tree",
            }),
        }
    }

    /// Merge `other` into `self`, keeping every value `self` already has.
    ///
    /// - keys absent from `self` are copied from `other`
    /// - `run_list` becomes `self.run_list + other.run_list`
    /// - `chef_attributes` is reverse-merged recursively
    /// - any other key already present is left alone
    pub fn reverse_merge(&mut self, other: &SettingsTree) -> Result<()> {
        let mut merged = self.clone();
        merged.fill_from(other, "", false)?;
        *self = merged;
        Ok(())
    }

    /// Overlay `other` onto `self`; values from `other` win.
    ///
    /// Nested trees merge recursively and `run_list` is concatenated, so
    /// repeated declarations accumulate rather than replace.
    pub fn merge(&mut self, other: &SettingsTree) -> Result<()> {
        let mut merged = self.clone();
        merged.overlay_from(other, "")?;
        *self = merged;
        Ok(())
    }

    fn fill_from(&mut self, other: &SettingsTree, prefix: &str, deep: bool) -> Result<()> {
        let top_level = prefix.is_empty();
        for (key, incoming) in &other.entries {
            let path = join_path(prefix, key);
            match self.entries.get_mut(key) {
                None => {
                    if top_level && key == RUN_LIST_KEY {
                        run_list_items(incoming, &path)?;
                    }
                    self.entries.insert(key.clone(), incoming.clone());
                }
                Some(existing) => {
                    if top_level && key == RUN_LIST_KEY {
                        append_run_list(existing, incoming, &path)?;
                        continue;
                    }
                    ensure_same_kind(existing, incoming, &path)?;
                    let recurse = deep || (top_level && key == CHEF_ATTRIBUTES_KEY);
                    if let (SettingValue::Tree(mine), SettingValue::Tree(theirs)) = (existing, incoming) {
                        if recurse {
                            mine.fill_from(theirs, &path, true)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn overlay_from(&mut self, other: &SettingsTree, prefix: &str) -> Result<()> {
        let top_level = prefix.is_empty();
        for (key, incoming) in &other.entries {
            let path = join_path(prefix, key);
            match self.entries.get_mut(key) {
                None => {
                    if top_level && key == RUN_LIST_KEY {
                        run_list_items(incoming, &path)?;
                    }
                    self.entries.insert(key.clone(), incoming.clone());
                }
                Some(existing) => {
                    if top_level && key == RUN_LIST_KEY {
                        append_run_list(existing, incoming, &path)?;
                        continue;
                    }
                    ensure_same_kind(existing, incoming, &path)?;
                    match (existing, incoming) {
                        (SettingValue::Tree(mine), SettingValue::Tree(theirs)) => {
                            mine.overlay_from(theirs, &path)?;
                        }
                        (existing, incoming) => *existing = incoming.clone(),
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SettingsTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl<'a> IntoIterator for &'a SettingsTree {
    type Item = (&'a String, &'a SettingValue);
    type IntoIter = btree_map::Iter<'a, String, SettingValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<SettingValue>> FromIterator<(K, V)> for SettingsTree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn ensure_same_kind(existing: &SettingValue, incoming: &SettingValue, path: &str) -> Result<()> {
    if existing.is_tree() != incoming.is_tree() {
        return Err(Error::ConfigurationConflict {
            path: path.to_string(),
            existing: existing.shape(),
            incoming: incoming.shape(),
        });
    }
    Ok(())
}

fn run_list_items(value: &SettingValue, path: &str) -> Result<Vec<String>> {
    let shape_error = || Error::RunListShape {
        path: path.to_string(),
    };
    value
        .as_list()
        .ok_or_else(shape_error)?
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(shape_error))
        .collect()
}

fn append_run_list(existing: &mut SettingValue, incoming: &SettingValue, path: &str) -> Result<()> {
    let additions = run_list_items(incoming, path)?;
    run_list_items(existing, path)?;
    match existing {
        SettingValue::List(items) => {
            items.extend(additions.into_iter().map(SettingValue::String));
            Ok(())
        }
        _ => Err(Error::RunListShape {
            path: path.to_string(),
        }),
    }
}
