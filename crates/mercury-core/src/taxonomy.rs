//! Label taxonomy: a tree of checkable labels keyed by dotted path.
//!
//! The backend serves the taxonomy as JSON where a string is a leaf and an
//! object maps a group name to its children (a string, an array or another
//! object):
//!
//! ```json
//! ["consistent", {"extrinsic": ["fact", {"entity": ["person", "place"]}]}]
//! ```
//!
//! yields the paths `consistent`, `extrinsic.fact`, `extrinsic.entity.person`
//! and `extrinsic.entity.place`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::TaxonomyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelNode {
    Leaf(String),
    Group(String, Vec<LabelNode>),
}

impl LabelNode {
    pub fn name(&self) -> &str {
        match self {
            LabelNode::Leaf(name) | LabelNode::Group(name, _) => name,
        }
    }
}

/// Parse the backend's taxonomy JSON.
pub fn parse_taxonomy(value: &Value) -> Result<Vec<LabelNode>, TaxonomyError> {
    let mut nodes = Vec::new();
    collect(value, &mut nodes)?;
    Ok(nodes)
}

fn collect(value: &Value, out: &mut Vec<LabelNode>) -> Result<(), TaxonomyError> {
    match value {
        Value::String(name) => out.push(LabelNode::Leaf(name.clone())),
        Value::Array(items) => {
            for item in items {
                collect(item, out)?;
            }
        }
        Value::Object(map) => {
            for (name, children) in map {
                let mut nested = Vec::new();
                collect(children, &mut nested)?;
                out.push(LabelNode::Group(name.clone(), nested));
            }
        }
        other => return Err(TaxonomyError::Unsupported(other.to_string())),
    }
    Ok(())
}

/// Dotted paths of every leaf, in taxonomy order.
pub fn leaf_paths(nodes: &[LabelNode]) -> Vec<String> {
    let mut paths = Vec::new();
    walk(nodes, "", &mut paths);
    paths
}

fn walk(nodes: &[LabelNode], prefix: &str, paths: &mut Vec<String>) {
    for node in nodes {
        let path = if prefix.is_empty() {
            node.name().to_string()
        } else {
            format!("{prefix}.{}", node.name())
        };
        match node {
            LabelNode::Leaf(_) => paths.push(path),
            LabelNode::Group(_, children) => walk(children, &path, paths),
        }
    }
}

/// Checkbox state for every leaf of a taxonomy.
#[derive(Debug, Clone, Default)]
pub struct LabelStates {
    order: Vec<String>,
    checked: BTreeMap<String, bool>,
}

impl LabelStates {
    pub fn new(nodes: &[LabelNode]) -> Self {
        let order = leaf_paths(nodes);
        let checked = order.iter().map(|p| (p.clone(), false)).collect();
        Self { order, checked }
    }

    /// Set a leaf's state. Returns `false` when `path` names no leaf.
    pub fn set(&mut self, path: &str, on: bool) -> bool {
        match self.checked.get_mut(path) {
            Some(state) => {
                *state = on;
                true
            }
            None => false,
        }
    }

    pub fn toggle(&mut self, path: &str) -> bool {
        let on = !self.is_checked(path);
        self.set(path, on)
    }

    pub fn is_checked(&self, path: &str) -> bool {
        self.checked.get(path).copied().unwrap_or(false)
    }

    /// Checked paths in taxonomy order.
    pub fn selected(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|p| self.is_checked(p))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.checked.values_mut().for_each(|v| *v = false);
    }
}
