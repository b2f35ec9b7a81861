// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tree Builder
//!
//! Assembles nested trees from flat `{id, pid}` records and walks pid links back
//! up to the business root. Ids are strings so that group ids (`"3"`) and
//! host membership ids (`"3_17"`) share one vocabulary without colliding.
//!
//! Traversal buckets nodes by pid into an immutable `pid → [index]` map and
//! tracks consumed buckets in a separate set, so a bucket is never attached
//! twice and cyclic input terminates instead of recursing forever.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// Pid of every business root
pub const ROOT_ID: &str = "0";

/// One flat record: identity, parent link, and whatever the caller carries along
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatNode<T> {
    pub id: String,
    pub pid: String,
    pub payload: T,
}

impl<T> FlatNode<T> {
    pub fn new(id: impl Into<String>, pid: impl Into<String>, payload: T) -> Self {
        Self {
            id: id.into(),
            pid: pid.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode<T> {
    pub id: String,
    pub pid: String,
    pub payload: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    pub fn leaf(node: FlatNode<T>) -> Self {
        Self {
            id: node.id,
            pid: node.pid,
            payload: node.payload,
            children: Vec::new(),
        }
    }
}

/// Build the forest hanging below `root_id`.
///
/// An unknown root yields an empty forest.
pub fn build_tree<'a, T: Clone>(nodes: &'a [FlatNode<T>], root_id: &'a str) -> Vec<TreeNode<T>> {
    let mut buckets: HashMap<&'a str, Vec<usize>> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        buckets.entry(node.pid.as_str()).or_default().push(index);
    }

    let mut consumed: HashSet<&'a str> = HashSet::new();
    attach_children(nodes, &buckets, root_id, &mut consumed)
}

fn attach_children<'a, T: Clone>(
    nodes: &'a [FlatNode<T>],
    buckets: &HashMap<&'a str, Vec<usize>>,
    pid: &'a str,
    consumed: &mut HashSet<&'a str>,
) -> Vec<TreeNode<T>> {
    if !consumed.insert(pid) {
        return Vec::new();
    }
    let Some(indices) = buckets.get(pid) else {
        return Vec::new();
    };

    indices
        .iter()
        .map(|&index| {
            let node = &nodes[index];
            TreeNode {
                id: node.id.clone(),
                pid: node.pid.clone(),
                payload: node.payload.clone(),
                children: attach_children(nodes, buckets, node.id.as_str(), consumed),
            }
        })
        .collect()
}

/// Ancestors of `node`, root first, excluding the node itself.
///
/// `lookup` resolves a parent id to its record. The walk stops at a business
/// root (pid `"0"`), at a missing parent, or when a parent repeats.
pub fn ancestor_path<T, F>(node: &FlatNode<T>, lookup: &F) -> Vec<FlatNode<T>>
where
    T: Clone,
    F: Fn(&str) -> Option<FlatNode<T>>,
{
    collect_ancestors(node, lookup, Vec::new())
}

fn collect_ancestors<T, F>(node: &FlatNode<T>, lookup: &F, mut acc: Vec<FlatNode<T>>) -> Vec<FlatNode<T>>
where
    T: Clone,
    F: Fn(&str) -> Option<FlatNode<T>>,
{
    if node.pid == ROOT_ID {
        acc.reverse();
        return acc;
    }

    match lookup(&node.pid) {
        Some(parent) if parent.id != node.id && !acc.iter().any(|a| a.id == parent.id) => {
            acc.push(parent.clone());
            collect_ancestors(&parent, lookup, acc)
        }
        _ => {
            acc.reverse();
            acc
        }
    }
}

/// Nest `leaves` under a root-first ancestor chain.
///
/// An empty chain returns the leaves as roots.
pub fn graft<T>(path: Vec<FlatNode<T>>, leaves: Vec<TreeNode<T>>) -> Vec<TreeNode<T>> {
    path.into_iter().rev().fold(leaves, |children, ancestor| {
        vec![TreeNode {
            id: ancestor.id,
            pid: ancestor.pid,
            payload: ancestor.payload,
            children,
        }]
    })
}

/// Pre-order `(id, pid)` pairs of a forest
pub fn flatten<T>(forest: &[TreeNode<T>]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for node in forest {
        flatten_into(node, &mut out);
    }
    out
}

fn flatten_into<T>(node: &TreeNode<T>, out: &mut Vec<(String, String)>) {
    out.push((node.id.clone(), node.pid.clone()));
    for child in &node.children {
        flatten_into(child, out);
    }
}

/// Composite id for a (group, host) membership node
pub fn membership_id(group_id: impl std::fmt::Display, host_id: impl std::fmt::Display) -> String {
    format!("{group_id}_{host_id}")
}
