//! Builds the reply forest for one blog post from its flat comment list.
//!
//! Nodes are addressed by index into the input (an arena); each index owns a
//! list of child indices. The owned nested output is materialized bottom-up
//! without recursion. Nesting is capped at `max_depth`: anything deeper hangs
//! off its ancestor at that depth, so serializing the forest stays shallow.

use std::collections::HashMap;

use serde::Serialize;

/// Anything that sits in a self-referential parent/child list.
pub trait Threaded {
    fn id(&self) -> &str;
    fn parent_id(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub replies: Vec<ThreadNode<T>>,
}

impl<T> Drop for ThreadNode<T> {
    // Unlink descendants onto a heap stack so long chains drop iteratively.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Assemble `items` (already in display order) into a forest.
///
/// Roots are the items without a parent. An item whose parent is not in
/// `items` is an orphan and is dropped along with its own replies; items that
/// only reach each other through a cycle are dropped the same way. Sibling
/// order follows input order at every level.
///
/// Roots sit at depth 0 and replies at most at `max_depth` (at least 1). A
/// reply that would land deeper is attached to its ancestor at
/// `max_depth - 1` instead, after the replies that precede it in thread
/// order.
pub fn assemble<T: Threaded>(items: Vec<T>, max_depth: usize) -> Vec<ThreadNode<T>> {
    let n = items.len();

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (i, item) in items.iter().enumerate() {
        index.entry(item.id()).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match item.parent_id() {
            None => roots.push(i),
            Some(parent) => {
                if let Some(&p) = index.get(parent) {
                    if p != i {
                        children[p].push(i);
                    }
                }
            }
        }
    }
    drop(index);

    // Pre-order walk from the roots; only reachable indices are visited.
    // Each entry carries its depth and the node it will be rendered under.
    let mut placed: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize, Option<usize>)> =
        roots.iter().rev().map(|&r| (r, 0, None)).collect();
    while let Some((i, depth, anchor)) = stack.pop() {
        order.push(i);
        if let Some(a) = anchor {
            placed[a].push(i);
        }
        let (child_depth, child_anchor) = if depth < max_depth.max(1) {
            (depth + 1, Some(i))
        } else {
            (depth, anchor)
        };
        stack.extend(
            children[i]
                .iter()
                .rev()
                .map(|&c| (c, child_depth, child_anchor)),
        );
    }
    drop(children);

    // Reverse pre-order sees every placed child before its anchor.
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut built: Vec<Option<ThreadNode<T>>> = (0..n).map(|_| None).collect();
    for &i in order.iter().rev() {
        let replies = placed[i]
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        if let Some(item) = slots[i].take() {
            built[i] = Some(ThreadNode { item, replies });
        }
    }

    roots.into_iter().filter_map(|r| built[r].take()).collect()
}
