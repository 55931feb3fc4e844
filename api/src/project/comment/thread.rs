use std::{
    collections::{HashMap, hash_map::Entry},
    str::FromStr,
};

use serde::Serialize;

/// What to do with a reply whose parent is not among the fetched comments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave the reply out of the tree entirely.
    #[default]
    Drop,
    /// Show the reply as a top-level comment.
    PromoteToRoot,
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(OrphanPolicy::Drop),
            "promote" => Ok(OrphanPolicy::PromoteToRoot),
            other => Err(format!("unknown orphan policy `{other}`")),
        }
    }
}

/// Anything that can be arranged into a reply tree.
pub trait Threadable {
    fn thread_id(&self) -> i64;
    fn parent_thread_id(&self) -> Option<i64>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentTree<T> {
    #[serde(flatten)]
    pub comment: T,
    pub replies: Vec<CommentTree<T>>,
    pub depth: usize,
}

// Dropping a long reply chain through the generated drop glue would recurse
// once per level.
impl<T> Drop for CommentTree<T> {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Deepest nesting rendered. A reply below this depth is rendered at it, as
/// a later reply of its nearest ancestor at `MAX_THREAD_DEPTH - 1`, so
/// serializing a tree never recurses deeper than this.
pub const MAX_THREAD_DEPTH: usize = 64;

/// Arranges flat comments into reply trees.
///
/// Siblings keep their input order, so chronologically sorted input yields
/// chronological threads. A comment naming itself as parent is a root.
/// Orphans follow `policy`. The first of several comments sharing an id wins,
/// and comments caught in a parent cycle are left out. Chains deeper than
/// [`MAX_THREAD_DEPTH`] are flattened at that depth.
pub fn build_threads<T: Threadable>(comments: Vec<T>, policy: OrphanPolicy) -> Vec<CommentTree<T>> {
    let n = comments.len();

    // Every id must be known before linking: a reply can precede its parent.
    let mut index: HashMap<i64, usize> = HashMap::with_capacity(n);
    let mut duplicate = vec![false; n];
    for (i, c) in comments.iter().enumerate() {
        match index.entry(c.thread_id()) {
            Entry::Vacant(e) => {
                e.insert(i);
            }
            Entry::Occupied(_) => {
                tracing::warn!(comment_id = c.thread_id(), "duplicate comment id, keeping the first");
                duplicate[i] = true;
            }
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots: Vec<usize> = vec![];
    let mut orphans = 0usize;
    for (i, c) in comments.iter().enumerate() {
        if duplicate[i] {
            continue;
        }

        match c.parent_thread_id() {
            Some(parent_id) if parent_id != c.thread_id() => match index.get(&parent_id) {
                Some(&parent) => children[parent].push(i),
                None => {
                    orphans += 1;
                    match policy {
                        OrphanPolicy::Drop => {
                            tracing::debug!(comment_id = c.thread_id(), parent_id, "dropping orphan reply")
                        }
                        OrphanPolicy::PromoteToRoot => roots.push(i),
                    }
                }
            },
            _ => roots.push(i),
        }
    }

    // Walk the reply graph from the roots with an explicit stack and decide
    // where each comment is rendered. Past the depth cap a reply is hosted by
    // its parent's host instead of its parent.
    let mut depth = vec![0usize; n];
    let mut host: Vec<Option<usize>> = vec![None; n];
    let mut rendered: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut placed = 0usize;
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        placed += 1;
        let (target, child_depth) = match host[i] {
            Some(h) if depth[i] >= MAX_THREAD_DEPTH => (h, MAX_THREAD_DEPTH),
            _ => (i, depth[i] + 1),
        };
        for &child in children[i].iter().rev() {
            depth[child] = child_depth;
            host[child] = Some(target);
            rendered[target].push(child);
            stack.push(child);
        }
    }

    let excluded = n - placed;
    if excluded > 0 {
        tracing::warn!(excluded, orphans, "some comments could not be placed in a thread");
    }

    // Flattened replies arrive out of order; input order is chronological.
    for replies in rendered.iter_mut() {
        replies.sort_unstable();
    }

    // Pre-order over the rendered tree. Parents come before their
    // descendants, so walking it backwards builds children first.
    let mut order: Vec<usize> = Vec::with_capacity(placed);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        order.push(i);
        stack.extend(rendered[i].iter().rev());
    }

    let mut pending: Vec<Option<T>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentTree<T>>> = (0..n).map(|_| None).collect();
    for &i in order.iter().rev() {
        let replies = rendered[i].iter().filter_map(|&c| built[c].take()).collect();
        if let Some(comment) = pending[i].take() {
            built[i] = Some(CommentTree {
                comment,
                replies,
                depth: depth[i],
            });
        }
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}

/// Number of comments across all trees, replies included.
pub fn count_comments<T>(trees: &[CommentTree<T>]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&CommentTree<T>> = trees.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.replies.iter());
    }
    count
}
