//! A nested key/value container addressed by key sequences.
//!
//! Every node of a [`PathTree`] carries its own write-lock flag. A locked node refuses any change
//! to its immediate children: no new keys, no removed keys, no changed values, and no leaf turned
//! into a subtree. Locks don't cascade, so an unlocked node below a locked one is still writable.
//!
//! Two trees can be merged leaf by leaf. The method [`PathTree::merge`] only writes what the
//! caller's policies explicitly permit, while the free function [`merge`] permits everything
//! unless told otherwise. These are separate operations with separate defaults.

use std::fmt;
use std::iter::FusedIterator;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{path_string, Error, Result};

/// A tree node. Children keep the order they were inserted in.
#[derive(Clone, Debug)]
pub struct PathTree<K, V> {
    children: Vec<(K, Child<K, V>)>,
    locked: bool,
}

/// What a key inside a node holds.
#[derive(Clone, Debug, PartialEq)]
pub enum Child<K, V> {
    Leaf(V),
    Tree(PathTree<K, V>),
}

impl<K, V> Child<K, V> {
    pub fn as_leaf(&self) -> Option<&V> {
        match self {
            Child::Leaf(v) => Some(v),
            Child::Tree(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&PathTree<K, V>> {
        match self {
            Child::Leaf(_) => None,
            Child::Tree(t) => Some(t),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Child::Leaf(_))
    }
}

/// Result of a [`PathTree::set`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    /// The value was written.
    Applied,
    /// Nothing was written: a lock or the overwrite/restructure flags forbade it.
    Rejected,
    /// The leaf already held an equal value.
    Unchanged,
}

/// Result of a [`PathTree::remove`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum Removed<K, V> {
    Removed(Child<K, V>),
    /// The parent node is locked, nothing was removed.
    Rejected,
}

/// Decides whether a merge may write one leaf.
///
/// `Decide` receives the leaf's path, the tree being merged into, and the tree being merged from.
pub enum Policy<'a, K, V> {
    AlwaysDeny,
    AlwaysAllow,
    Decide(&'a dyn Fn(&[K], &PathTree<K, V>, &PathTree<K, V>) -> bool),
}

impl<'a, K, V> Policy<'a, K, V> {
    fn permits(&self, path: &[K], mine: &PathTree<K, V>, theirs: &PathTree<K, V>) -> bool {
        match self {
            Policy::AlwaysDeny => false,
            Policy::AlwaysAllow => true,
            Policy::Decide(f) => f(path, mine, theirs),
        }
    }
}

impl<'a, K, V> Clone for Policy<'a, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, V> Copy for Policy<'a, K, V> {}

impl<'a, K, V> From<bool> for Policy<'a, K, V> {
    fn from(allow: bool) -> Self {
        if allow {
            Policy::AlwaysAllow
        } else {
            Policy::AlwaysDeny
        }
    }
}

impl<'a, K, V> fmt::Debug for Policy<'a, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Policy::AlwaysDeny => f.write_str("AlwaysDeny"),
            Policy::AlwaysAllow => f.write_str("AlwaysAllow"),
            Policy::Decide(_) => f.write_str("Decide(..)"),
        }
    }
}

impl<K, V> Default for PathTree<K, V> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            locked: false,
        }
    }
}

impl<K, V> PathTree<K, V>
where
    K: Clone + PartialEq + fmt::Debug,
    V: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of immediate children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether this node's own lock is set.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Immediate child keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.children.iter().map(|(k, _)| k)
    }

    /// Immediate children, in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&K, &Child<K, V>)> {
        self.children.iter().map(|(k, c)| (k, c))
    }

    fn index_of(&self, key: &K) -> Option<usize> {
        self.children.iter().position(|(k, _)| k == key)
    }

    /// Look up an immediate child.
    pub fn child(&self, key: &K) -> Option<&Child<K, V>> {
        self.index_of(key).map(|i| &self.children[i].1)
    }

    /// Look up whatever is stored at `path`. Fails if the path is empty or any segment is missing.
    pub fn get(&self, path: &[K]) -> Result<&Child<K, V>> {
        let (last, parents) = path.split_last().ok_or(Error::InvalidPath)?;
        let mut node = self;
        for (depth, key) in parents.iter().enumerate() {
            node = match node.child(key) {
                Some(Child::Tree(t)) => t,
                _ => {
                    return Err(Error::KeyNotFound {
                        path: path_string(&path[..=depth]),
                    })
                }
            };
        }
        node.child(last).ok_or_else(|| Error::KeyNotFound {
            path: path_string(path),
        })
    }

    /// Look up a leaf value. A subtree at `path` counts as not found.
    pub fn get_leaf(&self, path: &[K]) -> Result<&V> {
        self.get(path)?.as_leaf().ok_or_else(|| Error::KeyNotFound {
            path: path_string(path),
        })
    }

    /// Look up a subtree. A leaf at `path` counts as not found.
    pub fn get_tree(&self, path: &[K]) -> Result<&PathTree<K, V>> {
        self.get(path)?.as_tree().ok_or_else(|| Error::KeyNotFound {
            path: path_string(path),
        })
    }

    pub fn contains(&self, path: &[K]) -> bool {
        self.get(path).is_ok()
    }

    /// Write a leaf, creating intermediate nodes and replacing leaves in the way.
    pub fn set(&mut self, path: &[K], value: V) -> Result<SetOutcome> {
        self.set_with(path, value, true, true)
    }

    /// Write a leaf at `path`.
    ///
    /// Missing intermediate nodes are created. A leaf sitting where the path needs a node is
    /// replaced only if `restructure` is set, and a leaf (or subtree) already at `path` is replaced
    /// only if `overwrite` is set. Writing an equal value is reported as
    /// [`Unchanged`](SetOutcome::Unchanged). If any node whose immediate children would change is
    /// locked, the call is [`Rejected`](SetOutcome::Rejected) and the tree is left untouched.
    pub fn set_with(
        &mut self,
        path: &[K],
        value: V,
        overwrite: bool,
        restructure: bool,
    ) -> Result<SetOutcome> {
        let outcome = self.plan_set(path, &value, overwrite, restructure)?;
        if outcome == SetOutcome::Applied {
            self.apply_set(path, value);
        }
        Ok(outcome)
    }

    // Read-only pass that decides the outcome of a set before anything gets touched.
    fn plan_set(
        &self,
        path: &[K],
        value: &V,
        overwrite: bool,
        restructure: bool,
    ) -> Result<SetOutcome> {
        let (last, parents) = path.split_last().ok_or(Error::InvalidPath)?;
        let mut node = self;
        for key in parents {
            match node.child(key) {
                Some(Child::Tree(t)) => node = t,
                Some(Child::Leaf(_)) if !restructure || node.locked => {
                    return Ok(SetOutcome::Rejected)
                }
                // Everything below here is freshly created and unlocked.
                Some(Child::Leaf(_)) | None if node.locked => return Ok(SetOutcome::Rejected),
                Some(Child::Leaf(_)) | None => return Ok(SetOutcome::Applied),
            }
        }
        Ok(match node.child(last) {
            Some(Child::Leaf(v)) if v == value => SetOutcome::Unchanged,
            _ if node.locked => SetOutcome::Rejected,
            Some(_) if !overwrite => SetOutcome::Rejected,
            _ => SetOutcome::Applied,
        })
    }

    fn apply_set(&mut self, path: &[K], value: V) {
        let (last, parents) = match path.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut node = self;
        for key in parents {
            node = node.descend(key);
        }
        match node.index_of(last) {
            Some(i) => node.children[i].1 = Child::Leaf(value),
            None => node.children.push((last.clone(), Child::Leaf(value))),
        }
    }

    // Step into the subtree at `key`, creating it or replacing a leaf there as needed.
    fn descend(&mut self, key: &K) -> &mut PathTree<K, V> {
        let idx = match self.index_of(key) {
            Some(i) => i,
            None => {
                self.children
                    .push((key.clone(), Child::Tree(PathTree::new())));
                self.children.len() - 1
            }
        };
        let slot = &mut self.children[idx].1;
        if slot.is_leaf() {
            *slot = Child::Tree(PathTree::new());
        }
        match slot {
            Child::Tree(t) => t,
            Child::Leaf(_) => unreachable!("leaf was replaced by a subtree above"),
        }
    }

    /// Remove whatever is stored at `path`, unless its parent node is locked.
    pub fn remove(&mut self, path: &[K]) -> Result<Removed<K, V>> {
        let (last, parents) = path.split_last().ok_or(Error::InvalidPath)?;
        let parent = self.tree_mut(parents).map_err(|_| Error::KeyNotFound {
            path: path_string(path),
        })?;
        let idx = parent.index_of(last).ok_or_else(|| Error::KeyNotFound {
            path: path_string(path),
        })?;
        if parent.locked {
            return Ok(Removed::Rejected);
        }
        Ok(Removed::Removed(parent.children.remove(idx).1))
    }

    // Find the node at `path`. The empty path is this node.
    fn tree_mut(&mut self, path: &[K]) -> Result<&mut PathTree<K, V>> {
        let mut node = self;
        for (depth, key) in path.iter().enumerate() {
            let not_found = || Error::KeyNotFound {
                path: path_string(&path[..=depth]),
            };
            let idx = node.index_of(key).ok_or_else(not_found)?;
            node = match &mut node.children[idx].1 {
                Child::Tree(t) => t,
                Child::Leaf(_) => return Err(not_found()),
            };
        }
        Ok(node)
    }

    /// Lock this node and every node below it.
    pub fn lock_close(&mut self) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.locked = true;
            for (_, child) in node.children.iter_mut() {
                if let Child::Tree(t) = child {
                    stack.push(t);
                }
            }
        }
    }

    /// Unlock only the node at `path`. The empty path is this node.
    pub fn lock_open(&mut self, path: &[K]) -> Result<()> {
        self.tree_mut(path)?.locked = false;
        Ok(())
    }

    /// Lock only the node at `path`. The empty path is this node.
    pub fn lock(&mut self, path: &[K]) -> Result<()> {
        self.tree_mut(path)?.locked = true;
        Ok(())
    }

    /// The lock flag of the deepest node reached by following `path`. Segments past the existing
    /// structure, or past a leaf, are ignored.
    pub fn get_lock(&self, path: &[K]) -> bool {
        let mut node = self;
        for key in path {
            match node.child(key) {
                Some(Child::Tree(t)) => node = t,
                _ => break,
            }
        }
        node.locked
    }

    /// Every entry in the tree, leaves and subtrees, in depth-first insertion order.
    pub fn entries(&self) -> Entries<'_, K, V> {
        Entries {
            path: Vec::new(),
            stack: vec![self.children.iter()],
        }
    }

    /// Full paths of every leaf, in depth-first insertion order.
    pub fn leaves(&self) -> Leaves<'_, K, V> {
        Leaves {
            inner: self.entries(),
        }
    }

    /// Like [`leaves`](Self::leaves), but every path starts with `prefix`. Handy when walking a
    /// subtree and wanting paths relative to the whole tree.
    pub fn leaves_under(&self, prefix: &[K]) -> Leaves<'_, K, V> {
        Leaves {
            inner: Entries {
                path: prefix.to_vec(),
                stack: vec![self.children.iter()],
            },
        }
    }

    /// Merge the leaves of `other` into this tree.
    ///
    /// A leaf missing here is added only if `on_extend` permits it, and a leaf with a different
    /// value is replaced only if `on_overwrite` permits it. `None` means deny for both. Writes
    /// refused by a lock are skipped. Returns the number of leaves written.
    pub fn merge(
        &mut self,
        other: &PathTree<K, V>,
        on_overwrite: Option<Policy<'_, K, V>>,
        on_extend: Option<Policy<'_, K, V>>,
    ) -> usize {
        self.merge_leaves(
            other,
            on_overwrite.unwrap_or(Policy::AlwaysDeny),
            on_extend.unwrap_or(Policy::AlwaysDeny),
        )
    }

    fn merge_leaves(
        &mut self,
        other: &PathTree<K, V>,
        on_overwrite: Policy<'_, K, V>,
        on_extend: Policy<'_, K, V>,
    ) -> usize {
        let mut written = 0;
        for (path, child) in other.entries() {
            let theirs = match child {
                Child::Leaf(v) => v,
                Child::Tree(_) => continue,
            };
            let permit = match self.get(&path) {
                Ok(Child::Leaf(mine)) if mine == theirs => continue,
                Ok(_) => on_overwrite.permits(&path, self, other),
                Err(_) => on_extend.permits(&path, self, other),
            };
            if permit && matches!(self.set(&path, theirs.clone()), Ok(SetOutcome::Applied)) {
                written += 1;
            }
        }
        written
    }
}

impl<K, V> PartialEq for PathTree<K, V>
where
    K: PartialEq,
    V: PartialEq,
{
    /// Trees are equal when they hold the same keys and values. Lock flags and child order are
    /// ignored.
    fn eq(&self, other: &Self) -> bool {
        self.children.len() == other.children.len()
            && self.children.iter().all(|(k, c)| {
                other
                    .children
                    .iter()
                    .find(|(ok, _)| ok == k)
                    .map_or(false, |(_, oc)| oc == c)
            })
    }
}

impl<K, V> FromIterator<(Vec<K>, V)> for PathTree<K, V>
where
    K: Clone + PartialEq + fmt::Debug,
    V: Clone + PartialEq,
{
    fn from_iter<I: IntoIterator<Item = (Vec<K>, V)>>(iter: I) -> Self {
        let mut tree = PathTree::new();
        tree.extend(iter);
        tree
    }
}

/// Each entry goes through [`set`](PathTree::set). Entries under a locked node are skipped. An
/// empty path is a caller bug and trips a debug assertion.
impl<K, V> Extend<(Vec<K>, V)> for PathTree<K, V>
where
    K: Clone + PartialEq + fmt::Debug,
    V: Clone + PartialEq,
{
    fn extend<I: IntoIterator<Item = (Vec<K>, V)>>(&mut self, iter: I) {
        for (path, value) in iter {
            debug_assert!(!path.is_empty(), "tree entries need a non-empty path");
            let _ = self.set(&path, value);
        }
    }
}

impl<K: Serialize, V: Serialize> Serialize for PathTree<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.children.len()))?;
        for (k, c) in self.children.iter() {
            map.serialize_entry(k, c)?;
        }
        map.end()
    }
}

impl<K: Serialize, V: Serialize> Serialize for Child<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Child::Leaf(v) => v.serialize(serializer),
            Child::Tree(t) => t.serialize(serializer),
        }
    }
}

/// Depth-first walk over every entry of a tree. Cloning it restarts from the same position.
#[derive(Clone, Debug)]
pub struct Entries<'a, K, V> {
    path: Vec<K>,
    stack: Vec<std::slice::Iter<'a, (K, Child<K, V>)>>,
}

impl<'a, K: Clone, V> Iterator for Entries<'a, K, V> {
    type Item = (Vec<K>, &'a Child<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.stack.last_mut()?.next();
            match next {
                None => {
                    self.stack.pop();
                    if !self.stack.is_empty() {
                        self.path.pop();
                    }
                }
                Some((key, child)) => {
                    let mut path = self.path.clone();
                    path.push(key.clone());
                    if let Child::Tree(t) = child {
                        self.path.push(key.clone());
                        self.stack.push(t.children.iter());
                    }
                    return Some((path, child));
                }
            }
        }
    }
}

impl<'a, K: Clone, V> FusedIterator for Entries<'a, K, V> {}

/// Lazy walk over every leaf path of a tree. Cloning it restarts from the same position.
#[derive(Clone, Debug)]
pub struct Leaves<'a, K, V> {
    inner: Entries<'a, K, V>,
}

impl<'a, K: Clone, V> Iterator for Leaves<'a, K, V> {
    type Item = Vec<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find(|(_, child)| child.is_leaf())
            .map(|(path, _)| path)
    }
}

impl<'a, K: Clone, V> FusedIterator for Leaves<'a, K, V> {}

/// Paths of either every leaf or every subtree in `tree`.
pub fn paths<K, V>(tree: &PathTree<K, V>, include_leaves: bool) -> Vec<Vec<K>>
where
    K: Clone + PartialEq + fmt::Debug,
    V: Clone + PartialEq,
{
    tree.entries()
        .filter(|(_, child)| child.is_leaf() == include_leaves)
        .map(|(path, _)| path)
        .collect()
}

/// Policies for the free-standing [`merge`] and [`merged`].
pub struct MergeOptions<'a, K, V> {
    pub on_overwrite: Policy<'a, K, V>,
    pub on_extend: Policy<'a, K, V>,
}

impl<'a, K, V> Clone for MergeOptions<'a, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, V> Copy for MergeOptions<'a, K, V> {}

impl<'a, K, V> Default for MergeOptions<'a, K, V> {
    /// Allow both overwriting and extending.
    fn default() -> Self {
        Self {
            on_overwrite: Policy::AlwaysAllow,
            on_extend: Policy::AlwaysAllow,
        }
    }
}

/// Merge `other` into `into` in place. Unlike [`PathTree::merge`], the default options permit
/// every write. Returns the number of leaves written.
pub fn merge<K, V>(
    into: &mut PathTree<K, V>,
    other: &PathTree<K, V>,
    options: MergeOptions<'_, K, V>,
) -> usize
where
    K: Clone + PartialEq + fmt::Debug,
    V: Clone + PartialEq,
{
    into.merge_leaves(other, options.on_overwrite, options.on_extend)
}

/// Like [`merge`], but leaves `base` alone and returns the merged copy.
pub fn merged<K, V>(
    base: &PathTree<K, V>,
    other: &PathTree<K, V>,
    options: MergeOptions<'_, K, V>,
) -> PathTree<K, V>
where
    K: Clone + PartialEq + fmt::Debug,
    V: Clone + PartialEq,
{
    let mut out = base.clone();
    merge(&mut out, other, options);
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    type Tree = PathTree<String, i64>;

    fn p(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn data() -> Vec<(Vec<String>, i64)> {
        vec![
            (p(&["new jersey", "mercer county", "plumbers"]), 3),
            (p(&["new jersey", "mercer county", "programmers"]), 81),
            (p(&["new jersey", "middlesex county", "programmers"]), 81),
            (p(&["new jersey", "middlesex county", "salesmen"]), 62),
            (p(&["new york", "queens county", "plumbers"]), 9),
            (p(&["new york", "queens county", "salesmen"]), 36),
        ]
    }

    fn full() -> Tree {
        data().into_iter().collect()
    }

    // Even entries in one tree, odd entries in the other.
    fn parts() -> (Tree, Tree) {
        let d = data();
        let one = d.iter().step_by(2).cloned().collect();
        let two = d.iter().skip(1).step_by(2).cloned().collect();
        (one, two)
    }

    #[test]
    fn set_then_get() {
        let mut tree = Tree::new();
        assert_eq!(tree.set(&p(&["a", "b"]), 1).unwrap(), SetOutcome::Applied);
        assert_eq!(tree.get_leaf(&p(&["a", "b"])).unwrap(), &1);
        assert!(tree.get(&p(&["a"])).unwrap().as_tree().is_some());
        assert_eq!(tree.set(&p(&["a", "b"]), 1).unwrap(), SetOutcome::Unchanged);

        let before = tree.clone();
        assert_eq!(
            tree.set_with(&p(&["a", "b"]), 2, false, true).unwrap(),
            SetOutcome::Rejected
        );
        assert_eq!(tree, before);
        assert_eq!(tree.get_leaf(&p(&["a", "b"])).unwrap(), &1);
        assert_eq!(tree.set(&p(&["a", "b"]), 2).unwrap(), SetOutcome::Applied);
        assert_eq!(tree.get_leaf(&p(&["a", "b"])).unwrap(), &2);
    }

    #[test]
    fn get_errors() {
        let tree = full();
        assert!(matches!(tree.get(&[]), Err(Error::InvalidPath)));
        assert!(matches!(
            tree.get(&p(&["new jersey", "hudson county"])),
            Err(Error::KeyNotFound { .. })
        ));
        // Walking through a leaf doesn't work.
        assert!(matches!(
            tree.get(&p(&["new york", "queens county", "plumbers", "x"])),
            Err(Error::KeyNotFound { .. })
        ));
        assert!(tree.get_leaf(&p(&["new york"])).is_err());
        assert!(tree.get_tree(&p(&["new york"])).is_ok());
        assert!(matches!(
            Tree::new().set(&[], 1),
            Err(Error::InvalidPath)
        ));
    }

    #[test]
    fn restructure_leaf() {
        let mut tree = Tree::new();
        tree.set(&p(&["a"]), 1).unwrap();
        assert_eq!(
            tree.set_with(&p(&["a", "b"]), 2, true, false).unwrap(),
            SetOutcome::Rejected
        );
        assert_eq!(tree.get_leaf(&p(&["a"])).unwrap(), &1);
        assert_eq!(tree.set(&p(&["a", "b"]), 2).unwrap(), SetOutcome::Applied);
        assert_eq!(tree.get_leaf(&p(&["a", "b"])).unwrap(), &2);
        // And back: a subtree replaced by a leaf needs overwrite.
        assert_eq!(
            tree.set_with(&p(&["a"]), 5, false, true).unwrap(),
            SetOutcome::Rejected
        );
        assert_eq!(tree.set(&p(&["a"]), 5).unwrap(), SetOutcome::Applied);
        assert_eq!(tree.get_leaf(&p(&["a"])).unwrap(), &5);
    }

    #[test]
    fn matches_nested_layout() {
        let tree = full();
        assert_eq!(tree.len(), 2);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "new jersey": {
                    "mercer county": {"plumbers": 3, "programmers": 81},
                    "middlesex county": {"programmers": 81, "salesmen": 62},
                },
                "new york": {"queens county": {"plumbers": 9, "salesmen": 36}},
            })
        );
    }

    #[test]
    fn extend_skips_locked_entries() {
        let mut tree: PathTree<String, i32> = vec![(p(&["a", "b"]), 1)].into_iter().collect();
        tree.lock(&p(&["a"])).unwrap();
        tree.extend(vec![(p(&["a", "c"]), 2), (p(&["d"]), 3)]);
        assert!(!tree.contains(&p(&["a", "c"])));
        assert_eq!(tree.get_leaf(&p(&["d"])).unwrap(), &3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "non-empty path")]
    fn extend_with_empty_path() {
        let mut tree: PathTree<String, i32> = PathTree::new();
        tree.extend(vec![(Vec::new(), 1)]);
    }

    #[test]
    fn locked_node_refuses_changes() {
        let mut tree = full();
        let base = p(&["new jersey", "mercer county"]);
        let with = |extra: &[&str]| {
            let mut path = base.clone();
            path.extend(extra.iter().map(|s| s.to_string()));
            path
        };
        tree.set(&with(&["plumbers", "test"]), 1).unwrap();
        let expected = tree.clone();

        assert!(!tree.get_lock(&base));
        assert!(!tree.get_lock(&with(&["fake"])));
        tree.lock(&base).unwrap();
        assert!(tree.get_lock(&with(&["fake"])));
        assert!(tree.get_lock(&with(&["programmers", "deeper"])));

        // Read-then-write decrement
        let current = *tree.get_leaf(&with(&["programmers"])).unwrap();
        assert_eq!(
            tree.set(&with(&["programmers"]), current - 1).unwrap(),
            SetOutcome::Rejected
        );
        // Extending a leaf into a subtree
        assert_eq!(
            tree.set(&with(&["programmers", "test"]), 1).unwrap(),
            SetOutcome::Rejected
        );
        // New key
        assert_eq!(tree.set(&with(&["welders"]), 1).unwrap(), SetOutcome::Rejected);
        assert_eq!(tree, expected);

        // The unlocked child below still takes writes, and so does the root.
        assert_eq!(
            tree.set(&with(&["plumbers", "test"]), 2).unwrap(),
            SetOutcome::Applied
        );
        assert!(!tree.is_locked());
        assert_eq!(tree.set(&p(&["ohio"]), 1).unwrap(), SetOutcome::Applied);
    }

    #[test]
    fn close_then_open() {
        let mut tree = full();
        tree.lock_close();
        assert!(tree.is_locked());
        for path in paths(&tree, false) {
            assert!(tree.get_tree(&path).unwrap().is_locked());
        }
        for path in paths(&tree, true) {
            assert_eq!(tree.set(&path, -1).unwrap(), SetOutcome::Rejected);
        }
        assert_eq!(tree.set(&p(&["new jersey", "test"]), 1).unwrap(), SetOutcome::Rejected);

        tree.lock_open(&p(&["new jersey"])).unwrap();
        assert_eq!(tree.set(&p(&["new jersey", "test"]), 1).unwrap(), SetOutcome::Applied);
        assert_eq!(tree.set(&p(&["new york", "test"]), 1).unwrap(), SetOutcome::Rejected);
        // Children of the opened node keep their locks.
        assert!(tree.get_lock(&p(&["new jersey", "mercer county"])));
        assert!(tree.is_locked());

        let mut expected = full();
        expected.set(&p(&["new jersey", "test"]), 1).unwrap();
        assert_eq!(tree, expected);
        assert!(tree.lock_open(&p(&["nowhere"])).is_err());
    }

    #[test]
    fn remove_entries() {
        let mut tree = full();
        match tree.remove(&p(&["new york", "queens county", "salesmen"])).unwrap() {
            Removed::Removed(Child::Leaf(v)) => assert_eq!(v, 36),
            other => panic!("Expected a removed leaf, got {:?}", other),
        }
        assert!(!tree.contains(&p(&["new york", "queens county", "salesmen"])));
        assert!(matches!(
            tree.remove(&p(&["new york", "queens county", "salesmen"])),
            Err(Error::KeyNotFound { .. })
        ));
        assert!(matches!(tree.remove(&[]), Err(Error::InvalidPath)));

        tree.lock(&p(&["new jersey"])).unwrap();
        assert_eq!(
            tree.remove(&p(&["new jersey", "middlesex county"])).unwrap(),
            Removed::Rejected
        );
        assert!(tree.contains(&p(&["new jersey", "middlesex county"])));
        // Locks only guard immediate children.
        assert!(matches!(
            tree.remove(&p(&["new jersey", "middlesex county", "salesmen"])).unwrap(),
            Removed::Removed(_)
        ));
    }

    #[test]
    fn leaf_paths_in_order() {
        let tree = full();
        let leaves: Vec<Vec<String>> = tree.leaves().collect();
        let expected: Vec<Vec<String>> = data().into_iter().map(|(path, _)| path).collect();
        assert_eq!(leaves, expected);

        // Restartable: a clone taken midway picks up from the same point.
        let mut iter = tree.leaves();
        iter.next();
        let rest_a: Vec<_> = iter.clone().collect();
        let rest_b: Vec<_> = iter.collect();
        assert_eq!(rest_a, rest_b);
        assert_eq!(rest_a.len(), 5);
        assert_eq!(tree.leaves().count(), 6);
    }

    #[test]
    fn prefixed_leaves() {
        let tree = full();
        let prefix = p(&["new york"]);
        let sub = tree.get_tree(&prefix).unwrap();
        let leaves: Vec<_> = sub.leaves_under(&prefix).collect();
        assert_eq!(
            leaves,
            vec![
                p(&["new york", "queens county", "plumbers"]),
                p(&["new york", "queens county", "salesmen"]),
            ]
        );
    }

    #[test]
    fn subtree_paths() {
        let mut tree = full();
        tree.set(&p(&["empty", "x"]), 0).unwrap();
        tree.remove(&p(&["empty", "x"])).unwrap();
        let subtrees = paths(&tree, false);
        assert_eq!(
            subtrees,
            vec![
                p(&["new jersey"]),
                p(&["new jersey", "mercer county"]),
                p(&["new jersey", "middlesex county"]),
                p(&["new york"]),
                p(&["new york", "queens county"]),
                p(&["empty"]),
            ]
        );
        assert_eq!(paths(&tree, true).len(), 6);
    }

    #[test]
    fn equality_ignores_locks_and_order() {
        let mut forward = full();
        let backward: Tree = data().into_iter().rev().collect();
        assert_eq!(forward, backward);
        forward.lock_close();
        assert_eq!(forward, backward);
        forward.lock_open(&[]).unwrap();
        forward.set(&p(&["x"]), 1).unwrap();
        assert_ne!(forward, backward);
    }

    #[test]
    fn method_merge_denies_by_default() {
        let (mut one, two) = parts();
        let before = one.clone();
        assert_eq!(one.merge(&two, None, None), 0);
        assert_eq!(one, before);
    }

    #[test]
    fn method_merge_with_policies() {
        let (mut one, two) = parts();
        one.merge(&two, None, Some(Policy::AlwaysAllow));
        assert_eq!(one, full());

        // Locked path: programmers can't be added and plumbers can't be overwritten.
        let (mut one, mut two) = parts();
        let mercer = p(&["new jersey", "mercer county"]);
        one.lock(&mercer).unwrap();
        one.merge(&two, Some(Policy::AlwaysAllow), Some(Policy::AlwaysAllow));
        let mut expected = full();
        expected
            .remove(&p(&["new jersey", "mercer county", "programmers"]))
            .unwrap();
        assert_eq!(one, expected);

        two.set(&p(&["new jersey", "mercer county", "plumbers"]), 10).unwrap();
        one.merge(&two, Some(Policy::AlwaysAllow), Some(Policy::AlwaysAllow));
        assert_eq!(one, expected);

        one.lock_open(&mercer).unwrap();
        one.merge(&two, Some(Policy::AlwaysAllow), Some(Policy::AlwaysAllow));
        let mut expected = full();
        expected
            .set(&p(&["new jersey", "mercer county", "plumbers"]), 10)
            .unwrap();
        assert_eq!(one, expected);
    }

    #[test]
    fn decide_policy() {
        let mut mine = full();
        let mut theirs = full();
        theirs.set(&p(&["new york", "queens county", "plumbers"]), 4).unwrap();
        theirs.set(&p(&["new york", "queens county", "salesmen"]), 40).unwrap();

        // Only take values that are larger than ours.
        let larger = |path: &[String], mine: &Tree, theirs: &Tree| {
            mine.get_leaf(path).unwrap() < theirs.get_leaf(path).unwrap()
        };
        assert_eq!(mine.merge(&theirs, Some(Policy::Decide(&larger)), None), 1);
        assert_eq!(
            mine.get_leaf(&p(&["new york", "queens county", "plumbers"])).unwrap(),
            &9
        );
        assert_eq!(
            mine.get_leaf(&p(&["new york", "queens county", "salesmen"])).unwrap(),
            &40
        );
    }

    #[test]
    fn free_merge_allows_by_default() {
        let (one, two) = parts();
        let copy = merged(&one, &two, MergeOptions::default());
        assert_eq!(copy, full());
        // The inputs are untouched.
        assert_eq!(one.leaves().count(), 3);

        let mut in_place = one.clone();
        assert_eq!(merge(&mut in_place, &two, MergeOptions::default()), 3);
        assert_eq!(in_place, full());

        let mut no_extend = one.clone();
        let options = MergeOptions {
            on_extend: Policy::from(false),
            ..MergeOptions::default()
        };
        assert_eq!(merge(&mut no_extend, &two, options), 0);
        assert_eq!(no_extend, one);
    }

    fn arb_tree() -> impl Strategy<Value = Tree> {
        prop::collection::vec(
            (prop::collection::vec("[abc]", 1..4), -3i64..3),
            0..20,
        )
        .prop_map(|items| items.into_iter().collect())
    }

    proptest! {
        #[test]
        fn merge_with_self_is_identity(tree in arb_tree()) {
            let mut merged_tree = tree.clone();
            merged_tree.merge(&tree, Some(Policy::AlwaysAllow), Some(Policy::AlwaysAllow));
            prop_assert_eq!(&merged_tree, &tree);
            let copy = merged(&tree, &tree, MergeOptions::default());
            prop_assert_eq!(copy, tree);
        }

        #[test]
        fn rejected_sets_have_no_side_effects(
            tree in arb_tree(),
            path in prop::collection::vec("[abc]", 1..4),
            value in -3i64..3,
        ) {
            let mut locked = tree.clone();
            locked.lock_close();
            let before = locked.clone();
            let outcome = locked.set(&path, value).unwrap();
            if outcome != SetOutcome::Unchanged {
                prop_assert_eq!(outcome, SetOutcome::Rejected);
            }
            prop_assert_eq!(locked, before);
        }
    }
}
