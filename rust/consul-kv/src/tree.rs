//! Reconstruction of a directory tree from a flat prefix listing
//!
//! The store itself is flat: `a/b/c` is just a key. Directories exist either
//! as explicit markers (keys ending in `/`, conventionally with an empty
//! value) or implicitly, as prefixes of deeper keys. [build_tree] folds both
//! kinds into the same [TreeNode] shape, so a listing that carries markers
//! for every ancestor reconstructs to exactly the same tree as one that
//! carries none.

use indexmap::IndexMap;

use crate::KeyValueEntry;

/// A child of a [TreeNode]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChild {
    /// A nested directory
    Directory(TreeNode),
    /// A stored entry
    Leaf(KeyValueEntry),
}

impl TreeChild {
    /// The nested directory, if this child is one
    pub fn as_directory(&self) -> Option<&TreeNode> {
        match self {
            TreeChild::Directory(node) => Some(node),
            TreeChild::Leaf(_) => None,
        }
    }

    /// The stored entry, if this child is a leaf
    pub fn as_leaf(&self) -> Option<&KeyValueEntry> {
        match self {
            TreeChild::Leaf(entry) => Some(entry),
            TreeChild::Directory(_) => None,
        }
    }
}

/// A directory in a reconstructed tree.
///
/// Children are keyed by their full path: directories by their
/// slash-terminated prefix (`a/b/`), leaves by the entry key (`a/b/c`).
/// Iteration follows listing order, which the server keeps lexicographic.
/// A directory never holds a value of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    path: String,
    children: IndexMap<String, TreeChild>,
}

impl TreeNode {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            children: IndexMap::new(),
        }
    }

    /// The slash-terminated prefix this directory represents; empty for the root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Children in listing order
    pub fn children(&self) -> &IndexMap<String, TreeChild> {
        &self.children
    }

    /// Look up an immediate child by its full path
    pub fn get(&self, path: &str) -> Option<&TreeChild> {
        self.children.get(path)
    }

    /// Look up an immediate subdirectory by its full path
    pub fn directory(&self, path: &str) -> Option<&TreeNode> {
        self.get(path).and_then(TreeChild::as_directory)
    }

    /// Look up an immediate leaf by its full key
    pub fn leaf(&self, key: &str) -> Option<&KeyValueEntry> {
        self.get(key).and_then(TreeChild::as_leaf)
    }

    /// Whether this directory has no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of immediate children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Find a descendant directory by its path, searching the whole subtree.
    ///
    /// Directory paths are normalized: empty segments are dropped, so the
    /// directory holding `a//b/c` is `a/b/`.
    pub fn find_directory(&self, path: &str) -> Option<&TreeNode> {
        if path == self.path {
            return Some(self);
        }

        self.children
            .values()
            .filter_map(TreeChild::as_directory)
            .find_map(|node| node.find_directory(path))
    }

    /// Find a descendant leaf by its full key, searching the whole subtree
    pub fn find_leaf(&self, key: &str) -> Option<&KeyValueEntry> {
        self.leaf(key).or_else(|| {
            self.children
                .values()
                .filter_map(TreeChild::as_directory)
                .find_map(|node| node.find_leaf(key))
        })
    }

    /// Every leaf below this directory, depth first in listing order
    pub fn leaves(&self) -> Vec<&KeyValueEntry> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a KeyValueEntry>) {
        for child in self.children.values() {
            match child {
                TreeChild::Leaf(entry) => leaves.push(entry),
                TreeChild::Directory(node) => node.collect_leaves(leaves),
            }
        }
    }

    /// Ensure a subdirectory exists at `path` and return it
    fn directory_mut(&mut self, path: &str) -> &mut TreeNode {
        let child = self
            .children
            .entry(path.to_string())
            .or_insert_with(|| TreeChild::Directory(TreeNode::new(path)));

        match child {
            TreeChild::Directory(node) => node,
            // Leaf keys never end in '/', directory keys always do
            TreeChild::Leaf(_) => unreachable!("directory path {path} is held by a leaf"),
        }
    }
}

/// Ensure the chain of directories for every slash-terminated prefix of
/// `prefix` exists below `node`, skipping empty segments and the root
/// segment the chain hangs from. Returns the deepest directory.
fn ensure_ancestors<'a>(
    mut node: &'a mut TreeNode,
    prefix: &str,
    root_segment: &str,
) -> &'a mut TreeNode {
    let mut path = String::with_capacity(prefix.len());

    for segment in prefix.split('/').filter(|segment| !segment.is_empty()) {
        path.push_str(segment);
        path.push('/');

        if path == root_segment {
            continue;
        }

        node = node.directory_mut(&path);
    }

    node
}

/// Rebuild the directory tree implied by a flat prefix listing.
///
/// The listing is consumed and its entries are moved into the tree. Every
/// slash-terminated ancestor of every key exists as a [TreeNode] in the
/// result, whether or not the listing carried an explicit marker for it.
/// Markers contribute structure only; their entries are dropped.
///
/// ```
/// use consul_kv::{build_tree, KeyValueEntry};
/// use indexmap::IndexMap;
///
/// let listing: IndexMap<String, KeyValueEntry> = [
///     KeyValueEntry::new("a", "1"),
///     KeyValueEntry::new("a/b", "2"),
///     KeyValueEntry::new("c/", ""),
/// ]
/// .into_iter()
/// .map(|entry| (entry.key.clone(), entry))
/// .collect();
///
/// let root = build_tree(listing);
///
/// assert_eq!(root.leaf("a").unwrap().value, b"1");
/// assert_eq!(root.directory("a/").unwrap().leaf("a/b").unwrap().value, b"2");
/// assert!(root.directory("c/").unwrap().is_empty());
/// ```
pub fn build_tree(listing: IndexMap<String, KeyValueEntry>) -> TreeNode {
    let mut root = TreeNode::new("");

    for (path, entry) in listing {
        let Some(first_slash) = path.find('/') else {
            root.children.insert(path, TreeChild::Leaf(entry));
            continue;
        };

        let root_segment = &path[..=first_slash];
        let top = root.directory_mut(root_segment);

        if path.ends_with('/') {
            ensure_ancestors(top, &path, root_segment);
            continue;
        }

        // `path` holds a slash, so `rfind` always succeeds
        let parent_end = path.rfind('/').unwrap_or(first_slash);
        let parent = ensure_ancestors(top, &path[..=parent_end], root_segment);
        parent.children.insert(path, TreeChild::Leaf(entry));
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn listing(entries: &[(&str, &str)]) -> IndexMap<String, KeyValueEntry> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), KeyValueEntry::new(*key, *value)))
            .collect()
    }

    fn child_keys(node: &TreeNode) -> Vec<&str> {
        node.children().keys().map(String::as_str).collect()
    }

    #[test]
    fn it_keeps_root_level_keys_as_leaves() {
        let root = build_tree(listing(&[("alpha", "1"), ("beta", "2")]));

        assert_eq!(root.path(), "");
        assert_eq!(child_keys(&root), vec!["alpha", "beta"]);
        assert_eq!(root.leaf("beta").map(|entry| entry.value.clone()), Some(b"2".to_vec()));
    }

    #[test]
    fn it_reconstructs_the_mixed_listing() {
        let root = build_tree(listing(&[("a", "1"), ("a/b", "2"), ("c/", "")]));

        assert_eq!(child_keys(&root), vec!["a", "a/", "c/"]);
        assert_eq!(root.leaf("a").unwrap().value, b"1");

        let a = root.directory("a/").unwrap();
        assert_eq!(a.path(), "a/");
        assert_eq!(child_keys(a), vec!["a/b"]);
        assert_eq!(a.leaf("a/b").unwrap().value, b"2");

        let c = root.directory("c/").unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn it_creates_implicit_intermediate_directories() {
        let root = build_tree(listing(&[("a/b/c/d", "deep")]));

        let a = root.directory("a/").unwrap();
        let b = a.directory("a/b/").unwrap();
        let c = b.directory("a/b/c/").unwrap();

        assert_eq!(child_keys(a), vec!["a/b/"]);
        assert_eq!(child_keys(b), vec!["a/b/c/"]);
        assert_eq!(c.leaf("a/b/c/d").unwrap().value, b"deep");
        assert_eq!(root.find_leaf("a/b/c/d").unwrap().value, b"deep");
        assert_eq!(root.find_directory("a/b/c/").map(TreeNode::path), Some("a/b/c/"));
    }

    #[test]
    fn it_materializes_empty_directories_from_deep_markers() {
        let root = build_tree(listing(&[("x/y/z/", "")]));

        let z = root
            .find_directory("x/y/z/")
            .expect("marker directory exists");
        assert!(z.is_empty());
        assert!(root.directory("x/").unwrap().directory("x/y/").is_some());
        assert!(root.leaves().is_empty());
    }

    #[test]
    fn it_never_stores_a_value_on_a_directory() {
        let root = build_tree(listing(&[("dir/", "ignored"), ("dir/file", "kept")]));

        let dir = root.directory("dir/").unwrap();
        assert_eq!(child_keys(dir), vec!["dir/file"]);
        assert_eq!(root.leaves().len(), 1);
        assert_eq!(root.leaves()[0].value, b"kept");
    }

    #[test]
    fn it_skips_empty_segments() {
        let root = build_tree(listing(&[("a//b", "1")]));

        let a = root.directory("a/").unwrap();
        assert_eq!(child_keys(a), vec!["a//b"]);
    }

    #[test]
    fn it_finds_leaves_under_unnormalized_keys() {
        let root = build_tree(listing(&[("/a/b", "rooted"), ("a//b/c", "doubled")]));

        assert_eq!(root.find_leaf("/a/b").map(|entry| entry.value.clone()), Some(b"rooted".to_vec()));
        assert_eq!(root.find_leaf("a//b/c").map(|entry| entry.value.clone()), Some(b"doubled".to_vec()));

        let slash = root.directory("/").unwrap();
        assert_eq!(slash.find_directory("a/").map(TreeNode::path), Some("a/"));
        assert_eq!(root.find_directory("a/b/").map(|node| child_keys(node)), Some(vec!["a//b/c"]));
        assert_eq!(root.find_leaf("a/b/c"), None);
    }

    #[test]
    fn it_preserves_listing_order_for_siblings() {
        let root = build_tree(listing(&[
            ("app/a", "1"),
            ("app/b/", ""),
            ("app/b/x", "2"),
            ("app/c", "3"),
        ]));

        let app = root.directory("app/").unwrap();
        assert_eq!(child_keys(app), vec!["app/a", "app/b/", "app/c"]);
    }

    #[test]
    fn it_builds_nothing_from_an_empty_listing() {
        assert!(build_tree(IndexMap::new()).is_empty());
    }

    fn key_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "dd"]), 1..5)
            .prop_map(|segments| segments.join("/"))
    }

    fn sorted_listing(keys: &[String]) -> IndexMap<String, KeyValueEntry> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();
        keys.into_iter()
            .map(|key| {
                let entry = KeyValueEntry::new(key.clone(), key.as_bytes().to_vec());
                (key, entry)
            })
            .collect()
    }

    fn with_markers(listing: &IndexMap<String, KeyValueEntry>) -> IndexMap<String, KeyValueEntry> {
        let mut keys: Vec<String> = listing.keys().cloned().collect();
        for key in listing.keys() {
            for (position, _) in key.match_indices('/') {
                keys.push(key[..=position].to_string());
            }
        }
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .map(|key| {
                let entry = listing
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| KeyValueEntry::new(key.clone(), Vec::new()));
                (key, entry)
            })
            .collect()
    }

    proptest! {
        #[test]
        fn every_ancestor_exists_as_a_directory(keys in prop::collection::vec(key_strategy(), 0..20)) {
            let listing = sorted_listing(&keys);
            let root = build_tree(listing.clone());

            for key in listing.keys() {
                for (position, _) in key.match_indices('/') {
                    let ancestor = &key[..=position];
                    prop_assert!(root.find_directory(ancestor).is_some(), "missing {}", ancestor);
                }
                prop_assert_eq!(root.find_leaf(key), listing.get(key));
            }
        }

        #[test]
        fn markers_do_not_change_the_shape(keys in prop::collection::vec(key_strategy(), 0..20)) {
            let implicit = sorted_listing(&keys);
            let explicit = with_markers(&implicit);

            prop_assert_eq!(build_tree(implicit), build_tree(explicit));
        }

        #[test]
        fn reconstruction_is_deterministic(keys in prop::collection::vec(key_strategy(), 0..20)) {
            let listing = sorted_listing(&keys);
            let first = build_tree(listing.clone());
            let second = build_tree(listing);

            prop_assert_eq!(&first, &second);
            let first_order: Vec<&String> = first.children().keys().collect();
            let second_order: Vec<&String> = second.children().keys().collect();
            prop_assert_eq!(first_order, second_order);
        }
    }
}
