use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// values are type-erased so one trie can hold mixed value types,
/// a lookup only succeeds when the requested type matches
type ValueRef = Arc<dyn Any + Send + Sync>;
type NodeRef = Arc<TrieNode>;

enum TrieNode {
    Plain {
        children: HashMap<u8, NodeRef>,
    },
    WithValue {
        children: HashMap<u8, NodeRef>,
        value: ValueRef,
    },
}

impl TrieNode {
    fn children(&self) -> &HashMap<u8, NodeRef> {
        match self {
            TrieNode::Plain { children } | TrieNode::WithValue { children, .. } => children,
        }
    }

    fn value(&self) -> Option<&ValueRef> {
        match self {
            TrieNode::Plain { .. } => None,
            TrieNode::WithValue { value, .. } => Some(value),
        }
    }

    fn is_value_node(&self) -> bool {
        matches!(self, TrieNode::WithValue { .. })
    }

    /// same node shape with a replaced child map
    fn with_children(&self, children: HashMap<u8, NodeRef>) -> TrieNode {
        match self {
            TrieNode::Plain { .. } => TrieNode::Plain { children },
            TrieNode::WithValue { value, .. } => TrieNode::WithValue {
                children,
                value: value.clone(),
            },
        }
    }
}

/// immutable key-value map over byte strings, every update returns a new
/// version sharing the untouched subtrees with its predecessor
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<NodeRef>,
}

impl Trie {
    pub fn new() -> Self {
        Trie { root: None }
    }

    /// walk the key byte by byte, the empty key reads the root's value slot
    pub fn get<T: Any>(&self, key: &[u8]) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for ch in key {
            node = node.children().get(ch)?;
        }
        node.value()?.downcast_ref::<T>()
    }

    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let value: ValueRef = Arc::new(value);
        let root = Self::put_node(self.root.as_deref(), key, value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    fn put_node(node: Option<&TrieNode>, key: &[u8], value: ValueRef) -> TrieNode {
        let mut children = node.map(|node| node.children().clone()).unwrap_or_default();
        match key.split_first() {
            // the terminal node becomes a value node, keeping whatever hangs below it
            None => TrieNode::WithValue { children, value },
            Some((&ch, rest)) => {
                let child = children.get(&ch).cloned();
                children.insert(ch, Arc::new(Self::put_node(child.as_deref(), rest, value)));
                match node {
                    Some(node) => node.with_children(children),
                    None => TrieNode::Plain { children },
                }
            }
        }
    }

    pub fn remove(&self, key: &[u8]) -> Trie {
        let root = match &self.root {
            None => None,
            Some(root) => Self::remove_node(root, key),
        };
        Trie { root }
    }

    /// rebuild the path down to the key, dropping nodes that end up with
    /// neither a value nor children; None means the node vanished
    fn remove_node(node: &NodeRef, key: &[u8]) -> Option<NodeRef> {
        match key.split_first() {
            None => {
                if !node.is_value_node() {
                    return Some(node.clone());
                }
                if node.children().is_empty() {
                    return None;
                }
                Some(Arc::new(TrieNode::Plain {
                    children: node.children().clone(),
                }))
            }
            Some((&ch, rest)) => {
                let child = match node.children().get(&ch) {
                    // the key is absent, share the whole subtree as-is
                    None => return Some(node.clone()),
                    Some(child) => child,
                };
                let mut children = node.children().clone();
                match Self::remove_node(child, rest) {
                    Some(new_child) if Arc::ptr_eq(&new_child, child) => {
                        return Some(node.clone())
                    }
                    Some(new_child) => {
                        children.insert(ch, new_child);
                    }
                    None => {
                        children.remove(&ch);
                    }
                }
                if children.is_empty() && !node.is_value_node() {
                    return None;
                }
                Some(Arc::new(node.with_children(children)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_test() {
        let trie = Trie::new();
        let trie = trie.put(b"hello", 233u32);
        assert_eq!(trie.get::<u32>(b"hello"), Some(&233));
        // absent paths and absent terminals both miss
        assert_eq!(trie.get::<u32>(b"hell"), None);
        assert_eq!(trie.get::<u32>(b"helloo"), None);
        // mismatched value types miss instead of panicking
        assert_eq!(trie.get::<String>(b"hello"), None);
    }

    #[test]
    fn overwrite_test() {
        let trie = Trie::new().put(b"key", 1u32);
        let trie = trie.put(b"key", 2u32);
        assert_eq!(trie.get::<u32>(b"key"), Some(&2));
        // overwriting may change the value type
        let trie = trie.put(b"key", "two".to_string());
        assert_eq!(trie.get::<String>(b"key"), Some(&"two".to_string()));
        assert_eq!(trie.get::<u32>(b"key"), None);
    }

    #[test]
    fn versions_are_independent_test() {
        let trie1 = Trie::new().put(b"ab", 1u32);
        let trie2 = trie1.put(b"ab", 2u32);
        let trie3 = trie2.remove(b"ab");
        assert_eq!(trie1.get::<u32>(b"ab"), Some(&1));
        assert_eq!(trie2.get::<u32>(b"ab"), Some(&2));
        assert_eq!(trie3.get::<u32>(b"ab"), None);
    }

    #[test]
    fn remove_keeps_prefix_test() {
        let trie = Trie::new().put(b"ab", 1u32).put(b"abc", 2u32);
        let trie = trie.remove(b"abc");
        // the prefix keeps its value, the removed branch is elided
        assert_eq!(trie.get::<u32>(b"ab"), Some(&1));
        assert_eq!(trie.get::<u32>(b"abc"), None);
        let node = trie.root.as_ref().unwrap().children()[&b'a'].children()[&b'b'].clone();
        assert!(node.is_value_node());
        assert!(node.children().is_empty());
    }

    #[test]
    fn remove_keeps_children_test() {
        let trie = Trie::new().put(b"ab", 1u32).put(b"abc", 2u32);
        let trie = trie.remove(b"ab");
        // the inner node loses its value but keeps the branch below
        assert_eq!(trie.get::<u32>(b"ab"), None);
        assert_eq!(trie.get::<u32>(b"abc"), Some(&2));
    }

    #[test]
    fn remove_absent_key_test() {
        let trie = Trie::new().put(b"ab", 1u32);
        let same = trie.remove(b"xy");
        assert_eq!(same.get::<u32>(b"ab"), Some(&1));
        // a no-op removal shares the entire receiver
        assert!(Arc::ptr_eq(trie.root.as_ref().unwrap(), same.root.as_ref().unwrap()));
    }

    #[test]
    fn empty_key_test() {
        let trie = Trie::new().put(b"a", 1u32);
        // the empty key binds at the root, existing children survive
        let trie = trie.put(b"", 42u32);
        assert_eq!(trie.get::<u32>(b""), Some(&42));
        assert_eq!(trie.get::<u32>(b"a"), Some(&1));
        let trie = trie.remove(b"");
        assert_eq!(trie.get::<u32>(b""), None);
        assert_eq!(trie.get::<u32>(b"a"), Some(&1));
        // removing the last binding leaves an empty trie
        let trie = Trie::new().put(b"", 42u32).remove(b"");
        assert!(trie.root.is_none());
        assert_eq!(trie.get::<u32>(b""), None);
    }

    #[test]
    fn structural_sharing_test() {
        let trie1 = Trie::new().put(b"ab", 1u32).put(b"cd", 2u32);
        let trie2 = trie1.put(b"cx", 3u32);
        // the untouched 'a' branch is the same allocation in both versions
        let branch1 = &trie1.root.as_ref().unwrap().children()[&b'a'];
        let branch2 = &trie2.root.as_ref().unwrap().children()[&b'a'];
        assert!(Arc::ptr_eq(branch1, branch2));
        // the rewritten 'c' branch is not
        let branch1 = &trie1.root.as_ref().unwrap().children()[&b'c'];
        let branch2 = &trie2.root.as_ref().unwrap().children()[&b'c'];
        assert!(!Arc::ptr_eq(branch1, branch2));
    }

    #[test]
    fn non_copyable_value_test() {
        struct Token {
            name: String,
        }
        let trie = Trie::new().put(b"token", Token { name: "tok".to_string() });
        assert_eq!(trie.get::<Token>(b"token").unwrap().name, "tok");
        // rewriting a path through a value node shares the value itself
        let trie = trie.put(b"token-2", Token { name: "tok2".to_string() });
        assert_eq!(trie.get::<Token>(b"token").unwrap().name, "tok");
        assert_eq!(trie.get::<Token>(b"token-2").unwrap().name, "tok2");
    }
}
