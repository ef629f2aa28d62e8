//! Internal traversal context for the graph resolver.

use std::collections::HashSet;
use std::sync::Arc;

/// Internal context for graph traversal.
///
/// The requesting user is fixed for one check, so visited nodes are keyed
/// by `object#relation` alone.
#[derive(Debug, Clone)]
pub(crate) struct TraversalContext {
    /// Current traversal depth.
    pub(crate) depth: u32,
    /// Nodes on the current path. Shared until a step adds to it.
    pub(crate) visited: Arc<HashSet<String>>,
}

impl TraversalContext {
    pub(crate) fn new() -> Self {
        Self {
            depth: 0,
            visited: Arc::new(HashSet::new()),
        }
    }

    pub(crate) fn increment_depth(&self) -> Self {
        Self {
            depth: self.depth + 1,
            visited: Arc::clone(&self.visited),
        }
    }

    pub(crate) fn with_visited(&self, key: &str) -> Self {
        // Clone the inner HashSet only when adding new entries (copy-on-write)
        let mut new_visited = (*self.visited).clone();
        new_visited.insert(key.to_string());
        Self {
            depth: self.depth,
            visited: Arc::new(new_visited),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_visited_does_not_touch_sibling_paths() {
        let root = TraversalContext::new();
        let left = root.with_visited("document:a#viewer");
        let right = root.increment_depth();

        assert!(left.visited.contains("document:a#viewer"));
        assert!(!right.visited.contains("document:a#viewer"));
        assert!(root.visited.is_empty());
        assert_eq!(right.depth, 1);
        assert_eq!(left.depth, 0);
    }
}
