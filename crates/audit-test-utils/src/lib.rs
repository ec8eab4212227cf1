//! Testing utilities for the ACL audit workspace
//!
//! Shared trees, collaborator doubles and workbook readers.

#![allow(missing_docs)]

use audit_core::{
    AccessControlEntry, DocumentTree, InMemoryRegistry, InMemoryTree, NodeId, PrincipalRegistry,
    RepositoryError, TreeNode,
};
use audit_sheet::{CellValue, LogicalCoord, VirtualWorkbook};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Groups used by the fixture trees
pub const FIXTURE_GROUPS: [&str; 3] = ["administrators", "members", "auditors"];

/// Users used by the fixture trees
pub const FIXTURE_USERS: [&str; 2] = ["alice", "bob"];

const PERMISSION_CYCLE: [&str; 3] = ["Read", "ReadWrite", "Everything"];

/// Deterministic entry `index` of a fixture node
///
/// Principals cycle through groups then users, so group-only filtering keeps
/// three entries out of every five.
pub fn fixture_entry(index: usize) -> AccessControlEntry {
    let principals: Vec<&str> = FIXTURE_GROUPS.iter().chain(FIXTURE_USERS.iter()).copied().collect();
    let principal = principals[index % principals.len()];
    let permission = PERMISSION_CYCLE[index % PERMISSION_CYCLE.len()];
    AccessControlEntry::grant(principal, permission)
}

fn fixture_acl(entries: usize) -> Vec<AccessControlEntry> {
    (0..entries).map(fixture_entry).collect()
}

/// Root with `nodes` leaf children, each carrying `entries` local entries
///
/// The root itself has no entries.
pub fn wide_tree(nodes: usize, entries: usize) -> (InMemoryTree, NodeId) {
    let mut tree = InMemoryTree::new();
    let root = tree.add_root("/default-domain");
    for i in 0..nodes {
        let child = tree.add_child(root, format!("doc-{i:05}")).unwrap();
        tree.set_acl(child, fixture_acl(entries)).unwrap();
    }
    (tree, root)
}

/// Chain of `depth` nodes below a root, each carrying `entries` local entries
pub fn deep_tree(depth: usize, entries: usize) -> (InMemoryTree, NodeId) {
    let mut tree = InMemoryTree::new();
    let root = tree.add_root("/default-domain");
    tree.set_acl(root, fixture_acl(entries)).unwrap();
    let mut parent = root;
    for level in 0..depth {
        parent = tree.add_child(parent, format!("level-{level}")).unwrap();
        tree.set_acl(parent, fixture_acl(entries)).unwrap();
    }
    (tree, root)
}

/// Registry knowing [`FIXTURE_GROUPS`] as groups and [`FIXTURE_USERS`] as users
pub fn registry_with_groups() -> Arc<dyn PrincipalRegistry> {
    Arc::new(
        InMemoryRegistry::new()
            .with_groups(FIXTURE_GROUPS)
            .with_users(FIXTURE_USERS),
    )
}

/// Tree that sleeps before every ACL read
#[derive(Debug)]
pub struct SlowTree<T> {
    inner: T,
    delay: Duration,
    acl_reads: AtomicUsize,
}

impl<T: DocumentTree> SlowTree<T> {
    pub fn new(inner: T, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            acl_reads: AtomicUsize::new(0),
        }
    }

    /// ACL reads served so far
    pub fn acl_reads(&self) -> usize {
        self.acl_reads.load(Ordering::SeqCst)
    }
}

impl<T: DocumentTree> DocumentTree for SlowTree<T> {
    fn node(&self, id: NodeId) -> Result<TreeNode, RepositoryError> {
        self.inner.node(id)
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, RepositoryError> {
        self.inner.children(id)
    }

    fn acl(&self, id: NodeId) -> Result<Vec<AccessControlEntry>, RepositoryError> {
        std::thread::sleep(self.delay);
        self.acl_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.acl(id)
    }
}

/// Tree whose backend becomes unavailable at one node
#[derive(Debug)]
pub struct FailingTree<T> {
    inner: T,
    fail_at: NodeId,
}

impl<T: DocumentTree> FailingTree<T> {
    pub fn new(inner: T, fail_at: NodeId) -> Self {
        Self { inner, fail_at }
    }
}

impl<T: DocumentTree> DocumentTree for FailingTree<T> {
    fn node(&self, id: NodeId) -> Result<TreeNode, RepositoryError> {
        self.inner.node(id)
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, RepositoryError> {
        self.inner.children(id)
    }

    fn acl(&self, id: NodeId) -> Result<Vec<AccessControlEntry>, RepositoryError> {
        if id == self.fail_at {
            return Err(RepositoryError::Unavailable(format!(
                "acl backend went away at {id}"
            )));
        }
        self.inner.acl(id)
    }
}

/// Read consecutive logical rows starting at `first_row`
///
/// Stops at the first row whose column 0 is empty.
pub fn read_rows(book: &VirtualWorkbook, first_row: usize, width: usize) -> Vec<Vec<CellValue>> {
    (first_row..)
        .map_while(|row| {
            book.get(LogicalCoord::new(row, 0))?;
            Some(
                (0..width)
                    .map(|col| {
                        book.get(LogicalCoord::new(row, col))
                            .cloned()
                            .unwrap_or(CellValue::Text(String::new()))
                    })
                    .collect(),
            )
        })
        .collect()
}

/// Text of a row's first column
pub fn row_path(row: &[CellValue]) -> &str {
    row.first().and_then(CellValue::as_text).unwrap_or_default()
}
