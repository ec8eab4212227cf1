//! Document tree and ACL capability
//!
//! The engine never owns documents. It reads them through [`DocumentTree`],
//! which a repository adapter implements. [`InMemoryTree`] is an
//! index-addressed implementation used by the CLI and the tests.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

/// Opaque handle to a document, issued by the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Document metadata consumed by the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Document handle
    pub id: NodeId,
    /// Repository path, e.g. `/default-domain/workspaces/hr`
    pub path: String,
}

/// One access-control entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessControlEntry {
    /// User or group name
    pub principal: String,
    /// Permission label, e.g. `Read`
    pub permission: String,
    /// Grant (`true`) or deny (`false`)
    pub granted: bool,
    /// Stops ancestor entries from applying to this node and below
    #[serde(default)]
    pub block_inheritance: bool,
}

impl AccessControlEntry {
    /// Granting entry
    #[inline]
    #[must_use]
    pub fn grant(principal: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            permission: permission.into(),
            granted: true,
            block_inheritance: false,
        }
    }

    /// Denying entry
    #[inline]
    #[must_use]
    pub fn deny(principal: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            granted: false,
            ..Self::grant(principal, permission)
        }
    }

    /// Mark as inheritance-blocking
    #[inline]
    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.block_inheritance = true;
        self
    }
}

/// Tree/ACL capability errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// Handle not known to the tree
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Backend could not be reached
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to a document tree
///
/// Implementations must be cheap to call repeatedly; the processor asks for
/// each node's metadata, ACL and children exactly once per run.
pub trait DocumentTree: Send + Sync + Debug {
    /// Metadata for a node
    ///
    /// # Errors
    /// - `RepositoryError::NodeNotFound` for unknown handles
    fn node(&self, id: NodeId) -> Result<TreeNode, RepositoryError>;

    /// Children in repository order
    ///
    /// # Errors
    /// - `RepositoryError::NodeNotFound` for unknown handles
    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, RepositoryError>;

    /// Local ACL in evaluation order
    ///
    /// # Errors
    /// - `RepositoryError::NodeNotFound` for unknown handles
    fn acl(&self, id: NodeId) -> Result<Vec<AccessControlEntry>, RepositoryError>;
}

#[derive(Debug, Clone)]
struct NodeRecord {
    path: String,
    children: Vec<NodeId>,
    acl: Vec<AccessControlEntry>,
}

/// Arena-backed document tree
#[derive(Debug, Clone, Default)]
pub struct InMemoryTree {
    nodes: Vec<NodeRecord>,
}

impl InMemoryTree {
    /// Create empty tree
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a parentless node
    pub fn add_root(&mut self, path: impl Into<String>) -> NodeId {
        self.push(path.into())
    }

    /// Add a child named `name` under `parent`
    ///
    /// # Errors
    /// - `RepositoryError::NodeNotFound` if `parent` is unknown
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl AsRef<str>,
    ) -> Result<NodeId, RepositoryError> {
        let parent_path = self.record(parent)?.path.clone();
        let path = if parent_path.ends_with('/') {
            format!("{parent_path}{}", name.as_ref())
        } else {
            format!("{parent_path}/{}", name.as_ref())
        };
        let id = self.push(path);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Replace a node's local ACL
    ///
    /// # Errors
    /// - `RepositoryError::NodeNotFound` if `node` is unknown
    pub fn set_acl(
        &mut self,
        node: NodeId,
        entries: Vec<AccessControlEntry>,
    ) -> Result<(), RepositoryError> {
        self.record_mut(node)?.acl = entries;
        Ok(())
    }

    /// Append one entry to a node's local ACL
    ///
    /// # Errors
    /// - `RepositoryError::NodeNotFound` if `node` is unknown
    pub fn push_ace(
        &mut self,
        node: NodeId,
        entry: AccessControlEntry,
    ) -> Result<(), RepositoryError> {
        self.record_mut(node)?.acl.push(entry);
        Ok(())
    }

    fn push(&mut self, path: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeRecord {
            path,
            children: Vec::new(),
            acl: Vec::new(),
        });
        id
    }

    fn record(&self, id: NodeId) -> Result<&NodeRecord, RepositoryError> {
        self.nodes.get(id.0).ok_or(RepositoryError::NodeNotFound(id))
    }

    fn record_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, RepositoryError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(RepositoryError::NodeNotFound(id))
    }
}

impl DocumentTree for InMemoryTree {
    fn node(&self, id: NodeId) -> Result<TreeNode, RepositoryError> {
        Ok(TreeNode {
            id,
            path: self.record(id)?.path.clone(),
        })
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, RepositoryError> {
        Ok(self.record(id)?.children.clone())
    }

    fn acl(&self, id: NodeId) -> Result<Vec<AccessControlEntry>, RepositoryError> {
        Ok(self.record(id)?.acl.clone())
    }
}
