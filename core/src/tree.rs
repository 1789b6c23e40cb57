// In-memory host tree
// Both the image builder and the image parser speak this representation;
// host-directory I/O lives in the adapters.

use crate::{SimplexError, SimplexResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `rw-r--r--`, the mode every host entry gets unless told otherwise.
pub const DEFAULT_PERMISSIONS: u16 = 0o644;

/// Permission bits share the flags word with the entry type.
pub const PERMISSION_MASK: u16 = 0o7777;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub content: Vec<u8>,
    pub permissions: u16,
}

impl File {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            permissions: DEFAULT_PERMISSIONS,
        }
    }

    pub fn with_permissions(mut self, permissions: u16) -> Self {
        self.permissions = permissions & PERMISSION_MASK;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Sorted by name, which is also the on-disk entry order.
    pub entries: BTreeMap<String, Node>,
    pub permissions: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    File(File),
    Directory(Directory),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::File(_) => NodeKind::File,
            Node::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn permissions(&self) -> u16 {
        match self {
            Node::File(file) => file.permissions,
            Node::Directory(dir) => dir.permissions,
        }
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}

impl From<Directory> for Node {
    fn from(dir: Directory) -> Self {
        Node::Directory(dir)
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            permissions: DEFAULT_PERMISSIONS,
        }
    }

    pub fn with_permissions(mut self, permissions: u16) -> Self {
        self.permissions = permissions & PERMISSION_MASK;
        self
    }

    /// Builder-style insert, mostly for tests and small fixtures.
    pub fn with(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.entries.insert(name.into(), node.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        self.entries.insert(name.into(), node.into())
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a `/`-separated path relative to this directory.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let mut components = path.split('/').filter(|c| !c.is_empty());
        let first = components.next()?;
        let mut current = self.entries.get(first)?;
        for component in components {
            match current {
                Node::Directory(dir) => current = dir.entries.get(component)?,
                Node::File(_) => return None,
            }
        }
        Some(current)
    }

    /// Count of files and directories below this one, not including itself.
    pub fn node_count(&self) -> usize {
        self.entries
            .values()
            .map(|node| match node {
                Node::File(_) => 1,
                Node::Directory(dir) => 1 + dir.node_count(),
            })
            .sum()
    }

    /// Sum of all file content lengths below this directory.
    pub fn content_bytes(&self) -> u64 {
        self.entries
            .values()
            .map(|node| match node {
                Node::File(file) => file.content.len() as u64,
                Node::Directory(dir) => dir.content_bytes(),
            })
            .sum()
    }
}

/// Why a name cannot be stored in a directory's name pool, if it can't.
pub fn name_problem(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if !name.is_ascii() {
        Some("name is not ASCII")
    } else if name.bytes().any(|b| b == 0) {
        Some("name contains a null byte")
    } else if name.contains('/') {
        Some("name contains a path separator")
    } else {
        None
    }
}

pub fn validate_name(name: &str) -> SimplexResult<()> {
    match name_problem(name) {
        Some(reason) => Err(SimplexError::invalid(
            "name",
            format!("{:?}: {}", name, reason),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_nested() {
        let tree = Directory::new()
            .with("docs", Directory::new().with("readme.txt", File::new("hello")))
            .with("a.bin", File::new(vec![1, 2, 3]));

        match tree.lookup("docs/readme.txt") {
            Some(Node::File(file)) => assert_eq!(file.content, b"hello"),
            other => panic!("unexpected lookup result: {:?}", other),
        }
        assert!(tree.lookup("a.bin/oops").is_none());
        assert!(tree.lookup("missing").is_none());
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.content_bytes(), 8);
    }

    #[test]
    fn test_default_directory_matches_new() {
        assert_eq!(Directory::default(), Directory::new());
        assert_eq!(Directory::default().permissions, DEFAULT_PERMISSIONS);
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("a.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("caf\u{e9}").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("nul\0").is_err());
    }

    #[test]
    fn test_permissions_are_masked() {
        let file = File::new("x").with_permissions(0o170755);
        assert_eq!(file.permissions, 0o0755);
    }
}
