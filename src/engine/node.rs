use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Directory or file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
        }
    }
}

/// One visited entry of the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Absolute (or root-joined) filesystem path
    pub path: PathBuf,
    /// POSIX-style path relative to the run root; empty for the root
    pub rel_path: String,
    pub kind: NodeKind,
    /// 0 for the root
    pub depth: usize,
}

impl Node {
    pub fn new(
        path: impl Into<PathBuf>,
        rel_path: impl Into<String>,
        kind: NodeKind,
        depth: usize,
    ) -> Self {
        Self {
            path: path.into(),
            rel_path: rel_path.into(),
            kind,
            depth,
        }
    }

    pub(crate) fn root(path: &Path) -> Self {
        Self::new(path, "", NodeKind::Directory, 0)
    }

    /// Build the node for a child entry. The filesystem path keeps the raw
    /// name; `rel_path` holds its lossy UTF-8 form.
    pub(crate) fn child(&self, file_name: impl AsRef<OsStr>, kind: NodeKind) -> Self {
        let file_name = file_name.as_ref();
        let name = file_name.to_string_lossy();
        let rel_path = if self.rel_path.is_empty() {
            name.into_owned()
        } else {
            format!("{}/{}", self.rel_path, name)
        };
        Self::new(self.path.join(file_name), rel_path, kind, self.depth + 1)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_root(&self) -> bool {
        self.rel_path.is_empty()
    }

    /// Stable key used to address per-node data: `.` for the root,
    /// the relative path otherwise
    pub fn key(&self) -> &str {
        if self.rel_path.is_empty() {
            "."
        } else {
            &self.rel_path
        }
    }

    /// Key of the containing directory; `None` for the root
    pub fn parent_key(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(match self.rel_path.rsplit_once('/') {
            Some((parent, _)) => parent,
            None => ".",
        })
    }

    /// Final path segment; empty for the root
    pub fn name(&self) -> &str {
        self.rel_path
            .rsplit_once('/')
            .map_or(self.rel_path.as_str(), |(_, name)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let root = Node::root(Path::new("/srv/tree"));
        assert_eq!(root.key(), ".");
        assert_eq!(root.parent_key(), None);

        let data = root.child("data", NodeKind::Directory);
        assert_eq!(data.key(), "data");
        assert_eq!(data.parent_key(), Some("."));
        assert_eq!(data.depth, 1);

        let file = data
            .child("group1", NodeKind::Directory)
            .child("file.txt", NodeKind::File);
        assert_eq!(file.rel_path, "data/group1/file.txt");
        assert_eq!(file.parent_key(), Some("data/group1"));
        assert_eq!(file.name(), "file.txt");
        assert_eq!(file.path, Path::new("/srv/tree/data/group1/file.txt"));
        assert!(file.is_file());
    }
}
