//! Child listing strategies
//!
//! The engine asks a [`DirectoryLister`] for the immediate children of each
//! directory it enters. Both built-in listers return entries sorted by file
//! name with files and directories interleaved.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

use ignore::WalkBuilder;
use tracing::warn;
use walkdir::WalkDir;

use super::NodeKind;

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Name as the filesystem reports it; joined onto the parent path
    pub file_name: OsString,
    /// Lossy UTF-8 form used for matching and keys
    pub name: String,
    pub kind: NodeKind,
}

impl ListedEntry {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let name = name.into();
        Self {
            file_name: OsString::from(&name),
            name,
            kind,
        }
    }

    pub fn from_os(file_name: OsString, kind: NodeKind) -> Self {
        Self {
            name: file_name.to_string_lossy().into_owned(),
            file_name,
            kind,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

pub trait DirectoryLister: Send + Sync {
    /// Immediate children of `dir` in visiting order. An error means the
    /// directory itself could not be read.
    fn list(&self, dir: &Path) -> io::Result<Vec<ListedEntry>>;
}

/// Symlinks count as directories only when links are followed and the
/// target is one. Loop checks are left to the engine.
fn kind_of(path: &Path, file_type: Option<fs::FileType>, follow_links: bool) -> NodeKind {
    let is_dir = match file_type {
        Some(ft) if ft.is_symlink() => follow_links && path.is_dir(),
        Some(ft) => ft.is_dir(),
        None => false,
    };
    if is_dir {
        NodeKind::Directory
    } else {
        NodeKind::File
    }
}

/// Plain listing through `walkdir`; unreadable entries are skipped
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkdirLister {
    pub follow_links: bool,
}

impl DirectoryLister for WalkdirLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<ListedEntry>> {
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        let mut entries = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => entries.push(ListedEntry::from_os(
                    entry.file_name().to_os_string(),
                    kind_of(entry.path(), Some(entry.file_type()), self.follow_links),
                )),
                // depth 0 means the directory itself failed to open
                Err(e) if e.depth() == 0 => return Err(io::Error::from(e)),
                Err(e) => warn!("skipping unreadable entry: {e}"),
            }
        }
        Ok(entries)
    }
}

/// Listing through the `ignore` walker, honouring `.gitignore`, `.ignore`
/// and global git excludes (no git repository required)
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreLister {
    pub follow_links: bool,
}

impl DirectoryLister for IgnoreLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<ListedEntry>> {
        // the walker reports a broken root as an ordinary item; check it first
        fs::read_dir(dir)?;

        let walker = WalkBuilder::new(dir)
            .max_depth(Some(1))
            .hidden(false)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut entries = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) if entry.depth() == 0 => {}
                Ok(entry) => entries.push(ListedEntry::from_os(
                    entry.file_name().to_os_string(),
                    kind_of(entry.path(), entry.file_type(), self.follow_links),
                )),
                Err(e) => warn!("skipping unreadable entry: {e}"),
            }
        }
        Ok(entries)
    }
}
