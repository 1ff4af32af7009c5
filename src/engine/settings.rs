use serde::{Deserialize, Serialize};

use super::lister::{DirectoryLister, IgnoreLister, WalkdirLister};

/// Knobs of a traversal run, loaded from the `[engine]` settings section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Abort the walk on the first processor failure
    pub fail_fast: bool,
    /// Deepest node depth allowed below the root
    pub max_depth: usize,
    /// Descend into symlinked directories
    pub follow_links: bool,
    /// Skip entries excluded by `.gitignore` and `.ignore` files
    pub respect_ignore_files: bool,
    /// Visit entries whose name starts with `.`
    pub include_hidden: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_depth: 64,
            follow_links: false,
            respect_ignore_files: false,
            include_hidden: true,
        }
    }
}

impl EngineSettings {
    /// Lister implied by these settings
    pub fn lister(&self) -> Box<dyn DirectoryLister> {
        if self.respect_ignore_files {
            Box::new(IgnoreLister {
                follow_links: self.follow_links,
            })
        } else {
            Box::new(WalkdirLister {
                follow_links: self.follow_links,
            })
        }
    }
}
