use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Locations of the two persisted files inside the site data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub seen_ids: PathBuf,
    pub store: PathBuf,
}

impl DataPaths {
    pub fn new(dir: &Path) -> Self {
        DataPaths {
            seen_ids: dir.join("recent_pubmed_ids.txt"),
            store: dir.join("papers.yml"),
        }
    }
}

/// Every identifier ever successfully ingested. Membership prevents
/// duplicate output; the persisted order is newest-first. Never pruned.
#[derive(Debug, Default)]
pub struct SeenIds {
    ordered: Vec<String>,
    members: HashSet<String>,
}

impl SeenIds {
    /// Load the persisted set. A missing or unreadable file is an empty
    /// set, so a first run bootstraps without prior state.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => contents
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => SeenIds::default(),
        }
    }

    /// The candidates not yet seen, in candidate order.
    pub fn delta(&self, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|id| !self.members.contains(*id))
            .cloned()
            .collect()
    }

    /// Splice freshly ingested identifiers in front of the existing order.
    /// Duplicates are ignored.
    pub fn admit(&mut self, new_ids: &[String]) {
        let fresh: Vec<String> = new_ids
            .iter()
            .filter(|id| self.members.insert((*id).clone()))
            .cloned()
            .collect();
        self.ordered.splice(0..0, fresh);
    }

    /// Overwrite the persisted set wholesale, one comma-separated line.
    pub fn persist(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.ordered.join(","))
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl FromIterator<String> for SeenIds {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = SeenIds::default();
        for id in iter {
            if set.members.insert(id.clone()) {
                set.ordered.push(id);
            }
        }
        set
    }
}

/// The persisted citation list. Existing content is read once at open and
/// preserved verbatim; new blocks only ever go in front of it.
#[derive(Debug)]
pub struct CitationStore {
    path: PathBuf,
    existing: String,
}

impl CitationStore {
    /// Open the store, treating an absent file as empty (bootstrap).
    pub fn open(path: &Path) -> io::Result<Self> {
        let existing = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        Ok(CitationStore {
            path: path.to_path_buf(),
            existing,
        })
    }

    /// True on a first run, before anything was ever written.
    pub fn is_empty(&self) -> bool {
        self.existing.is_empty()
    }

    /// Insert-at-head: the new block, then the original content, written
    /// wholesale. No reordering, no reparsing of what is already there.
    pub fn prepend(&self, block: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut contents = String::with_capacity(block.len() + self.existing.len());
        contents.push_str(block);
        contents.push_str(&self.existing);
        fs::write(&self.path, contents)
    }
}
