//! Music directory tree assembled from `lsinfo` listings.
//!
//! Nodes live in an arena keyed by path. A node refers to its parent and its
//! subdirectories by path, so navigation needs no owning back-references.

use std::collections::{BTreeSet, HashMap};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use super::{get_string, PlaylistFile, Song};
use crate::protocol::Record;

/// Path of the root directory; it is the only node without a parent.
pub const ROOT: &str = "";

/// One directory node.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Directory {
  path: String,
  parent: Option<String>,
  pub last_modified: Option<String>,
  subdirectories: BTreeSet<String>,
  pub files: Vec<Song>,
  pub playlists: Vec<PlaylistFile>,
  /// Whether this directory's own listing has been fetched.
  pub loaded: bool,
}

impl Directory {
  pub fn path(&self) -> &str {
    &self.path
  }

  /// Last path segment; empty for the root.
  pub fn name(&self) -> &str {
    self.path.rsplit('/').next().unwrap_or_default()
  }

  pub fn parent_path(&self) -> Option<&str> {
    self.parent.as_deref()
  }

  pub fn is_root(&self) -> bool {
    self.parent.is_none()
  }

  /// Paths of the direct subdirectories, sorted.
  pub fn subdirectory_paths(&self) -> impl Iterator<Item = &str> {
    self.subdirectories.iter().map(String::as_str)
  }
}

impl PartialEq for Directory {
  fn eq(&self, other: &Self) -> bool {
    self.path == other.path
  }
}

impl Eq for Directory {}

fn normalize(path: &str) -> &str {
  path.trim_matches('/')
}

fn parent_of(path: &str) -> &str {
  match path.rfind('/') {
    Some(idx) => &path[..idx],
    None => ROOT,
  }
}

/// Arena of directory nodes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct DirectoryTree {
  nodes: HashMap<String, Directory>,
}

impl Default for DirectoryTree {
  fn default() -> Self {
    Self::new()
  }
}

impl DirectoryTree {
  pub fn new() -> Self {
    let mut nodes = HashMap::new();
    nodes.insert(
      ROOT.to_string(),
      Directory {
        path: ROOT.to_string(),
        ..Directory::default()
      },
    );
    Self { nodes }
  }

  pub fn root(&self) -> &Directory {
    &self.nodes[ROOT]
  }

  pub fn get(&self, path: &str) -> Option<&Directory> {
    self.nodes.get(normalize(path))
  }

  pub fn parent(&self, path: &str) -> Option<&Directory> {
    let node = self.get(path)?;
    self.nodes.get(node.parent.as_deref()?)
  }

  pub fn subdirectories<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a Directory> + 'a {
    self
      .get(path)
      .into_iter()
      .flat_map(|dir| dir.subdirectories.iter())
      .filter_map(|child| self.nodes.get(child))
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.len() <= 1
  }

  /// Get or create the node at `path`, creating missing ancestors.
  pub fn ensure(&mut self, path: &str) -> &mut Directory {
    let path = normalize(path);
    if !self.nodes.contains_key(path) {
      self
        .ensure(parent_of(path))
        .subdirectories
        .insert(path.to_string());
    }
    self
      .nodes
      .entry(path.to_string())
      .or_insert_with_key(|path| Directory {
        path: path.clone(),
        parent: Some(parent_of(path).to_string()),
        ..Directory::default()
      })
  }

  /// Replace the contents of `path` with an `lsinfo` listing.
  ///
  /// Subdirectories that are no longer listed are dropped with their
  /// subtrees.
  pub fn insert_listing<I>(&mut self, path: &str, records: I)
  where
    I: IntoIterator<Item = Record>,
  {
    let path = normalize(path).to_string();
    let mut subdirectories = BTreeSet::new();
    let mut files = Vec::new();
    let mut playlists = Vec::new();

    for record in records {
      match record.kind() {
        Some("directory") => {
          let child = normalize(record.get("directory").unwrap_or_default()).to_string();
          if child.is_empty() {
            continue;
          }
          let node = self.ensure(&child);
          node.last_modified = get_string(&record, "last-modified");
          if parent_of(&child) == path {
            subdirectories.insert(child);
          }
        }
        Some("file") => files.push(Song::from(&record)),
        Some("playlist") => playlists.push(PlaylistFile::from(&record)),
        other => log::debug!("Skipping lsinfo entry of kind {:?}", other),
      }
    }

    let stale: Vec<String> = {
      let node = self.ensure(&path);
      let stale = node
        .subdirectories
        .difference(&subdirectories)
        .cloned()
        .collect();
      node.subdirectories.extend(subdirectories.iter().cloned());
      node.files = files;
      node.playlists = playlists;
      node.loaded = true;
      stale
    };
    for child in stale {
      self.remove(&child);
    }
  }

  /// Remove a node and its subtree. The root cannot be removed.
  pub fn remove(&mut self, path: &str) {
    let path = normalize(path);
    if path == ROOT {
      return;
    }
    let Some(node) = self.nodes.remove(path) else {
      return;
    };
    if let Some(parent) = node.parent.as_deref().and_then(|p| self.nodes.get_mut(p)) {
      parent.subdirectories.remove(path);
    }
    for child in node.subdirectories {
      self.remove(&child);
    }
  }
}
