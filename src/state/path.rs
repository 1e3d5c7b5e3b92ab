//! Dotted paths into the device-state tree and the per-command change set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::Error;

/// One step of a [`StatePath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(u32),
}

/// Location of a node in the state tree, rendered as
/// `video.mixEffects.0.programInput`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StatePath(Vec<PathSegment>);

impl StatePath {
    /// Path with a single top-level key
    pub fn root(key: &str) -> Self {
        StatePath(vec![PathSegment::Key(key.to_owned())])
    }

    pub fn key(mut self, key: &str) -> Self {
        self.0.push(PathSegment::Key(key.to_owned()));
        self
    }

    pub fn index(mut self, index: impl Into<u32>) -> Self {
        self.0.push(PathSegment::Index(index.into()));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Whether `prefix` names this node or one of its ancestors
    pub fn starts_with(&self, prefix: &StatePath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Key(key) => f.write_str(key)?,
                PathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for StatePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    Err(Error::config(format!("empty segment in state path {:?}", s)))
                } else if let Ok(index) = part.parse::<u32>() {
                    Ok(PathSegment::Index(index))
                } else {
                    Ok(PathSegment::Key(part.to_owned()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StatePath(segments))
    }
}

impl Serialize for StatePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StatePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Paths touched by one applied command, in application order and without
/// duplicates
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangedPaths(Vec<StatePath>);

impl ChangedPaths {
    pub fn new() -> Self {
        ChangedPaths(Vec::new())
    }

    /// Records a path unless it is already present
    pub fn insert(&mut self, path: StatePath) {
        if !self.0.contains(&path) {
            self.0.push(path);
        }
    }

    pub fn extend(&mut self, other: ChangedPaths) {
        for path in other.0 {
            self.insert(path);
        }
    }

    /// Whether the rendered form of any path equals `path`
    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p.to_string() == path)
    }

    /// Whether any path lies under `prefix`
    pub fn touches(&self, prefix: &StatePath) -> bool {
        self.0.iter().any(|p| p.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StatePath> {
        self.0.iter()
    }
}

impl IntoIterator for ChangedPaths {
    type Item = StatePath;
    type IntoIter = std::vec::IntoIter<StatePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangedPaths {
    type Item = &'a StatePath;
    type IntoIter = std::slice::Iter<'a, StatePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_parse() {
        let path = StatePath::root("video").key("mixEffects").index(0u8).key("programInput");
        assert_eq!(path.to_string(), "video.mixEffects.0.programInput");
        assert_eq!("video.mixEffects.0.programInput".parse::<StatePath>().unwrap(), path);
        assert!("video..mode".parse::<StatePath>().is_err());
    }

    #[test]
    fn test_changed_paths_dedup_keeps_order() {
        let mut changes = ChangedPaths::new();
        changes.insert(StatePath::root("video").key("mode"));
        changes.insert(StatePath::root("tally").key("byIndex"));
        changes.insert(StatePath::root("video").key("mode"));
        let rendered: Vec<String> = changes.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["video.mode", "tally.byIndex"]);
        assert!(changes.touches(&StatePath::root("tally")));
        assert!(!changes.touches(&StatePath::root("audio")));
    }

    #[test]
    fn test_serde_as_strings() {
        let mut changes = ChangedPaths::new();
        changes.insert(StatePath::root("inputs").index(1010u16).key("longName"));
        let json = serde_json::to_string(&changes).unwrap();
        assert_eq!(json, r#"["inputs.1010.longName"]"#);
        let back: ChangedPaths = serde_json::from_str(&json).unwrap();
        assert_eq!(back, changes);
    }
}
