//! Constraint filtering for file system events
//!
//! A [`Constraints`] value decides whether an event is interesting to the
//! subscriber. It combines three independent checks, all of which must pass:
//!
//! - filename substrings (any configured substring occurs in the file name)
//! - filename patterns (any configured regular expression matches the whole
//!   file name)
//! - file types (the path's type, read without following symlinks, is one of
//!   the configured types)
//!
//! An empty set never disqualifies an event. The `recursive` flag is not
//! evaluated here; the watcher engine uses it to decide whether to descend
//! into subdirectories.

use crate::events::{EventKind, FilesystemEvent};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::trace;
use treewatch_core::config::WatchConfig;
use treewatch_core::error::{Error, Result};

/// Type of a file system object
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FileType {
    /// Regular file
    Regular,
    /// Directory
    Directory,
    /// Symbolic link
    Link,
    /// Anything else (sockets, fifos, devices)
    Other,
}

impl FileType {
    /// Check whether a file type read with `symlink_metadata` is of this type
    pub fn matches(&self, file_type: &std::fs::FileType) -> bool {
        match self {
            Self::Regular => file_type.is_file(),
            Self::Directory => file_type.is_dir(),
            Self::Link => file_type.is_symlink(),
            Self::Other => {
                !file_type.is_file() && !file_type.is_dir() && !file_type.is_symlink()
            }
        }
    }
}

#[derive(Debug, Clone)]
struct FilenamePattern {
    source: String,
    regex: Regex,
}

impl FilenamePattern {
    fn compile(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| Error::pattern(source, e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }
}

/// Immutable filter configuration
///
/// The `with_*` methods consume the value and return a new one, so two
/// configurations never share state.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    filename_substrings: Vec<String>,
    filename_patterns: Vec<FilenamePattern>,
    file_types: Vec<FileType>,
    recursive: bool,
}

impl Constraints {
    /// Accept everything, do not descend into subdirectories
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the filename substrings
    pub fn with_filename_substrings<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for substring in substrings.into_iter().map(Into::into) {
            if !unique.contains(&substring) {
                unique.push(substring);
            }
        }
        self.filename_substrings = unique;
        self
    }

    /// Replace the filename patterns
    ///
    /// Each pattern is a regular expression that must match the whole file
    /// name, not just a part of it.
    pub fn with_filename_patterns<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled: Vec<FilenamePattern> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if compiled.iter().any(|p| p.source == pattern) {
                continue;
            }
            compiled.push(FilenamePattern::compile(pattern)?);
        }
        self.filename_patterns = compiled;
        Ok(self)
    }

    /// Replace the accepted file types
    pub fn with_file_types<I>(mut self, file_types: I) -> Self
    where
        I: IntoIterator<Item = FileType>,
    {
        let mut unique = Vec::new();
        for file_type in file_types {
            if !unique.contains(&file_type) {
                unique.push(file_type);
            }
        }
        self.file_types = unique;
        self
    }

    /// Set whether subdirectories are watched
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Whether subdirectories are watched
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn filename_substrings(&self) -> &[String] {
        &self.filename_substrings
    }

    pub fn filename_patterns(&self) -> impl Iterator<Item = &str> {
        self.filename_patterns.iter().map(|p| p.source.as_str())
    }

    pub fn file_types(&self) -> &[FileType] {
        &self.file_types
    }

    /// Decide whether an event passes the filter
    ///
    /// File types are not checked for `Deleted` events since the object no
    /// longer exists. For every other kind the path must be stat-able;
    /// failing to stat it is reported as an I/O error.
    pub fn accepts(&self, event: &FilesystemEvent) -> Result<bool> {
        // the type check runs first so a missing path always surfaces as an error
        if !self.file_types.is_empty() && event.kind() != EventKind::Deleted {
            let metadata = std::fs::symlink_metadata(event.path())?;
            let file_type = metadata.file_type();
            if !self.file_types.iter().any(|t| t.matches(&file_type)) {
                trace!("File type of {} not accepted", event.path().display());
                return Ok(false);
            }
        }

        let file_name = event.file_name();

        if !self.filename_substrings.is_empty()
            && !self
                .filename_substrings
                .iter()
                .any(|substring| file_name.contains(substring.as_str()))
        {
            trace!("No substring matches {}", event.path().display());
            return Ok(false);
        }

        if !self.filename_patterns.is_empty()
            && !self
                .filename_patterns
                .iter()
                .any(|pattern| pattern.regex.is_match(&file_name))
        {
            trace!("No pattern matches {}", event.path().display());
            return Ok(false);
        }

        Ok(true)
    }
}

impl TryFrom<&WatchConfig> for Constraints {
    type Error = Error;

    fn try_from(config: &WatchConfig) -> Result<Self> {
        let file_types = config
            .file_types
            .iter()
            .map(|name| {
                FileType::from_str(name)
                    .map_err(|_| Error::config(format!("Invalid file type '{name}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new()
            .with_recursive(config.recursive)
            .with_filename_substrings(config.filename_substrings.iter().cloned())
            .with_filename_patterns(&config.filename_patterns)?
            .with_file_types(file_types))
    }
}
