// Copyright (c) The stepwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test-level metadata, such as links and ownership, attached to reports as labels.
//!
//! Metadata is supplied per [`TestIdentity`] by the caller, typically from annotations found when
//! tests were listed. Only the closed set of keys in [`MetadataKey`] is understood.

use crate::{errors::UnknownSeverityError, reporter::TestIdentity};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};
use tracing::warn;

/// A metadata entry understood by the report assembler.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MetadataKey {
    /// A free-form description of the test.
    Description,

    /// A link to an issue tracker.
    Issue,

    /// A link to a test management system.
    TmsLink,

    /// The epic the test belongs to.
    Epic,

    /// The feature the test covers.
    Feature,

    /// The user story the test covers.
    Story,

    /// How severe a failure of this test is. See [`SeverityLevel`].
    Severity,

    /// Who owns the test.
    Owner,
}

impl MetadataKey {
    /// All keys, in the order their labels are emitted.
    pub const ALL: [MetadataKey; 8] = [
        MetadataKey::Description,
        MetadataKey::Issue,
        MetadataKey::TmsLink,
        MetadataKey::Epic,
        MetadataKey::Feature,
        MetadataKey::Story,
        MetadataKey::Severity,
        MetadataKey::Owner,
    ];

    /// Returns the canonical name of this key.
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataKey::Description => "description",
            MetadataKey::Issue => "issue",
            MetadataKey::TmsLink => "tms-link",
            MetadataKey::Epic => "epic",
            MetadataKey::Feature => "feature",
            MetadataKey::Story => "story",
            MetadataKey::Severity => "severity",
            MetadataKey::Owner => "owner",
        }
    }

    /// Looks up a key by name.
    ///
    /// Accepts canonical names (`tms-link`) as well as annotation-style names (`TmsLink`).
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();
        Self::ALL.into_iter().find(|key| {
            key.as_str().replace('-', "").eq_ignore_ascii_case(&normalized)
        })
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How severe a failure of a test is.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum SeverityLevel {
    /// Blocks further work.
    Blocker,
    /// Breaks a major feature.
    Critical,
    /// The default.
    Normal,
    /// Breaks a minor feature.
    Minor,
    /// Cosmetic.
    Trivial,
}

impl SeverityLevel {
    /// Returns the name of this level as shown in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityLevel::Blocker => "blocker",
            SeverityLevel::Critical => "critical",
            SeverityLevel::Normal => "normal",
            SeverityLevel::Minor => "minor",
            SeverityLevel::Trivial => "trivial",
        }
    }
}

impl FromStr for SeverityLevel {
    type Err = UnknownSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            SeverityLevel::Blocker,
            SeverityLevel::Critical,
            SeverityLevel::Normal,
            SeverityLevel::Minor,
            SeverityLevel::Trivial,
        ]
        .into_iter()
        .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| UnknownSeverityError::new(s))
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a single test.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestMetadata {
    entries: BTreeMap<MetadataKey, String>,
}

impl TestMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an entry, replacing any previous value.
    ///
    /// Severity values are normalized. An unknown severity is ignored with a warning.
    pub fn insert(&mut self, key: MetadataKey, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if key == MetadataKey::Severity {
            match value.parse::<SeverityLevel>() {
                Ok(level) => {
                    self.entries.insert(key, level.as_str().to_owned());
                }
                Err(err) => warn!("ignoring metadata entry: {err}"),
            }
        } else {
            self.entries.insert(key, value);
        }
        self
    }

    /// Returns the value for `key`, if set.
    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    /// Iterates over the entries in [`MetadataKey::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &str)> + '_ {
        self.entries.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Returns true if no entries are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TestMetadata {
    /// Collects metadata from name/value pairs, ignoring unknown names with a warning.
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut metadata = TestMetadata::new();
        for (name, value) in iter {
            let name = name.into();
            match MetadataKey::from_name(&name) {
                Some(key) => {
                    metadata.insert(key, value);
                }
                None => warn!("ignoring unknown metadata key `{name}`"),
            }
        }
        metadata
    }
}

/// Metadata for every test that has some.
#[derive(Clone, Debug, Default)]
pub struct MetadataIndex {
    tests: HashMap<TestIdentity, TestMetadata>,
}

impl MetadataIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the metadata for a test.
    pub fn insert(&mut self, test: TestIdentity, metadata: TestMetadata) {
        self.tests.insert(test, metadata);
    }

    /// Returns the metadata for a test, if any.
    pub fn get(&self, test: &TestIdentity) -> Option<&TestMetadata> {
        self.tests.get(test)
    }
}
