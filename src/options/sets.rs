//! Library and platform sets with canonical string forms.

use std::collections::BTreeSet;
use std::fmt;

use boost_catalog::{BuildUnit, Platform};
use serde::Serialize;

/// Set of catalog library names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibrarySet(BTreeSet<String>);

impl LibrarySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, library: impl Into<String>) {
        self.0.insert(library.into());
    }

    pub fn contains(&self, library: &str) -> bool {
        self.0.contains(library)
    }

    pub fn is_superset(&self, other: &LibrarySet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted, comma-joined names. Used as a cache key.
    pub fn canonical(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }

    /// Read back a canonical string. Blank entries are dropped.
    pub fn from_canonical(s: &str) -> Self {
        s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for LibrarySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for LibrarySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Set of concrete build units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformSet(BTreeSet<BuildUnit>);

impl PlatformSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: BuildUnit) {
        self.0.insert(unit);
    }

    pub fn contains(&self, unit: &BuildUnit) -> bool {
        self.0.contains(unit)
    }

    /// Units in canonical order.
    pub fn units(&self) -> impl Iterator<Item = BuildUnit> + '_ {
        self.0.iter().copied()
    }

    /// Distinct platforms (packaging families) present, in canonical order.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = Vec::new();
        for unit in &self.0 {
            if !platforms.contains(&unit.platform) {
                platforms.push(unit.platform);
            }
        }
        platforms
    }

    /// Units belonging to one platform.
    pub fn units_of(&self, platform: Platform) -> Vec<BuildUnit> {
        self.units().filter(|u| u.platform == platform).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted, comma-joined unit ids. Used as a cache key.
    pub fn canonical(&self) -> String {
        self.units().map(|u| u.id()).collect::<Vec<_>>().join(",")
    }
}

impl FromIterator<BuildUnit> for PlatformSet {
    fn from_iter<I: IntoIterator<Item = BuildUnit>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boost_catalog::Arch;

    #[test]
    fn test_library_canonical_is_sorted_and_deduplicated() {
        let set: LibrarySet = ["thread", "atomic", "thread", "chrono"].into_iter().collect();
        assert_eq!(set.canonical(), "atomic,chrono,thread");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_library_canonical_round_trip() {
        let set = LibrarySet::from_canonical("atomic, filesystem,,");
        assert_eq!(set.canonical(), "atomic,filesystem");
        assert!(LibrarySet::from_canonical("").is_empty());
    }

    #[test]
    fn test_superset() {
        let built = LibrarySet::from_canonical("atomic,filesystem,system");
        assert!(built.is_superset(&LibrarySet::from_canonical("atomic,system")));
        assert!(built.is_superset(&built));
        assert!(!built.is_superset(&LibrarySet::from_canonical("atomic,regex")));
    }

    #[test]
    fn test_platform_canonical_and_families() {
        let set: PlatformSet = [
            BuildUnit::new(Platform::Macosx, Arch::X86_64),
            BuildUnit::new(Platform::Ios, Arch::Arm64),
            BuildUnit::new(Platform::Macosx, Arch::Arm64),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.canonical(), "ios-arm64,macosx-arm64,macosx-x86_64");
        assert_eq!(set.platforms(), vec![Platform::Ios, Platform::Macosx]);
        assert_eq!(set.units_of(Platform::Macosx).len(), 2);
    }
}
