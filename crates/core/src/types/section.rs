//! Cache sections.
//!
//! A section is a named partition of the cached session data that the
//! commerce backend refreshes independently (`cart`, `customer`,
//! `side-by-side`, ...). Section names are owned by the backend, so they are
//! kept as strings rather than a closed enum.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A section name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Section(String);

impl Section {
    /// Cart summary section.
    pub const CART: &'static str = "cart";
    /// Customer section (holds `firstname` when logged in).
    pub const CUSTOMER: &'static str = "customer";
    /// Section carrying the GraphQL cart ID and bearer token.
    pub const SIDE_BY_SIDE: &'static str = "side-by-side";

    /// Create a section from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the section name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Section {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl AsRef<str> for Section {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered, de-duplicated set of sections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionSet(BTreeSet<Section>);

impl SectionSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// The sections needed to render cart and login state:
    /// `cart`, `customer` and `side-by-side`.
    #[must_use]
    pub fn session() -> Self {
        [Section::CART, Section::CUSTOMER, Section::SIDE_BY_SIDE]
            .into_iter()
            .collect()
    }

    /// Only the `cart` section.
    #[must_use]
    pub fn cart() -> Self {
        std::iter::once(Section::CART).collect()
    }

    /// Returns `true` if the set contains the named section.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|section| section.as_str() == name)
    }

    /// Add a section.
    pub fn insert(&mut self, section: impl Into<Section>) {
        self.0.insert(section.into());
    }

    /// Iterate over the section names.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.0.iter()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-separated list as used by the section-load endpoint.
    #[must_use]
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(Section::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<S: Into<Section>> FromIterator<S> for SectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a SectionSet {
    type Item = &'a Section;
    type IntoIter = std::collections::btree_set::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
