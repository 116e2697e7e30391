use std::fmt;
use std::fmt::{Display, Formatter};

/// Prefix of every generated index name.
pub const INDEX_NAME_PREFIX: &str = ".x-index.";

/// Default number of random characters appended to [`INDEX_NAME_PREFIX`].
pub const DEFAULT_INDEX_SUFFIX_LEN: usize = 10;

/// Shortest random suffix [`IndexName::generate`] produces. 62^8 possible
/// suffixes keep collisions between handlers on one cache negligible.
pub const MIN_INDEX_SUFFIX_LEN: usize = 8;

/// Name of a secondary index on a cache.
///
/// Generated names carry a random alphanumeric suffix so that several handlers
/// can index the same kind on a shared cache without colliding.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IndexName(String);

impl IndexName {
    /// Generates `.x-index.<suffix>` where the suffix is `len` characters
    /// drawn uniformly from `[a-zA-Z0-9]`. A `len` below
    /// [`MIN_INDEX_SUFFIX_LEN`] is raised to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use linked_resources::cache::IndexName;
    ///
    /// let mut rng = fastrand::Rng::with_seed(7);
    /// let name = IndexName::generate(&mut rng, 10);
    /// assert!(name.as_str().starts_with(".x-index."));
    /// assert_eq!(name.suffix().len(), 10);
    /// ```
    pub fn generate(rng: &mut fastrand::Rng, len: usize) -> Self {
        let len = len.max(MIN_INDEX_SUFFIX_LEN);
        let mut name = String::with_capacity(INDEX_NAME_PREFIX.len() + len);
        name.push_str(INDEX_NAME_PREFIX);
        name.extend(std::iter::repeat_with(|| rng.alphanumeric()).take(len));
        IndexName(name)
    }

    /// Returns the random part of the name.
    pub fn suffix(&self) -> &str {
        self.0.strip_prefix(INDEX_NAME_PREFIX).unwrap_or(&self.0)
    }

    /// Returns the full name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for IndexName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IndexName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
