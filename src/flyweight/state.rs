use std::fmt;
use std::hash::{Hash, Hasher};

/// Derive the cache key for a sequence of attributes.
///
/// Attributes are concatenated in order with no separator, so `["ab", "c"]`
/// and `["a", "bc"]` produce the same key and share one cache entry.
#[must_use]
pub fn flyweight_key<S: AsRef<str>>(attributes: &[S]) -> String {
    let len = attributes.iter().map(|a| a.as_ref().len()).sum();
    let mut key = String::with_capacity(len);
    for attr in attributes {
        key.push_str(attr.as_ref());
    }
    key
}

/// Immutable intrinsic state shared by every entity that uses it.
///
/// Equality and hashing go through the derived key, matching how the cache
/// looks entries up.
#[derive(Debug, Clone)]
pub struct SharedState {
    attributes: Vec<String>,
    key: String,
}

impl SharedState {
    /// Build a shared state from an ordered attribute sequence.
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        let key = flyweight_key(&attributes);
        Self { attributes, key }
    }

    /// The attributes in the order they were supplied.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// The cache key for this state.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Combine this shared state with caller-supplied extrinsic state.
    ///
    /// The extrinsic part is used for this call only and never stored.
    #[must_use]
    pub fn operation<S: AsRef<str>>(&self, unique_state: &[S]) -> String {
        let unique: Vec<&str> = unique_state.iter().map(AsRef::as_ref).collect();
        format!(
            "shared ({}) and unique ({}) state",
            self.attributes.join(", "),
            unique.join(", ")
        )
    }
}

impl PartialEq for SharedState {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SharedState {}

impl Hash for SharedState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.attributes.join(", "))
    }
}
