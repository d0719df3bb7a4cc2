use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// Label grouping read bindings that one mutating operation invalidates together
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(Cow<'static, str>);

impl Namespace {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Supply, tiers, stats, per-token reads
    pub fn contract() -> Self {
        Self::from_static("contract")
    }

    /// Per-address staked lists and staking flags
    pub fn staking() -> Self {
        Self::from_static("staking")
    }

    /// Auction status and drop schedule
    pub fn auction() -> Self {
        Self::from_static("auction")
    }

    /// Whitelist membership and allotments
    pub fn whitelist() -> Self {
        Self::from_static("whitelist")
    }

    /// Ownership, roles, pause and emergency flags
    pub fn admin() -> Self {
        Self::from_static("admin")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Namespace {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// Set of namespaces to mark stale after a confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvalidationSignal {
    namespaces: BTreeSet<Namespace>,
}

impl InvalidationSignal {
    pub fn new(namespaces: impl IntoIterator<Item = Namespace>) -> Self {
        Self {
            namespaces: namespaces.into_iter().collect(),
        }
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.iter()
    }

    pub fn contains(&self, namespace: &Namespace) -> bool {
        self.namespaces.contains(namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }
}
