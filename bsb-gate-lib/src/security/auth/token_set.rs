use std::fmt;

use ahash::AHashSet;

use crate::config::Mode;

/// Token injected automatically in development mode.
pub const DEV_TOKEN: &str = "dev-token-123";

/// Immutable allow-list of bearer tokens.
#[derive(Clone, Default)]
pub struct TokenSet {
    tokens: AHashSet<String>,
}

impl TokenSet {
    /// Build from individual tokens. Entries are trimmed and empty ones discarded.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    /// Build from a comma-separated list, adding [`DEV_TOKEN`] in development mode.
    pub fn from_list(source: &str, mode: Mode) -> Self {
        let mut set = Self::new(source.split(','));
        if mode == Mode::Development {
            set.tokens.insert(DEV_TOKEN.to_string());
        }
        set
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet").field("len", &self.tokens.len()).finish()
    }
}
