//! Channel-name validator (C1)
//!
//! Pure, side-effect-free classification of channel names. Every other
//! component (registry, broadcast engine, auth) calls `ChannelName::parse`
//! rather than re-deriving these rules.

use std::fmt;

use crate::error::Error;

const MAX_LEN: usize = 100;

const PUBLIC_TOPICS: &[&str] = &[
    "trade",
    "candles",
    "sys",
    "rsi",
    "extrema",
    "analysis",
    "subscription",
    "payment",
    "deposit",
];

/// Classification of a validated channel name (§4.1 rule 1-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Global,
    User,
    Strategy,
    EphemeralForgeJob,
    EphemeralBacktest,
    Public,
    Other,
}

impl ChannelKind {
    /// True for kinds that should be reclaimed once their subscriber set
    /// is empty (§3 Channel invariant, §4.3 `cleanup_empty_channels`).
    pub fn is_ephemeral(self) -> bool {
        matches!(
            self,
            ChannelKind::EphemeralForgeJob | ChannelKind::EphemeralBacktest
        )
    }
}

/// A validated channel name, classified by kind. Immutable value object:
/// equality and hashing are by name alone.
#[derive(Debug, Clone, Eq)]
pub struct ChannelName {
    value: String,
    kind: ChannelKind,
}

impl ChannelName {
    /// Validate `name` against the syntactic rule set and classify it.
    ///
    /// Rules (§4.1): non-empty, length <= 100, characters in
    /// `[a-z0-9.-]`, no leading/trailing dot.
    pub fn parse(name: &str) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(Error::ChannelNameInvalid(
                name.to_string(),
                "channel name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_LEN {
            return Err(Error::ChannelNameInvalid(
                name.to_string(),
                format!("channel name must be at most {MAX_LEN} characters"),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        {
            return Err(Error::ChannelNameInvalid(
                name.to_string(),
                "channel name may only contain lowercase letters, digits, '.', and '-'"
                    .to_string(),
            ));
        }
        if name.starts_with('.') || name.ends_with('.') {
            return Err(Error::ChannelNameInvalid(
                name.to_string(),
                "channel name must not start or end with '.'".to_string(),
            ));
        }

        let kind = classify(name);

        Ok(Self {
            value: name.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_ephemeral(&self) -> bool {
        self.kind.is_ephemeral()
    }

    pub fn is_global(&self) -> bool {
        self.kind == ChannelKind::Global
    }

    pub fn is_user_channel(&self) -> bool {
        self.kind == ChannelKind::User
    }

    pub fn is_strategy_channel(&self) -> bool {
        self.kind == ChannelKind::Strategy
    }

    pub fn is_public(&self) -> bool {
        self.kind == ChannelKind::Public
    }

    /// Extract the `<id>` suffix of a `user.<id>` channel.
    pub fn extract_user_id(&self) -> Result<&str, Error> {
        self.value.strip_prefix("user.").ok_or_else(|| {
            Error::Other(format!("'{}' is not a user channel", self.value))
        })
    }
}

fn classify(name: &str) -> ChannelKind {
    if name == "global" {
        ChannelKind::Global
    } else if name.starts_with("user.") {
        ChannelKind::User
    } else if name.starts_with("strategy.") {
        ChannelKind::Strategy
    } else if name.starts_with("forge.job.") {
        ChannelKind::EphemeralForgeJob
    } else if name.starts_with("backtest.") {
        ChannelKind::EphemeralBacktest
    } else if PUBLIC_TOPICS.contains(&name) {
        ChannelKind::Public
    } else {
        ChannelKind::Other
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl PartialEq for ChannelName {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl std::hash::Hash for ChannelName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialEq<str> for ChannelName {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}
