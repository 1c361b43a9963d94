//! Opaque registration tokens.
//!
//! A token carries the kind of registration it was issued for, so handing it
//! to the wrong `unsubscribe_*` call is caught.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::StreamerError;

/// What a [`Token`] was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LogFilter,
    BlockAdded,
    BlockRemoved,
    LogsAdded,
    LogsRemoved,
}

impl TokenKind {
    const ALL: [TokenKind; 5] = [
        Self::LogFilter,
        Self::BlockAdded,
        Self::BlockRemoved,
        Self::LogsAdded,
        Self::LogsRemoved,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::LogFilter => "log filter",
            Self::BlockAdded => "on block added",
            Self::BlockRemoved => "on block removed",
            Self::LogsAdded => "on logs added",
            Self::LogsRemoved => "on logs removed",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Handle returned by filter registration and subscription calls.
///
/// Displays as `"<kind> token <uuid>"` and parses back from that form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    kind: TokenKind,
    id: Uuid,
}

impl Token {
    pub(crate) fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            id: Uuid::new_v4(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} token {}", self.kind, self.id)
    }
}

impl FromStr for Token {
    type Err = StreamerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || StreamerError::MalformedToken(s.to_string());
        let (label, id) = s.rsplit_once(" token ").ok_or_else(malformed)?;
        let kind = TokenKind::ALL
            .into_iter()
            .find(|k| k.label() == label)
            .ok_or_else(malformed)?;
        let id = Uuid::parse_str(id).map_err(|_| malformed())?;
        Ok(Self { kind, id })
    }
}
