//! One-line administrator commands typed at the console prompt.

use std::str::FromStr;

use thiserror::Error;

use crate::feed::{Recipient, RecipientId};

pub const HELP: &str = "add | check | assets <key> | repo <key> <owner/name> | filters <key> <glob>... | \
sub|unsub <key> user|channel <id> | del <key> | help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the registration dialog.
    Add,
    /// Run a poll cycle now.
    Check,
    Help,
    Assets { key: String },
    Repo { key: String, repo: String },
    Filters { key: String, patterns: Vec<String> },
    Subscribe { key: String, recipient: Recipient },
    Unsubscribe { key: String, recipient: Recipient },
    Delete { key: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid recipient id {0:?}")]
    BadId(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("add", []) => Self::Add,
            ("check", []) => Self::Check,
            ("help" | "?", _) => Self::Help,
            ("assets", [key]) => Self::Assets { key: key.to_string() },
            ("assets", _) => return Err(CommandError::Usage("assets <key>")),
            ("repo", [key, repo]) => Self::Repo {
                key: key.to_string(),
                repo: repo.to_string(),
            },
            ("repo", _) => return Err(CommandError::Usage("repo <key> <owner/name>")),
            ("filters", [key, patterns @ ..]) if !patterns.is_empty() => Self::Filters {
                key: key.to_string(),
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
            },
            ("filters", _) => return Err(CommandError::Usage("filters <key> <glob>...")),
            ("sub", [key, kind, id]) => Self::Subscribe {
                key: key.to_string(),
                recipient: parse_recipient(kind, id)?,
            },
            ("unsub", [key, kind, id]) => Self::Unsubscribe {
                key: key.to_string(),
                recipient: parse_recipient(kind, id)?,
            },
            ("sub" | "unsub", _) => return Err(CommandError::Usage("sub|unsub <key> user|channel <id>")),
            ("del", [key]) => Self::Delete { key: key.to_string() },
            ("del", _) => return Err(CommandError::Usage("del <key>")),
            ("add" | "check", _) => return Err(CommandError::Usage("add | check (no arguments)")),
            (other, _) => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

impl Command {
    /// Whether the command changes feed configuration and so needs the
    /// administrator identity.
    pub fn needs_admin(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Repo { .. } | Self::Filters { .. } | Self::Delete { .. }
        )
    }
}

fn parse_recipient(kind: &str, id: &str) -> Result<Recipient, CommandError> {
    let parsed: RecipientId = id.parse().map_err(|_| CommandError::BadId(id.to_string()))?;
    match kind {
        "user" | "u" => Ok(Recipient::User(parsed)),
        "channel" | "chat" | "c" => Ok(Recipient::Channel(parsed)),
        _ => Err(CommandError::Usage("sub|unsub <key> user|channel <id>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, CommandError> {
        line.parse()
    }

    #[test]
    fn simple_verbs() {
        assert_eq!(parse("add"), Ok(Command::Add));
        assert_eq!(parse("  check  "), Ok(Command::Check));
        assert_eq!(parse("help me"), Ok(Command::Help));
    }

    #[test]
    fn filters_take_every_remaining_word() {
        assert_eq!(
            parse("filters lsposed *zygisk*.zip *.apk"),
            Ok(Command::Filters {
                key: "lsposed".into(),
                patterns: vec!["*zygisk*.zip".into(), "*.apk".into()],
            })
        );
        assert!(matches!(parse("filters lsposed"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn subscribe_parses_recipient_kind() {
        assert_eq!(
            parse("sub pif channel -1001234"),
            Ok(Command::Subscribe {
                key: "pif".into(),
                recipient: Recipient::Channel(-1001234),
            })
        );
        assert_eq!(
            parse("unsub pif user 42"),
            Ok(Command::Unsubscribe {
                key: "pif".into(),
                recipient: Recipient::User(42),
            })
        );
        assert_eq!(parse("sub pif user abc"), Err(CommandError::BadId("abc".into())));
        assert!(matches!(parse("sub pif group 1"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn wrong_arity_and_unknown_verbs() {
        assert_eq!(parse(""), Err(CommandError::Empty));
        assert!(matches!(parse("repo only_key"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("del"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("check now"), Err(CommandError::Usage(_))));
        assert_eq!(parse("frobnicate"), Err(CommandError::Unknown("frobnicate".into())));
    }

    #[test]
    fn admin_only_commands() {
        assert!(parse("del x").unwrap().needs_admin());
        assert!(parse("add").unwrap().needs_admin());
        assert!(!parse("check").unwrap().needs_admin());
        assert!(!parse("sub x user 1").unwrap().needs_admin());
    }
}
