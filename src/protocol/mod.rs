//! Line protocol spoken between game clients and the server.
//!
//! Every message is one UTF-8 line of colon-separated fields. Clients open
//! with a `JOIN:<code>:<username>` handshake and then send `CHAT`, `DRAW`,
//! `GUESS` and `LEAVE` messages; the server answers with the `ServerMessage`
//! lines below.

use std::fmt;

use crate::db::ScoreEntry;
use crate::error::ProtocolError;

const SCORE_SEPARATOR: &str = ";;";

/// Parsed `JOIN:<code>:<username>` handshake line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub code: String,
    pub username: String,
}

impl JoinRequest {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let rest = line
            .strip_prefix("JOIN:")
            .ok_or(ProtocolError::MissingJoinPrefix)?;

        let mut parts = rest.splitn(2, ':');
        let code = parts
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(ProtocolError::MissingField("code"))?;
        let username = parts.next().ok_or(ProtocolError::MissingField("username"))?;
        let username = username.trim();
        if username.is_empty() {
            return Err(ProtocolError::EmptyUsername);
        }

        Ok(Self {
            code: code.to_string(),
            username: username.to_string(),
        })
    }
}

/// Messages a client may send after its handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Chat { text: String },
    /// Stroke event; the payload is relayed untouched.
    Draw { payload: String },
    Guess { text: String },
    Leave,
}

impl ClientMessage {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "LEAVE" {
            return Ok(ClientMessage::Leave);
        }
        if let Some(text) = line.strip_prefix("CHAT:") {
            return Ok(ClientMessage::Chat {
                text: text.to_string(),
            });
        }
        if let Some(payload) = line.strip_prefix("DRAW:") {
            return Ok(ClientMessage::Draw {
                payload: payload.to_string(),
            });
        }
        // Blank guesses are still guesses: the drawer is told off and anyone
        // else's shows up as chat.
        if let Some(text) = line.strip_prefix("GUESS:") {
            return Ok(ClientMessage::Guess {
                text: text.to_string(),
            });
        }

        let command = line.split(':').next().unwrap_or_default();
        Err(ProtocolError::UnknownCommand(command.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Drawer,
    Guesser,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Drawer => f.write_str("DRAWER"),
            Role::Guesser => f.write_str("GUESSER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEnd {
    /// The clock ran out; carries the secret word so guessers learn it.
    TimeUp { secret: String },
    Finished,
}

/// Lines the server writes to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Info(String),
    Chat { username: String, text: String },
    Draw { username: String, payload: String },
    Role(Role),
    Secret(String),
    Time(u32),
    Correct {
        username: String,
        secret: String,
        points: u32,
    },
    Disable(String),
    RoundStart,
    RoundEnd(RoundEnd),
    Scores(Vec<ScoreEntry>),
    Players(Vec<String>),
    Error(String),
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Info(text) => write!(f, "INFO:{text}"),
            ServerMessage::Chat { username, text } => write!(f, "CHAT:{username}:{text}"),
            ServerMessage::Draw { username, payload } => write!(f, "DRAW:{username}:{payload}"),
            ServerMessage::Role(role) => write!(f, "ROLE:{role}"),
            ServerMessage::Secret(word) => write!(f, "SECRET:{word}"),
            ServerMessage::Time(seconds) => write!(f, "TIME:{seconds}"),
            ServerMessage::Correct {
                username,
                secret,
                points,
            } => write!(f, "CORRECT:{username}:{secret}:{points}"),
            ServerMessage::Disable(username) => write!(f, "DISABLE:{username}"),
            ServerMessage::RoundStart => f.write_str("ROUND_START"),
            ServerMessage::RoundEnd(RoundEnd::TimeUp { secret }) => {
                write!(f, "ROUND_END:TimeUp:{secret}")
            }
            ServerMessage::RoundEnd(RoundEnd::Finished) => f.write_str("ROUND_END:Finished"),
            ServerMessage::Scores(entries) => {
                let joined = entries
                    .iter()
                    .map(|e| format!("{},{}", e.username, e.score))
                    .collect::<Vec<_>>()
                    .join(SCORE_SEPARATOR);
                write!(f, "SCORES:{joined}")
            }
            ServerMessage::Players(names) => write!(f, "PLAYERS:{}", names.join(",")),
            ServerMessage::Error(text) => write!(f, "ERROR:{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_parsing() {
        let join = JoinRequest::parse("JOIN:778899:alice\r\n").unwrap();
        assert_eq!(join.code, "778899");
        assert_eq!(join.username, "alice");

        // Everything after the second colon belongs to the username.
        let join = JoinRequest::parse("JOIN:42:bob:the:builder").unwrap();
        assert_eq!(join.username, "bob:the:builder");
    }

    #[test]
    fn test_malformed_join() {
        assert_eq!(
            JoinRequest::parse("HELLO:1:alice"),
            Err(ProtocolError::MissingJoinPrefix)
        );
        assert_eq!(
            JoinRequest::parse("JOIN:778899"),
            Err(ProtocolError::MissingField("username"))
        );
        assert_eq!(
            JoinRequest::parse("JOIN::alice"),
            Err(ProtocolError::MissingField("code"))
        );
        assert_eq!(
            JoinRequest::parse("JOIN:778899:   "),
            Err(ProtocolError::EmptyUsername)
        );
    }

    #[test]
    fn test_client_message_parsing() {
        assert_eq!(ClientMessage::parse("LEAVE"), Ok(ClientMessage::Leave));
        assert_eq!(
            ClientMessage::parse("CHAT:hello: world"),
            Ok(ClientMessage::Chat {
                text: "hello: world".into()
            })
        );
        assert_eq!(
            ClientMessage::parse("DRAW:10.0:20.0:false:false:#000000"),
            Ok(ClientMessage::Draw {
                payload: "10.0:20.0:false:false:#000000".into()
            })
        );
        assert_eq!(
            ClientMessage::parse("GUESS:Apple "),
            Ok(ClientMessage::Guess {
                text: "Apple ".into()
            })
        );
    }

    #[test]
    fn test_blank_payloads_pass_through() {
        assert_eq!(
            ClientMessage::parse("GUESS:   "),
            Ok(ClientMessage::Guess { text: "   ".into() })
        );
        assert_eq!(
            ClientMessage::parse("GUESS:"),
            Ok(ClientMessage::Guess { text: String::new() })
        );
        assert_eq!(
            ClientMessage::parse("DRAW:"),
            Ok(ClientMessage::Draw {
                payload: String::new()
            })
        );
    }

    #[test]
    fn test_client_message_errors() {
        assert_eq!(
            ClientMessage::parse("DANCE:now"),
            Err(ProtocolError::UnknownCommand("DANCE".into()))
        );
    }

    #[test]
    fn test_server_message_encoding() {
        assert_eq!(ServerMessage::Role(Role::Drawer).to_string(), "ROLE:DRAWER");
        assert_eq!(ServerMessage::Role(Role::Guesser).to_string(), "ROLE:GUESSER");
        assert_eq!(ServerMessage::Time(60).to_string(), "TIME:60");
        assert_eq!(
            ServerMessage::Correct {
                username: "B".into(),
                secret: "apple".into(),
                points: 25
            }
            .to_string(),
            "CORRECT:B:apple:25"
        );
        assert_eq!(
            ServerMessage::RoundEnd(RoundEnd::TimeUp {
                secret: "apple".into()
            })
            .to_string(),
            "ROUND_END:TimeUp:apple"
        );
        assert_eq!(
            ServerMessage::RoundEnd(RoundEnd::Finished).to_string(),
            "ROUND_END:Finished"
        );
        assert_eq!(
            ServerMessage::Draw {
                username: "A".into(),
                payload: "10.0:20.0:false:false:#000000".into()
            }
            .to_string(),
            "DRAW:A:10.0:20.0:false:false:#000000"
        );
    }

    #[test]
    fn test_list_encoding() {
        let scores = ServerMessage::Scores(vec![
            ScoreEntry::new("B", 25),
            ScoreEntry::new("A", 0),
        ]);
        assert_eq!(scores.to_string(), "SCORES:B,25;;A,0");
        assert_eq!(ServerMessage::Scores(vec![]).to_string(), "SCORES:");

        let players = ServerMessage::Players(vec!["A".into(), "B".into()]);
        assert_eq!(players.to_string(), "PLAYERS:A,B");
    }
}
