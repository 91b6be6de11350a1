//! The line-oriented wire grammar (§6.3). This is a collaborator spec, not
//! a core engineering subject — the requirements are interface constraints
//! so a client written against the reference behaves the same against this
//! server.

use crate::error::VolumeError;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create { name: String },
    Write { name: String, payload: Vec<u8> },
    Read { name: String },
    Delete { name: String },
    List,
    Help,
    Quit,
}

/// Why a line could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const USAGE: &str =
    "CREATE <name> | WRITE <name> <hex> | READ <name> | DELETE <name> | LIST | HELP | QUIT";

/// Parses one line (verb case-insensitive, whitespace-separated, at most
/// three tokens).
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().ok_or_else(|| ParseError("empty command".into()))?;

    match verb.to_ascii_uppercase().as_str() {
        "CREATE" => {
            let name = require_one_arg(tokens, "CREATE")?;
            Ok(Command::Create { name })
        }
        "WRITE" => {
            let name = tokens
                .next()
                .ok_or_else(|| ParseError("WRITE requires a name and payload".into()))?
                .to_string();
            let hex = tokens
                .next()
                .ok_or_else(|| ParseError("WRITE requires a hex payload".into()))?;
            if tokens.next().is_some() {
                return Err(ParseError("too many arguments".into()));
            }
            let payload = decode_hex(hex).map_err(|e| ParseError(e.to_string()))?;
            Ok(Command::Write { name, payload })
        }
        "READ" => {
            let name = require_one_arg(tokens, "READ")?;
            Ok(Command::Read { name })
        }
        "DELETE" => {
            let name = require_one_arg(tokens, "DELETE")?;
            Ok(Command::Delete { name })
        }
        "LIST" => {
            if tokens.next().is_some() {
                return Err(ParseError("LIST takes no arguments".into()));
            }
            Ok(Command::List)
        }
        "HELP" => Ok(Command::Help),
        "QUIT" => Ok(Command::Quit),
        other => Err(ParseError(format!("unknown command {other}"))),
    }
}

fn require_one_arg<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    verb: &str,
) -> Result<String, ParseError> {
    let name = tokens
        .next()
        .ok_or_else(|| ParseError(format!("{verb} requires a name")))?
        .to_string();
    if tokens.next().is_some() {
        return Err(ParseError("too many arguments".into()));
    }
    Ok(name)
}

pub fn usage() -> &'static str {
    USAGE
}

/// Decodes an even-length hex string into bytes.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, VolumeError> {
    if s.len() % 2 != 0 {
        return Err(VolumeError::InvalidArgument(
            "hex payload has odd length".into(),
        ));
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for pair in bytes.chunks(2) {
        let hi = hex_digit(pair[0])?;
        let lo = hex_digit(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn hex_digit(b: u8) -> Result<u8, VolumeError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(VolumeError::InvalidArgument(format!(
            "invalid hex digit {:#04x}",
            b
        ))),
    }
}

/// Encodes bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create() {
        assert_eq!(
            parse_command("create a").unwrap(),
            Command::Create { name: "a".into() }
        );
        assert_eq!(
            parse_command("CREATE a").unwrap(),
            Command::Create { name: "a".into() }
        );
    }

    #[test]
    fn parses_write_with_hex() {
        assert_eq!(
            parse_command("WRITE a 0102ff").unwrap(),
            Command::Write {
                name: "a".into(),
                payload: vec![0x01, 0x02, 0xff]
            }
        );
    }

    #[test]
    fn rejects_odd_length_hex() {
        assert!(parse_command("WRITE a 010").is_err());
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(parse_command("FROBNICATE a").is_err());
    }

    #[test]
    fn list_takes_no_arguments() {
        assert!(parse_command("LIST extra").is_err());
        assert_eq!(parse_command("list").unwrap(), Command::List);
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = [0x00, 0x01, 0x7f, 0xff, 0xab];
        assert_eq!(decode_hex(&encode_hex(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn quit_and_help_take_no_arguments() {
        assert_eq!(parse_command("QUIT").unwrap(), Command::Quit);
        assert_eq!(parse_command("help").unwrap(), Command::Help);
    }
}
