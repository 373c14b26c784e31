//! Line-oriented client command protocol.
//!
//! One command per CRLF-terminated line, one CRLF-terminated response
//! per command. Keys are single tokens without whitespace or control
//! characters; values run to the end of the line, with the literal
//! `""` denoting the empty value (an empty stored value is rendered
//! back the same way).

use storage::Operation;

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    Delete { key: String },
    Increment { key: String, delta: i64 },
    Decrement { key: String, delta: i64 },
    Append { key: String, value: String },
    Prepend { key: String, value: String },
}

/// Why a command line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand(String),
    MissingKey,
    MissingValue,
    InvalidKey,
    InvalidDelta(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::UnknownCommand(verb) => write!(f, "unknown command: {}", verb),
            ParseError::MissingKey => write!(f, "missing key"),
            ParseError::MissingValue => write!(f, "missing value"),
            ParseError::InvalidKey => {
                write!(f, "invalid key (must be non-empty, no whitespace or control characters)")
            }
            ParseError::InvalidDelta(raw) => write!(f, "invalid amount: {}", raw),
        }
    }
}

impl std::error::Error for ParseError {}

impl Command {
    /// Parse one command line (without its CRLF terminator).
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let (verb, rest) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (line, None),
        };

        // Verbs are case-insensitive; keys and values are not.
        match verb.to_ascii_uppercase().as_str() {
            "GET" => Ok(Command::Get {
                key: parse_key(rest)?,
            }),
            "DEL" | "DELETE" => Ok(Command::Delete {
                key: parse_key(rest)?,
            }),
            "SET" => {
                let (key, value) = parse_key_value(rest)?;
                Ok(Command::Set { key, value })
            }
            "APPEND" => {
                let (key, value) = parse_key_value(rest)?;
                Ok(Command::Append { key, value })
            }
            "PREPEND" => {
                let (key, value) = parse_key_value(rest)?;
                Ok(Command::Prepend { key, value })
            }
            "INC" => {
                let (key, delta) = parse_key_delta(rest)?;
                Ok(Command::Increment { key, delta })
            }
            "DEC" => {
                let (key, delta) = parse_key_delta(rest)?;
                Ok(Command::Decrement { key, delta })
            }
            _ => Err(ParseError::UnknownCommand(verb.to_string())),
        }
    }

    /// Convert into the store operation this command performs.
    ///
    /// `Get` is a read, not an operation; callers route it separately.
    pub fn into_operation(self) -> Option<Operation> {
        match self {
            Command::Get { .. } => None,
            Command::Set { key, value } => Some(Operation::Set { key, value }),
            Command::Delete { key } => Some(Operation::Delete { key }),
            Command::Increment { key, delta } => Some(Operation::Increment { key, delta }),
            Command::Decrement { key, delta } => Some(Operation::Decrement { key, delta }),
            Command::Append { key, value } => Some(Operation::Append { key, suffix: value }),
            Command::Prepend { key, value } => Some(Operation::Prepend { key, prefix: value }),
        }
    }
}

fn validate_key(key: &str) -> Result<String, ParseError> {
    if key.is_empty() {
        return Err(ParseError::InvalidKey);
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ParseError::InvalidKey);
    }
    Ok(key.to_string())
}

fn parse_key(rest: Option<&str>) -> Result<String, ParseError> {
    let key = rest.ok_or(ParseError::MissingKey)?;
    validate_key(key)
}

fn parse_key_value(rest: Option<&str>) -> Result<(String, String), ParseError> {
    let rest = rest.ok_or(ParseError::MissingKey)?;
    let (key, value) = rest.split_once(' ').ok_or(ParseError::MissingValue)?;
    let key = validate_key(key)?;
    // The literal "" means the empty value; anything else is taken
    // verbatim, spaces included.
    let value = if value == "\"\"" {
        String::new()
    } else {
        value.to_string()
    };
    Ok((key, value))
}

fn parse_key_delta(rest: Option<&str>) -> Result<(String, i64), ParseError> {
    let rest = rest.ok_or(ParseError::MissingKey)?;
    match rest.split_once(' ') {
        None => Ok((validate_key(rest)?, 1)),
        Some((key, raw)) => {
            let key = validate_key(key)?;
            let delta = raw
                .parse::<i64>()
                .map_err(|_| ParseError::InvalidDelta(raw.to_string()))?;
            Ok((key, delta))
        }
    }
}

/// Response sent back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Value(String),
    NotFound,
    Deleted,
    Error(String),
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            // An empty stored value renders as the same literal clients
            // use to set it.
            Response::Value(v) if v.is_empty() => write!(f, "VALUE \"\""),
            Response::Value(v) => write!(f, "VALUE {}", v),
            Response::NotFound => write!(f, "NOT_FOUND"),
            Response::Deleted => write!(f, "DELETED"),
            Response::Error(msg) => write!(f, "ERROR {}", msg),
        }
    }
}
