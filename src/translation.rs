use std::fmt::Display;

use crate::cpu::OpCode;
use crate::error::ProgramError;

/// A classified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Literal(i64),
    Op(OpCode),
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Literal(n) => write!(f, "{}", n),
            Command::Op(op) => write!(f, "{}", op),
        }
    }
}

/// Splits program text on runs of whitespace.
pub fn tokenize(source: &str) -> impl Iterator<Item = &str> {
    source.split_whitespace()
}

/// Parses a token as an integer literal. The value must print back to
/// exactly the same text, so `+5`, `007` and `-0` are not literals.
fn parse_literal(token: &str) -> Option<i64> {
    let value = token.parse::<i64>().ok()?;
    if value.to_string() == token {
        Some(value)
    } else {
        None
    }
}

pub fn classify(token: &str) -> Result<Command, ProgramError> {
    if let Some(value) = parse_literal(token) {
        return Ok(Command::Literal(value));
    }
    OpCode::from_keyword(token)
        .map(Command::Op)
        .ok_or_else(|| ProgramError::BadToken(token.to_string()))
}

/// The classified form of one concrete instruction string.
///
/// Classification stops at the first bad token. The commands before it still
/// run, and the error is raised once execution reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub commands: Vec<Command>,
    pub bad_token: Option<String>,
}

impl Translation {
    pub fn new(source: &str) -> Self {
        let mut commands = Vec::new();
        for token in tokenize(source) {
            match classify(token) {
                Ok(command) => commands.push(command),
                Err(_) => {
                    return Self {
                        commands,
                        bad_token: Some(token.to_string()),
                    }
                }
            }
        }
        Self {
            commands,
            bad_token: None,
        }
    }

    /// The error that ends execution once every command has run.
    pub fn trailing_error(&self) -> Option<ProgramError> {
        self.bad_token.clone().map(ProgramError::BadToken)
    }
}
