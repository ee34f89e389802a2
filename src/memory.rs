use std::fmt::Display;

use crate::error::ProgramError;

/// LIFO operand stack. Values only ever enter it through `PUSH`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stack {
    data: Vec<i64>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: i64) {
        self.data.push(value);
    }

    pub fn pop(&mut self) -> Result<i64, ProgramError> {
        self.data.pop().ok_or(ProgramError::EmptyStack)
    }
}

impl Display for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (index, value) in self.data.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}
