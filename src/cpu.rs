use std::fmt::Display;

use crate::error::{ArithmeticError, Trap};
use crate::memory::Stack;

/// Rounding used by `DIV` and `MOD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Division {
    /// Quotient rounds toward zero, remainder takes the dividend's sign.
    #[default]
    Truncate,
    /// Quotient rounds toward negative infinity, remainder takes the divisor's sign.
    Floor,
}

impl Division {
    fn div(self, lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
        if rhs == 0 {
            return Err(ArithmeticError::DivisionByZero);
        }
        let q = lhs.checked_div(rhs).ok_or(ArithmeticError::Overflow)?;
        match self {
            Division::Truncate => Ok(q),
            Division::Floor => {
                if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
                    Ok(q - 1)
                } else {
                    Ok(q)
                }
            }
        }
    }

    fn rem(self, lhs: i64, rhs: i64) -> Result<i64, ArithmeticError> {
        if rhs == 0 {
            return Err(ArithmeticError::DivisionByZero);
        }
        // i64::MIN % -1 overflows in checked_rem even though the answer is 0
        let r = lhs.checked_rem(rhs).unwrap_or(0);
        match self {
            Division::Truncate => Ok(r),
            Division::Floor => {
                if r != 0 && ((r < 0) != (rhs < 0)) {
                    Ok(r + rhs)
                } else {
                    Ok(r)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    PUSH,   // push A
    ADD,    // A = A + pop
    SUB,    // A = A - pop
    MULT,   // A = A * pop
    DIV,    // A = A / pop
    MOD,    // A = A % pop
    POP,    // A = pop
    PRINT,  // emit A
}

impl OpCode {
    pub const ALL: [OpCode; 8] = [
        OpCode::PUSH,
        OpCode::ADD,
        OpCode::SUB,
        OpCode::MULT,
        OpCode::DIV,
        OpCode::MOD,
        OpCode::POP,
        OpCode::PRINT,
    ];

    /// Case-sensitive keyword lookup.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.keyword() == keyword)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            OpCode::PUSH => "PUSH",
            OpCode::ADD => "ADD",
            OpCode::SUB => "SUB",
            OpCode::MULT => "MULT",
            OpCode::DIV => "DIV",
            OpCode::MOD => "MOD",
            OpCode::POP => "POP",
            OpCode::PRINT => "PRINT",
        }
    }
}

impl Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Per-run machine state. A fresh one is built for every run and dropped
/// when the run ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub register: i64,  // The accumulator register
    pub stack: Stack,   // Operands staged by PUSH
}

impl Display for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cpu [ register: {}, stack: {} ]", self.register, self.stack)
    }
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            register: 0,
            stack: Stack::new(),
        }
    }

    pub fn load(&mut self, value: i64) {
        self.register = value;
    }

    /// Applies one opcode. Returns the value to emit when the opcode is `PRINT`.
    ///
    /// The register is always the left operand and the popped value the right one.
    pub fn execute(&mut self, op: OpCode, division: Division) -> Result<Option<i64>, Trap> {
        let a = self.register;
        match op {
            OpCode::PUSH => self.stack.push(a),
            OpCode::ADD => {
                let v = self.stack.pop()?;
                self.register = a.checked_add(v).ok_or(ArithmeticError::Overflow)?;
            }
            OpCode::SUB => {
                let v = self.stack.pop()?;
                self.register = a.checked_sub(v).ok_or(ArithmeticError::Overflow)?;
            }
            OpCode::MULT => {
                let v = self.stack.pop()?;
                self.register = a.checked_mul(v).ok_or(ArithmeticError::Overflow)?;
            }
            OpCode::DIV => {
                let v = self.stack.pop()?;
                self.register = division.div(a, v)?;
            }
            OpCode::MOD => {
                let v = self.stack.pop()?;
                self.register = division.rem(a, v)?;
            }
            OpCode::POP => self.register = self.stack.pop()?,
            OpCode::PRINT => return Ok(Some(a)),
        }
        Ok(None)
    }
}
