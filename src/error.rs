use thiserror::Error;

/// Errors raised by a running program. These are the only errors the run
/// boundary catches and reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// A token that is neither an integer literal nor an opcode.
    #[error("Invalid token: {0}")]
    BadToken(String),
    /// An arithmetic or `POP` command found nothing on the stack.
    #[error("Empty stack!")]
    EmptyStack,
}

/// Errors produced while filling a template's placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("missing template binding: {0}")]
    Missing(String),
    #[error("malformed template at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("divided by 0")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
}

/// Everything that escapes the run boundary.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    #[error("unable to write program output: {0}")]
    Io(#[from] std::io::Error),
}

/// An [`EvalError`] raised while collecting output, with the lines that were
/// printed before it.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct CaptureError {
    pub lines: Vec<String>,
    pub source: EvalError,
}

/// Why a single command stopped the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    Program(ProgramError),
    Fault(ArithmeticError),
}

impl From<ProgramError> for Trap {
    fn from(e: ProgramError) -> Self {
        Trap::Program(e)
    }
}

impl From<ArithmeticError> for Trap {
    fn from(e: ArithmeticError) -> Self {
        Trap::Fault(e)
    }
}
