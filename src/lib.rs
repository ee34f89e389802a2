pub mod cpu;
pub mod error;
pub mod memory;
pub mod program;
pub mod translation;

use std::io::Write;
use std::rc::Rc;

use caches::Cache;
use cpu::{Cpu, Division};
use error::{CaptureError, EvalError, ProgramError, Trap};
use log::{debug, info, warn};

use program::{Bindings, Program};
use translation::{Command, Translation};

const CACHE_SIZE: usize = 32;

/// Largest translation cache an interpreter will allocate.
pub const MAX_CACHE_CAPACITY: usize = 4096;

type CodeCache = caches::AdaptiveCache<String, Rc<Translation>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of concrete instruction strings whose translation is kept.
    /// Zero disables the cache.
    pub cache_capacity: usize,
    pub division: Division,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: CACHE_SIZE,
            division: Division::default(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    Ok,
    Error(ProgramError),
}

impl Halt {
    pub fn is_ok(&self) -> bool {
        matches!(self, Halt::Ok)
    }
}

pub struct Interpreter {
    config: Config,
    code_cache: Option<CodeCache>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        let mut config = config;
        if config.cache_capacity > MAX_CACHE_CAPACITY {
            warn!(
                "translation cache capacity {} clamped to {}",
                config.cache_capacity, MAX_CACHE_CAPACITY
            );
            config.cache_capacity = MAX_CACHE_CAPACITY;
        }

        let code_cache = if config.cache_capacity == 0 {
            None
        } else {
            match CodeCache::new(config.cache_capacity) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!("unable to build the translation cache, running uncached: {:?}", e);
                    None
                }
            }
        };
        Self { config, code_cache }
    }

    /// Number of translations currently cached.
    pub fn cached_translations(&self) -> usize {
        self.code_cache.as_ref().map_or(0, |cache| cache.len())
    }

    /// Renders `program` with `bindings` and runs the result.
    ///
    /// Template errors are returned before anything runs.
    pub fn eval<W: Write>(
        &mut self,
        program: &Program,
        bindings: &Bindings,
        out: &mut W,
    ) -> Result<Halt, EvalError> {
        let source = program.render(bindings)?;
        self.run(&source, out)
    }

    /// Runs concrete program text against a fresh machine.
    ///
    /// A program error is written to `out` as a single line and reported
    /// through the returned [`Halt`]; it is not an `Err`.
    pub fn run<W: Write>(&mut self, source: &str, out: &mut W) -> Result<Halt, EvalError> {
        let translation = self.translate(source);
        let mut cpu = Cpu::new();

        let halt = self.interpret(&mut cpu, &translation, out)?;
        if let Halt::Error(e) = &halt {
            warn!("program halted: {}", e);
            writeln!(out, "{}", e)?;
        }

        info!("{}", cpu);
        Ok(halt)
    }

    /// Like [`Interpreter::eval`], collecting output lines. On failure the
    /// lines printed before it travel with the error.
    pub fn capture(
        &mut self,
        program: &Program,
        bindings: &Bindings,
    ) -> Result<Vec<String>, CaptureError> {
        let mut buf = Vec::new();
        let result = self.eval(program, bindings, &mut buf);
        let lines = String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect();
        match result {
            Ok(_) => Ok(lines),
            Err(source) => Err(CaptureError { lines, source }),
        }
    }

    fn translate(&mut self, source: &str) -> Rc<Translation> {
        let cache = match self.code_cache.as_mut() {
            Some(cache) => cache,
            None => return Rc::new(Translation::new(source)),
        };

        let key = source.to_string();
        if let Some(translation) = cache.get(&key) {
            debug!("translation found in cache");
            return Rc::clone(translation);
        }

        debug!("translation not found...");
        let translation = Rc::new(Translation::new(source));
        cache.put(key, Rc::clone(&translation));
        translation
    }

    fn interpret<W: Write>(
        &self,
        cpu: &mut Cpu,
        translation: &Translation,
        out: &mut W,
    ) -> Result<Halt, EvalError> {
        for command in &translation.commands {
            debug!("State: {} | {}", cpu, command);

            match *command {
                Command::Literal(value) => cpu.load(value),
                Command::Op(op) => match cpu.execute(op, self.config.division) {
                    Ok(Some(value)) => writeln!(out, "{}", value)?,
                    Ok(None) => {}
                    Err(Trap::Program(e)) => return Ok(Halt::Error(e)),
                    Err(Trap::Fault(e)) => return Err(e.into()),
                },
            }
        }

        Ok(translation.trailing_error().map_or(Halt::Ok, Halt::Error))
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use crate::error::{ArithmeticError, TemplateError};

    const CENTIGRADE_TO_FAHRENHEIT: &str =
        "5 PUSH %<degrees_c>d PUSH 9 MULT DIV PUSH 32 ADD PRINT";
    const FAHRENHEIT_TO_CENTIGRADE: &str =
        "9 PUSH 5 PUSH 32 PUSH %<degrees_f>d SUB MULT DIV PRINT";

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn run(source: &str) -> Vec<String> {
        let mut vm = Interpreter::default();
        vm.capture(&Program::new(source), &Bindings::new())
            .expect("program should not fault")
    }

    #[test]
    pub fn scenario_print_only() {
        init();
        assert_eq!(run("PRINT"), vec!["0"]);
    }

    #[test]
    pub fn scenario_mult() {
        init();
        assert_eq!(run("5 PUSH 3 MULT PRINT"), vec!["15"]);
    }

    #[test]
    pub fn scenario_prints_in_order() {
        init();
        assert_eq!(run("5 PRINT PUSH 3 PRINT ADD PRINT"), vec!["5", "3", "8"]);
        assert_eq!(run("5 PUSH 10 PRINT POP PRINT"), vec!["10", "5"]);
    }

    #[test]
    pub fn scenario_div_and_mod() {
        init();
        assert_eq!(run("3 PUSH PUSH 7 DIV MULT PRINT "), vec!["6"]);
        assert_eq!(run("4 PUSH PUSH 7 MOD MULT PRINT "), vec!["12"]);
        assert_eq!(run("-3 PUSH 5 SUB PRINT"), vec!["8"]);
    }

    #[test]
    pub fn scenario_empty_stack() {
        init();
        assert_eq!(run("5 PUSH POP POP PRINT"), vec!["Empty stack!"]);
    }

    #[test]
    pub fn scenario_bad_token() {
        init();
        assert_eq!(run("-3 PUSH 5 XSUB PRINT"), vec!["Invalid token: XSUB"]);
    }

    #[test]
    pub fn scenario_no_print() {
        init();
        assert!(run("6 PUSH").is_empty());
        assert!(run("").is_empty());
    }

    #[test]
    pub fn output_before_error_stands() {
        init();
        assert_eq!(
            run("7 PRINT 8 PRINT POP 9 PRINT"),
            vec!["7", "8", "Empty stack!"]
        );
        assert_eq!(
            run("1 PRINT PUSH 2 PRINT NOPE PRINT"),
            vec!["1", "2", "Invalid token: NOPE"]
        );
    }

    #[test]
    pub fn empty_stack_before_bad_token_wins() {
        init();
        assert_eq!(run("ADD XSUB"), vec!["Empty stack!"]);
    }

    #[test]
    pub fn halt_reports_program_error() {
        init();
        let mut vm = Interpreter::default();
        let mut out = Vec::new();
        let halt = vm.run("POP", &mut out).unwrap();
        assert_eq!(halt, Halt::Error(ProgramError::EmptyStack));
        assert_eq!(out, b"Empty stack!\n");

        let halt = vm.run("1 PRINT", &mut out).unwrap();
        assert!(halt.is_ok());
    }

    #[test]
    pub fn template_reuse_does_not_leak_state() {
        init();
        let program = Program::new(CENTIGRADE_TO_FAHRENHEIT);
        let mut vm = Interpreter::default();
        for (c, f) in [(100, "212"), (0, "32"), (-40, "-40"), (100, "212")] {
            let out = vm
                .capture(&program, &Bindings::new().with("degrees_c", c))
                .unwrap();
            assert_eq!(out, vec![f]);
        }

        let program = Program::new(FAHRENHEIT_TO_CENTIGRADE);
        for (f, c) in [(212, "100"), (32, "0"), (-40, "-40")] {
            let out = vm
                .capture(&program, &Bindings::new().with("degrees_f", f))
                .unwrap();
            assert_eq!(out, vec![c]);
        }
    }

    #[test]
    pub fn repeated_runs_are_identical() {
        init();
        let program = Program::new("5 PRINT PUSH 3 PRINT ADD PRINT");
        let mut vm = Interpreter::default();
        let first = vm.capture(&program, &Bindings::new()).unwrap();
        let second = vm.capture(&program, &Bindings::new()).unwrap();
        assert_eq!(first, second);
        assert_eq!(vm.cached_translations(), 1);
    }

    #[test]
    pub fn uncached_interpreter_behaves_the_same() {
        init();
        let mut vm = Interpreter::new(Config {
            cache_capacity: 0,
            ..Config::default()
        });
        let program = Program::new(CENTIGRADE_TO_FAHRENHEIT);
        let out = vm
            .capture(&program, &Bindings::new().with("degrees_c", 100))
            .unwrap();
        assert_eq!(out, vec!["212"]);
        assert_eq!(vm.cached_translations(), 0);
    }

    #[test]
    pub fn missing_binding_propagates() {
        init();
        let mut vm = Interpreter::default();
        let mut out = Vec::new();
        let err = vm
            .eval(&Program::new(CENTIGRADE_TO_FAHRENHEIT), &Bindings::new(), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::Template(TemplateError::Missing(ref name)) if name == "degrees_c"
        ));
        assert!(out.is_empty());
    }

    #[test]
    pub fn division_by_zero_propagates_after_prior_output() {
        init();
        let mut vm = Interpreter::default();
        let mut out = Vec::new();
        let err = vm.run("5 PRINT 0 PUSH 1 DIV PRINT", &mut out).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Arithmetic(ArithmeticError::DivisionByZero)
        ));
        assert_eq!(out, b"5\n");
    }

    #[test]
    pub fn capture_keeps_lines_printed_before_a_fault() {
        init();
        let mut vm = Interpreter::default();
        let err = vm
            .capture(&Program::new("5 PRINT 0 PUSH 1 DIV"), &Bindings::new())
            .unwrap_err();
        assert_eq!(err.lines, vec!["5"]);
        assert!(matches!(
            err.source,
            EvalError::Arithmetic(ArithmeticError::DivisionByZero)
        ));
        assert_eq!(err.to_string(), "divided by 0");
    }

    #[test]
    pub fn oversized_cache_is_clamped() {
        init();
        for capacity in [usize::MAX, usize::MAX / 2, MAX_CACHE_CAPACITY + 1] {
            let mut vm = Interpreter::new(Config {
                cache_capacity: capacity,
                ..Config::default()
            });
            let out = vm
                .capture(&Program::new("1 PRINT"), &Bindings::new())
                .unwrap();
            assert_eq!(out, vec!["1"]);
            assert_eq!(vm.cached_translations(), 1);
        }
    }

    #[test]
    pub fn floored_division_mode() {
        init();
        let mut vm = Interpreter::new(Config {
            division: Division::Floor,
            ..Config::default()
        });
        let out = vm
            .capture(&Program::new("2 PUSH -7 DIV PRINT 2 PUSH -7 MOD PRINT"), &Bindings::new())
            .unwrap();
        assert_eq!(out, vec!["-4", "1"]);

        let out = run("2 PUSH -7 DIV PRINT 2 PUSH -7 MOD PRINT");
        assert_eq!(out, vec!["-3", "-1"]);
    }
}
