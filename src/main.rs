//!
//! Run a minilang program.
//!
//! Usage: `minilang [SOURCE] [-f FILE] [-s NAME=VALUE]... [--floor] [--cache N] [--repeat N]`

use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use log::error;
use minilang::cpu::Division;
use minilang::program::{Binding, Bindings, Program};
use minilang::error::EvalError;
use minilang::{Config, Interpreter, MAX_CACHE_CAPACITY};

#[derive(Parser, Debug)]
#[command(name = "minilang")]
#[command(about = "Run a stack machine program, optionally filling %<name>d placeholders")]
struct Args {
    /// Program text, e.g. "5 PUSH 3 MULT PRINT"
    source: Option<String>,

    /// Read the program text from a file
    #[arg(short = 'f', long = "file", conflicts_with = "source")]
    file: Option<PathBuf>,

    /// Placeholder binding, NAME=VALUE (repeatable)
    #[arg(short = 's', long = "set")]
    set: Vec<Binding>,

    /// Use floored DIV/MOD instead of truncating
    #[arg(long = "floor")]
    floor: bool,

    /// Translation cache capacity (0 disables)
    #[arg(
        long = "cache",
        default_value_t = 32,
        value_parser = clap::value_parser!(u64).range(0..=MAX_CACHE_CAPACITY as u64)
    )]
    cache: u64,

    /// Number of times to run the program
    #[arg(long = "repeat", default_value_t = 1)]
    repeat: usize,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let template = match (&args.source, &args.file) {
        (Some(source), _) => source.clone(),
        (None, Some(path)) => match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        (None, None) => {
            error!("no program given; pass SOURCE or --file");
            process::exit(1);
        }
    };

    let bindings: Bindings = args.set.into_iter().map(|b| (b.name, b.value)).collect();
    let config = Config {
        cache_capacity: args.cache as usize,
        division: if args.floor {
            Division::Floor
        } else {
            Division::Truncate
        },
    };

    let program = Program::new(template);
    let mut vm = Interpreter::new(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Err(e) = run_repeated(&mut vm, &program, &bindings, args.repeat, &mut out) {
        error!("{}", e);
        process::exit(1);
    }
}

/// Runs `program` `repeat` times and flushes `out`, whatever the outcome.
fn run_repeated<W: Write>(
    vm: &mut Interpreter,
    program: &Program,
    bindings: &Bindings,
    repeat: usize,
    out: &mut W,
) -> Result<(), EvalError> {
    let mut result = Ok(());
    for _ in 0..repeat {
        result = vm.eval(program, bindings, out).map(|_| ());
        if result.is_err() {
            break;
        }
    }
    let flushed = out.flush().map_err(EvalError::from);
    result.and(flushed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_flag_is_bounded() {
        let args = Args::try_parse_from(["minilang", "1 PRINT", "--cache", "4096"]).unwrap();
        assert_eq!(args.cache, MAX_CACHE_CAPACITY as u64);

        assert!(Args::try_parse_from(["minilang", "1 PRINT", "--cache", "100000000000"]).is_err());
    }

    struct FailingFlush(Vec<u8>);

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn flush_failure_is_an_error() {
        let mut vm = Interpreter::default();
        let mut out = FailingFlush(Vec::new());
        let err = run_repeated(&mut vm, &Program::new("1 PRINT"), &Bindings::new(), 2, &mut out)
            .unwrap_err();
        assert!(matches!(err, EvalError::Io(_)));
        assert_eq!(out.0, b"1\n1\n");
    }

    #[test]
    fn repeated_runs_write_every_pass() {
        let mut vm = Interpreter::default();
        let mut out = Vec::new();
        let program = Program::new("%<c>d PRINT");
        run_repeated(&mut vm, &program, &Bindings::new().with("c", 7), 3, &mut out).unwrap();
        assert_eq!(out, b"7\n7\n7\n");
    }

    #[test]
    fn set_flags_parse_into_bindings() {
        let args = Args::try_parse_from(["minilang", "%<c>d PRINT", "-s", "c =5"]).unwrap();
        assert_eq!(args.set[0].name, "c");
        assert_eq!(args.set[0].value, 5);
    }
}
