// Thin CLI driver: `run` compiles and executes a source file end to end;
// `assemble` turns the textual bytecode format into the binary one. No
// teacher equivalent (the original `main.rs` drove a GTK/DRM dashboard);
// grounded on `H1ghBre4k3r-y-lang`'s `clap::Parser`-derived `Cli` for the
// overall subcommand shape, and on the `thiserror`-within-the-library/
// `anyhow`-at-the-binary-boundary split `Luvion1-Fax`'s driver crates use.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use microlang::asm::{self, AssembleOptions};
use microlang::bytecode;
use microlang::clock::Clock;
use microlang::codegen::CodeGenerator;
use microlang::config::RunConfig;
use microlang::lexer::Lexer;
use microlang::optimizer::Optimizer;
use microlang::parser::parse;
use microlang::vm::{StdoutSink, VM};

#[derive(Parser)]
#[command(name = "microlang", version, about = "Lexer, parser, optimizer, bytecode compiler and stack VM for a small embeddable scripting language.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and run a source file.
    Run {
        path: PathBuf,

        /// Log every executed instruction and its operand stack depth.
        #[arg(long)]
        trace: bool,

        /// Caps the number of instructions the VM will execute before
        /// faulting with a budget-exceeded error.
        #[arg(long = "max-steps")]
        max_steps: Option<u64>,

        /// Skip the constant-folding/dead-code optimizer pass.
        #[arg(long = "no-optimize")]
        no_optimize: bool,

        /// Print the compiled bytecode's textual form before running it.
        #[arg(long = "dump-bytecode")]
        dump_bytecode: bool,

        /// Optional TOML file overriding the default VM limits.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Assemble a textual bytecode file into its binary form.
    Assemble {
        path: PathBuf,

        /// Output path; defaults to the input path with a `.mlbc` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Match opcode mnemonics case-sensitively (upper-case only).
        #[arg(long = "case-sensitive")]
        case_sensitive: bool,

        /// Treat an operand that doesn't match its opcode's expected kind
        /// as a hard error instead of coercing it.
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { path, trace, max_steps, no_optimize, dump_bytecode, config } => run_command(path, trace, max_steps, no_optimize, dump_bytecode, config),
        Command::Assemble { path, output, case_sensitive, strict } => assemble_command(path, output, case_sensitive, strict),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn init_logging(trace: bool) {
    let level = if trace { LevelFilter::Trace } else { LevelFilter::Warn };
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();
}

fn load_config(config_path: Option<PathBuf>, max_steps: Option<u64>) -> Result<RunConfig> {
    let mut config = match config_path {
        Some(path) => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading config file {}", path.display()))?;
            RunConfig::from_toml(&text).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => RunConfig::default(),
    };
    if let Some(steps) = max_steps {
        config.max_instructions = steps;
    }
    Ok(config)
}

/// Exit codes: 0 clean halt, 1 compile error (or any CLI-level failure), 2
/// runtime fault.
fn run_command(path: PathBuf, trace: bool, max_steps: Option<u64>, no_optimize: bool, dump_bytecode: bool, config_path: Option<PathBuf>) -> Result<ExitCode> {
    init_logging(trace);

    let source = fs::read_to_string(&path).with_context(|| format!("reading source file {}", path.display()))?;
    let config = load_config(config_path, max_steps)?;

    let (tokens, lex_errors) = Lexer::new(&source).tokenize();
    let (ast, parse_errors) = parse(tokens);
    let mut errors = lex_errors;
    for err in parse_errors.0 {
        errors.push(err);
    }
    if !errors.is_empty() {
        eprintln!("{}", errors);
        return Ok(ExitCode::from(1));
    }

    let ast = if no_optimize { ast } else { Optimizer::default().optimize(ast).optimized_tree };

    let codegen_result = CodeGenerator::new().generate(&ast);
    if !codegen_result.errors.is_empty() {
        eprintln!("{}", codegen_result.errors);
        return Ok(ExitCode::from(1));
    }

    if dump_bytecode {
        print!("{}", asm::disassemble(&codegen_result.program));
    }

    let clock = Clock::new();
    let mut vm = VM::new(codegen_result.program, codegen_result.functions, config.to_limits());
    let mut out = StdoutSink;
    match vm.run(&mut out) {
        Ok(()) => {
            log::trace!("execution finished in {:.6}s", clock.seconds());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", err);
            Ok(ExitCode::from(2))
        }
    }
}

fn assemble_command(path: PathBuf, output: Option<PathBuf>, case_sensitive: bool, strict: bool) -> Result<ExitCode> {
    init_logging(false);

    let source = fs::read_to_string(&path).with_context(|| format!("reading bytecode source {}", path.display()))?;
    let options = AssembleOptions { case_sensitive, strict_mode: strict };
    let program = match asm::assemble(&source, options) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("error: {}", err);
            return Ok(ExitCode::from(1));
        }
    };

    let bytes = bytecode::encode_binary(&program);
    let out_path = output.unwrap_or_else(|| path.with_extension("mlbc"));
    fs::write(&out_path, bytes).with_context(|| format!("writing bytecode output {}", out_path.display()))?;
    Ok(ExitCode::SUCCESS)
}
