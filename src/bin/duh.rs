//! The `duh` CLI: compile a source file to a `.pmc` listing, or compile and
//! run it directly (`spec.md` §6). Ported from `main.py`'s `compile_file`/
//! `run_file`.

use std::fs;
use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, info};

use duh::back::{format_listing, Machine, StdoutOutput};
use duh::error::{DuhError, RuntimeSetupError};
use duh::front::parse;
use duh::middle::compile_program;

#[derive(Debug, Parser)]
#[command(version, about = "Compiler and runtime for the duh language", long_about = None)]
struct Args {
    /// Source file. `--run` expects a `.duh` file; `--compile` accepts any name.
    file: String,

    /// Compile to a `.pmc` listing next to the source file.
    #[arg(long, conflicts_with = "run")]
    compile: bool,

    /// Compile and execute, reading the input/output memory protocol on stdin.
    #[arg(long, conflicts_with = "compile")]
    run: bool,
}

fn compile_source(source: &str) -> Result<Vec<duh::middle::ResolvedInstruction>, DuhError> {
    let program = parse(source)?;
    debug!("parsed {} top-level node(s)", program.0.len());
    let instructions = compile_program(&program);
    info!("compiled to {} instruction(s)", instructions.len());
    Ok(instructions)
}

/// `name.ext` -> `name.pmc`, matching `main.py`'s `source_file_name.split('.')`.
fn listing_path(source_path: &str) -> String {
    match source_path.split_once('.') {
        Some((stem, _)) => format!("{stem}.pmc"),
        None => format!("{source_path}.pmc"),
    }
}

fn compile_file(source_path: &str) -> Result<(), DuhError> {
    let source = fs::read_to_string(source_path)?;
    let instructions = compile_source(&source)?;
    let target_path = listing_path(source_path);
    fs::write(&target_path, format_listing(&instructions))?;
    info!("wrote {target_path}");
    Ok(())
}

/// The `--run` stdin protocol (`spec.md` §6): a header line `INP OUT`, then
/// `INP` lines `INDEX:VALUE` seeding memory, then `OUT` lines each a bare
/// memory index to print after execution.
struct RunRequest {
    seeds: Vec<(i64, i64)>,
    outputs: Vec<i64>,
}

fn parse_run_request(mut lines: impl Iterator<Item = io::Result<String>>) -> Result<RunRequest, DuhError> {
    let header = next_line(&mut lines)?;
    let mut header_parts = header.split_whitespace();
    let inp: usize = parse_field(&mut header_parts, &header)?;
    let out: usize = parse_field(&mut header_parts, &header)?;

    let mut seeds = Vec::with_capacity(inp);
    for _ in 0..inp {
        let line = next_line(&mut lines)?;
        let (index, value) = line
            .split_once(':')
            .ok_or_else(|| RuntimeSetupError::MalformedInput(line.clone()))?;
        let index: i64 =
            index.trim().parse().map_err(|_| RuntimeSetupError::MalformedInput(line.clone()))?;
        let value: i64 =
            value.trim().parse().map_err(|_| RuntimeSetupError::MalformedInput(line.clone()))?;
        seeds.push((index, value));
    }

    let mut outputs = Vec::with_capacity(out);
    for _ in 0..out {
        let line = next_line(&mut lines)?;
        let index: i64 =
            line.trim().parse().map_err(|_| RuntimeSetupError::MalformedInput(line.clone()))?;
        outputs.push(index);
    }

    Ok(RunRequest { seeds, outputs })
}

fn next_line(lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<String, DuhError> {
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(RuntimeSetupError::MalformedInput("expected another line of input".into()).into()),
    }
}

fn parse_field(parts: &mut std::str::SplitWhitespace<'_>, line: &str) -> Result<usize, DuhError> {
    parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| RuntimeSetupError::MalformedInput(line.to_string()).into())
}

fn run_file(source_path: &str) -> Result<(), DuhError> {
    let source = fs::read_to_string(source_path)?;
    let instructions = compile_source(&source)?;

    let stdin = io::stdin();
    let request = parse_run_request(stdin.lock().lines())?;

    let mut machine = Machine::new();
    for (index, value) in &request.seeds {
        if (0..duh::back::machine::MEMORY_SIZE as i64).contains(index) {
            machine.memory[*index as usize] = *value;
        }
    }

    let mut out = StdoutOutput;
    machine.run(&instructions, &mut out);

    for index in &request.outputs {
        if (0..duh::back::machine::MEMORY_SIZE as i64).contains(index) {
            println!("{}", machine.memory[*index as usize]);
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), DuhError> {
    match (args.compile, args.run) {
        (true, false) => compile_file(&args.file),
        (false, true) => run_file(&args.file),
        _ => Err(RuntimeSetupError::MalformedInput(
            "exactly one of --compile or --run is required".to_string(),
        )
        .into()),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("duh: {err}");
            ExitCode::FAILURE
        }
    }
}
