//! `ralph-ring`: loads a compiled program and either runs it to
//! completion or attaches the interactive debugger.

mod config;
mod report;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::Config;
use ralph_core::debugger::{command, Debugger};
use ralph_core::vm::WriterSink;
use ralph_core::{Program, Vm};
use ralph_primitives::AiBackend;
use report::Report;

#[derive(Parser)]
#[command(name = "ralph-ring", about = "Stack VM and debugger for the ralph-ring DSL toolchain")]
struct Cli {
    /// Optional TOML configuration file (defaults < file < CLI flags).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a compiled program to completion.
    Run {
        program: PathBuf,
        /// Write the JSON execution report here instead of stdout.
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        safe_mode: Option<bool>,
    },
    /// Attach the interactive debugger to a compiled program.
    Debug { program: PathBuf },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            2
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = Config::load_file(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { program, report, safe_mode } => {
            if let Some(s) = safe_mode {
                config.safe_mode = s;
            }
            let instructions = load_program(&program)?;
            let mut vm = build_vm(&config, instructions)?;
            // `debug_mode` only gates whether a debugger attaches, never its
            // breakpoint set — it applies here too, not just to the `debug`
            // subcommand, so a config file alone can turn `run` interactive.
            if config.debug_mode {
                attach_debugger(&mut vm)?;
            } else {
                vm.run();
            }
            let snapshot = vm.snapshot();
            write_report(&snapshot, &vm, report.as_deref())?;
            Ok(if snapshot.fault_flag { 1 } else { 0 })
        }
        Commands::Debug { program } => {
            let instructions = load_program(&program)?;
            let mut vm = build_vm(&config, instructions)?;
            attach_debugger(&mut vm)?;
            Ok(if vm.snapshot().fault_flag { 1 } else { 0 })
        }
    }
}

fn load_program(path: &std::path::Path) -> anyhow::Result<Vec<ralph_core::Instr>> {
    let bytes = std::fs::read(path).map_err(|e| anyhow::anyhow!("reading program {}: {e}", path.display()))?;
    ralph_core::format::read_program(&bytes).map_err(|e| anyhow::anyhow!("loading program {}: {e}", path.display()))
}

fn build_vm(config: &Config, instructions: Vec<ralph_core::Instr>) -> anyhow::Result<Vm> {
    let backend = AiBackend::parse(&config.ai_backend).ok_or_else(|| anyhow::anyhow!("unknown ai_backend '{}'", config.ai_backend))?;
    let registry = ralph_primitives::default_registry(
        backend,
        config.ai_endpoint.clone(),
        config.ai_api_key.clone(),
        config.verifier_timeout(),
        config.ai_timeout(),
    );
    let mut vm = Vm::new(config.safe_mode, config.memory_size, registry);
    vm.set_output_sink(Box::new(WriterSink(io::stdout())));
    vm.set_debug_sink(Box::new(WriterSink(io::stderr())));
    let program = Program::load(instructions).map_err(|e| anyhow::anyhow!("{e}"))?;
    vm.load(program);
    Ok(vm)
}

fn write_report(snapshot: &ralph_core::Snapshot, vm: &Vm, path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let report = Report::build(snapshot, vm.error_center().log());
    let json = report.to_json()?;
    match path {
        Some(p) => std::fs::write(p, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn attach_debugger(vm: &mut Vm) -> anyhow::Result<()> {
    let mut debugger = Debugger::new();
    if let Some(p) = vm.program() {
        debugger.load_program(p);
    }
    interactive_debug(&mut debugger, vm)
}

fn interactive_debug(debugger: &mut Debugger, vm: &mut Vm) -> anyhow::Result<()> {
    let stdin = io::stdin();
    println!("ralph-ring debugger — type 'help' for commands");
    loop {
        print!("(ralph-dbg) ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        match command::parse(&line) {
            Ok(command::Command::Quit) => {
                let output = command::execute(debugger, vm, command::Command::Quit);
                println!("{output}");
                break;
            }
            Ok(cmd) => {
                let output = command::execute(debugger, vm, cmd);
                println!("{output}");
                if !vm.is_running() {
                    println!("(program finished)");
                }
            }
            Err(e) => println!("error: {}", e.0),
        }
    }
    Ok(())
}
