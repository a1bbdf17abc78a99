use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use log::Level;
use nix_build_task::preflight::{check_required_tools, required_tools};
use nix_build_task::{exit_code_for, Env, RunMode, TaskConfig, TaskRunner};

const EXIT_USAGE: u8 = 2;

fn usage() -> &'static str {
    "Usage:\n  nix-build-task\n  nix-build-task eval-outpaths"
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let tag = match record.level() {
                Level::Error => "error: ",
                Level::Warn => "warning: ",
                _ => "",
            };
            writeln!(buf, "nix-build-task: {}{}", tag, record.args())
        })
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = match args.as_slice() {
        [] => RunMode::Build,
        [cmd] if cmd == "eval-outpaths" => RunMode::EvalOutpaths,
        _ => {
            eprintln!("{}", usage());
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            let code = exit_code_for(&err);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(mode: RunMode) -> Result<()> {
    let work_dir = std::env::current_dir().context("resolving current directory")?;
    let config = TaskConfig::resolve(&Env::from_process(), &work_dir)?;
    check_required_tools(&required_tools(&config, mode))?;

    let report = TaskRunner::new(&config, mode).run()?;
    log::info!(
        "done: {} target(s) run, {} result(s) materialized",
        report.built.len(),
        report.results
    );
    Ok(())
}
