use anyhow::Context;
use clap::Parser;
use itxn_check::checks::{all_checks, find_check};
use itxn_check::cli::{Args, CheckArgs, Command, OutputFormat};
use itxn_check::config::{self, DEFAULT_CONFIG_FILE_NAME};
use itxn_check::diagnostics::Severity;
use itxn_check::render;
use itxn_check::report::ProgramReport;
use itxn_check::{Checker, load_program, parse_program, trace_info};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::{DirEntry, WalkDir};

fn main() -> ExitCode {
    itxn_check::telemetry::init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Some(Command::ListChecks) => {
            list_checks();
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Explain { code }) => {
            explain_check(&code)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Check(check)) => check_command(check),
        None => check_command(args.check),
    }
}

fn list_checks() {
    let mut checks: Vec<_> = all_checks().to_vec();
    checks.sort_by_key(|d| d.name);

    for d in checks {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            d.name,
            d.category.as_str(),
            d.severity.as_str(),
            if d.fatal { "fatal" } else { "configurable" },
            d.description
        );
    }
}

fn explain_check(code: &str) -> anyhow::Result<()> {
    let Some(d) = find_check(code) else {
        anyhow::bail!("unknown check: {code}");
    };

    println!("name: {}", d.name);
    println!("category: {}", d.category.as_str());
    println!("analysis: {}", d.analysis.as_str());
    println!("severity: {}", d.severity.as_str());
    if d.fatal {
        println!("configurable: no (always an error)");
    } else {
        println!("configurable: yes ([checks] in {DEFAULT_CONFIG_FILE_NAME})");
    }
    println!("description: {}", d.description);
    Ok(())
}

fn check_command(args: CheckArgs) -> anyhow::Result<ExitCode> {
    let start_dir = infer_start_dir(&args)?;
    let checker = match config::load_config(args.config.as_deref(), &start_dir)? {
        Some((path, cfg)) => {
            trace_info!(config = %path.display(), "loaded configuration");
            Checker::new(cfg.settings()?, cfg.effects)
        }
        None => Checker::default(),
    };

    let reports = if args.paths.is_empty() {
        vec![check_stdin(&checker)?]
    } else {
        let files = collect_program_files(&args.paths)?;
        trace_info!(files = files.len(), "checking programs");
        files
            .iter()
            .map(|path| check_file(&checker, path))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    match args.format {
        OutputFormat::Json => {
            let out: Vec<_> = reports.iter().map(render::json_report).collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Pretty => {
            for report in &reports {
                print!("{}", render::render_pretty(report));
            }
        }
        OutputFormat::Github => {
            for report in &reports {
                print!("{}", render::render_github(report, args.deny_warnings));
            }
        }
    }

    let has_error = reports.iter().any(ProgramReport::has_errors);
    let warnings: usize = reports.iter().map(|r| r.count(Severity::Warning)).sum();
    if has_error || (args.deny_warnings && warnings > 0) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn check_file(checker: &Checker, path: &Path) -> anyhow::Result<ProgramReport> {
    let program = load_program(path)
        .with_context(|| format!("failed to load program: {}", path.display()))?;
    checker
        .check_program(&program)
        .with_context(|| format!("failed to check program: {}", path.display()))
}

fn check_stdin(checker: &Checker) -> anyhow::Result<ProgramReport> {
    let mut source = String::new();
    std::io::stdin().read_to_string(&mut source)?;
    let program = parse_program(&source).context("failed to parse program from stdin")?;
    Ok(checker.check_program(&program)?)
}

fn collect_program_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if !path.is_dir() {
            out.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .into_iter()
            .filter_entry(|e| !should_skip_dir(e))
        {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
            {
                out.push(entry.into_path());
            }
        }
    }

    out.sort();
    out.dedup();
    Ok(out)
}

fn should_skip_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    matches!(
        entry.file_name().to_str(),
        Some(".git" | "target" | "node_modules")
    )
}

fn infer_start_dir(args: &CheckArgs) -> anyhow::Result<PathBuf> {
    let base = match args.paths.first() {
        Some(p) => p.clone(),
        None => std::env::current_dir()?,
    };

    let base = if base.is_file() {
        base.parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        base
    };

    Ok(base)
}
