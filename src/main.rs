//! repatch CLI - Command-line interface
//!
//! Commands:
//!   patch     - Apply a rule set to an index, emit patch instructions
//!   validate  - Pre-flight check of rule files
//!   show      - List loaded rules and the rule-set hash
//!   schema    - Print JSON schema for rule/instruction documents

use repatch::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "patch" => cmd_patch(&args[2..]),
        "validate" => cmd_validate(&args[2..]),
        "show" => cmd_show(&args[2..]),
        "schema" => cmd_schema(&args[2..]),
        "version" | "--version" | "-v" => {
            println!("repatch {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"
repatch - rule-driven dependency metadata patching

USAGE:
    repatch <COMMAND> [OPTIONS]

COMMANDS:
    patch <repodata.json> <rules>    Apply rules, emit patch instructions
    validate <rules>                 Pre-flight check of rule files
    show <rules>                     List loaded rules and rule-set hash
    schema [name]                    Print JSON schema for output type
    version                          Print version

OPTIONS:
    --subdir <subdir>                Subdir being processed (default: the
                                     index's info.subdir)
    --output <file>                  Instruction output file (default: stdout)
    --patched <file>                 Also write the patched index

EXAMPLES:
    repatch patch linux-64/repodata.json rules/ --output patch_instructions.json
    repatch patch repodata.json hotfix.yaml --subdir osx-64 --patched patched.json
    repatch validate rules/
    repatch schema rule
"#
    );
}

fn cmd_patch(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        return Err(
            "Usage: repatch patch <repodata.json> <rules> [--subdir <s>] [--output <file>] [--patched <file>]"
                .into(),
        );
    }

    let index_path = &args[0];
    let rules_path = &args[1];
    let output = parse_value_arg(args, "--output").map(PathBuf::from);
    let patched_out = parse_value_arg(args, "--patched").map(PathBuf::from);

    let rules = RuleSet::load(Path::new(rules_path))?;
    if rules.is_empty() {
        eprintln!("Warning: no rules loaded from {}", rules_path);
    }

    let content = fs::read_to_string(index_path).map_err(Error::Io)?;
    let index = RepoIndex::from_json(&content)?;

    let subdir = match parse_value_arg(args, "--subdir") {
        Some(s) => s,
        None => index
            .info_subdir()
            .map(str::to_string)
            .ok_or("No --subdir given and the index carries no info.subdir")?,
    };

    let outcome = PatchEngine::new(rules).run(&index, &subdir)?;

    write_output(&output, &outcome.instructions.to_json()?)?;

    if let Some(path) = &patched_out {
        fs::write(path, outcome.patched.to_json()?).map_err(Error::Io)?;
        eprintln!("Patched index written to: {}", path.display());
    }

    let entries =
        outcome.instructions.packages.len() + outcome.instructions.conda_packages.len();
    eprintln!(
        "✓ {} of {} record(s) patched ({})",
        entries,
        index.record_count(),
        subdir
    );
    Ok(())
}

fn cmd_validate(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err("Usage: repatch validate <rules>".into());
    }

    let path = &args[0];
    let result = validate_path(Path::new(path));

    if result.issues.is_empty() {
        println!(
            "✓ {}: {} rule(s) across {} file(s), no issues",
            path, result.rules_parsed, result.files_checked
        );
        return Ok(());
    }

    for issue in &result.issues {
        let marker = match issue.severity {
            Severity::Error => "✗",
            Severity::Warning => "⚠",
        };
        println!("{} [{}] {}: {}", marker, issue.code, issue.file, issue.message);
    }
    println!(
        "\nSummary: {} error(s), {} warning(s)",
        result.error_count(),
        result.warning_count()
    );

    if result.has_errors() {
        Err("Validation failed".into())
    } else {
        Ok(())
    }
}

fn cmd_show(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Err("Usage: repatch show <rules>".into());
    }

    let rules = RuleSet::load(Path::new(&args[0]))?;
    println!("Rule set: {} rule(s), hash {}", rules.len(), rules.hash());
    for rule in rules.rules() {
        println!(
            "  {} - {} condition(s), {} operation(s)",
            rule.source,
            rule.conditions.len(),
            rule.ops.len()
        );
    }
    Ok(())
}

fn cmd_schema(args: &[String]) -> Result<()> {
    let schema_name = args.first().map(|s| s.as_str()).unwrap_or("list");

    match schema_name {
        "list" => {
            println!("Available schemas: rule, instructions");
            Ok(())
        }
        "rule" => print_schema::<RuleDoc>(),
        "instructions" => print_schema::<PatchInstructions>(),
        _ => Err(format!("Unknown schema: {}", schema_name).into()),
    }
}

fn print_schema<T: schemars::JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn parse_value_arg(args: &[String], flag: &str) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if arg == flag {
            if let Some(value) = args.get(i + 1) {
                return Some(value.clone());
            }
        }
    }
    None
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content).map_err(Error::Io)?;
            eprintln!("Written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
