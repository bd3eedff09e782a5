//! kfrag CLI
//!
//! Entry point for the `kfrag` command-line tool.

use clap::{Parser, Subcommand};
use kconfig_fragments::config::{default_host_config_path, REPO_CONFIG_FILE};
use kconfig_fragments::pipeline::{Pipeline, PipelineConfig, PipelineError};
use kconfig_fragments::summary::ExitCode;
use kconfig_fragments::{logging, ConfigurationSnapshot, EffectiveConfig, Fragment, FragmentError};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "kfrag")]
#[command(about = "Validate and merge Linux kernel configuration fragments", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check fragments against the Kconfig line grammar
    Validate {
        /// Fragment files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Merge fragments onto a baseline and finalize the configuration
    Merge {
        /// Fragment files, applied in order after any in --fragment-dir
        fragments: Vec<PathBuf>,

        /// Path to repo config file (default: ./kfrag.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Kernel source tree
        #[arg(long, short = 'k')]
        kernel_dir: Option<PathBuf>,

        /// Kernel architecture (ARCH=)
        #[arg(long, short = 'a')]
        arch: Option<String>,

        /// Out-of-tree build directory (O=)
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,

        /// Directory for timestamped audit copies (default: output dir)
        #[arg(long)]
        audit_dir: Option<PathBuf>,

        /// Start from an existing .config instead of a make target
        #[arg(long)]
        baseline_file: Option<PathBuf>,

        /// Merge backend: script or builtin
        #[arg(long)]
        merge_backend: Option<String>,

        /// Skip dependency resolution
        #[arg(long)]
        no_resolve: bool,

        /// Directory of fragments, applied in file-name order
        #[arg(long)]
        fragment_dir: Option<PathBuf>,

        /// Validate and print the plan without running any tool
        #[arg(long)]
        dry_run: bool,

        /// Output the report in JSON format
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the effective settings and where they came from
    Config {
        /// Path to repo config file (default: ./kfrag.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compare two .config files
    Diff {
        before: PathBuf,
        after: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Validate { files, json } => {
            run_validate(&files, json);
        }
        Commands::Merge {
            fragments,
            config,
            kernel_dir,
            arch,
            output_dir,
            audit_dir,
            baseline_file,
            merge_backend,
            no_resolve,
            fragment_dir,
            dry_run,
            json,
            report,
        } => {
            let overrides = MergeOverrides {
                fragments,
                kernel_dir,
                arch,
                output_dir,
                audit_dir,
                baseline_file,
                merge_backend,
                no_resolve,
                fragment_dir,
            };
            run_merge(config, overrides.to_value(), dry_run, json, report);
        }
        Commands::Config { config, json } => {
            run_config(config, json);
        }
        Commands::Diff {
            before,
            after,
            json,
        } => {
            run_diff(&before, &after, json);
        }
    }
}

fn run_validate(files: &[PathBuf], json_output: bool) {
    let results: Vec<(&PathBuf, Result<Fragment, FragmentError>)> =
        files.iter().map(|p| (p, Fragment::load(p))).collect();
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    if json_output {
        let output: Vec<Value> = results
            .iter()
            .map(|(path, result)| match result {
                Ok(fragment) => json!({
                    "path": path,
                    "accepted": true,
                    "directives": fragment.directives.len(),
                    "digest": fragment.digest,
                }),
                Err(FragmentError::Malformed { defects, .. }) => json!({
                    "path": path,
                    "accepted": false,
                    "defects": defects,
                }),
                Err(e) => json!({
                    "path": path,
                    "accepted": false,
                    "error": e.to_string(),
                }),
            })
            .collect();
        print_json(&output);
    } else {
        for (path, result) in &results {
            match result {
                Ok(fragment) => {
                    println!("OK       {} ({} directive(s))", path.display(), fragment.directives.len());
                }
                Err(e) => {
                    println!("INVALID  {}", path.display());
                    print_fragment_error(e);
                }
            }
        }
    }

    if failed > 0 {
        process::exit(ExitCode::Input.as_i32());
    }
}

/// Merge flags that feed the CLI settings layer
struct MergeOverrides {
    fragments: Vec<PathBuf>,
    kernel_dir: Option<PathBuf>,
    arch: Option<String>,
    output_dir: Option<PathBuf>,
    audit_dir: Option<PathBuf>,
    baseline_file: Option<PathBuf>,
    merge_backend: Option<String>,
    no_resolve: bool,
    fragment_dir: Option<PathBuf>,
}

impl MergeOverrides {
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if !self.fragments.is_empty() {
            map.insert("fragments".to_string(), json!(self.fragments));
        }
        if let Some(ref dir) = self.kernel_dir {
            map.insert("kernel_dir".to_string(), json!(dir));
        }
        if let Some(ref arch) = self.arch {
            map.insert("arch".to_string(), json!(arch));
        }
        if let Some(ref dir) = self.output_dir {
            map.insert("output_dir".to_string(), json!(dir));
        }
        if let Some(ref dir) = self.audit_dir {
            map.insert("audit_dir".to_string(), json!(dir));
        }
        if let Some(ref file) = self.baseline_file {
            map.insert("baseline".to_string(), json!({"kind": "file", "file": file}));
        }
        if let Some(ref backend) = self.merge_backend {
            map.insert("merge".to_string(), json!({"backend": backend}));
        }
        if self.no_resolve {
            map.insert("resolve".to_string(), json!({"backend": "none"}));
        }
        if let Some(ref dir) = self.fragment_dir {
            map.insert("fragment_dir".to_string(), json!(dir));
        }
        Value::Object(map)
    }
}

fn load_effective(config_path: Option<PathBuf>, cli: Option<Value>) -> EffectiveConfig {
    let repo = config_path.unwrap_or_else(|| PathBuf::from(REPO_CONFIG_FILE));
    let host = default_host_config_path();

    match EffectiveConfig::build(host.as_deref(), Some(&repo), cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(ExitCode::Config.as_i32());
        }
    }
}

fn run_merge(
    config_path: Option<PathBuf>,
    cli: Value,
    dry_run: bool,
    json_output: bool,
    report_path: Option<PathBuf>,
) {
    let effective = load_effective(config_path, Some(cli));

    let settings = match effective.settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.as_i32());
        }
    };

    let fragments = match settings.fragment_paths() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.as_i32());
        }
    };

    if fragments.is_empty() {
        eprintln!("No fragments given. Pass fragment files or --fragment-dir.");
        process::exit(ExitCode::Config.as_i32());
    }

    let capabilities = match settings.capabilities() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.as_i32());
        }
    };

    let mut config = PipelineConfig::new(fragments, settings.output_config());
    config.dry_run = dry_run;

    let mut pipeline = Pipeline::new(config, capabilities);
    match pipeline.run() {
        Ok(report) => {
            if let Some(ref path) = report_path {
                if let Err(e) = report.write_to_file(path) {
                    eprintln!("Error writing report {}: {}", path.display(), e);
                    process::exit(ExitCode::Persist.as_i32());
                }
            }
            if json_output {
                match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing output: {}", e);
                        process::exit(ExitCode::Internal.as_i32());
                    }
                }
            } else {
                print!("{}", report.to_human());
            }
        }
        Err(e) => {
            eprintln!("{}: {}", e.kind().description(), e);
            print_pipeline_error(&e);
            process::exit(e.exit_code().as_i32());
        }
    }
}

fn print_pipeline_error(error: &PipelineError) {
    match error {
        PipelineError::Input { errors } => {
            for e in errors {
                eprintln!("  {}", e);
                for line in e.offending_lines() {
                    eprintln!("    {}", line);
                }
            }
        }
        PipelineError::Merge { source, .. }
        | PipelineError::Baseline(source)
        | PipelineError::Resolution(source)
        | PipelineError::Persist(source) => {
            for defect in source.defects() {
                eprintln!("  line {}: {}", defect.line_number, defect.text);
                eprintln!("    {}", defect.reason);
            }
            if let Some(output) = source.tool_output() {
                eprintln!("--- tool output ---");
                eprintln!("{}", output);
            }
        }
        _ => {}
    }
}

fn print_fragment_error(error: &FragmentError) {
    match error {
        FragmentError::Malformed { defects, .. } => {
            for defect in defects {
                println!("  line {}: {}", defect.line_number, defect.text);
                println!("    {}", defect.reason);
            }
        }
        other => println!("  {}", other),
    }
}

fn run_config(config_path: Option<PathBuf>, json_output: bool) {
    let effective = load_effective(config_path, None);

    if json_output {
        match effective.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(ExitCode::Internal.as_i32());
            }
        }
    } else {
        println!("Effective settings (digest {}):", effective.digest);
        for source in &effective.sources {
            match source.path {
                Some(ref path) => println!("  {:?}: {}", source.origin, path),
                None => println!("  {:?}", source.origin),
            }
        }
        println!();
        match toml::to_string_pretty(&effective.config) {
            Ok(text) => print!("{}", text),
            Err(e) => {
                eprintln!("Error rendering settings: {}", e);
                process::exit(ExitCode::Internal.as_i32());
            }
        }
    }

    if let Err(e) = effective.settings() {
        eprintln!("Configuration error: {}", e);
        process::exit(ExitCode::Config.as_i32());
    }
}

fn load_snapshot(path: &Path) -> ConfigurationSnapshot {
    match ConfigurationSnapshot::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            for defect in e.defects() {
                eprintln!("  line {}: {}", defect.line_number, defect.text);
                eprintln!("    {}", defect.reason);
            }
            process::exit(ExitCode::Input.as_i32());
        }
    }
}

fn run_diff(before: &Path, after: &Path, json_output: bool) {
    let before = load_snapshot(before);
    let after = load_snapshot(after);
    let changes = before.diff(&after);

    if json_output {
        print_json(&changes);
    } else if changes.is_empty() {
        println!("No differences.");
    } else {
        for change in &changes {
            println!("{}", change.to_human());
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(ExitCode::Internal.as_i32());
        }
    }
}
