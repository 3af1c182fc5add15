use clap::{Parser, Subcommand};
use razor_transpiler::{compile_with, CompileError, Options, Pipeline};
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, Level};
use walkdir::WalkDir;

const TEMPLATE_EXTENSIONS: &[&str] = &["cshtml", "razor"];

#[derive(Parser)]
#[command(name = "razor")]
#[command(about = "Razor - compile and render .cshtml templates")]
struct Cli {
    /// Log more (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template against a JSON model
    Render {
        file: PathBuf,

        /// JSON file holding the model
        #[arg(long)]
        model: Option<PathBuf>,

        /// JSON file holding compiler options
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Compile every template under a path and report errors
    Check { path: PathBuf },
    /// Print the generated program of a template
    Program {
        file: PathBuf,

        /// Print the parsed AST as JSON instead
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();

    let result = match cli.command {
        Commands::Render { file, model, config } => render(&file, model.as_deref(), config.as_deref()),
        Commands::Check { path } => check(&path),
        Commands::Program { file, json } => program(&file, json),
    };

    match result {
        Ok(code) => code,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("cannot read {}: {}", path.display(), err))
}

fn render(file: &Path, model: Option<&Path>, config: Option<&Path>) -> Result<ExitCode, String> {
    let options = match config {
        Some(path) => Options::from_json(&read(path)?).map_err(|err| format!("invalid config {}: {}", path.display(), err))?,
        None => Options::default(),
    };
    let model = match model {
        Some(path) => serde_json::from_str(&read(path)?).map_err(|err| format!("invalid model {}: {}", path.display(), err))?,
        None => serde_json::Value::Object(serde_json::Map::new()),
    };

    let source = read(file)?;
    let view = match compile_with(&source, &options) {
        Ok(view) => view,
        Err(err) => {
            report(&err, &source, file);
            return Ok(ExitCode::FAILURE);
        }
    };
    for name in view.missing_helpers() {
        eprintln!("warning: helper `{}` is not defined", name);
    }

    let html = view.execute(&model).map_err(|err| err.to_string())?;
    print!("{}", html);
    Ok(ExitCode::SUCCESS)
}

fn check(path: &Path) -> Result<ExitCode, String> {
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()));
    }

    let start = Instant::now();
    let pipeline = Pipeline::standard();
    let mut checked = 0;
    let mut failed = 0;

    for entry in WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_template(e.path()))
    {
        let source = read(entry.path())?;
        checked += 1;
        match pipeline.compile(&source) {
            Ok(_) => {
                debug!(path = %entry.path().display(), "compiled");
                print_checked(&entry.path().display().to_string());
            }
            Err(err) => {
                failed += 1;
                report(&err, &source, entry.path());
            }
        }
    }

    if checked == 0 {
        return Err(format!("no templates found in {}", path.display()));
    }
    print_summary(checked, failed, start.elapsed());
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn program(file: &Path, json: bool) -> Result<ExitCode, String> {
    let source = read(file)?;
    let pipeline = Pipeline::standard();

    let output = if json {
        pipeline
            .parse(&source)
            .map(|ast| serde_json::to_string_pretty(&ast).map_err(|err| err.to_string()))
    } else {
        pipeline.compile(&source).map(|view| Ok(view.to_source()))
    };

    match output {
        Ok(text) => {
            println!("{}", text?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report(&err, &source, file);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn is_template(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
}

fn report(err: &CompileError, source: &str, path: &Path) {
    eprint!("{}", err.render(source, &path.display().to_string()));
}

fn print_checked(path: &str) {
    if io::stderr().is_terminal() {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}

fn print_summary(count: usize, failed: usize, elapsed: std::time::Duration) {
    let files_word = if count == 1 { "template" } else { "templates" };
    let summary = format!("Checked {} {} in {}, {} failed", count, files_word, format_duration(elapsed), failed);
    if io::stderr().is_terminal() {
        eprintln!("\n\x1b[1m{}\x1b[0m", summary);
    } else {
        eprintln!("\n{}", summary);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
