use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};

use thinc::engine::EngineError;
use thinc::{Canvas, CanvasSnapshot};

#[derive(ClapParser)]
#[command(name = "thinc")]
#[command(about = "thinc language CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate inline thinc code
    Eval {
        /// The code to evaluate
        code: String,
    },
    /// Run a thinc file
    Run {
        /// Path to .thinc file
        file: PathBuf,
        /// Canvas file for persistence (load on start, save on exit)
        #[arg(long)]
        canvas: Option<PathBuf>,
    },
    /// Check if code parses correctly
    Check {
        /// Path to .thinc file
        file: PathBuf,
    },
    /// Run test files with expected output verification
    Test {
        /// Path to test file(s)
        files: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval { code } => eval_code(&code, "<eval>"),
        Commands::Run { file, canvas } => match fs::read_to_string(&file) {
            Ok(code) => {
                eprintln!("Running: {}", file.display());
                run_with_persistence(&code, &file, canvas)
            }
            Err(e) => {
                eprintln!("Error reading file: {e}");
                ExitCode::FAILURE
            }
        },
        Commands::Check { file } => match fs::read_to_string(&file) {
            Ok(code) => check_code(&code, &file),
            Err(e) => {
                eprintln!("Error reading file: {e}");
                ExitCode::FAILURE
            }
        },
        Commands::Test { files } => run_tests(&files),
    }
}

fn check_code(code: &str, file: &Path) -> ExitCode {
    eprintln!("Checking: {}", file.display());
    match thinc::engine::parse(&file.display().to_string(), code) {
        Ok(statements) => {
            eprintln!("Parse OK: {} statements", statements.len());
            ExitCode::SUCCESS
        }
        Err(error) => {
            print_engine_error(&error);
            ExitCode::FAILURE
        }
    }
}

fn eval_code(code: &str, filename: &str) -> ExitCode {
    let mut canvas = Canvas::new();
    match thinc::run(&mut canvas, filename, code) {
        Ok(outcome) => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "ok",
                    "result": outcome.result.to_json(),
                    "writes": outcome.writes.len(),
                })
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            print_engine_error(&error);
            println!(
                "{}",
                serde_json::json!({ "status": "error", "error": error.to_string() })
            );
            ExitCode::FAILURE
        }
    }
}

fn run_with_persistence(code: &str, file: &Path, canvas_file: Option<PathBuf>) -> ExitCode {
    let mut canvas = match canvas_file.as_deref().map(load_canvas).transpose() {
        Ok(canvas) => canvas.unwrap_or_default(),
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match thinc::run(&mut canvas, &file.display().to_string(), code) {
        Ok(outcome) => outcome,
        Err(error) => {
            print_engine_error(&error);
            println!(
                "{}",
                serde_json::json!({ "status": "error", "error": error.to_string() })
            );
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = canvas_file {
        match CanvasSnapshot::capture(&canvas).to_json() {
            Ok(json) => match fs::write(&path, json) {
                Ok(()) => eprintln!("Saved canvas to: {}", path.display()),
                Err(e) => eprintln!("Warning: failed to write canvas file: {e}"),
            },
            Err(e) => eprintln!("Warning: failed to serialize canvas: {e}"),
        }
    }

    println!(
        "{}",
        serde_json::json!({
            "status": "ok",
            "result": outcome.result.to_json(),
            "writes": outcome.writes.len(),
        })
    );
    ExitCode::SUCCESS
}

fn load_canvas(path: &Path) -> Result<Canvas, String> {
    if !path.exists() {
        return Ok(Canvas::new());
    }
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Error reading canvas file: {e}"))?;
    let snapshot = CanvasSnapshot::from_json(&json)
        .map_err(|e| format!("Error parsing canvas file: {e}"))?;
    let canvas = snapshot
        .restore()
        .map_err(|e| format!("Error restoring canvas: {e}"))?;
    eprintln!("Loaded canvas from: {}", path.display());
    Ok(canvas)
}

fn print_engine_error(error: &EngineError) {
    if let EngineError::Parse { reports } = error {
        for report in reports {
            eprintln!("{report}");
        }
    } else {
        eprintln!("Error: {error}");
    }
}

/// Run test files with expected output verification.
/// Test file format:
/// ```text
/// -- test: test_name
/// code here
/// -- expect: expected_json_value
/// ```
fn run_tests(files: &[PathBuf]) -> ExitCode {
    let mut total = 0;
    let mut passed = 0;
    let mut failed = 0;

    for file in files {
        match fs::read_to_string(file) {
            Ok(content) => {
                let (t, p, f) = run_test_file(file, &content);
                total += t;
                passed += p;
                failed += f;
            }
            Err(e) => {
                eprintln!("Error reading {}: {e}", file.display());
                failed += 1;
            }
        }
    }

    eprintln!("\n{total} tests: {passed} passed, {failed} failed");
    if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Parse and run tests from a single test file.
/// Returns (total, passed, failed) counts.
fn run_test_file(file: &Path, content: &str) -> (usize, usize, usize) {
    let mut total = 0;
    let mut passed = 0;
    let mut failed = 0;
    let mut current_test: Option<(&str, String)> = None;

    let mut finish = |name: &str, code: &str, expected: Option<&str>| {
        if run_single_test(file, name, code, expected) {
            passed += 1;
        } else {
            failed += 1;
        }
        total += 1;
    };

    for line in content.lines() {
        if let Some(name) = line.strip_prefix("-- test:") {
            // A new header closes any test that had no expectation.
            if let Some((name, code)) = current_test.take() {
                finish(name, &code, None);
            }
            current_test = Some((name.trim(), String::new()));
        } else if let Some(expected) = line.strip_prefix("-- expect:") {
            if let Some((name, code)) = current_test.take() {
                finish(name, &code, Some(expected.trim()));
            }
        } else if let Some((_, ref mut code)) = current_test {
            if !code.is_empty() {
                code.push('\n');
            }
            code.push_str(line);
        }
    }

    if let Some((name, code)) = current_test {
        finish(name, &code, None);
    }

    (total, passed, failed)
}

/// Run a single test case. With no expectation the test only has to
/// evaluate cleanly.
fn run_single_test(file: &Path, name: &str, code: &str, expected: Option<&str>) -> bool {
    eprint!("  {name} ... ");

    let mut canvas = Canvas::new();
    let result = thinc::run(&mut canvas, &file.display().to_string(), code)
        .map(|outcome| outcome.result.to_json());

    match (&result, expected) {
        (Ok(actual), Some(expected)) => match serde_json::from_str::<serde_json::Value>(expected) {
            Ok(expected_value) => {
                if actual == &expected_value {
                    eprintln!("ok");
                    true
                } else {
                    eprintln!("FAILED");
                    eprintln!("    expected: {expected}");
                    eprintln!("    actual:   {actual}");
                    false
                }
            }
            Err(e) => {
                eprintln!("FAILED (invalid expected JSON: {e})");
                false
            }
        },
        (Ok(actual), None) => {
            eprintln!("ok ({actual})");
            true
        }
        (Err(e), _) => {
            eprintln!("FAILED: {e}");
            false
        }
    }
}
