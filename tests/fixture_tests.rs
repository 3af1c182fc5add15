//! Renders every `tests/fixtures/*.cshtml` against its sibling `.json` model
//! and compares the output with `.expected.html`.
//!
//! Run with: cargo test --test fixture_tests

use libtest_mimic::{Arguments, Failed, Trial};
use razor_transpiler::compile;
use std::fs;
use std::path::{Path, PathBuf};

fn collect_fixtures() -> Vec<PathBuf> {
    let pattern = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("*.cshtml");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .filter_map(Result::ok)
        .collect();
    files.sort();
    files
}

fn run_fixture(path: &Path) -> Result<(), Failed> {
    let source = fs::read_to_string(path).map_err(|err| format!("cannot read {}: {}", path.display(), err))?;

    let model_path = path.with_extension("json");
    let model = if model_path.exists() {
        let json = fs::read_to_string(&model_path)?;
        serde_json::from_str(&json)?
    } else {
        serde_json::json!({})
    };

    let expected_path = path.with_extension("expected.html");
    let expected = fs::read_to_string(&expected_path)
        .map_err(|err| format!("missing expected file {}: {}", expected_path.display(), err))?;

    let view = compile(&source).map_err(|err| err.render(&source, &path.display().to_string()))?;
    let actual = view.execute(&model)?;

    if actual != expected {
        return Err(format!("output mismatch\n--- expected ---\n{}\n--- actual ---\n{}", expected, actual).into());
    }
    Ok(())
}

fn main() {
    let args = Arguments::from_args();

    let tests = collect_fixtures()
        .into_iter()
        .map(|path| {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("fixture")
                .to_string();
            Trial::test(name, move || run_fixture(&path))
        })
        .collect();

    libtest_mimic::run(&args, tests).exit();
}
