//! Golden-output regression runner for `quinn-workbench`.
//!
//! Loads a list of scenarios (binary arguments + an expected-output file),
//! runs the `quinn-workbench` binary for each, and diffs its stdout against
//! the recorded golden file. `record` overwrites the golden files with the
//! current output so a reviewer can diff the change in version control
//! instead of trusting this tool blindly.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::{style, Style};
use similar::{ChangeTag, TextDiff};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(about = "Golden-output regression tests for quinn-workbench")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Path to the scenario manifest
    #[arg(long, global = true, default_value = "golden-tests/scenarios.json")]
    scenarios: PathBuf,

    /// Path to the quinn-workbench binary under test
    #[arg(long, global = true)]
    bin: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run every scenario and diff its output against the recorded golden file
    Check,
    /// Run every scenario and overwrite its golden file with the current output
    Record,
    /// Print the scenario manifest
    List,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    args: Vec<String>,
    golden: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let manifest_dir = cli
        .scenarios
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let raw = fs::read_to_string(&cli.scenarios)
        .with_context(|| format!("reading scenario manifest {:?}", cli.scenarios))?;
    let scenarios: Vec<Scenario> =
        serde_json::from_str(&raw).context("parsing scenario manifest")?;

    let bin = cli.bin.unwrap_or_else(default_bin_path);
    if !bin.exists() {
        bail!(
            "quinn-workbench binary not found at {:?} -- build it first, or pass --bin",
            bin
        );
    }

    match cli.command {
        Cmd::List => {
            for scenario in &scenarios {
                println!("{}: {:?}", scenario.name, scenario.args);
            }
            Ok(())
        }
        Cmd::Record => {
            for scenario in &scenarios {
                let output = run_scenario(&bin, scenario)?;
                let golden_path = manifest_dir.join(&scenario.golden);
                if let Some(parent) = golden_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&golden_path, &output)
                    .with_context(|| format!("writing golden file {:?}", golden_path))?;
                println!("{} {}", style("recorded").green(), scenario.name);
            }
            Ok(())
        }
        Cmd::Check => {
            let mut failures = 0;
            for scenario in &scenarios {
                let golden_path = manifest_dir.join(&scenario.golden);
                if !golden_path.exists() {
                    println!(
                        "{} {} (no golden recorded at {:?}; run `record` first)",
                        style("skip").yellow(),
                        scenario.name,
                        golden_path
                    );
                    continue;
                }

                let actual = run_scenario(&bin, scenario)?;
                let expected = fs::read_to_string(&golden_path)
                    .with_context(|| format!("reading golden file {:?}", golden_path))?;

                if actual == expected {
                    println!("{} {}", style("ok").green(), scenario.name);
                } else {
                    failures += 1;
                    println!("{} {}", style("FAIL").red().bold(), scenario.name);
                    print_diff(&expected, &actual);
                }
            }

            if failures > 0 {
                bail!("{failures} scenario(s) diverged from their golden output");
            }
            Ok(())
        }
    }
}

fn run_scenario(bin: &Path, scenario: &Scenario) -> anyhow::Result<String> {
    let output = Command::new(bin)
        .args(&scenario.args)
        .output()
        .with_context(|| format!("running {:?} {:?}", bin, scenario.args))?;

    if !output.status.success() {
        bail!(
            "scenario {} exited with {}: {}",
            scenario.name,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(String::from_utf8(output.stdout).context("scenario produced non-UTF-8 stdout")?)
}

fn print_diff(expected: &str, actual: &str) {
    let diff = TextDiff::from_lines(expected, actual);
    for change in diff.iter_all_changes() {
        let (sign, color) = match change.tag() {
            ChangeTag::Delete => ("-", Style::new().red()),
            ChangeTag::Insert => ("+", Style::new().green()),
            ChangeTag::Equal => (" ", Style::new()),
        };
        print!("{}{}", color.apply_to(sign), color.apply_to(change));
    }
}

/// The debug binary produced by a plain `cargo build` from the workspace root.
fn default_bin_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../target/debug/quinn-workbench")
}
