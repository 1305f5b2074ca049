//! Function leaves run in re-executed copies of this test binary.
//!
//! Built with `harness = false`: `main` first checks whether it was started
//! as a leaf; otherwise it drives the scenarios below and exits nonzero on
//! the first failed check.

use std::fs;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use suite_runner::core::classifier::Outcome;
use suite_runner::exit_codes;
use suite_runner::harness::run_leaf_if_requested;
use suite_runner::test_support::{quiet_options, run_quiet};
use suite_runner::{RunOptions, RunResult, Suite, run_to};

fn passes() {
    assert_eq!(2 + 2, 4);
}

fn prints() {
    println!("hello from a leaf");
}

fn panics() {
    panic!("leaf failed on purpose");
}

fn aborts() {
    std::process::abort();
}

fn suite() -> Arc<Suite> {
    Suite::group(
        "all",
        [
            Suite::test("passes", passes),
            Suite::test("prints", prints),
            Suite::group(
                "bad",
                [Suite::test("panics", panics), Suite::test("aborts", aborts)],
            ),
        ],
    )
}

fn outcome(result: &RunResult, path: &str) -> Option<Outcome> {
    let id = result.node(path)?;
    result.tree.leaf(id)?.outcome
}

fn check(name: &str, ok: bool) -> Result<(), String> {
    if ok {
        println!("test {name} ... ok");
        Ok(())
    } else {
        Err(format!("test {name} ... FAILED"))
    }
}

fn whole_suite() -> Result<(), String> {
    let temp = tempfile::tempdir().map_err(|err| err.to_string())?;
    let result = run_quiet(&suite(), temp.path()).map_err(|err| format!("{err:#}"))?;

    check("passing leaf passes", outcome(&result, "all.passes") == Some(Outcome::Passed))?;
    check(
        "panicking leaf exits with panic code",
        outcome(&result, "all.bad.panics") == Some(Outcome::Exited(exit_codes::PANICKED)),
    )?;
    check(
        "aborting leaf is terminated by SIGABRT",
        outcome(&result, "all.bad.aborts") == Some(Outcome::Terminated(6)),
    )?;
    check("run reports failure", result.exit_code() == exit_codes::FAILED)?;

    let printed = result
        .log_path("all.prints")
        .and_then(|path| fs::read_to_string(path).ok())
        .unwrap_or_default();
    check("leaf stdout is captured", printed == "hello from a leaf\n")?;

    let panicked = result
        .log_path("all.bad.panics")
        .and_then(|path| fs::read_to_string(path).ok())
        .unwrap_or_default();
    check("panic message is captured", panicked.contains("leaf failed on purpose"))?;
    check("silent leaf log is pruned", result.log_path("all.passes").is_none())
}

fn filtered_leaf_finds_itself() -> Result<(), String> {
    let temp = tempfile::tempdir().map_err(|err| err.to_string())?;
    let options = RunOptions {
        filter: Some("all.bad.panics".to_string()),
        ..quiet_options(temp.path())
    };
    let result = run_to(&suite(), &options, io::sink()).map_err(|err| format!("{err:#}"))?;
    check(
        "filtered leaf re-executes by full path",
        outcome(&result, "panics") == Some(Outcome::Exited(exit_codes::PANICKED)),
    )
}

fn main() -> ExitCode {
    if let Some(code) = run_leaf_if_requested(&suite()) {
        return ExitCode::from(u8::try_from(code).unwrap_or(1));
    }

    let scenarios: [fn() -> Result<(), String>; 2] = [whole_suite, filtered_leaf_finds_itself];
    for scenario in scenarios {
        if let Err(message) = scenario() {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
