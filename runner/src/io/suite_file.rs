//! Suite definition files.
//!
//! A suite file is TOML naming a root node, run options, command tests and
//! groups:
//!
//! ```toml
//! root = "all"
//!
//! [run]
//! animate = false
//!
//! [tests.lint]
//! command = ["cargo", "clippy"]
//! env = { RUSTFLAGS = "-Dwarnings" }
//! cwd = "crates/core"           # relative to this file (default: its directory)
//!
//! [groups.all]
//! children = ["lint", "unit"]
//! ```
//!
//! Groups may reference the same test or group more than once; such nodes
//! are shared, but cycles are rejected.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::core::invariants::validate_suite;
use crate::io::config::RunOptions;
use crate::suite::{CommandSpec, Suite};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSuiteFile {
    root: String,
    #[serde(default)]
    run: RunOptions,
    #[serde(default)]
    tests: BTreeMap<String, RawTest>,
    #[serde(default)]
    groups: BTreeMap<String, RawGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTest {
    command: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    children: Vec<String>,
}

/// A loaded suite and the run options it declares.
#[derive(Debug, Clone)]
pub struct SuiteFile {
    pub root: Arc<Suite>,
    pub options: RunOptions,
}

impl SuiteFile {
    /// Load and validate a suite file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read suite {}", path.display()))?;
        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::parse_str(&contents, base).with_context(|| format!("load suite {}", path.display()))
    }

    /// Parse a suite; relative working directories resolve against `base`.
    pub fn parse_str(contents: &str, base: &Path) -> Result<Self> {
        let raw: RawSuiteFile = toml::from_str(contents).context("parse suite")?;
        for name in raw.tests.keys() {
            if raw.groups.contains_key(name) {
                bail!("{name} is defined both as a test and as a group");
            }
        }
        for (name, test) in &raw.tests {
            if test.command.is_empty() || test.command[0].trim().is_empty() {
                bail!("tests.{name}.command must be a non-empty array");
            }
        }

        let mut builder = Builder {
            raw: &raw,
            base,
            built: HashMap::new(),
            visiting: Vec::new(),
        };
        let root = builder.build(&raw.root).context("resolve root")?;

        let problems = validate_suite(&root);
        if !problems.is_empty() {
            bail!("invalid suite:\n- {}", problems.join("\n- "));
        }
        raw.run.validate().context("invalid [run] table")?;
        Ok(Self {
            root,
            options: raw.run,
        })
    }
}

struct Builder<'a> {
    raw: &'a RawSuiteFile,
    base: &'a Path,
    built: HashMap<String, Arc<Suite>>,
    visiting: Vec<String>,
}

impl Builder<'_> {
    fn build(&mut self, name: &str) -> Result<Arc<Suite>> {
        if let Some(done) = self.built.get(name) {
            return Ok(Arc::clone(done));
        }
        if self.visiting.iter().any(|seen| seen == name) {
            bail!("cycle: {} -> {name}", self.visiting.join(" -> "));
        }

        let raw = self.raw;
        let node = if let Some(test) = raw.tests.get(name) {
            Suite::command(name, self.command(test))
        } else if let Some(group) = raw.groups.get(name) {
            self.visiting.push(name.to_string());
            let mut children = Vec::with_capacity(group.children.len());
            for child in &group.children {
                let built = self
                    .build(child)
                    .with_context(|| format!("in group {name}"))?;
                children.push(built);
            }
            self.visiting.pop();
            Suite::group(name, children)
        } else {
            bail!("unknown test or group: {name}");
        };
        self.built.insert(name.to_string(), Arc::clone(&node));
        Ok(node)
    }

    fn command(&self, test: &RawTest) -> CommandSpec {
        let (program, args) = match test.command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };
        let cwd = match &test.cwd {
            Some(cwd) => self.base.join(cwd),
            None => self.base.to_path_buf(),
        };
        CommandSpec {
            program,
            args,
            env: test.env.clone(),
            cwd: Some(cwd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{Runnable, SuiteKind};

    fn parse(contents: &str) -> Result<SuiteFile> {
        SuiteFile::parse_str(contents, Path::new("/suites"))
    }

    #[test]
    fn parses_tests_groups_and_options() {
        let file = parse(
            r#"
root = "all"

[run]
animate = false

[tests.lint]
command = ["sh", "-c", "exit 0"]
env = { MODE = "strict" }
cwd = "sub"

[tests.unit]
command = ["true"]

[groups.all]
children = ["lint", "unit"]
"#,
        )
        .expect("parse");

        assert!(!file.options.animate);
        assert_eq!(file.root.name, "all");
        let children = file.root.children();
        assert_eq!(children.len(), 2);
        let SuiteKind::Leaf(Runnable::Command(lint)) = &children[0].kind else {
            panic!("lint should be a command leaf");
        };
        assert_eq!(lint.program, "sh");
        assert_eq!(lint.args, vec!["-c", "exit 0"]);
        assert_eq!(lint.env.get("MODE").map(String::as_str), Some("strict"));
        assert_eq!(lint.cwd.as_deref(), Some(Path::new("/suites/sub")));
        let SuiteKind::Leaf(Runnable::Command(unit)) = &children[1].kind else {
            panic!("unit should be a command leaf");
        };
        assert_eq!(unit.cwd.as_deref(), Some(Path::new("/suites")));
    }

    #[test]
    fn repeated_references_share_one_node() {
        let file = parse(
            r#"
root = "all"
[tests.a]
command = ["true"]
[groups.left]
children = ["a"]
[groups.right]
children = ["a"]
[groups.all]
children = ["left", "right"]
"#,
        )
        .expect("parse");
        let left = &file.root.children()[0].children()[0];
        let right = &file.root.children()[1].children()[0];
        assert!(Arc::ptr_eq(left, right));
        assert_eq!(file.root.num_leaves(), 2);
    }

    #[test]
    fn cycles_are_rejected() {
        let err = parse(
            r#"
root = "a"
[groups.a]
children = ["b"]
[groups.b]
children = ["a"]
"#,
        )
        .expect_err("cycle");
        assert!(format!("{err:#}").contains("cycle: a -> b -> a"));
    }

    #[test]
    fn unknown_references_are_rejected() {
        let err = parse("root = \"all\"\n[groups.all]\nchildren = [\"ghost\"]\n").expect_err("unknown");
        assert!(format!("{err:#}").contains("unknown test or group: ghost"));
    }

    #[test]
    fn name_used_twice_is_rejected() {
        let err = parse(
            "root = \"x\"\n[tests.x]\ncommand = [\"true\"]\n[groups.x]\nchildren = []\n",
        )
        .expect_err("duplicate");
        assert!(err.to_string().contains("both as a test and as a group"));
    }

    #[test]
    fn empty_groups_and_commands_are_rejected() {
        let err = parse("root = \"all\"\n[groups.all]\nchildren = []\n").expect_err("empty group");
        assert!(err.to_string().contains("group must have at least one child"));

        let err = parse("root = \"t\"\n[tests.t]\ncommand = []\n").expect_err("empty command");
        assert!(err.to_string().contains("tests.t.command must be a non-empty array"));
    }

    #[test]
    fn invalid_run_table_is_rejected() {
        let err = parse("root = \"t\"\n[run]\nfps = 0.0\n[tests.t]\ncommand = [\"true\"]\n")
            .expect_err("fps");
        assert!(format!("{err:#}").contains("fps (0)"));
    }

    #[test]
    fn load_reads_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("suite.toml");
        fs::write(&path, "root = \"t\"\n[tests.t]\ncommand = [\"true\"]\n").expect("write");
        let file = SuiteFile::load(&path).expect("load");
        assert!(file.root.is_leaf());
    }
}
