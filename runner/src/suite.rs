//! Immutable suite declarations.
//!
//! A suite is a tree (or DAG, when a node is shared) of named nodes. Leaves
//! wrap one [`Runnable`]; groups hold an ordered list of children. Suites are
//! built once and never mutated; each run builds a fresh
//! [`RunTree`](crate::core::graph::RunTree) from them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Signature of an in-binary test function.
///
/// A function leaf passes when it returns and fails when it panics or kills
/// its own process.
pub type TestFn = fn();

/// A declared suite node.
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub kind: SuiteKind,
}

#[derive(Debug, Clone)]
pub enum SuiteKind {
    Leaf(Runnable),
    Group(Vec<Arc<Suite>>),
}

/// What a leaf executes in its own process.
#[derive(Debug, Clone)]
pub enum Runnable {
    /// A function compiled into the current executable. The engine isolates it
    /// by re-executing the executable with the leaf path in
    /// [`LEAF_ENV`](crate::harness::LEAF_ENV).
    Function(TestFn),
    /// An external program.
    Command(CommandSpec),
}

/// External program description for command leaves.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Shorthand for `sh -c <script>`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").args(["-c".to_string(), script.into()])
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Build the `std::process::Command` with args, env and working directory applied.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

impl Runnable {
    /// Build the command that runs this leaf in a child process.
    ///
    /// `leaf_path` is the dotted path of the leaf from the root of the full
    /// suite; function leaves need it to find themselves again in the child.
    pub fn to_command(&self, leaf_path: &str) -> Result<Command> {
        match self {
            Runnable::Command(spec) => Ok(spec.to_command()),
            Runnable::Function(_) => {
                let exe = std::env::current_exe().context("locate current executable")?;
                let mut cmd = Command::new(exe);
                cmd.env(crate::harness::LEAF_ENV, leaf_path);
                Ok(cmd)
            }
        }
    }
}

impl Suite {
    /// Function leaf.
    pub fn test(name: impl Into<String>, test: TestFn) -> Arc<Suite> {
        Arc::new(Suite {
            name: name.into(),
            kind: SuiteKind::Leaf(Runnable::Function(test)),
        })
    }

    /// External program leaf.
    pub fn command(name: impl Into<String>, spec: CommandSpec) -> Arc<Suite> {
        Arc::new(Suite {
            name: name.into(),
            kind: SuiteKind::Leaf(Runnable::Command(spec)),
        })
    }

    /// Internal node. Children keep their declared order.
    pub fn group<I>(name: impl Into<String>, children: I) -> Arc<Suite>
    where
        I: IntoIterator<Item = Arc<Suite>>,
    {
        Arc::new(Suite {
            name: name.into(),
            kind: SuiteKind::Group(children.into_iter().collect()),
        })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, SuiteKind::Leaf(_))
    }

    pub fn children(&self) -> &[Arc<Suite>] {
        match &self.kind {
            SuiteKind::Leaf(_) => &[],
            SuiteKind::Group(children) => children,
        }
    }

    /// Number of leaves reachable from this node, counting shared nodes once
    /// per reference.
    pub fn num_leaves(&self) -> usize {
        match &self.kind {
            SuiteKind::Leaf(_) => 1,
            SuiteKind::Group(children) => children.iter().map(|child| child.num_leaves()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn shared_nodes_count_once_per_reference() {
        let a = Suite::test("a", noop);
        let b = Suite::test("b", noop);
        let ab = Suite::group("ab", [a, b]);
        let twice = Suite::group("twice", [ab.clone(), Suite::group("again", [ab])]);
        assert_eq!(twice.num_leaves(), 4);
    }

    #[test]
    fn shell_spec_wraps_script() {
        let spec = CommandSpec::shell("exit 3").env("K", "V");
        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args, vec!["-c".to_string(), "exit 3".to_string()]);
        assert_eq!(spec.env.get("K").map(String::as_str), Some("V"));
    }

    #[test]
    fn function_leaf_reexecs_with_leaf_env() {
        let runnable = Runnable::Function(noop);
        let cmd = runnable.to_command("all.a").expect("command");
        let env: Vec<_> = cmd.get_envs().collect();
        assert!(env.iter().any(|(key, value)| {
            key.to_str() == Some(crate::harness::LEAF_ENV)
                && value.and_then(|v| v.to_str()) == Some("all.a")
        }));
    }
}
