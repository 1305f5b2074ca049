//! Frame rendering for the live tree view.
//!
//! Rendering reads the runtime tree and produces one full frame. The only
//! mutation is the spinner of running leaves, which advances by one phase per
//! render, so animation speed equals the render rate.

use std::time::Duration;

use anyhow::Result;
use termcolor::{Ansi, Color, ColorSpec, NoColor, WriteColor};

use crate::core::graph::{LeafState, NodeId, NodeKind, RunTree};
use crate::error::EngineError;

pub const HEADER: &str = "suite-runner";
pub const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

/// Reset the terminal and clear its scrollback.
const CLEAR: &[u8] = b"\x1bc\x1b[3J";
const INDENT: usize = 2;

/// Glyph for the current phase, then advance the phase.
pub fn advance_spinner(phase: &mut u8) -> &'static str {
    let glyph = SPINNER[usize::from(*phase) % SPINNER.len()];
    *phase = (*phase + 1) % SPINNER.len() as u8;
    glyph
}

/// Human-readable elapsed time, scaled to the largest whole unit.
pub fn humanize(elapsed: Duration) -> String {
    let nanos = elapsed.as_nanos();
    let micros = nanos / 1000;
    let millis = micros / 1000;
    let seconds = millis / 1000;
    let minutes = seconds / 60;
    if minutes > 0 {
        format!("{}m{}s", minutes, seconds % 60)
    } else if seconds > 0 {
        format!("{}.{:03}s", seconds, millis % 1000)
    } else if millis > 0 {
        format!("{}.{:03}ms", millis, micros % 1000)
    } else if micros > 0 {
        format!("{}.{:03}µs", micros, nanos % 1000)
    } else {
        format!("{nanos}ns")
    }
}

/// Render the whole tree into a frame buffer.
///
/// Colored frames start by clearing the terminal; plain frames are meant to
/// be appended to a log.
pub fn render_frame(tree: &mut RunTree, color: bool) -> Result<Vec<u8>> {
    if color {
        let mut out = Ansi::new(CLEAR.to_vec());
        write_frame(tree, &mut out)?;
        Ok(out.into_inner())
    } else {
        let mut out = NoColor::new(Vec::new());
        write_frame(tree, &mut out)?;
        Ok(out.into_inner())
    }
}

fn write_frame<W: WriteColor>(tree: &mut RunTree, out: &mut W) -> Result<()> {
    writeln!(out, "{HEADER}")?;
    let root = tree.root();
    write_node(tree, root, 0, out)
}

fn write_node<W: WriteColor>(tree: &mut RunTree, id: NodeId, depth: usize, out: &mut W) -> Result<()> {
    let node = tree.node_mut(id);
    write!(out, "{:width$}{}: ", "", node.name, width = depth * INDENT)?;
    let elapsed = node.elapsed();
    let counts = node.counts();
    match &mut node.kind {
        NodeKind::Leaf(leaf) => match leaf.state {
            LeafState::Idle => {
                return Err(EngineError::RenderIdle {
                    name: node.name.clone(),
                }
                .into());
            }
            LeafState::Running => {
                let glyph = advance_spinner(&mut leaf.spinner);
                painted(out, Color::Blue, glyph)?;
                writeln!(out)?;
            }
            LeafState::Done => {
                let Some(outcome) = leaf.outcome else {
                    return Err(EngineError::NotRunning {
                        name: node.name.clone(),
                    }
                    .into());
                };
                let color = if outcome.passed() {
                    Color::Green
                } else {
                    Color::Red
                };
                painted(out, color, &outcome.to_string())?;
                writeln!(out, " ({})", humanize(elapsed.unwrap_or_default()))?;
            }
        },
        NodeKind::Internal(_) => {
            write!(out, "(")?;
            let parts = [
                (counts.running(), Color::Blue),
                (counts.passed, Color::Green),
                (counts.failed, Color::Red),
            ];
            let mut first = true;
            for (count, color) in parts {
                if count == 0 {
                    continue;
                }
                if !first {
                    write!(out, ",")?;
                }
                painted(out, color, &count.to_string())?;
                first = false;
            }
            writeln!(out, ")")?;
            let children = tree.children(id).to_vec();
            for child in children {
                write_node(tree, child, depth + 1, out)?;
            }
        }
    }
    Ok(())
}

fn painted<W: WriteColor>(out: &mut W, color: Color, text: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{text}")?;
    out.reset()?;
    Ok(())
}
