//! Terminal output for a run and the state shared with the render thread.
//!
//! All frame writes and all tree mutations during the completion phase happen
//! under one lock ([`Board`]), so a frame never shows a leaf as done without
//! its ancestors' counts. Without animation nothing else touches the board
//! and the lock is skipped entirely ([`SharedBoard::Local`]).

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use termcolor::{Ansi, Color, ColorSpec, NoColor, WriteColor};
use tracing::{debug, warn};

use crate::core::graph::RunTree;
use crate::core::render::render_frame;
use crate::io::config::ColorMode;

/// Where frames and run messages go.
pub struct Display {
    out: Box<dyn Write + Send>,
    color: bool,
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display").field("color", &self.color).finish_non_exhaustive()
    }
}

impl Display {
    /// Display on stdout; `Auto` colors only when stdout is a terminal.
    pub fn stdout(mode: ColorMode) -> Self {
        let color = match mode {
            ColorMode::Auto => io::stdout().is_terminal(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        };
        Self {
            out: Box::new(io::stdout()),
            color,
        }
    }

    /// Display on an arbitrary writer; `Auto` means no color.
    pub fn new(out: Box<dyn Write + Send>, mode: ColorMode) -> Self {
        Self {
            out,
            color: mode == ColorMode::Always,
        }
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Render one frame of `tree` and flush it.
    pub fn render(&mut self, tree: &mut RunTree) -> Result<()> {
        let frame = render_frame(tree, self.color)?;
        self.out.write_all(&frame).context("write frame")?;
        self.out.flush().context("flush frame")
    }

    /// Print a plain line.
    pub fn message(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}").context("write message")?;
        self.out.flush().context("flush message")
    }

    /// Announce a leaf run in-process.
    pub fn testing(&mut self, path: &str) -> Result<()> {
        let mut line = Vec::new();
        if self.color {
            let mut out = Ansi::new(&mut line);
            write_testing(&mut out, path)?;
        } else {
            let mut out = NoColor::new(&mut line);
            write_testing(&mut out, path)?;
        }
        self.out.write_all(&line).context("write test banner")?;
        self.out.flush().context("flush test banner")
    }
}

fn write_testing<W: WriteColor>(out: &mut W, path: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Blue)).set_bold(true))?;
    write!(out, "Testing")?;
    out.reset()?;
    writeln!(out, " {path}")
}

/// The runtime tree and the display it is drawn on.
#[derive(Debug)]
pub struct Board {
    pub tree: RunTree,
    pub display: Display,
}

impl Board {
    pub fn render(&mut self) -> Result<()> {
        self.display.render(&mut self.tree)
    }
}

/// A board that is either owned outright or shared with a [`RenderThread`].
#[derive(Debug)]
pub enum SharedBoard {
    Local(Board),
    Locked(Arc<Mutex<Board>>),
}

impl SharedBoard {
    /// Run `f` with exclusive access to the board.
    pub fn with<R>(&mut self, f: impl FnOnce(&mut Board) -> R) -> Result<R> {
        match self {
            SharedBoard::Local(board) => Ok(f(board)),
            SharedBoard::Locked(shared) => {
                let mut guard = shared
                    .lock()
                    .map_err(|_| anyhow!("failed to lock the board: poisoned"))?;
                Ok(f(&mut guard))
            }
        }
    }

    /// Take the board back once no other thread holds it.
    pub fn into_board(self) -> Result<Board> {
        match self {
            SharedBoard::Local(board) => Ok(board),
            SharedBoard::Locked(shared) => Arc::try_unwrap(shared)
                .map_err(|_| anyhow!("board is still shared with the render thread"))?
                .into_inner()
                .map_err(|_| anyhow!("failed to unlock the board: poisoned")),
        }
    }
}

/// Background thread that redraws the board at a fixed rate until the tree
/// completes or it is stopped.
#[derive(Debug)]
pub struct RenderThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Result<()>>,
}

impl RenderThread {
    pub fn spawn(board: Arc<Mutex<Board>>, interval: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("render".to_string())
            .spawn(move || render_loop(&board, &flag, interval))
            .context("spawn render thread")?;
        debug!(interval_ms = interval.as_millis() as u64, "render thread started");
        Ok(Self { stop, handle })
    }

    /// Ask the thread to stop and wait for it.
    pub fn stop(self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow!("render thread panicked")),
        }
    }
}

fn render_loop(board: &Mutex<Board>, stop: &AtomicBool, interval: Duration) -> Result<()> {
    loop {
        if stop.load(Ordering::Acquire) {
            return Ok(());
        }
        {
            let mut guard = board
                .lock()
                .map_err(|_| anyhow!("render loop failed to lock the board"))?;
            if guard.tree.is_complete() {
                debug!("tree complete, render thread exiting");
                return Ok(());
            }
            if let Err(err) = guard.render() {
                warn!(err = %err, "render loop failed to render graph");
                return Err(err.context("render loop failed to render graph"));
            }
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::build_graph;
    use crate::suite::Suite;
    use crate::test_support::Captured;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::time::Instant;

    fn noop() {}

    fn running_board(out: &Captured) -> Board {
        let mut tree = build_graph(&Suite::group("g", [Suite::test("t", noop)]), None);
        let leaf = tree.leaves().next().expect("leaf");
        tree.mark_running(leaf, Some(9), Instant::now());
        Board {
            tree,
            display: Display::new(Box::new(out.clone()), ColorMode::Never),
        }
    }

    #[test]
    fn custom_writer_with_auto_is_plain() {
        let display = Display::new(Box::new(io::sink()), ColorMode::Auto);
        assert!(!display.color());
    }

    #[test]
    fn testing_banner_names_the_path() {
        let out = Captured::default();
        let mut display = Display::new(Box::new(out.clone()), ColorMode::Never);
        display.testing("all.a").expect("banner");
        assert_eq!(out.text(), "Testing all.a\n");
    }

    #[test]
    fn local_board_runs_closures_without_locking() {
        let out = Captured::default();
        let mut shared = SharedBoard::Local(running_board(&out));
        shared.with(Board::render).expect("with").expect("render");
        let board = shared.into_board().expect("board");
        assert_eq!(board.tree.counts().running(), 1);
        assert!(out.text().contains("t: ◐"));
    }

    #[test]
    fn render_thread_redraws_until_stopped() {
        let out = Captured::default();
        let shared = Arc::new(Mutex::new(running_board(&out)));
        let renderer = RenderThread::spawn(Arc::clone(&shared), Duration::from_millis(5)).expect("spawn");
        thread::sleep(Duration::from_millis(100));
        renderer.stop().expect("stop");
        let frames = out.text().matches("suite-runner\n").count();
        assert!(frames >= 2, "expected several frames, got {frames}");
    }

    #[test]
    fn render_thread_exits_once_tree_is_complete() {
        let out = Captured::default();
        let mut board = running_board(&out);
        let leaf = board.tree.leaves().next().expect("leaf");
        board
            .tree
            .complete(leaf, ExitStatus::from_raw(0), Instant::now())
            .expect("complete");
        let shared = Arc::new(Mutex::new(board));
        let renderer = RenderThread::spawn(Arc::clone(&shared), Duration::from_millis(33)).expect("spawn");
        let started = Instant::now();
        while !renderer.handle.is_finished() {
            assert!(started.elapsed() < Duration::from_secs(5), "render thread kept running");
            thread::sleep(Duration::from_millis(10));
        }
        renderer.stop().expect("stop");
        assert_eq!(out.text(), "");
    }
}
