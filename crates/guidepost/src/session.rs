//! Line-oriented terminal session hosting the overlay.
//!
//! The session plays the role of the host page: it mounts the overlay, feeds
//! it user events typed as commands, reports a panel layout, and renders every
//! state change it observes.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::overlay::{InstructionStep, OnboardingOverlay, OverlayOptions, OverlayState, Point, Rect};
use crate::page::PageState;
use crate::storage::FlagStore;

/// Where the instruction panel is laid out in a 1280x800 viewport.
pub const DEFAULT_PANEL_BOUNDS: Rect = Rect::new(400.0, 280.0, 480.0, 240.0);

const HELP: &str = "\
commands:
  toggle          show or hide the instructions
  next            go to the next instruction
  finish          close the instructions from the last step
  click <x> <y>   click somewhere on the page
  scroll <y>      scroll the page to offset y
  editor          open or close the note editor
  status          print overlay and page state as JSON
  help            show this help
  quit            leave the session";

/// A parsed session command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    /// Flip overlay visibility.
    Toggle,
    /// Next instruction.
    Next,
    /// Finish from the last instruction.
    Finish,
    /// Pointer interaction at a page position.
    Click(Point),
    /// Scroll to a vertical offset.
    Scroll(u32),
    /// Flip editor visibility.
    Editor,
    /// Print state.
    Status,
    /// Print help.
    Help,
    /// End the session.
    Quit,
}

/// Why a line could not be parsed as a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    /// Blank input.
    #[error("empty command")]
    Empty,
    /// Not a known command word.
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    /// Known command with bad or missing arguments.
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for SessionCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(ParseCommandError::Empty);
        };
        let args: Vec<&str> = words.collect();

        let no_args = |cmd: Self, usage: &'static str| {
            if args.is_empty() {
                Ok(cmd)
            } else {
                Err(ParseCommandError::Usage(usage))
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "toggle" | "t" => no_args(Self::Toggle, "toggle"),
            "next" | "n" => no_args(Self::Next, "next"),
            "finish" | "f" => no_args(Self::Finish, "finish"),
            "editor" | "e" => no_args(Self::Editor, "editor"),
            "status" | "s" => no_args(Self::Status, "status"),
            "help" | "?" => no_args(Self::Help, "help"),
            "quit" | "q" | "exit" => no_args(Self::Quit, "quit"),
            "click" | "c" => match args.as_slice() {
                [x, y] => {
                    let x = x.parse().map_err(|_| ParseCommandError::Usage("click <x> <y>"))?;
                    let y = y.parse().map_err(|_| ParseCommandError::Usage("click <x> <y>"))?;
                    Ok(Self::Click(Point::new(x, y)))
                }
                _ => Err(ParseCommandError::Usage("click <x> <y>")),
            },
            "scroll" => match args.as_slice() {
                [y] => y
                    .parse()
                    .map(Self::Scroll)
                    .map_err(|_| ParseCommandError::Usage("scroll <y>")),
                _ => Err(ParseCommandError::Usage("scroll <y>")),
            },
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

/// Render the overlay as text.
#[must_use]
pub fn render_overlay(state: OverlayState, steps: &[InstructionStep]) -> String {
    if !state.visible {
        return "[instructions hidden; type 'toggle' to show them]".to_string();
    }

    let mut out = String::new();
    let total = steps.len();
    let index = state.current_index;
    let _ = writeln!(out, "+-- Instructions ({}/{total}) --", index + 1);
    if let Some(step) = steps.get(index) {
        let _ = writeln!(out, "| {}", step.text);
    }
    let action = if state.is_last_step(total) {
        "[finish]"
    } else {
        "[next]"
    };
    let _ = write!(out, "+-- {action}");
    out
}

/// An interactive session over an input and output stream.
#[derive(Debug)]
pub struct Session {
    overlay: OnboardingOverlay,
    page: PageState,
}

impl Session {
    /// Mount the overlay for `config` on top of a fresh page.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay cannot be mounted.
    pub fn new(config: &Config, store: Arc<dyn FlagStore>) -> Result<Self> {
        let overlay = OnboardingOverlay::mount(OverlayOptions::from_config(&config.overlay)?, store)?;
        overlay.set_panel_bounds(Some(DEFAULT_PANEL_BOUNDS));
        Ok(Self {
            overlay,
            page: PageState::new(&config.page),
        })
    }

    /// The mounted overlay.
    #[must_use]
    pub fn overlay(&self) -> &OnboardingOverlay {
        &self.overlay
    }

    /// The host page state.
    #[must_use]
    pub fn page(&self) -> PageState {
        self.page
    }

    /// Apply one command. Returns text to print, if any.
    ///
    /// Overlay transitions print nothing here; they are rendered from the
    /// overlay's update stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be serialized.
    pub fn apply(&mut self, command: SessionCommand) -> Result<Option<String>> {
        debug!(?command, "Session command");
        let output = match command {
            SessionCommand::Toggle => {
                self.overlay.toggle_visibility();
                None
            }
            SessionCommand::Next => {
                self.overlay.next();
                None
            }
            SessionCommand::Finish => match self.overlay.finish() {
                Some(ack) => Some(format!("*** {ack} ***")),
                None => Some("finish is only available on the last instruction".to_string()),
            },
            SessionCommand::Click(point) => {
                self.overlay.handle_outside_interaction(point);
                None
            }
            SessionCommand::Scroll(offset) => self.page.on_scroll(offset).then(|| {
                if self.page.navbar_scrolled {
                    "navbar: scrolled style".to_string()
                } else {
                    "navbar: top style".to_string()
                }
            }),
            SessionCommand::Editor => Some(if self.page.toggle_editor() {
                "editor: open".to_string()
            } else {
                "editor: closed".to_string()
            }),
            SessionCommand::Status => Some(self.status_json()?),
            SessionCommand::Help => Some(HELP.to_string()),
            SessionCommand::Quit => None,
        };
        Ok(output)
    }

    /// Overlay and page state as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn status_json(&self) -> Result<String> {
        let status = serde_json::json!({
            "overlay": {
                "state": self.overlay.state(),
                "phase": self.overlay.phase(),
                "first_visit_pending": self.overlay.first_visit_pending(),
                "steps": self.overlay.steps().len(),
            },
            "page": self.page,
        });
        Ok(serde_json::to_string_pretty(&status)?)
    }

    /// Run until `quit`, end of input, or the overlay goes away.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut updates = self.overlay.subscribe();
        let mut lines = input.lines();

        write_block(output, "guidepost session; type 'help' for commands").await?;
        write_block(
            output,
            &render_overlay(self.overlay.state(), self.overlay.steps()),
        )
        .await?;

        loop {
            tokio::select! {
                biased;

                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *updates.borrow_and_update();
                    write_block(output, &render_overlay(state, self.overlay.steps())).await?;
                }

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<SessionCommand>() {
                        Ok(SessionCommand::Quit) => break,
                        Ok(command) => {
                            if let Some(text) = self.apply(command)? {
                                write_block(output, &text).await?;
                            }
                        }
                        Err(err) => write_block(output, &err.to_string()).await?,
                    }
                }
            }
        }

        info!("Session ended");
        Ok(())
    }

    /// Unmount the overlay.
    pub fn close(self) {
        self.overlay.unmount();
    }
}

async fn write_block<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
