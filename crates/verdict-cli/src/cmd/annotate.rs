//! `vd annotate`: the line-oriented annotation session.
//!
//! Each stdin line is one command. Validation and gating errors are printed
//! and the session continues; a failed local write ends it. In JSON mode
//! every response is one compact object on its own line, tagged by `event`.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use clap::Args;
use serde::Serialize;
use tracing::{debug, warn};
use verdict_core::model::{Agreement, ContextualFactors, Factor, Item, Label};
use verdict_core::navigate::{NavError, NavOutcome, Navigator, SaveReport};
use verdict_core::session::{EditBuffer, Phase, SessionError, SessionState};

use crate::cmd::open_workspace;
use crate::cmd::sync::status_line;
use crate::cmd::view::{ItemView, describe_factors, write_item_pretty, write_item_text};
use crate::output::{CliError, OutputMode, pretty_kv, pretty_rule, write_error, write_mode};
use crate::reviewer::CredentialFlags;

/// Arguments for `vd annotate`.
#[derive(Args, Debug, Default)]
pub struct AnnotateArgs {
    /// Item id to start at (defaults to the first item).
    #[arg(long)]
    pub start: Option<String>,
}

const HELP: &[(&str, &str)] = &[
    ("show", "show the current item and your answers"),
    ("label correct|incorrect", "Task 1: is the machine judgment correct?"),
    ("agree", "Task 2: accept the machine's contextual factor"),
    ("disagree", "Task 2: reject it and pick factors yourself"),
    ("factors <codes>", "select factors, e.g. `factors a,c,j` (see `vd factors`)"),
    ("explain <text>", "free-text explanation, kept when factor j is selected"),
    ("save", "save the current item without moving"),
    ("next", "save, then move to the next item"),
    ("prev", "save, then move to the previous item"),
    ("jump <id>", "move to the item with this id"),
    ("goto <n>", "move to the n-th item (1-based)"),
    ("progress", "how many items you have annotated"),
    ("traceback", "ids you have annotated, in save order"),
    ("help", "this list"),
    ("quit", "leave the session"),
];

/// A malformed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UsageError(String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UsageError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Show,
    Label(Label),
    Agree,
    Disagree,
    Factors(String),
    Explain(String),
    Save,
    Next,
    Prev,
    Jump(String),
    Goto(usize),
    Progress,
    Traceback,
    Help,
    Quit,
}

impl ReplCommand {
    /// Parse one input line. Blank lines and `#` comments yield `None`.
    fn parse(line: &str) -> Result<Option<Self>, UsageError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));
        let usage = |form: &str| UsageError(format!("usage: {form}"));

        let command = match head.to_ascii_lowercase().as_str() {
            "show" | "s" => Self::Show,
            "label" => Self::Label(
                rest.parse()
                    .map_err(|_| usage("label correct|incorrect"))?,
            ),
            "agree" => Self::Agree,
            "disagree" => Self::Disagree,
            "factors" | "f" => Self::Factors(rest.to_string()),
            "explain" | "e" => Self::Explain(rest.to_string()),
            "save" => Self::Save,
            "next" | "n" => Self::Next,
            "prev" | "previous" | "p" => Self::Prev,
            "jump" | "j" if !rest.is_empty() => Self::Jump(rest.to_string()),
            "jump" | "j" => return Err(usage("jump <id>")),
            "goto" => match rest.parse::<usize>() {
                Ok(n) if n >= 1 => Self::Goto(n),
                _ => return Err(usage("goto <n> (1-based)")),
            },
            "progress" => Self::Progress,
            "traceback" => Self::Traceback,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => {
                return Err(UsageError(format!(
                    "unknown command '{other}' (type `help` for the list)"
                )));
            }
        };
        Ok(Some(command))
    }
}

/// The item currently under review, with the working answers.
#[derive(Debug, Serialize)]
struct ItemEvent<'a> {
    #[serde(flatten)]
    view: ItemView<'a>,
    phase: Phase,
    buffer: &'a EditBuffer,
    saved: bool,
    dirty: bool,
}

/// One response of the session, as written in JSON mode.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Item(ItemEvent<'a>),
    Edited {
        item_id: &'a str,
        phase: Phase,
        buffer: &'a EditBuffer,
    },
    Saved(&'a SaveReport),
    Moved(&'a NavOutcome),
    Progress {
        done: usize,
        total: usize,
    },
    Traceback {
        ids: Vec<&'a str>,
    },
    Help {
        commands: Vec<Usage>,
    },
    Quit {
        unsaved_edits: bool,
    },
}

#[derive(Debug, Serialize)]
struct Usage {
    command: &'static str,
    description: &'static str,
}

enum Flow {
    Continue,
    Quit,
}

/// What to type next, given where the item stands.
const fn phase_hint(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "no item loaded",
        Phase::Viewing => "`label correct` or `label incorrect`",
        Phase::Task1Incorrect | Phase::Task2Agree => "`next` to save and continue",
        Phase::PendingTask2 => "`agree` or `disagree` with the machine's contextual factor",
        Phase::Task2DisagreePendingFactors => "`factors <codes>` (see `vd factors`)",
        Phase::Task2DisagreeReady => "`next` to save, or `explain <text>` alongside factor j",
    }
}

fn write_buffer_pretty(w: &mut dyn Write, phase: Phase, buffer: &EditBuffer) -> io::Result<()> {
    pretty_rule(w)?;
    pretty_kv(w, "Task 1", buffer.label.map_or("-", Label::as_str))?;
    if phase.task2_visible() {
        pretty_kv(
            w,
            "Task 2",
            buffer.contextual_agreement.map_or("-", Agreement::as_str),
        )?;
    }
    if phase.factors_editable() {
        let selected = ContextualFactors::selected(buffer.contextual_factors.iter().copied());
        pretty_kv(w, "Factors", describe_factors(&selected))?;
        if buffer.contextual_factors.contains(&Factor::OTHER) {
            let explanation = buffer.contextual_explanation.trim();
            pretty_kv(w, "Explanation", if explanation.is_empty() { "-" } else { explanation })?;
        }
    }
    writeln!(w, "next: {}", phase_hint(phase))
}

fn write_buffer_text(w: &mut dyn Write, phase: Phase, buffer: &EditBuffer) -> io::Result<()> {
    let phase = serde_json::to_value(phase).map_err(io::Error::other)?;
    writeln!(w, "phase={}", phase.as_str().unwrap_or_default())?;
    writeln!(w, "label={}", buffer.label.map_or("", Label::as_str))?;
    writeln!(
        w,
        "contextual_agreement={}",
        buffer.contextual_agreement.map_or("", Agreement::as_str)
    )?;
    let codes: String = buffer.contextual_factors.iter().map(|f| f.code()).collect();
    writeln!(w, "contextual_factors={codes}")
}

fn write_save_human(w: &mut dyn Write, report: &SaveReport) -> io::Result<()> {
    writeln!(w, "saved item {}", report.record.item_id)?;
    if report.sync.is_failure() {
        writeln!(
            w,
            "warning: sync {}; kept locally, run `vd sync` to retry",
            status_line(&report.sync)
        )?;
    }
    Ok(())
}

fn is_recoverable(err: &anyhow::Error) -> bool {
    if let Some(nav) = err.downcast_ref::<NavError>() {
        return !nav.is_fatal();
    }
    err.downcast_ref::<SessionError>().is_some() || err.downcast_ref::<UsageError>().is_some()
}

struct Repl<'a> {
    nav: &'a mut Navigator,
    state: SessionState,
    mode: OutputMode,
}

impl Repl<'_> {
    fn emit(
        &self,
        out: &mut dyn Write,
        event: &Event<'_>,
        human: impl Fn(&mut dyn Write, bool) -> io::Result<()>,
    ) -> anyhow::Result<()> {
        write_mode(out, self.mode, event, |_, w| human(w, false), |_, w| human(w, true))
    }

    fn current(&self) -> anyhow::Result<(usize, &Item)> {
        let index = self.state.cursor();
        let item = self.nav.current_item(&self.state).ok_or(SessionError::Idle)?;
        Ok((index, item))
    }

    fn show(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let (index, item) = self.current()?;
        let view = ItemView::new(index, self.nav.dataset().len(), item);
        let phase = self.state.phase();
        let buffer = self.state.buffer();
        let event = Event::Item(ItemEvent {
            view: ItemView::new(index, self.nav.dataset().len(), item),
            phase,
            buffer,
            saved: self.nav.saved_record(&item.id).is_some(),
            dirty: self.nav.is_dirty(&self.state),
        });
        self.emit(out, &event, |w, pretty| {
            if pretty {
                write_item_pretty(w, &view)?;
                write_buffer_pretty(w, phase, buffer)
            } else {
                write_item_text(w, &view)?;
                write_buffer_text(w, phase, buffer)
            }
        })
    }

    fn edited(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let phase = self.state.phase();
        let buffer = self.state.buffer();
        let event = Event::Edited {
            item_id: self.state.loaded_item_id().unwrap_or_default(),
            phase,
            buffer,
        };
        self.emit(out, &event, |w, pretty| {
            if pretty {
                write_buffer_pretty(w, phase, buffer)
            } else {
                write_buffer_text(w, phase, buffer)
            }
        })
    }

    fn moved(&self, out: &mut dyn Write, outcome: &NavOutcome, edge: &str) -> anyhow::Result<()> {
        self.emit(out, &Event::Moved(outcome), |w, _| {
            if let Some(report) = &outcome.saved {
                write_save_human(w, report)?;
            }
            if outcome.discarded_edits {
                writeln!(w, "unsaved edits discarded")?;
            }
            if !outcome.moved() {
                writeln!(w, "{edge}")?;
            }
            Ok(())
        })?;
        if outcome.moved() {
            self.show(out)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, command: ReplCommand, out: &mut dyn Write) -> anyhow::Result<Flow> {
        debug!(?command, cursor = self.state.cursor(), "session command");
        match command {
            ReplCommand::Show => self.show(out)?,
            ReplCommand::Label(label) => {
                self.state.set_label(label)?;
                self.edited(out)?;
            }
            ReplCommand::Agree => {
                self.state.set_contextual_agreement(Agreement::Agree)?;
                self.edited(out)?;
            }
            ReplCommand::Disagree => {
                self.state.set_contextual_agreement(Agreement::Disagree)?;
                self.edited(out)?;
            }
            ReplCommand::Factors(codes) => {
                self.state.set_factor_codes(&codes)?;
                self.edited(out)?;
            }
            ReplCommand::Explain(text) => {
                self.state.set_explanation(text)?;
                self.edited(out)?;
            }
            ReplCommand::Save => {
                let report = self.nav.save(&mut self.state)?;
                self.emit(out, &Event::Saved(&report), |w, _| {
                    write_save_human(w, &report)
                })?;
            }
            ReplCommand::Next => {
                let outcome = self.nav.next(&mut self.state)?;
                self.moved(out, &outcome, "already at the last item; `save` keeps your edits")?;
            }
            ReplCommand::Prev => {
                let outcome = self.nav.previous(&mut self.state)?;
                self.moved(out, &outcome, "already at the first item")?;
            }
            ReplCommand::Jump(id) => {
                let outcome = self.nav.jump_to(&mut self.state, &id)?;
                self.moved(out, &outcome, "already on that item")?;
            }
            ReplCommand::Goto(n) => {
                let outcome = self.nav.jump_to_index(&mut self.state, n - 1)?;
                self.moved(out, &outcome, "already on that item")?;
            }
            ReplCommand::Progress => {
                let progress = self.nav.progress();
                let event = Event::Progress {
                    done: progress.done,
                    total: progress.total,
                };
                self.emit(out, &event, |w, _| {
                    writeln!(w, "progress={}/{}", progress.done, progress.total)
                })?;
            }
            ReplCommand::Traceback => {
                let ids: Vec<&str> = self.nav.records().map(|r| r.item_id.as_str()).collect();
                let joined = ids.join(", ");
                self.emit(out, &Event::Traceback { ids }, |w, _| {
                    if joined.is_empty() {
                        writeln!(w, "nothing saved yet")
                    } else {
                        writeln!(w, "annotated: {joined}")
                    }
                })?;
            }
            ReplCommand::Help => {
                let commands = HELP
                    .iter()
                    .map(|&(command, description)| Usage {
                        command,
                        description,
                    })
                    .collect();
                self.emit(out, &Event::Help { commands }, |w, _| {
                    for (command, description) in HELP {
                        writeln!(w, "  {command:<24} {description}")?;
                    }
                    Ok(())
                })?;
            }
            ReplCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn finish(&self, out: &mut dyn Write, err: &mut dyn Write) -> anyhow::Result<()> {
        let unsaved_edits = self.nav.is_dirty(&self.state);
        if unsaved_edits {
            let item = self.state.loaded_item_id().unwrap_or_default();
            warn!(item, "session ended with unsaved edits");
            writeln!(err, "warning: unsaved edits on item {item} were not saved")?;
        }
        self.emit(out, &Event::Quit { unsaved_edits }, |w, pretty| {
            if pretty {
                writeln!(w, "bye")?;
            }
            Ok(())
        })
    }

    fn run(
        &mut self,
        input: impl BufRead,
        out: &mut dyn Write,
        err: &mut dyn Write,
        prompt: bool,
    ) -> anyhow::Result<()> {
        self.show(out)?;
        let mut lines = input.lines();
        loop {
            if prompt {
                write!(out, "vd> ")?;
                out.flush()?;
            }
            let Some(line) = lines.next() else { break };
            let line = line?;
            let step = match ReplCommand::parse(&line) {
                Ok(Some(command)) => self.dispatch(command, out),
                Ok(None) => Ok(Flow::Continue),
                Err(e) => Err(anyhow::Error::new(e)),
            };
            match step {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) if is_recoverable(&e) => write_error(err, self.mode, &CliError::from(&e))?,
                Err(e) => return Err(e),
            }
            out.flush()?;
        }
        self.finish(out, err)
    }
}

/// Execute `vd annotate`.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened, `--start` names an
/// unknown item, the dataset is empty, or a local snapshot write fails.
pub fn run_annotate(
    args: &AnnotateArgs,
    creds: CredentialFlags<'_>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let mut workspace = open_workspace(project_root, creds)?;
    let nav = &mut workspace.navigator;
    if nav.dataset().is_empty() {
        anyhow::bail!(
            "dataset {} has no items",
            workspace.config.dataset_path(project_root).display()
        );
    }
    let start = match args.start.as_deref().map(str::trim) {
        Some(id) => nav
            .dataset()
            .position(id)
            .ok_or_else(|| NavError::UnknownItem(id.to_string()))?,
        None => 0,
    };

    let state = nav.start(start);
    let prompt = output.is_pretty() && io::stdin().is_terminal();
    let mut repl = Repl {
        nav,
        state,
        mode: output,
    };
    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    repl.run(stdin.lock(), &mut stdout.lock(), &mut stderr.lock(), prompt)
}
