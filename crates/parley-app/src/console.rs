//! Line-oriented terminal front end.
//!
//! One tokio task on a current-thread runtime owns the
//! [`ConversationRuntime`]. A ticking interval plays the part of the redraw
//! cycle and stdin lines carry user intents.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use parley_core::config::AppConfig;
use parley_core::profile::SessionConfig;
use parley_session::{ConversationRuntime, Event, EventKind, Script, ScriptedFactory, StopOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::export;
use crate::setup;
use crate::tools::{self, AssistantTools};

const HELP: &str = "\
Commands:
  /start                 start a voice session
  /stop                  ask the session to end
  /clear                 clear the transcript
  /voice <name>          choose the assistant voice
  /voices                list voices
  /say <text>            send typed text (plain text works too)
  /calendar [date]       ask for calendar events (default: today)
  /event <what> at <when> add a calendar event
  /recipe <dish>         ask for a recipe
  /task <description>    add a task
  /tasks                 list tasks
  /search <query>        search the web
  /audio <bytes>         simulate recorded audio
  /save                  save the transcript to a file
  /status                show session status and diagnostics
  /help                  show this help
  /quit                  stop and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Clear,
    Voice(String),
    Voices,
    Say(String),
    Calendar(String),
    Event { summary: String, time: String },
    Recipe(String),
    Task(String),
    Tasks,
    Search(String),
    Audio(usize),
    Save,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0} (try /help)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line. Blank lines yield `None`; text without a leading
/// slash is typed input.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(ConsoleCommand::Say(line.to_string())));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let required = |usage: &'static str| {
        if arg.is_empty() {
            Err(CommandError::Usage(usage))
        } else {
            Ok(arg.to_string())
        }
    };

    let command = match name {
        "start" => ConsoleCommand::Start,
        "stop" => ConsoleCommand::Stop,
        "clear" => ConsoleCommand::Clear,
        "voice" => ConsoleCommand::Voice(required("/voice <name>")?),
        "voices" => ConsoleCommand::Voices,
        "say" => ConsoleCommand::Say(required("/say <text>")?),
        "calendar" => ConsoleCommand::Calendar(if arg.is_empty() {
            "today".to_string()
        } else {
            arg.to_string()
        }),
        "event" => {
            let usage = "/event <summary> at <time>";
            let (summary, time) = arg.rsplit_once(" at ").ok_or(CommandError::Usage(usage))?;
            if summary.trim().is_empty() || time.trim().is_empty() {
                return Err(CommandError::Usage(usage));
            }
            ConsoleCommand::Event {
                summary: summary.trim().to_string(),
                time: time.trim().to_string(),
            }
        }
        "recipe" => ConsoleCommand::Recipe(required("/recipe <dish>")?),
        "task" => ConsoleCommand::Task(required("/task <description>")?),
        "tasks" => ConsoleCommand::Tasks,
        "search" => ConsoleCommand::Search(required("/search <query>")?),
        "audio" => ConsoleCommand::Audio(
            arg.parse()
                .map_err(|_| CommandError::Usage("/audio <bytes>"))?,
        ),
        "save" => ConsoleCommand::Save,
        "status" => ConsoleCommand::Status,
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(CommandError::Unknown(format!("/{other}"))),
    };
    Ok(Some(command))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<W: Write> {
    runtime: ConversationRuntime,
    session_config: SessionConfig,
    tools: AssistantTools,
    save_dir: PathBuf,
    out: W,
    printed_through: Option<u64>,
    placeholder_shown: bool,
    thinking_shown: bool,
}

impl<W: Write> Console<W> {
    pub fn new(
        runtime: ConversationRuntime,
        config: &AppConfig,
        session_config: SessionConfig,
        out: W,
    ) -> Self {
        Self {
            runtime,
            session_config,
            tools: AssistantTools::new(config.profile.schedule.clone()),
            save_dir: PathBuf::from(&config.session.log_dir),
            out,
            printed_through: None,
            placeholder_shown: false,
            thinking_shown: false,
        }
    }

    pub fn runtime(&self) -> &ConversationRuntime {
        &self.runtime
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    pub fn notify(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "* {message}")?;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        match self.runtime.start(&self.session_config) {
            Ok(id) => {
                self.placeholder_shown = false;
                self.notify(&format!("Session {} started", id.short()))
            }
            Err(e) => self.notify(&format!("Failed to start conversation: {e}")),
        }
    }

    pub fn handle(&mut self, command: ConsoleCommand) -> Result<Flow> {
        let queue = self.runtime.queue().clone();
        match command {
            ConsoleCommand::Start => self.start()?,
            ConsoleCommand::Stop => match self.runtime.stop() {
                StopOutcome::Requested(_) => {
                    self.notify("Stop request sent. Waiting for session to fully terminate.")?
                }
                StopOutcome::NoSession | StopOutcome::AlreadyFinished => {
                    self.notify("No active session.")?
                }
            },
            ConsoleCommand::Clear => {
                self.runtime.clear();
                self.notify("Transcript cleared.")?;
            }
            ConsoleCommand::Voice(name) => match self.runtime.select_voice(&name) {
                Ok(()) => self.notify(&format!("Voice set to {name}"))?,
                Err(e) => self.notify(&e.to_string())?,
            },
            ConsoleCommand::Voices => {
                let selected = self.runtime.selected_voice().to_string();
                let names: Vec<String> = self
                    .runtime
                    .voices()
                    .iter()
                    .map(|v| {
                        if v.name == selected {
                            format!("{} (selected)", v.name)
                        } else {
                            v.name.clone()
                        }
                    })
                    .collect();
                self.notify(&format!("Voices: {}", names.join(", ")))?;
            }
            ConsoleCommand::Say(text) => {
                let text = text.trim();
                if text.is_empty() {
                    self.notify("Please enter some text to send.")?;
                } else {
                    tools::push_exchange(&queue, text, tools::manual_reply(text));
                }
            }
            ConsoleCommand::Calendar(date) => {
                let answer = self.tools.calendar_events(&date);
                tools::push_exchange(&queue, format!("What's on my calendar {date}?"), answer);
            }
            ConsoleCommand::Event { summary, time } => {
                let answer = self.tools.add_calendar_event(&summary, &time);
                tools::push_exchange(
                    &queue,
                    format!("Add {summary} at {time} to my calendar."),
                    answer,
                );
            }
            ConsoleCommand::Recipe(dish) => {
                let answer = self.tools.recipe(&dish);
                tools::push_exchange(&queue, format!("How do I make {dish}?"), answer);
            }
            ConsoleCommand::Task(description) => {
                let answer = self.tools.add_task(&description);
                tools::push_exchange(&queue, format!("Add a task: {description}"), answer);
            }
            ConsoleCommand::Tasks => {
                tools::push_exchange(&queue, "What are my tasks?", self.tools.tasks());
            }
            ConsoleCommand::Search(query) => {
                let answer = self.tools.search_web(&query);
                tools::push_exchange(&queue, format!("Search the web for {query}"), answer);
            }
            ConsoleCommand::Audio(bytes) => {
                queue.push(Event::detached(EventKind::UserAudio { bytes }));
            }
            ConsoleCommand::Save => {
                match export::save(
                    self.runtime.transcript(),
                    &self.save_dir,
                    Local::now().naive_local(),
                ) {
                    Ok(path) => self.notify(&format!("Conversation log saved as {}", path.display()))?,
                    Err(e) => self.notify(&format!("{e:#}"))?,
                }
            }
            ConsoleCommand::Status => self.print_status()?,
            ConsoleCommand::Help => writeln!(self.out, "{HELP}")?,
            ConsoleCommand::Quit => {
                self.runtime.stop();
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    fn print_status(&mut self) -> Result<()> {
        let stats = self.runtime.queue_stats();
        let session = self
            .runtime
            .current_session()
            .map_or_else(|| "none".to_string(), |id| id.to_string());
        writeln!(self.out, "status:   {}", self.runtime.status().as_str())?;
        writeln!(self.out, "session:  {session}")?;
        writeln!(self.out, "voice:    {}", self.runtime.selected_voice())?;
        writeln!(
            self.out,
            "queue:    {} pending, {} coalesced, {} dropped",
            stats.pending, stats.coalesced, stats.dropped
        )?;
        for line in self.runtime.transcript().debug_log() {
            writeln!(self.out, "debug:    {line}")?;
        }
        Ok(())
    }

    /// Poll the runtime and print whatever is new, including local notices
    /// added since the last refresh.
    pub fn refresh(&mut self, now: Instant) -> Result<()> {
        self.runtime.poll(now);
        self.render()
    }

    fn render(&mut self) -> Result<()> {
        let store = self.runtime.transcript();

        match store.placeholder() {
            Some(text) if !self.placeholder_shown => {
                writeln!(self.out, "{text}")?;
                self.placeholder_shown = true;
            }
            None => self.placeholder_shown = false,
            Some(_) => {}
        }

        let new_entries = store.entries_since(self.printed_through);
        for entry in new_entries {
            writeln!(self.out, "{}", export::entry_line(entry))?;
        }
        if let Some(last) = new_entries.last() {
            self.printed_through = Some(last.seq);
        }

        if store.is_thinking() != self.thinking_shown {
            self.thinking_shown = store.is_thinking();
            if self.thinking_shown {
                writeln!(self.out, "(assistant is thinking...)")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

fn tick_interval(config: &AppConfig) -> tokio::time::Interval {
    let mut interval =
        tokio::time::interval(Duration::from_millis(config.session.tick_millis.max(10)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}

/// Interactive loop until `/quit` or end of input.
pub async fn run(config: &AppConfig) -> Result<()> {
    let factory = setup::session_factory(config)?;
    let runtime = setup::build_runtime(config, factory);
    let mut console = Console::new(
        runtime,
        config,
        setup::session_config(config),
        std::io::stdout(),
    );
    console.notify("Type /help for commands, /start to begin.")?;

    let mut ticker = tick_interval(config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => console.refresh(Instant::now())?,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("End of input");
                    console.handle(ConsoleCommand::Quit)?;
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if console.handle(command)? == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => console.notify(&e.to_string())?,
                }
            }
        }
    }

    console.refresh(Instant::now())?;
    Ok(())
}

/// Play `script` to its end and print the transcript as it arrives.
pub async fn replay(config: &AppConfig, script: &Path, timeout: Duration) -> Result<()> {
    let factory = Arc::new(ScriptedFactory::new(Script::load(script)?));
    let runtime = setup::build_runtime(config, factory);
    let mut console = Console::new(
        runtime,
        config,
        setup::session_config(config),
        std::io::stdout(),
    );

    let id = console.runtime.start(&console.session_config)?;
    tracing::info!("Replaying {} as session {id}", script.display());

    let deadline = Instant::now() + timeout;
    let mut ticker = tick_interval(config);
    let mut timed_out = false;
    loop {
        ticker.tick().await;
        let now = Instant::now();
        console.refresh(now)?;
        let runtime = console.runtime();
        if runtime.status().is_terminal() && runtime.queue().is_empty() {
            break;
        }
        if now >= deadline && !timed_out {
            timed_out = true;
            tracing::warn!("Replay timed out after {}s", timeout.as_secs());
            console.handle(ConsoleCommand::Stop)?;
        }
    }
    console.refresh(Instant::now())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::config::{SessionSettings, SpeechConfig};

    #[test]
    fn parses_commands_and_plain_text() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("hello there"),
            Ok(Some(ConsoleCommand::Say("hello there".into())))
        );
        assert_eq!(parse_command("/start"), Ok(Some(ConsoleCommand::Start)));
        assert_eq!(
            parse_command("/calendar"),
            Ok(Some(ConsoleCommand::Calendar("today".into())))
        );
        assert_eq!(
            parse_command("/event Lunch with Sam at 12:30"),
            Ok(Some(ConsoleCommand::Event {
                summary: "Lunch with Sam".into(),
                time: "12:30".into()
            }))
        );
        assert_eq!(
            parse_command("/audio 4096"),
            Ok(Some(ConsoleCommand::Audio(4096)))
        );
    }

    #[test]
    fn rejects_bad_commands() {
        assert_eq!(
            parse_command("/dance"),
            Err(CommandError::Unknown("/dance".into()))
        );
        assert_eq!(
            parse_command("/voice"),
            Err(CommandError::Usage("/voice <name>"))
        );
        assert!(parse_command("/audio lots").is_err());
        assert!(parse_command("/event lunch").is_err());
    }

    fn console(script: &str) -> Console<Vec<u8>> {
        let mut config = AppConfig::default();
        config.speech = SpeechConfig {
            enabled: false,
            ..Default::default()
        };
        let factory = Arc::new(ScriptedFactory::new(script.parse().unwrap()));
        let runtime = ConversationRuntime::new(factory, &SessionSettings::default(), &config.speech);
        let session = setup::session_config(&config);
        Console::new(runtime, &config, session, Vec::new())
    }

    fn output(console: Console<Vec<u8>>) -> String {
        String::from_utf8(console.into_output()).unwrap()
    }

    #[test]
    fn typed_text_and_tools_render_as_exchanges() {
        let mut console = console("greet = false\nhold_open = true\n");
        console.handle(ConsoleCommand::Say("hi".into())).unwrap();
        console.handle(ConsoleCommand::Task("buy milk".into())).unwrap();
        console.handle(ConsoleCommand::Tasks).unwrap();
        console.refresh(Instant::now()).unwrap();

        let out = output(console);
        assert!(out.contains("You: hi\n"));
        assert!(out.contains("Assistant: I received your text: 'hi'."));
        assert!(out.contains("Assistant: Task 'buy milk' added."));
        assert!(out.contains("Assistant: Your current tasks are: buy milk"));
    }

    #[test]
    fn start_shows_placeholder_then_stop_notice() {
        let mut console = console("greet = false\nhold_open = true\n");
        console.handle(ConsoleCommand::Start).unwrap();
        console.refresh(Instant::now()).unwrap();
        console.handle(ConsoleCommand::Stop).unwrap();
        console.refresh(Instant::now()).unwrap();

        let out = output(console);
        let placeholder = out.find("Initializing conversation...").unwrap();
        let stop = out.find("[stop requested]").unwrap();
        assert!(placeholder < stop);
        assert!(out.contains("Stop request sent."));
    }

    #[test]
    fn restart_before_any_event_shows_placeholder_again() {
        let mut console = console("greet = false\nhold_open = true\n");
        console.handle(ConsoleCommand::Start).unwrap();
        console.refresh(Instant::now()).unwrap();
        console.handle(ConsoleCommand::Stop).unwrap();
        console.handle(ConsoleCommand::Start).unwrap();
        console.refresh(Instant::now()).unwrap();
        console.handle(ConsoleCommand::Quit).unwrap();

        let out = output(console);
        assert_eq!(out.matches("Initializing conversation...").count(), 2, "Got: {out}");
    }

    #[test]
    fn stop_without_session_reports_and_changes_nothing() {
        let mut console = console("");
        console.handle(ConsoleCommand::Stop).unwrap();
        assert!(console.runtime().transcript().is_empty());
        assert!(output(console).contains("No active session."));
    }

    #[test]
    fn unknown_voice_is_reported() {
        let mut console = console("");
        console.handle(ConsoleCommand::Voice("Nobody".into())).unwrap();
        assert_eq!(console.runtime().selected_voice(), "Rachel");
        assert!(output(console).contains("Nobody"));
    }

    #[test]
    fn quit_returns_quit_flow() {
        let mut console = console("");
        assert_eq!(console.handle(ConsoleCommand::Quit).unwrap(), Flow::Quit);
        assert_eq!(console.handle(ConsoleCommand::Help).unwrap(), Flow::Continue);
    }
}
