//! Console state.
//!
//! `App` owns everything the terminal shows: the feed list, the activity
//! log, the prompt, and the registration dialog.  It never performs I/O.
//! Work that needs the network or the store is returned as an [`Action`]
//! for the main loop to run on the async runtime; results come back as
//! [`ConsoleMsg`] values.

use std::collections::VecDeque;

use chrono::Local;
use ratatui::widgets::ListState;

use crate::admin::command::{self, Command};
use crate::admin::dialog::{DialogEvent, RegistrationDialog};
use crate::admin::FeedDraft;
use crate::feed::Feed;
use crate::poll::{PollMsg, Trigger};

/// How many activity lines are kept.
const LOG_CAPACITY: usize = 200;

/// Results delivered to the console from background tasks.
#[derive(Debug)]
pub enum ConsoleMsg {
    Poll(PollMsg),
    Feeds(Vec<Feed>),
    /// An admin action succeeded.
    Done(String),
    /// An admin action failed.
    Failed(String),
    RepoChecked(Result<Vec<String>, String>),
}

impl From<PollMsg> for ConsoleMsg {
    fn from(msg: PollMsg) -> Self {
        Self::Poll(msg)
    }
}

/// Background work requested by the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CheckNow,
    Refresh,
    Run(Command),
    CheckRepo(String),
    Register(FeedDraft),
}

pub enum Mode {
    Browse,
    Command,
    Dialog(RegistrationDialog),
}

pub struct App {
    pub feeds: Vec<Feed>,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    pub status: String,
    /// Recent activity, oldest first.
    pub log: VecDeque<String>,
    pub mode: Mode,
    /// Text typed at the prompt.
    pub input: String,
    /// Whether the operator is the administrator.
    pub can_admin: bool,
}

impl App {
    pub fn new(can_admin: bool) -> Self {
        Self {
            feeds: Vec::new(),
            list_state: ListState::default(),
            quit: false,
            status: if can_admin {
                "Starting…".into()
            } else {
                "Read-only: operator is not the administrator".into()
            },
            log: VecDeque::new(),
            mode: Mode::Browse,
            input: String::new(),
            can_admin,
        }
    }

    /// Replace the feed list, keeping the selection on the same key.
    pub fn set_feeds(&mut self, feeds: Vec<Feed>) {
        let selected_key = self.selected_feed().map(|f| f.key.clone());
        self.feeds = feeds;
        let index = selected_key
            .and_then(|key| self.feeds.iter().position(|f| f.key == key))
            .or(if self.feeds.is_empty() { None } else { Some(0) });
        self.list_state.select(index.map(|i| i.min(self.feeds.len().saturating_sub(1))));
    }

    pub fn selected_feed(&self) -> Option<&Feed> {
        self.list_state.selected().and_then(|i| self.feeds.get(i))
    }

    pub fn record(&mut self, line: impl Into<String>) {
        let stamp = Local::now().format("%H:%M:%S");
        self.log.push_back(format!("{stamp} {}", line.into()));
        while self.log.len() > LOG_CAPACITY {
            self.log.pop_front();
        }
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        if self.feeds.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(self.feeds.len() - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.feeds.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.feeds.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.feeds.is_empty() {
            self.list_state.select(Some(self.feeds.len() - 1));
        }
    }

    // -- prompt --------------------------------------------------------------

    pub fn is_typing(&self) -> bool {
        !matches!(self.mode, Mode::Browse)
    }

    /// Prompt label for the input line, if one is open.
    pub fn prompt(&self) -> Option<&'static str> {
        match &self.mode {
            Mode::Browse => None,
            Mode::Command => Some(":"),
            Mode::Dialog(dialog) => Some(dialog.prompt()),
        }
    }

    pub fn begin_command(&mut self) {
        self.input.clear();
        self.mode = Mode::Command;
    }

    pub fn begin_dialog(&mut self) {
        if !self.can_admin {
            self.status = "Only the administrator can add feeds".into();
            return;
        }
        self.input.clear();
        let keys = self.feeds.iter().map(|f| f.key.clone());
        self.mode = Mode::Dialog(RegistrationDialog::new(keys));
        self.status = "Adding a feed (Esc cancels)".into();
    }

    pub fn cancel_input(&mut self) {
        if matches!(self.mode, Mode::Dialog(_)) {
            self.status = "Registration cancelled".into();
        }
        self.input.clear();
        self.mode = Mode::Browse;
    }

    /// Submit the prompt line.
    pub fn submit(&mut self) -> Option<Action> {
        let line = std::mem::take(&mut self.input);
        match std::mem::replace(&mut self.mode, Mode::Browse) {
            Mode::Browse => None,
            Mode::Command => self.run_command(&line),
            Mode::Dialog(mut dialog) => {
                let event = dialog.answer(&line);
                self.mode = Mode::Dialog(dialog);
                self.on_dialog_event(event)
            }
        }
    }

    fn run_command(&mut self, line: &str) -> Option<Action> {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                self.status = e.to_string();
                return None;
            }
        };
        if command.needs_admin() && !self.can_admin {
            self.status = "Only the administrator can do that".into();
            return None;
        }
        match command {
            Command::Add => {
                self.begin_dialog();
                None
            }
            Command::Check => Some(Action::CheckNow),
            Command::Help => {
                self.status = command::HELP.into();
                None
            }
            other => Some(Action::Run(other)),
        }
    }

    fn on_dialog_event(&mut self, event: DialogEvent) -> Option<Action> {
        match event {
            DialogEvent::Next => None,
            DialogEvent::Retry(message) => {
                self.status = message;
                None
            }
            DialogEvent::CheckRepo(repo) => {
                self.status = format!("Checking {repo}…");
                Some(Action::CheckRepo(repo))
            }
            DialogEvent::Done(draft) => {
                self.mode = Mode::Browse;
                self.status = format!("Registering {}…", draft.key);
                Some(Action::Register(draft))
            }
        }
    }

    // -- background results --------------------------------------------------

    pub fn handle_msg(&mut self, msg: ConsoleMsg) -> Option<Action> {
        match msg {
            ConsoleMsg::Poll(PollMsg::Started(trigger)) => {
                self.status = match trigger {
                    Trigger::Manual => "Checking feeds now…".into(),
                    Trigger::Scheduled => "Scheduled check running…".into(),
                };
                None
            }
            ConsoleMsg::Poll(PollMsg::Finished(trigger, report)) => {
                let label = match trigger {
                    Trigger::Manual => "Manual check",
                    Trigger::Scheduled => "Scheduled check",
                };
                self.status = format!("{label} complete");
                self.record(format!("{label}: {report}"));
                Some(Action::Refresh)
            }
            ConsoleMsg::Feeds(feeds) => {
                self.set_feeds(feeds);
                None
            }
            ConsoleMsg::Done(message) => {
                self.status = message.clone();
                self.record(message);
                Some(Action::Refresh)
            }
            ConsoleMsg::Failed(message) => {
                self.status = format!("Error: {message}");
                self.record(format!("error: {message}"));
                None
            }
            ConsoleMsg::RepoChecked(result) => {
                let Mode::Dialog(dialog) = &mut self.mode else {
                    return None;
                };
                let event = dialog.repo_checked(result);
                let assets: Vec<String> = dialog
                    .assets()
                    .iter()
                    .enumerate()
                    .map(|(i, name)| format!("  {}. {name}", i + 1))
                    .collect();
                if matches!(event, DialogEvent::Next) {
                    if assets.is_empty() {
                        self.record("latest release has no assets; enter glob patterns");
                    } else {
                        self.record("latest release assets:");
                        for line in assets {
                            self.record(line);
                        }
                    }
                    self.status = "Choose assets".into();
                }
                self.on_dialog_event(event)
            }
        }
    }
}
