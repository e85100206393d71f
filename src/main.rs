//! release-relay: watches GitHub repositories for new releases and sends the
//! matching release assets to Telegram subscribers.
//!
//! ## Architecture overview
//!
//! ```text
//!                 ┌───────────┐ fetch  ┌────────────┐
//!   poll.rs ────► │ engine/   │ ─────► │ source/    │  GitHub REST
//!   (ticker,      │ (cycle)   │        └────────────┘
//!    check_now)   │           │ send   ┌────────────┐
//!       │         │           │ ─────► │ sink/      │  Telegram Bot API
//!       │         └─────┬─────┘        └────────────┘
//!       │               │ per-feed lock
//!       │         ┌─────┴─────┐        ┌────────────┐
//!       │         │ store.rs  │ ◄───── │ admin/     │ ◄── console commands
//!       │         └───────────┘        └────────────┘
//!       │ PollMsg                             ▲
//!       ▼                                     │ Action
//!   ┌──────────┐  draw()  ┌──────────┐  ┌──────────┐
//!   │  app.rs  │ ───────► │  ui.rs   │  │ input.rs │
//!   └──────────┘          └──────────┘  └──────────┘
//! ```
//!
//! * **`engine`** runs a poll cycle: per feed, fetch the latest release,
//!   compare tags, commit the new tag, then deliver the matching assets.
//! * **`source/`** and **`sink/`** are the `ReleaseSource` and
//!   `DeliverySink` traits with their GitHub and Telegram implementations.
//! * **`store`** persists feed records in one JSON file.
//! * **`admin/`** holds feed registration and editing, the registration
//!   dialog and the one-line command parser.
//! * **`poll`** drives the engine on a timer and on demand.
//! * **`app`**, **`ui`** and **`input`** are the terminal console.
//! * **`main`** wires everything together.  Pass `--headless` to run without
//!   the console.

mod admin;
mod app;
mod config;
mod engine;
mod error;
mod feed;
mod filter;
mod input;
mod logging;
mod poll;
mod sink;
mod source;
mod store;
mod ui;

#[cfg(test)]
mod testing;

use std::future::Future;
use std::io;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::{Handle, Runtime};
use tracing::{info, warn};

use admin::command::{self, Command};
use admin::{Admin, AdminGuard};
use app::{Action, App, ConsoleMsg};
use config::Config;
use engine::{FeedLocks, PollingEngine};
use error::AdminError;
use feed::RecipientId;
use poll::PollHandle;
use sink::TelegramSink;
use source::GithubSource;
use store::JsonFileStore;

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Enters raw mode and the alternate screen; [`Drop`] restores the terminal,
/// including during unwinding.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the panic message is printed.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

// ---------------------------------------------------------------------------
// Service wiring
// ---------------------------------------------------------------------------

struct Services {
    engine: Arc<PollingEngine>,
    admin: Arc<Admin>,
}

impl Services {
    async fn build(config: &Config) -> Result<Self> {
        let store = Arc::new(
            JsonFileStore::open(&config.store_path)
                .await
                .context("opening feed store")?,
        );
        info!(path = %store.path().display(), "using feed store");

        let source = Arc::new(
            GithubSource::new(
                config.github_api_url.clone(),
                config.github_token.clone(),
                config.request_timeout,
                config.transfer_timeout,
            )
            .context("building GitHub client")?,
        );
        let sink = Arc::new(
            TelegramSink::new(&config.telegram_api_url, &config.bot_token, config.transfer_timeout)
                .context("building Telegram client")?,
        );
        if config.github_token.is_none() {
            warn!("GITHUB_TOKEN not set, GitHub requests are unauthenticated and heavily rate limited");
        }

        let locks = FeedLocks::new();
        let engine = PollingEngine::new(
            store.clone(),
            source.clone(),
            sink,
            locks.clone(),
            config.max_concurrent_feeds,
        );
        let admin = Admin::new(AdminGuard::new(config.admin_id), store, source, locks);

        Ok(Self {
            engine: Arc::new(engine),
            admin: Arc::new(admin),
        })
    }
}

// ---------------------------------------------------------------------------
// Console action dispatch
// ---------------------------------------------------------------------------

/// Runs console [`Action`]s on the runtime and reports back as
/// [`ConsoleMsg`]s.
struct Dispatcher {
    runtime: Handle,
    admin: Arc<Admin>,
    poller: PollHandle,
    replies: mpsc::Sender<ConsoleMsg>,
    operator: RecipientId,
}

impl Dispatcher {
    fn dispatch(&self, app: &mut App, action: Action) {
        let admin = Arc::clone(&self.admin);
        let operator = self.operator;
        match action {
            Action::CheckNow => {
                if !self.poller.check_now() {
                    app.status = "Poll scheduler is not running".into();
                }
            }
            Action::Refresh => self.spawn(async move {
                match admin.list().await {
                    Ok(feeds) => ConsoleMsg::Feeds(feeds),
                    Err(e) => ConsoleMsg::Failed(e.to_string()),
                }
            }),
            Action::CheckRepo(repo) => self.spawn(async move {
                ConsoleMsg::RepoChecked(admin.check_repo(&repo).await.map_err(|e| e.to_string()))
            }),
            Action::Register(draft) => self.spawn(async move {
                reply(
                    admin
                        .register(operator, draft)
                        .await
                        .map(|feed| format!("feed {} registered for {}", feed.key, feed.repo)),
                )
            }),
            Action::Run(Command::Check) => self.dispatch(app, Action::CheckNow),
            Action::Run(Command::Add) => app.begin_dialog(),
            Action::Run(Command::Help) => app.status = command::HELP.into(),
            Action::Run(command) => self.spawn(run_command(admin, operator, command)),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ConsoleMsg> + Send + 'static,
    {
        let replies = self.replies.clone();
        self.runtime.spawn(async move {
            let _ = replies.send(task.await);
        });
    }
}

async fn run_command(admin: Arc<Admin>, operator: RecipientId, command: Command) -> ConsoleMsg {
    let result = match command {
        Command::Assets { key } => admin.asset_names(&key).await.map(|names| {
            if names.is_empty() {
                format!("{key}: no assets available right now")
            } else {
                format!("{key}: {}", names.join(", "))
            }
        }),
        Command::Repo { key, repo } => admin
            .set_repo(operator, &key, &repo)
            .await
            .map(|feed| format!("{} now follows {}", feed.key, feed.repo)),
        Command::Filters { key, patterns } => admin
            .set_filters(operator, &key, &patterns)
            .await
            .map(|feed| format!("{} filters: {}", feed.key, feed.asset_filters.join(" "))),
        Command::Subscribe { key, recipient } => {
            admin.subscribe(&key, recipient).await.map(|added| {
                if added {
                    format!("{recipient} subscribed to {key}")
                } else {
                    format!("{recipient} was already subscribed to {key}")
                }
            })
        }
        Command::Unsubscribe { key, recipient } => {
            admin.unsubscribe(&key, recipient).await.map(|removed| {
                if removed {
                    format!("{recipient} unsubscribed from {key}")
                } else {
                    format!("{recipient} was not subscribed to {key}")
                }
            })
        }
        Command::Delete { key } => admin
            .delete(operator, &key)
            .await
            .map(|()| format!("feed {key} deleted")),
        Command::Add | Command::Check | Command::Help => Ok(command::HELP.to_string()),
    };
    reply(result)
}

fn reply(result: Result<String, AdminError>) -> ConsoleMsg {
    match result {
        Ok(message) => ConsoleMsg::Done(message),
        Err(e) => {
            warn!(error = %e, "console action failed");
            ConsoleMsg::Failed(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let headless = std::env::args().skip(1).any(|arg| arg == "--headless");

    let config = Config::from_env().context("loading configuration")?;
    let _log_guard = logging::init_logging(&config.log_dir, headless)?;
    info!(?config, headless, "release-relay starting");

    let runtime = Runtime::new().context("starting tokio runtime")?;
    let services = runtime.block_on(Services::build(&config))?;

    let (tx, rx) = mpsc::channel::<ConsoleMsg>();
    let poller = poll::spawn(
        runtime.handle(),
        Arc::clone(&services.engine),
        config.poll_interval,
        tx.clone(),
    );

    let outcome = if headless {
        drop(rx);
        runtime
            .block_on(tokio::signal::ctrl_c())
            .context("waiting for ctrl-c")
    } else {
        let dispatcher = Dispatcher {
            runtime: runtime.handle().clone(),
            admin: services.admin,
            poller,
            replies: tx,
            operator: config.operator_id,
        };
        run_console(&dispatcher, rx)
    };

    info!("shutting down");
    runtime.shutdown_timeout(Duration::from_secs(2));
    outcome
}

fn run_console(dispatcher: &Dispatcher, rx: mpsc::Receiver<ConsoleMsg>) -> Result<()> {
    install_panic_hook();

    let can_admin = dispatcher.admin.guard().is_admin(dispatcher.operator);
    let mut app = App::new(can_admin);
    dispatcher.dispatch(&mut app, Action::Refresh);

    // Dropped on return, restoring the terminal.
    let mut guard = TerminalGuard::new()?;

    // ~10 fps: drain background results, render, then wait for a key.
    let tick_rate = Duration::from_millis(100);

    loop {
        while let Ok(msg) = rx.try_recv() {
            if let Some(action) = app.handle_msg(msg) {
                dispatcher.dispatch(&mut app, action);
            }
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = input::handle_key_event(&mut app, key) {
                    dispatcher.dispatch(&mut app, action);
                }
            }
        }

        if app.quit {
            break;
        }
    }

    Ok(())
}
