//! Command-line front end and REPL

use anyhow::{Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use midi_patchbay::authority::HttpAuthority;
use midi_patchbay::config::{AppConfig, MonitorConfig};
use midi_patchbay::graph::{GraphSync, PortRef, Snapshot};
use midi_patchbay::monitor::{ChannelOpener, MonitorSession, WsChannelOpener};
use midi_patchbay::{view, Error};

/// How often the monitor view repaints while events are arriving
const REPAINT_INTERVAL: Duration = Duration::from_millis(100);

/// Event lines shown under the keyboard
const MONITOR_ROWS: usize = 32;

const HELP: &str = "  ls                      list ports and connections
  connect FROM TO         route FROM (output) to TO (input), e.g. connect 20:0 128:0
  disconnect FROM TO      remove a route
  monitor PORT            watch live MIDI on PORT until Ctrl+C
  reset                   ask the authority to rebuild its state
  help                    this text
  quit                    leave";

/// Everything a command needs
pub struct App {
    pub config: AppConfig,
    pub sync: GraphSync,
    pub opener: Arc<dyn ChannelOpener>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let authority = HttpAuthority::new(&config.authority.url, config.request_timeout())
            .context("Failed to create authority client")?;
        let opener = WsChannelOpener::new(&config.authority.url)
            .context("Failed to derive monitor channel address")?;
        info!("Routing authority: {}", authority.base_url());

        let sync = GraphSync::new(Arc::new(authority), config.poll_interval());
        Ok(Self {
            config,
            sync,
            opener: Arc::new(opener),
        })
    }
}

fn print_graph(app: &App) {
    print!("{}", view::render_graph(&app.sync.snapshot()));
}

/// Reconcile once and print the graph
pub async fn status(app: &App, json: bool) -> Result<()> {
    let snapshot = app
        .sync
        .reconcile()
        .await
        .context("Failed to fetch status from authority")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view::graph_json(&snapshot))?);
    } else {
        print!("{}", view::render_graph(&snapshot));
    }
    Ok(())
}

/// Reprint the graph on every applied snapshot until Ctrl+C
pub async fn watch(app: &App) -> Result<()> {
    let mut updates = app.sync.subscribe();
    app.sync.start();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print!("\x1B[2J\x1B[H{}", view::render_graph(&snapshot));
            }
        }
    }

    app.sync.stop().await;
    Ok(())
}

pub async fn connect(app: &App, from: PortRef, to: PortRef) -> Result<()> {
    app.sync.reconcile().await.context("Failed to fetch status from authority")?;
    app.sync.connect(from, to).await?;
    println!("{} {} -> {}", "Connected".green(), from, to);
    print_graph(app);
    Ok(())
}

pub async fn disconnect(app: &App, from: PortRef, to: PortRef) -> Result<()> {
    app.sync.reconcile().await.context("Failed to fetch status from authority")?;
    app.sync.disconnect(from, to).await?;
    println!("{} {} -> {}", "Disconnected".yellow(), from, to);
    print_graph(app);
    Ok(())
}

pub async fn reset(app: &App) -> Result<()> {
    app.sync.reset().await.context("Reset failed")?;
    println!("{}", "Authority state reset".yellow());
    print_graph(app);
    Ok(())
}

/// Refresh the graph for display purposes only; failure is logged, not fatal
pub async fn refresh_best_effort(app: &App) -> bool {
    match app.sync.reconcile().await {
        Ok(_) => true,
        Err(e) => {
            warn!("Could not fetch port names, showing addresses only: {}", e);
            false
        }
    }
}

/// Stream one port until Ctrl+C or until the channel goes away
pub async fn monitor(app: &App, port: PortRef, json: bool) -> Result<()> {
    let mut session = MonitorSession::new(Arc::clone(&app.opener));
    session
        .start(port)
        .await
        .with_context(|| format!("Failed to open monitor channel for {}", port))?;

    let screen = MonitorScreen {
        snapshot: app.sync.snapshot(),
        port,
        keyboard: app.config.monitor.clone(),
        json,
    };
    if !json {
        println!("{}", screen.header());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    stream(&mut session, &screen, shutdown, &mut io::stdout()).await
}

/// What the monitor view draws around the session
struct MonitorScreen {
    snapshot: Arc<Snapshot>,
    port: PortRef,
    keyboard: MonitorConfig,
    json: bool,
}

impl MonitorScreen {
    fn header(&self) -> String {
        view::render_monitor_header(&self.snapshot, self.port)
    }

    fn paint(&self, session: &MonitorSession) -> String {
        format!(
            "\x1B[2J\x1B[H{}\n{}\n\n{}\n",
            self.header(),
            view::render_keyboard(
                session.keys(),
                self.keyboard.keyboard_base_note,
                self.keyboard.keyboard_octaves
            ),
            view::render_log(session.log(), MONITOR_ROWS),
        )
    }
}

/// Drive `session` until `shutdown` resolves or the channel ends
///
/// Every exit, including write and serialization failures, goes through
/// `MonitorSession::stop`, so an open channel always gets the close sentinel.
async fn stream<W: Write>(
    session: &mut MonitorSession,
    screen: &MonitorScreen,
    shutdown: impl Future<Output = ()>,
    out: &mut W,
) -> Result<()> {
    let mut repaint = tokio::time::interval(REPAINT_INTERVAL);
    let mut dirty = false;
    tokio::pin!(shutdown);

    let outcome: Result<()> = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            _ = repaint.tick(), if dirty => {
                let painted = write!(out, "{}", screen.paint(session)).and_then(|_| out.flush());
                if let Err(e) = painted {
                    break Err(e).context("Failed to write monitor view");
                }
                session.mark_painted();
                dirty = false;
            }
            next = session.next_event() => match next {
                Ok(Some(event)) if screen.json => {
                    let written = serde_json::to_string(&event)
                        .map_err(anyhow::Error::from)
                        .and_then(|line| Ok(writeln!(out, "{}", line)?));
                    if let Err(e) = written {
                        break Err(e).context("Failed to write event");
                    }
                }
                Ok(Some(_)) => dirty = true,
                Ok(None) => {
                    if let Err(e) = writeln!(out, "{}", "Monitor channel closed by the authority".yellow()) {
                        break Err(e).context("Failed to write monitor view");
                    }
                    break Ok(());
                }
                Err(e @ Error::MalformedFrame { .. }) => warn!("Skipping frame: {}", e),
                Err(e) => break Err(e).context("Monitor channel failed"),
            }
        }
    };

    if let Err(e) = session.stop().await {
        warn!("Monitor channel did not close cleanly: {}", e);
    }
    outcome
}

/// Interactive prompt with the poller running underneath
pub async fn run_repl(app: &App) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    if let Err(e) = app.sync.reconcile().await {
        println!("{} {}", "Authority not reachable yet:".red(), e);
    }
    app.sync.start();
    println!("{}", "Type 'help' for commands".dimmed());

    loop {
        let prompt = format!("{}> ", host_label(app));
        let readline = tokio::task::block_in_place(|| rl.readline(&prompt));
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match run_command(app, line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("{} {:#}", "Error:".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                warn!("Readline failed: {}", e);
                break;
            }
        }
    }

    app.sync.stop().await;
    Ok(())
}

fn host_label(app: &App) -> String {
    let snapshot = app.sync.snapshot();
    if snapshot.hostname().is_empty() {
        "patchbay".to_string()
    } else {
        snapshot.hostname().to_string()
    }
}

/// Run one REPL line; `Ok(false)` ends the session
async fn run_command(app: &App, line: &str) -> Result<bool> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    debug!("REPL command: {:?}", parts);

    match parts.as_slice() {
        ["quit"] | ["exit"] => return Ok(false),
        ["help"] => println!("{}", HELP),
        ["ls"] => print_graph(app),
        ["connect", from, to] => {
            let (from, to) = (from.parse::<PortRef>()?, to.parse::<PortRef>()?);
            app.sync.connect(from, to).await?;
            println!("{} {} -> {}", "Connected".green(), from, to);
        }
        ["disconnect", from, to] => {
            let (from, to) = (from.parse::<PortRef>()?, to.parse::<PortRef>()?);
            app.sync.disconnect(from, to).await?;
            println!("{} {} -> {}", "Disconnected".yellow(), from, to);
        }
        ["monitor", port] => monitor(app, port.parse::<PortRef>()?, false).await?,
        ["reset"] => reset(app).await?,
        _ => println!("{} '{}', try 'help'", "Unknown command".red(), line),
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use midi_patchbay::monitor::PushChannel;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct ScriptedChannel {
        frames: mpsc::UnboundedReceiver<Vec<u8>>,
        journal: Journal,
    }

    #[async_trait]
    impl PushChannel for ScriptedChannel {
        async fn next_frame(&mut self) -> midi_patchbay::Result<Option<Vec<u8>>> {
            Ok(self.frames.recv().await)
        }

        async fn send_text(&mut self, text: &str) -> midi_patchbay::Result<()> {
            self.journal.lock().push(format!("text {}", text));
            Ok(())
        }

        async fn close(&mut self) -> midi_patchbay::Result<()> {
            self.journal.lock().push("close".to_string());
            Ok(())
        }
    }

    /// Hands out one channel fed from a prepared list of frames
    struct ScriptedOpener {
        frames: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
        journal: Journal,
    }

    #[async_trait]
    impl ChannelOpener for ScriptedOpener {
        async fn open(&self, _port: PortRef) -> midi_patchbay::Result<Box<dyn PushChannel>> {
            let frames = self
                .frames
                .lock()
                .take()
                .ok_or_else(|| Error::Transport("already opened".into()))?;
            Ok(Box::new(ScriptedChannel {
                frames,
                journal: Arc::clone(&self.journal),
            }))
        }
    }

    /// Session streaming 20:0, plus the sender feeding it and its journal
    async fn streaming_session() -> (MonitorSession, mpsc::UnboundedSender<Vec<u8>>, Journal) {
        let (tx, rx) = mpsc::unbounded_channel();
        let journal = Journal::default();
        let opener = Arc::new(ScriptedOpener {
            frames: Mutex::new(Some(rx)),
            journal: Arc::clone(&journal),
        });

        let mut session = MonitorSession::new(opener);
        session.start(PortRef::new(20, 0)).await.unwrap();
        (session, tx, journal)
    }

    fn screen(json: bool) -> MonitorScreen {
        MonitorScreen {
            snapshot: Arc::new(Snapshot::default()),
            port: PortRef::new(20, 0),
            keyboard: MonitorConfig::default(),
            json,
        }
    }

    #[tokio::test]
    async fn test_shutdown_sends_close_sentinel() {
        let (mut session, tx, journal) = streaming_session().await;
        tx.send(vec![0x90, 60, 100]).unwrap();

        let mut out = Vec::new();
        let shutdown = tokio::time::sleep(Duration::from_millis(250));
        stream(&mut session, &screen(false), shutdown, &mut out)
            .await
            .unwrap();

        assert_eq!(*journal.lock(), vec!["text CLOSE", "close"]);
        assert_eq!(session.state(), midi_patchbay::monitor::SessionState::Idle);
        assert!(session.log().is_empty());
        // At least one repaint happened before shutdown
        assert!(String::from_utf8(out).unwrap().contains("note-on"));
    }

    #[tokio::test]
    async fn test_json_lines_until_channel_closes() {
        let (mut session, tx, journal) = streaming_session().await;
        tx.send(vec![0x90, 60, 100]).unwrap();
        tx.send(vec![0x90, 60]).unwrap();
        tx.send(vec![0xB0, 1, 127]).unwrap();
        drop(tx);

        let mut out = Vec::new();
        stream(&mut session, &screen(true), std::future::pending(), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let events: Vec<serde_json::Value> = text
            .lines()
            .filter(|l| l.starts_with('{'))
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        // The short frame is skipped without using up an id
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["id"], 1);
        assert_eq!(events[1]["id"], 2);
        assert_eq!(events[1]["type"], "controller");
        assert!(text.contains("Monitor channel closed by the authority"));

        // Channel ended on its own: no sentinel, state cleared
        assert!(journal.lock().is_empty());
        assert_eq!(session.port(), None);
    }

    #[tokio::test]
    async fn test_refresh_tolerates_unreachable_authority() {
        let mut config = AppConfig::default();
        config.authority.url = "http://127.0.0.1:9/".to_string();
        config.authority.request_timeout_ms = 500;
        let app = App::new(config).unwrap();

        assert!(!refresh_best_effort(&app).await);
        assert!(app.sync.snapshot().is_empty());
    }
}
