use std::{io, path::PathBuf, thread, time::Duration};

use owo_colors::OwoColorize;
use rustc_hash::FxHashMap;
use rustyline::{error::ReadlineError, DefaultEditor};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{parse_command, ConsoleCommand, HELP};
use crate::{ErrorExt, Hub, HubError, Mailbox, RecvError, Subscriber};

const PROMPT: &str = "chanhub> ";
const PRINTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Строка от потока readline и канал ответа: продолжать ли чтение.
type LineRequest = (String, oneshot::Sender<bool>);

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("unknown subscriber '{0}'")]
    UnknownSubscriber(String),
    #[error(transparent)]
    Hub(#[from] HubError),
    #[error("console I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Результат выполнения команды.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Quit,
}

/// Сессия консоли: хаб и именованные подписчики.
///
/// Каждому подписчику соответствует задача, печатающая полученные сообщения.
pub struct Console {
    hub: Hub<String>,
    subscribers: FxHashMap<String, Subscriber<String>>,
    printers: Vec<JoinHandle<()>>,
    color: bool,
}

impl Console {
    pub fn new(
        hub: Hub<String>,
        color: bool,
    ) -> Self {
        Self {
            hub,
            subscribers: FxHashMap::default(),
            printers: Vec::new(),
            color,
        }
    }

    pub fn hub(&self) -> &Hub<String> {
        &self.hub
    }

    /// Выполняет одну команду.
    pub async fn execute(
        &mut self,
        cmd: ConsoleCommand,
    ) -> Result<Outcome, ConsoleError> {
        let reply = match cmd {
            ConsoleCommand::Subscribe { name, channel } => {
                let subscriber = self.subscriber_or_create(&name);
                let ack = self.hub.subscribe(&subscriber, channel.as_deref()).await?;
                format!("{ack:?} {name} to {}", shown(channel.as_deref()))
            }
            ConsoleCommand::Unsubscribe { name, channel } => {
                let subscriber = self
                    .subscribers
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| ConsoleError::UnknownSubscriber(name.clone()))?;
                let ack = self
                    .hub
                    .unsubscribe(&subscriber, channel.as_deref())
                    .await?;
                format!("{ack:?} {name} from {}", shown(channel.as_deref()))
            }
            ConsoleCommand::Publish { channel, text } => {
                self.hub.publish(text, channel.as_deref())?;
                "OK".to_string()
            }
            ConsoleCommand::Stop { channel } => {
                self.hub.stop_channel(channel.as_deref().unwrap_or_default())?;
                format!("Stopping {}", shown(channel.as_deref()))
            }
            ConsoleCommand::Stats => {
                let s = self.hub.stats();
                format!(
                    "published={} delivered={} dropped={} unroutable={} \
                     nodes={} (created={} terminated={}) subscribes={} unsubscribes={}",
                    s.published,
                    s.delivered,
                    s.dropped,
                    s.unroutable,
                    self.hub.live_nodes(),
                    s.nodes_created,
                    s.nodes_terminated,
                    s.subscribes,
                    s.unsubscribes,
                )
            }
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Reply(reply))
    }

    /// Разбирает и выполняет строку, печатая результат.
    /// Возвращает `false`, если сессию нужно завершить.
    pub async fn handle_line(
        &mut self,
        line: &str,
    ) -> bool {
        let cmd = match parse_command(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return true,
            Err(err) => {
                self.print_error(&err.to_string());
                return true;
            }
        };

        match self.execute(cmd).await {
            Ok(Outcome::Reply(reply)) => {
                println!("{reply}");
                true
            }
            Ok(Outcome::Quit) => false,
            Err(ConsoleError::Hub(err)) => {
                tracing::debug!(error = %err.log_message(), "Console command failed");
                self.print_error(&format!("{} [{}]", err.client_message(), err.status_code()));
                // После остановки корня продолжать нет смысла.
                !matches!(err, HubError::Closed)
            }
            Err(err) => {
                self.print_error(&err.to_string());
                true
            }
        }
    }

    /// Читает строки до `quit`/EOF, затем останавливает хаб.
    pub async fn run(
        mut self,
        history: Option<PathBuf>,
    ) -> Result<(), ConsoleError> {
        let (tx, mut rx) = mpsc::channel::<LineRequest>(1);
        let reader = spawn_reader(history, tx)?;

        while let Some((line, done)) = rx.recv().await {
            let keep_going = self.handle_line(&line).await;
            let _ = done.send(keep_going);
            if !keep_going {
                break;
            }
        }
        drop(rx);

        if tokio::task::spawn_blocking(move || reader.join())
            .await
            .map_or(true, |joined| joined.is_err())
        {
            tracing::warn!("Readline thread ended abnormally");
        }

        self.shutdown().await
    }

    /// Останавливает хаб и ждёт, пока задачи печати дочитают ящики.
    pub async fn shutdown(self) -> Result<(), ConsoleError> {
        let Console {
            hub,
            subscribers,
            printers,
            ..
        } = self;

        drop(subscribers);
        hub.shutdown().await?;

        for printer in printers {
            if tokio::time::timeout(PRINTER_DRAIN_TIMEOUT, printer)
                .await
                .is_err()
            {
                tracing::debug!("Printer task still running after shutdown");
            }
        }
        Ok(())
    }

    fn subscriber_or_create(
        &mut self,
        name: &str,
    ) -> Subscriber<String> {
        if let Some(existing) = self.subscribers.get(name) {
            return existing.clone();
        }

        let (subscriber, mailbox) = self.hub.mailbox();
        tracing::debug!(name, routee = %subscriber.id(), "Console subscriber created");
        self.printers
            .push(tokio::spawn(print_incoming(name.to_string(), mailbox, self.color)));
        self.subscribers
            .insert(name.to_string(), subscriber.clone());
        subscriber
    }

    fn print_error(
        &self,
        message: &str,
    ) {
        if self.color {
            eprintln!("{} {message}", "error:".red().bold());
        } else {
            eprintln!("error: {message}");
        }
    }
}

fn shown(channel: Option<&str>) -> &str {
    match channel {
        None | Some("") => "/",
        Some(c) => c,
    }
}

async fn print_incoming(
    name: String,
    mut mailbox: Mailbox<String>,
    color: bool,
) {
    loop {
        match mailbox.recv().await {
            Ok(payload) => {
                if color {
                    println!("{} {payload}", format!("[{name}]").green());
                } else {
                    println!("[{name}] {payload}");
                }
            }
            Err(RecvError::Closed) | Err(RecvError::Timeout) => break,
        }
    }
}

/// Поток с rustyline: редактор блокирующий и живёт вне рантайма.
fn spawn_reader(
    history: Option<PathBuf>,
    tx: mpsc::Sender<LineRequest>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("chanhub-readline".into())
        .spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(err) => {
                    tracing::error!(error = %err, "Cannot initialize line editor");
                    return;
                }
            };
            if let Some(path) = &history {
                if editor.load_history(path).is_err() {
                    tracing::debug!(path = %path.display(), "No history loaded");
                }
            }

            loop {
                match editor.readline(PROMPT) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = editor.add_history_entry(line.as_str());
                        }
                        let (done_tx, done_rx) = oneshot::channel();
                        if tx.blocking_send((line, done_tx)).is_err() {
                            break;
                        }
                        if !done_rx.blocking_recv().unwrap_or(false) {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) => {
                        println!("^C (type 'quit' to exit)");
                    }
                    Err(ReadlineError::Eof) => break,
                    Err(err) => {
                        tracing::error!(error = %err, "Readline failed");
                        break;
                    }
                }
            }

            if let Some(path) = &history {
                if let Err(err) = editor.save_history(path) {
                    tracing::warn!(path = %path.display(), error = %err, "Cannot save history");
                }
            }
        })
}
