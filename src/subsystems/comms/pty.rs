//! PTY (console) channel: reads commands from stdin, runs them against one
//! docstore namespace and the researcher, prints the result to stdout.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), stdin is closed or
//! the user types `quit`. Every document is saved on the way out.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
#[cfg(feature = "plugin-chat")]
use crate::subsystems::chat::{ChatMessage, Researcher};
use crate::subsystems::memory::{AddOutcome, DocBackend, DocStore, DocStoreRegistry};

use super::command::{Command, HELP, parse_command};

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue(String),
    Quit,
}

/// Console session over one namespace of a registry.
pub struct Console<'a, B: DocBackend> {
    registry: &'a mut DocStoreRegistry<B>,
    namespace: String,
    #[cfg(feature = "plugin-chat")]
    researcher: Option<Researcher>,
}

impl<'a, B: DocBackend> Console<'a, B> {
    pub fn new(
        registry: &'a mut DocStoreRegistry<B>,
        namespace: impl Into<String>,
    ) -> Result<Self, AppError> {
        let namespace = namespace.into();
        if registry.get(&namespace).is_none() {
            return Err(AppError::Memory(format!("namespace {namespace} is not registered")));
        }
        Ok(Self {
            registry,
            namespace,
            #[cfg(feature = "plugin-chat")]
            researcher: None,
        })
    }

    #[cfg(feature = "plugin-chat")]
    pub fn with_researcher(mut self, researcher: Researcher) -> Self {
        self.researcher = Some(researcher);
        self
    }

    /// Greeting printed before the first prompt.
    pub fn banner(&self) -> String {
        let mut out = format!(
            "─────────────────────────────────\n Memory Machine  [{}]  (help, quit)\n─────────────────────────────────",
            self.namespace
        );
        #[cfg(feature = "plugin-chat")]
        if let Some(first) = self.researcher.as_ref().and_then(|r| r.initial_message()) {
            out.push('\n');
            out.push_str(&render_reply(first));
        }
        out
    }

    fn store(&mut self) -> Result<&mut DocStore<B>, AppError> {
        self.registry
            .get_mut(&self.namespace)
            .ok_or_else(|| AppError::Memory(format!("namespace {} vanished", self.namespace)))
    }

    fn state_line(&mut self) -> String {
        match self.store() {
            Ok(store) => store.debug_state().to_string(),
            Err(e) => format!("error: {e}"),
        }
    }

    /// Run one command. Failures are reported in the output, never raised.
    pub async fn execute(&mut self, command: Command) -> Step {
        let output = match command {
            Command::Quit => return Step::Quit,
            Command::Help => HELP.to_string(),
            Command::Invalid(usage) => usage.to_string(),
            Command::Chat(text) => self.chat(&text).await,
            Command::Suggestion(n) => self.suggestion(n).await,
            other => match self.execute_store(other) {
                Ok(text) => text,
                Err(e) => format!("error: {e}"),
            },
        };
        Step::Continue(output)
    }

    fn execute_store(&mut self, command: Command) -> Result<String, AppError> {
        let store = self.store()?;
        let text = match command {
            Command::List => {
                let docs = store.list_documents();
                if docs.is_empty() {
                    "(no documents)".to_string()
                } else {
                    docs.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("\n")
                }
            }
            Command::View(id) => match store.get_document(id) {
                Some(doc) => format!(
                    "{doc}\ncreated: {}\nupdated: {}\n\n{}",
                    doc.created_at.to_rfc3339(),
                    doc.updated_at.to_rfc3339(),
                    doc.content
                ),
                None => format!("no document with id {id}"),
            },
            Command::Add { name, content } => {
                let line = match store.add_document(&name, &content, None, None)? {
                    AddOutcome::Inserted(doc) => format!("added {doc}"),
                    AddOutcome::AlreadyExisted(doc) => format!("already exists: {doc}"),
                };
                format!("{line}\n{}", self.state_line())
            }
            Command::Delete(id) => {
                let line = if store.delete_document(id) {
                    format!("deleted {id}")
                } else {
                    format!("no document with id {id}")
                };
                format!("{line}\n{}", self.state_line())
            }
            Command::Refresh => {
                let loaded = store.refresh()?;
                format!("loaded {loaded} new document(s)\n{}", self.state_line())
            }
            Command::Save => {
                store.save_all_to_remote()?;
                format!("saved {} document(s)", store.len())
            }
            Command::Quit
            | Command::Help
            | Command::Invalid(_)
            | Command::Chat(_)
            | Command::Suggestion(_) => String::new(),
        };
        Ok(text)
    }

    #[cfg(feature = "plugin-chat")]
    async fn chat(&mut self, text: &str) -> String {
        let Some(researcher) = self.researcher.as_mut() else {
            return "chat is not configured".to_string();
        };
        match researcher.process_message(text).await {
            Ok(reply) => render_reply(reply),
            Err(e) => format!("error: {e}"),
        }
    }

    #[cfg(feature = "plugin-chat")]
    async fn suggestion(&mut self, n: usize) -> String {
        let picked = self
            .researcher
            .as_ref()
            .and_then(|r| n.checked_sub(1).and_then(|i| r.suggestions().get(i)).cloned());
        match picked {
            Some(text) => {
                let reply = self.chat(&text).await;
                format!("> {text}\n{reply}")
            }
            None => format!("no suggestion {n}"),
        }
    }

    #[cfg(not(feature = "plugin-chat"))]
    async fn chat(&mut self, _text: &str) -> String {
        "chat is disabled in this build".to_string()
    }

    #[cfg(not(feature = "plugin-chat"))]
    async fn suggestion(&mut self, n: usize) -> String {
        format!("no suggestion {n}")
    }

    /// Persist every registered namespace.
    pub fn save_all(&self) -> Result<(), AppError> {
        self.registry.save_all()
    }
}

#[cfg(feature = "plugin-chat")]
fn render_reply(message: &ChatMessage) -> String {
    let mut out = message.to_string();
    for (i, s) in message.suggestions.iter().enumerate() {
        out.push_str(&format!("\n  [{}] {s}", i + 1));
    }
    out
}

// ── run ──────────────────────────────────────────────────────────────────────

/// Drive `console` from stdin until quit, EOF or cancellation, then save.
pub async fn run<B: DocBackend>(
    mut console: Console<'_, B>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(namespace = %console.namespace, "console started");
    println!("{}", console.banner());

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!("\nshutdown signal received");
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console stdin closed");
                        break;
                    }
                    Ok(Some(input)) => input,
                };
                let Some(command) = parse_command(&input) else { continue };
                debug!(?command, "console command");

                match console.execute(command).await {
                    Step::Continue(output) => println!("{output}"),
                    Step::Quit => break,
                }
            }
        }
    }

    console.save_all()?;
    info!("documents saved");
    Ok(())
}
