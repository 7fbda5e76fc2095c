//! Persona chat terminal driver
//!
//! Starts the local inference server, then lets the user interview the
//! scenario's stakeholders and have the senior engineer review drafted
//! requirements.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use persona_chat::chat::relay::{RelayEvent, RelayEventKind};
use persona_chat::chat::{ChatError, ChatService};
use persona_chat::inference::{InferenceSupervisor, SupervisorError};
use persona_chat::persona::requirements::{RequirementKind, RequirementsNotebook};
use persona_chat::persona::{
    build_persona_system_prompt, persona_key, senior_software_engineer, Scenario, ScenarioError,
    Stakeholder,
};
use persona_chat::storage::settings::load_settings;

const HELP: &str = "\
Commands:
  /personas                     list personas (0 is the senior engineer)
  /persona <n>                  talk to persona n
  /reset                        restart the conversation with the current persona
  /req <functional|nf> <text>   draft a requirement
  /unreq <n>                    drop draft requirement n
  /reqs                         list drafted requirements
  /review                       ask the senior engineer to review your drafts
  /export <path>                write drafted requirements to a text file
  /quit                         exit
Anything else is sent to the current persona.";

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read scenario file {path:?}: {source}")]
    ScenarioFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid scenario file: {0}")]
    ScenarioJson(#[from] serde_json::Error),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let scenario = match std::env::args().nth(1) {
        Some(path) => load_scenario(Path::new(&path))?,
        None => sample_scenario(),
    };
    scenario.validate()?;

    let settings = load_settings();
    let supervisor = InferenceSupervisor::start(&settings).await?;
    if let Some(notice) = supervisor.low_memory_notice() {
        println!("{}", notice);
    }
    info!(
        "Using model {:?} ({:.0} MB available)",
        supervisor.selection().path,
        supervisor.selection().memory.available_mb
    );

    let service = Arc::new(ChatService::new(&settings));
    let printer = tokio::spawn(print_replies(service.relay().subscribe()));

    let result = Session::new(scenario, Arc::clone(&service)).repl().await;

    printer.abort();
    supervisor.stop().await;
    result
}

fn load_scenario(path: &Path) -> Result<Scenario, CliError> {
    let json = std::fs::read_to_string(path).map_err(|source| CliError::ScenarioFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

fn sample_scenario() -> Scenario {
    Scenario {
        name: "Neighbourhood Clinic".to_string(),
        description: "A walk-in clinic wants patients to book and manage appointments online \
                      instead of phoning the front desk."
            .to_string(),
        list_stakeholders: vec![
            Stakeholder::new("Dana Moss", "Receptionist", "Busy, friendly, practical"),
            Stakeholder::new("Dr. Omar Haddad", "Clinic Owner", "Cost-conscious, impatient"),
        ],
        ..Scenario::default()
    }
}

async fn print_replies(mut events: broadcast::Receiver<RelayEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let mut stdout = std::io::stdout().lock();
                match event.kind {
                    RelayEventKind::Fragment(text) => {
                        let _ = write!(stdout, "{}", text);
                    }
                    RelayEventKind::Finished => {
                        let _ = writeln!(stdout);
                    }
                }
                let _ = stdout.flush();
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Reply printer skipped {} fragments", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

struct Session {
    scenario: Scenario,
    personas: Vec<Stakeholder>,
    current: usize,
    notebook: RequirementsNotebook,
    service: Arc<ChatService>,
}

impl Session {
    fn new(scenario: Scenario, service: Arc<ChatService>) -> Self {
        let mut personas = vec![senior_software_engineer()];
        personas.extend(scenario.list_stakeholders.iter().cloned());

        let session = Self {
            scenario,
            personas,
            current: 0,
            notebook: RequirementsNotebook::new(),
            service,
        };
        session.select(0);
        session
    }

    fn current_key(&self) -> String {
        persona_key(Some(&self.scenario), self.personas.get(self.current))
    }

    fn system_prompt(&self, index: usize) -> String {
        build_persona_system_prompt(Some(&self.scenario), self.personas.get(index))
    }

    fn select(&self, index: usize) {
        let key = persona_key(Some(&self.scenario), self.personas.get(index));
        self.service.activate_persona(&key, &self.system_prompt(index));
        if let Some(persona) = self.personas.get(index) {
            println!("Now talking to {} ({})", persona.name, persona.role);
        }
    }

    async fn repl(&mut self) -> Result<(), CliError> {
        println!("Scenario: {}\n{}\n", self.scenario.name, self.scenario.description);
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if !self.handle(line) {
                break;
            }
        }
        Ok(())
    }

    /// Run one input line; `false` ends the session
    fn handle(&mut self, line: &str) -> bool {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "/quit" | "/exit" => return false,
            "/help" => println!("{}", HELP),
            "/personas" => {
                for (i, persona) in self.personas.iter().enumerate() {
                    let marker = if i == self.current { "*" } else { " " };
                    println!("{} {}: {} ({})", marker, i, persona.name, persona.role);
                }
            }
            "/persona" => match rest.parse::<usize>() {
                Ok(index) if index < self.personas.len() => {
                    self.current = index;
                    self.select(index);
                }
                _ => println!("Pick a persona between 0 and {}", self.personas.len() - 1),
            },
            "/reset" => {
                let key = self.current_key();
                match self.service.reset_conversation(&key, &self.system_prompt(self.current)) {
                    Ok(_) => println!("Conversation reset"),
                    Err(e) => println!("{}", e),
                }
            }
            "/req" => {
                let (kind, text) = rest.split_once(' ').unwrap_or((rest, ""));
                match kind.parse::<RequirementKind>() {
                    Ok(kind) if self.notebook.add(&self.scenario.name, kind, text) => {
                        println!("Added [{}] {}", kind, text.trim());
                    }
                    Ok(_) => println!("Requirement text is empty"),
                    Err(e) => println!("{}", e),
                }
            }
            "/unreq" => {
                let removed = rest
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| self.notebook.remove(&self.scenario.name, index));
                match removed {
                    Some(draft) => println!("Removed [{}] {}", draft.kind, draft.description),
                    None => println!("No such requirement"),
                }
            }
            "/reqs" => {
                let drafts = self.notebook.list(&self.scenario.name);
                if drafts.is_empty() {
                    println!("No requirements drafted yet");
                }
                for (i, draft) in drafts.iter().enumerate() {
                    println!("{}. [{}] {}", i + 1, draft.kind, draft.description);
                }
            }
            "/review" => match self.notebook.review_message(&self.scenario.name) {
                Some(message) => {
                    if self.current != 0 {
                        self.current = 0;
                        self.select(0);
                    }
                    self.send(message);
                }
                None => println!("Draft some requirements first (/req)"),
            },
            "/export" if !rest.is_empty() => {
                match self.notebook.export_to_file(&self.scenario.name, Path::new(rest)) {
                    Ok(()) => println!("Exported to {}", rest),
                    Err(e) => println!("Export failed: {}", e),
                }
            }
            "/export" => println!("Usage: /export <path>"),
            _ if command.starts_with('/') => println!("Unknown command {}, try /help", command),
            _ => self.send(line.to_string()),
        }
        true
    }

    fn send(&self, message: String) {
        let service = Arc::clone(&self.service);
        let key = self.current_key();
        tokio::spawn(async move {
            match service.send_message(&key, &message).await {
                Ok(reply) if reply.starts_with("Error: ") => println!("{}", reply),
                Ok(_) => {}
                Err(ChatError::Busy) => println!("{}", ChatError::Busy),
            }
        });
    }
}
