//! # subastas
//!
//! Command-line registration client for the live auction floor. Wires
//! settings, telemetry, storage and both transports into a
//! [`RegistrationCoordinator`] and runs a single submission.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use subastas_core::{FormField, FormInput, Role};
use subastas_session::{
    ChannelRouter, IdentityIssuer, LiveRegistrationTransport, RegistrationCoordinator,
    ResponseCorrelator, SubmitOutcome,
};
use subastas_settings::SubastasSettings;
use subastas_store::{KeyValueStore, SqliteKeyValueStore};
use subastas_telemetry::{TelemetryConfig, init_telemetry};
use subastas_transport::{ConnectionGateway, HttpAdminTransport, SocketGateway};

/// Auction client.
#[derive(Parser, Debug)]
#[command(name = "subastas", about = "Register into the live auction floor")]
struct Cli {
    /// Settings file (defaults to `~/.subastas/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register and print the auction floor route.
    Register {
        #[command(subcommand)]
        role: RegisterAs,
    },
    /// Print the most recently issued session identity.
    Whoami,
}

#[derive(Subcommand, Debug)]
enum RegisterAs {
    /// Join as a bidder over the persistent connection.
    Bidder {
        #[arg(long)]
        name: String,
        #[arg(long)]
        surname: String,
    },
    /// Authenticate as an auction manager.
    Manager {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

impl RegisterAs {
    fn into_form(self) -> (Role, FormInput) {
        match self {
            Self::Bidder { name, surname } => (
                Role::Bidder,
                FormInput::new()
                    .with(FormField::Name, name)
                    .with(FormField::Surname, surname),
            ),
            Self::Manager { username, password } => (
                Role::Manager,
                FormInput::new()
                    .with(FormField::Username, username)
                    .with(FormField::Password, password),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("subastas: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = match &cli.settings {
        Some(path) => subastas_settings::load_settings_from_path(path),
        None => subastas_settings::load_settings(),
    }
    .context("failed to load settings")?;

    let _telemetry = init_telemetry(&TelemetryConfig::from_settings(&settings.logging))
        .context("failed to initialise logging")?;

    let db_path = settings.storage.resolved_path();
    let store: Arc<dyn KeyValueStore> = Arc::new(
        SqliteKeyValueStore::open(&db_path)
            .with_context(|| format!("failed to open store at {}", db_path.display()))?,
    );
    tracing::debug!(path = %db_path.display(), "store opened");

    match cli.command {
        Command::Whoami => whoami(store),
        Command::Register { role } => register(&settings, store, role).await,
    }
}

fn whoami(store: Arc<dyn KeyValueStore>) -> Result<ExitCode> {
    match IdentityIssuer::new(store).last_issued()? {
        Some(identity) => println!("{identity}"),
        None => println!("no identity issued yet"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn register(
    settings: &SubastasSettings,
    store: Arc<dyn KeyValueStore>,
    role: RegisterAs,
) -> Result<ExitCode> {
    let (role, form) = role.into_form();

    // Only bidders need the persistent connection; an unreachable server
    // surfaces as ConnectionUnavailable from the coordinator.
    let gateway: Arc<dyn ConnectionGateway> = if role == Role::Bidder {
        match SocketGateway::connect(&settings.server.socket_url, settings.server.connect_timeout())
            .await
        {
            Ok(gateway) => Arc::new(gateway),
            Err(e) => {
                tracing::warn!(url = %settings.server.socket_url, error = %e, "socket connection failed");
                Arc::new(SocketGateway::offline())
            }
        }
    } else {
        Arc::new(SocketGateway::offline())
    };

    let admin = HttpAdminTransport::new(
        &settings.server.http_base_url,
        settings.registration.admin_request_timeout(),
    )?;
    let correlator = ResponseCorrelator::new(gateway.clone(), settings.registration.reply_timeout());
    let transport = Arc::new(LiveRegistrationTransport::new(
        gateway,
        correlator,
        Arc::new(admin),
    ));
    let (router, mut routes) = ChannelRouter::channel();
    let coordinator = Arc::new(RegistrationCoordinator::new(
        IdentityIssuer::new(store),
        transport,
        Arc::new(router),
    ));

    let _ = coordinator.select_role(role);
    let submission = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(&form).await })
    };
    let submission = tokio::select! {
        joined = submission => joined?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, abandoning registration");
            coordinator.teardown();
            return Ok(ExitCode::FAILURE);
        }
    };

    match submission {
        Ok(SubmitOutcome::Succeeded(_)) => {
            let view = coordinator.snapshot();
            if let Some(message) = view.message {
                eprintln!("{message}");
            }
            if let Ok(route) = routes.try_recv() {
                println!("{route}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(SubmitOutcome::Ignored | SubmitOutcome::Cancelled) => {
            eprintln!("registration abandoned");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            tracing::debug!(kind = e.error_kind(), local = e.is_local(), "registration error");
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
