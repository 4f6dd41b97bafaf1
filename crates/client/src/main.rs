// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use tracing::error;

use authclient::config::ClientConfig;
use authclient::credential::CredentialPair;
use authclient::request::RequestDescriptor;
use authclient::session::SessionEvent;

/// Authenticated API client.
#[derive(Debug, Parser)]
#[command(name = "authclient", version, about)]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a credential pair in the session file.
    Login {
        #[arg(long, env = "AUTHCLIENT_ACCESS_TOKEN")]
        access: String,
        #[arg(long, env = "AUTHCLIENT_REFRESH_TOKEN")]
        refresh: String,
    },
    /// Clear the session file.
    Logout,
    /// Send one request and print the resulting envelope.
    Request {
        /// HTTP method (GET, POST, ...).
        method: String,
        /// Endpoint path, e.g. `/links`.
        path: String,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
        /// Query parameter as `key=value` (repeatable).
        #[arg(long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got {s}"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli.config);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(config: &ClientConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    if matches!(cli.command, Command::Login { .. } | Command::Logout)
        && cli.config.credential_file.is_none()
    {
        anyhow::bail!("login/logout need --credential-file");
    }

    let authclient::Authenticated { client, session } = authclient::connect(&cli.config)?;

    match cli.command {
        Command::Login { access, refresh } => {
            session.login(CredentialPair::new(access, refresh))?;
            Ok(0)
        }
        Command::Logout => {
            session.logout()?;
            Ok(0)
        }
        Command::Request { method, path, body, query } => {
            let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = RequestDescriptor::new(method, path);
            if let Some(body) = body {
                request = request.with_body(serde_json::from_str(&body)?);
            }
            for (key, value) in query {
                request = request.with_query(key, value);
            }

            let mut events = session.subscribe();
            let envelope = client.send::<serde_json::Value>(request).await;
            println!("{}", serde_json::to_string_pretty(&envelope)?);

            if let Ok(SessionEvent::Lost) = events.try_recv() {
                eprintln!("session expired: sign in again with `authclient login`");
            }
            Ok(if envelope.is_success() { 0 } else { 1 })
        }
    }
}
