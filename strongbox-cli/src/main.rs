mod app;

use anyhow::{bail, Context, Result};
use app::App;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use strongbox_core::models::{BinarySecret, CardSecret, CredentialSecret, TextSecret};
use strongbox_core::sync::spawn_periodic_sync;
use strongbox_core::{CallContext, ClientConfig, RecordSummary, Secret};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// strongbox - zero-knowledge secret manager
#[derive(Parser)]
#[command(name = "strongbox")]
#[command(about = "Zero-knowledge secret manager with server sync", long_about = None)]
struct Cli {
    /// Path to the client configuration file
    #[arg(short, long, env = "STRONGBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Server URL override
    #[arg(short, long, env = "STRONGBOX_SERVER")]
    server: Option<String>,

    /// Account login
    #[arg(short, long, env = "STRONGBOX_LOGIN", default_value = "")]
    login: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account on the server
    Register,

    /// Check the password, online or against the local cache
    Login,

    /// Add a new secret
    Add {
        #[command(subcommand)]
        secret: SecretArgs,
    },

    /// Replace the content of an existing secret
    Update {
        #[command(subcommand)]
        secret: SecretArgs,
    },

    /// Show a secret
    Get {
        name: String,

        /// Read from the server instead of the local cache
        #[arg(long)]
        remote: bool,

        /// Write binary content to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List secret names and kinds
    List {
        /// List what the server has
        #[arg(long)]
        remote: bool,
    },

    /// Delete a secret
    Delete {
        name: String,

        /// Delete on the server directly
        #[arg(long)]
        remote: bool,
    },

    /// Run one sync cycle
    Sync,

    /// Keep syncing in the background until interrupted
    Watch,
}

#[derive(Subcommand)]
enum SecretArgs {
    /// Login and password pair
    Credential {
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[command(flatten)]
        meta: Meta,
    },

    /// Bank card
    Card {
        name: String,
        #[arg(long)]
        number: String,
        /// Expiry, e.g. 12/29
        #[arg(long)]
        expires: String,
        #[arg(long)]
        holder_name: String,
        #[arg(long)]
        holder_surname: String,
        #[arg(long)]
        cvv: String,
        #[command(flatten)]
        meta: Meta,
    },

    /// Free-form text
    Text {
        name: String,
        text: String,
        #[command(flatten)]
        meta: Meta,
    },

    /// Contents of a file
    Binary {
        name: String,
        file: PathBuf,
        #[command(flatten)]
        meta: Meta,
    },
}

#[derive(Args)]
struct Meta {
    /// Free-form note stored with the secret
    #[arg(long, default_value = "")]
    meta: String,
}

impl SecretArgs {
    fn into_secret(self) -> Result<(String, Secret)> {
        Ok(match self {
            Self::Credential {
                name,
                username,
                password,
                meta,
            } => (
                name,
                Secret::Credential(CredentialSecret {
                    login: username,
                    password,
                    meta: meta.meta,
                }),
            ),
            Self::Card {
                name,
                number,
                expires,
                holder_name,
                holder_surname,
                cvv,
                meta,
            } => (
                name,
                Secret::Card(CardSecret {
                    number,
                    expires,
                    name: holder_name,
                    surname: holder_surname,
                    cvv,
                    meta: meta.meta,
                }),
            ),
            Self::Text { name, text, meta } => (
                name,
                Secret::Text(TextSecret {
                    text,
                    meta: meta.meta,
                }),
            ),
            Self::Binary { name, file, meta } => {
                let blob = std::fs::read(&file)
                    .with_context(|| format!("cannot read {}", file.display()))?;
                (
                    name,
                    Secret::Binary(BinarySecret {
                        blob,
                        meta: meta.meta,
                    }),
                )
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let app = App::open(config, &cli.login)?;
    let cx = CallContext::new();

    if let Commands::Register = cli.command {
        app.register(&cx).await?;
        println!("Registered {}", app.login);
        return Ok(());
    }

    let mode = app.log_in(&cx).await?;

    match cli.command {
        Commands::Register => {}
        Commands::Login => println!("Logged in {} ({:?})", app.login, mode),
        Commands::Add { secret } => {
            let (name, secret) = secret.into_secret()?;
            app.vault.add(&name, &secret)?;
            app.sync_quietly(&cx).await;
            println!("Added {}", name);
        }
        Commands::Update { secret } => {
            let (name, secret) = secret.into_secret()?;
            app.vault.update(&name, &secret)?;
            app.sync_quietly(&cx).await;
            println!("Updated {}", name);
        }
        Commands::Get { name, remote, out } => {
            let secret = if remote {
                app.vault.fetch_remote(&app.remote, &name, &cx).await?
            } else {
                app.vault.get(&name)?
            };
            print_secret(&secret, out)?;
        }
        Commands::List { remote } => {
            let summaries = if remote {
                app.remote.list_record_summaries(&cx).await?
            } else {
                app.vault.list()?
            };
            print_summaries(&summaries);
        }
        Commands::Delete { name, remote } => {
            if remote {
                app.remote.delete_record(&name, &cx).await?;
                app.sync_quietly(&cx).await;
            } else {
                app.vault.delete(&name)?;
                app.sync_quietly(&cx).await;
            }
            println!("Deleted {}", name);
        }
        Commands::Sync => {
            let report = app.engine.sync(&cx).await?;
            println!(
                "{} created, {} pushed down, {} pulled up",
                report.created, report.pushed_down, report.pulled_up
            );
        }
        Commands::Watch => {
            let shutdown = CancellationToken::new();
            let handle = spawn_periodic_sync(
                app.engine.clone(),
                app.session.clone(),
                app.config.sync_interval(),
                shutdown.clone(),
            );
            info!(
                "Syncing every {:?}, press Ctrl-C to stop",
                app.config.sync_interval()
            );
            tokio::signal::ctrl_c().await?;
            shutdown.cancel();
            handle.await?;
        }
    }

    Ok(())
}

fn print_secret(secret: &Secret, out: Option<PathBuf>) -> Result<()> {
    if out.is_some() && !matches!(secret, Secret::Binary(_)) {
        bail!("--out only applies to binary secrets");
    }
    match secret {
        Secret::Credential(c) => {
            println!("login:    {}", c.login);
            println!("password: {}", c.password);
            print_meta(&c.meta);
        }
        Secret::Card(c) => {
            println!("number:  {}", c.number);
            println!("expires: {}", c.expires);
            println!("holder:  {} {}", c.name, c.surname);
            println!("cvv:     {}", c.cvv);
            print_meta(&c.meta);
        }
        Secret::Text(t) => {
            println!("{}", t.text);
            print_meta(&t.meta);
        }
        Secret::Binary(b) => {
            match out {
                Some(path) => {
                    std::fs::write(&path, &b.blob)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    println!("Wrote {} bytes to {}", b.blob.len(), path.display());
                }
                None => println!("{}", STANDARD.encode(&b.blob)),
            }
            print_meta(&b.meta);
        }
    }
    Ok(())
}

fn print_meta(meta: &str) {
    if !meta.is_empty() {
        println!("meta:     {}", meta);
    }
}

fn print_summaries(summaries: &[RecordSummary]) {
    if summaries.is_empty() {
        println!("No secrets");
        return;
    }
    for summary in summaries {
        println!("{:<12} {}", summary.kind.as_str(), summary.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_card_maps_holder_fields() {
        let cli = Cli::try_parse_from([
            "strongbox",
            "--login",
            "alice",
            "add",
            "card",
            "visa",
            "--number",
            "4111111111111111",
            "--expires",
            "12/29",
            "--holder-name",
            "Alice",
            "--holder-surname",
            "Smith",
            "--cvv",
            "123",
        ])
        .unwrap();
        let Commands::Add { secret } = cli.command else {
            panic!("expected add");
        };
        let (name, secret) = secret.into_secret().unwrap();
        assert_eq!(name, "visa");
        match secret {
            Secret::Card(card) => {
                assert_eq!(card.name, "Alice");
                assert_eq!(card.surname, "Smith");
                assert_eq!(card.meta, "");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn binary_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.bin");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();

        let cli = Cli::try_parse_from([
            "strongbox",
            "add",
            "binary",
            "ssh",
            path.to_str().unwrap(),
            "--meta",
            "laptop key",
        ])
        .unwrap();
        let Commands::Add { secret } = cli.command else {
            panic!("expected add");
        };
        let (_, secret) = secret.into_secret().unwrap();
        assert_eq!(
            secret,
            Secret::Binary(BinarySecret {
                blob: vec![0, 1, 2],
                meta: "laptop key".to_string(),
            })
        );
    }

    #[test]
    fn out_is_rejected_for_text() {
        let secret = Secret::Text(TextSecret {
            text: "hi".into(),
            meta: String::new(),
        });
        assert!(print_secret(&secret, Some(PathBuf::from("x"))).is_err());
    }
}
