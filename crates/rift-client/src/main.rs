//! rift-ctl - command line access to a mock server's control plane
//!
//! # Usage
//!
//! ```bash
//! # Is the server up?
//! rift-ctl --port 1080 status
//!
//! # Register expectations from a file, then verify one was hit twice
//! rift-ctl upsert expectations.json
//! rift-ctl verify --request health.json --at-least 2
//!
//! # Dump recorded requests
//! rift-ctl retrieve --kind requests
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rift_client::model::{
    ClearType, Expectation, Format, RequestDefinition, RetrieveType, VerificationTimes,
};
use rift_client::{ClientConfig, MockServerClient};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rift-ctl")]
#[command(author, version, about = "Control-plane client for MockServer-compatible mock services")]
struct Args {
    /// Control-plane host
    #[arg(long, default_value = "localhost", env = "RIFT_CONTROL_PLANE_HOST")]
    host: String,

    /// Control-plane port
    #[arg(short, long, default_value = "1080", env = "RIFT_CONTROL_PLANE_PORT")]
    port: u16,

    /// Context path the server is mounted under
    #[arg(long, default_value = "")]
    context_path: String,

    /// Use TLS for control-plane requests
    #[arg(long)]
    secure: bool,

    /// Bearer token for control-plane authorisation
    #[arg(long, env = "RIFT_CONTROL_PLANE_JWT", hide_env_values = true)]
    jwt: Option<String>,

    /// Client configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is running
    Status,
    /// Wait until the server has started
    WaitStarted,
    /// Clear all expectations and recorded requests
    Reset,
    /// Clear expectations and/or recorded requests
    Clear {
        #[arg(long = "type", value_enum)]
        clear_type: Option<ClearArg>,
        /// Request matcher (JSON)
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Stop the server
    Stop,
    /// Listen on additional ports
    Bind {
        #[arg(required = true)]
        ports: Vec<u16>,
    },
    /// Create or update expectations from a JSON file
    Upsert { file: PathBuf },
    /// Verify that matching requests were received
    Verify {
        /// Request matcher (JSON)
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        at_least: Option<u32>,
        #[arg(long)]
        at_most: Option<u32>,
    },
    /// Retrieve recorded state
    Retrieve {
        /// requests, request-responses, recorded-expectations, active-expectations or logs
        #[arg(long)]
        kind: RetrieveType,
        /// json, java or log-entries
        #[arg(long)]
        format: Option<Format>,
        /// Request matcher (JSON)
        #[arg(long)]
        request: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ClearArg {
    All,
    Log,
    Expectations,
}

impl From<ClearArg> for ClearType {
    fn from(arg: ClearArg) -> Self {
        match arg {
            ClearArg::All => ClearType::All,
            ClearArg::Log => ClearType::Log,
            ClearArg::Expectations => ClearType::Expectations,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_matcher(path: Option<&Path>) -> Result<Option<RequestDefinition>> {
    path.map(read_json::<RequestDefinition>).transpose()
}

fn read_expectations(path: &Path) -> Result<Vec<Expectation>> {
    let value: serde_json::Value = read_json(path)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

fn build_client(args: &Args) -> Result<MockServerClient> {
    let config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    let mut builder = MockServerClient::builder()
        .host(&args.host)
        .port(args.port)
        .context_path(&args.context_path)
        .config(config);
    if args.secure {
        builder = builder.secure(true);
    }
    if let Some(jwt) = &args.jwt {
        builder = builder.control_plane_jwt(jwt);
    }
    Ok(builder.build()?)
}

async fn run(args: Args) -> Result<()> {
    let client = build_client(&args)?;

    match args.command {
        Command::Status => {
            if !client.is_running().await? {
                bail!("server at {}:{} is not running", args.host, args.port);
            }
            println!("running");
        }
        Command::WaitStarted => {
            if !client.has_started().await? {
                bail!("server at {}:{} did not start", args.host, args.port);
            }
            println!("started");
        }
        Command::Reset => {
            client.reset().await?;
            info!("Reset {}:{}", args.host, args.port);
        }
        Command::Clear {
            clear_type,
            request,
        } => {
            let matcher = read_matcher(request.as_deref())?;
            client.clear(matcher, clear_type.map(Into::into)).await?;
        }
        Command::Stop => {
            client.stop().await;
            if !client.is_stopped() {
                bail!(
                    "stop of {}:{} did not finish tearing down in time",
                    args.host,
                    args.port
                );
            }
        }
        Command::Bind { ports } => {
            let bound = client.bind(&ports).await?;
            println!("{}", serde_json::to_string(&bound)?);
        }
        Command::Upsert { file } => {
            let expectations = read_expectations(&file)?;
            let stored = client.upsert(&expectations).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::Verify {
            request,
            at_least,
            at_most,
        } => {
            let times = match (at_least, at_most) {
                (Some(min), Some(max)) => VerificationTimes::between(min, max),
                (Some(min), None) => VerificationTimes::at_least(min),
                (None, Some(max)) => VerificationTimes::at_most(max),
                (None, None) => VerificationTimes::at_least(1),
            };
            let matcher: RequestDefinition = read_json(&request)?;
            client.verify_request(matcher, times).await?;
            println!("verified");
        }
        Command::Retrieve {
            kind,
            format,
            request,
        } => {
            let matcher = read_matcher(request.as_deref())?;
            let format = match kind {
                RetrieveType::Logs => None,
                _ => Some(format.unwrap_or_default()),
            };
            println!("{}", client.retrieve(matcher, kind, format).await?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Args::parse()).await
}
