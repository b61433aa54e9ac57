use anyhow::Result;
use clap::Parser;
use huefy::client::HuefyClient;
use huefy::commands::{self, GlobalOptions};
use log::debug;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// huefy - templated email from the command line
///
/// Sends emails through the Huefy API using server-side templates.
///
/// The API key is read from --api-key or the HUEFY_API_KEY environment variable.
/// Other HUEFY_* variables (HUEFY_BASE_URL, HUEFY_TIMEOUT, HUEFY_RETRY_ATTEMPTS,
/// HUEFY_DEFAULT_PROVIDER) supply defaults for the matching options.
///
/// Examples:
///   huefy health
///   huefy send welcome ada@example.com --data '{"name":"Ada"}'
///   huefy validate welcome --file data.json
#[derive(Parser, Debug)]
#[command(author, version = env!("HUEFY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API key (also via HUEFY_API_KEY)
    #[arg(long = "api-key", env = "HUEFY_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// API base URL (defaults to https://api.huefy.com/api/v1/sdk)
    #[arg(long = "base-url", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Request timeout in seconds; 0 disables it
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Maximum attempts per request; 0 or 1 disables retries
    #[arg(long, value_name = "N", global = true)]
    pub retries: Option<u32>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Check API health
    Health,

    /// List available email providers
    Providers,

    /// Send an email using a template
    Send(SendArgs),

    /// Validate a template with test data
    Validate(ValidateArgs),

    /// Send every email listed in a JSON file
    Bulk(BulkArgs),
}

#[derive(clap::Args, Debug)]
pub struct DataArgs {
    /// Template data as a JSON object
    #[arg(long, short = 'd', value_name = "JSON")]
    pub data: Option<String>,

    /// File containing template data as a JSON object (takes precedence over --data)
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Template to render
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Recipient email address
    #[arg(value_name = "RECIPIENT")]
    pub recipient: String,

    #[command(flatten)]
    pub data: DataArgs,

    /// Email provider to use (e.g. ses, sendgrid, mailgun)
    #[arg(long, short = 'p')]
    pub provider: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Template to validate
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    #[command(flatten)]
    pub data: DataArgs,
}

#[derive(clap::Args, Debug)]
pub struct BulkArgs {
    /// JSON array of {template_key, recipient, data?, provider?} objects
    #[arg(value_name = "PATH")]
    pub file: PathBuf,
}

impl From<&Cli> for GlobalOptions {
    fn from(cli: &Cli) -> Self {
        GlobalOptions {
            api_key: cli.api_key.clone(),
            base_url: cli.base_url.clone(),
            timeout: cli.timeout,
            retries: cli.retries,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = huefy::runtime::RealRuntime;

    let config = commands::load_config(&runtime, &GlobalOptions::from(&cli))?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling pending retries");
            on_interrupt.cancel();
        }
    });

    let client = HuefyClient::from_config(&config)?.with_cancellation(token);

    match cli.command {
        Commands::Health => commands::health(&client).await?,
        Commands::Providers => {
            commands::providers(&client, config.default_provider.as_deref()).await?
        }
        Commands::Send(args) => {
            commands::send(
                &runtime,
                &client,
                &args.template,
                &args.recipient,
                args.data.data.as_deref(),
                args.data.file.as_deref(),
                args.provider.as_deref(),
            )
            .await?
        }
        Commands::Validate(args) => {
            commands::validate(
                &runtime,
                &client,
                &args.template,
                args.data.data.as_deref(),
                args.data.file.as_deref(),
            )
            .await?
        }
        Commands::Bulk(args) => commands::bulk(&runtime, &client, &args.file).await?,
    }
    Ok(())
}
