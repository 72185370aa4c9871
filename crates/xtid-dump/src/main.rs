//! xtid-dump: print an example x-client-transaction-id and dump the
//! generator's serialisable state to JSON.

use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use xtid::config::{
    resolve_generator_command, resolve_home_url_with, resolve_output_path_with,
    DEFAULT_SAMPLE_METHOD, DEFAULT_SAMPLE_URL, DEFAULT_TIMEOUT_SECS, HOME_URL_ENV, OUTPUT_ENV,
};
use xtid::external::DEFAULT_HELPER_TIMEOUT;
use xtid::{
    fetch_landing_page, AssetLocator, DumpConfig, DumpPipeline, ExternalGeneratorFactory,
    HttpClient, LandingStrategy,
};

#[derive(Parser)]
#[command(
    name = "xtid-dump",
    about = "Dump the JSON-serialisable state of an x.com client-transaction generator",
    version
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Landing page to fetch. Also reads XTID_HOME_URL.
    #[arg(long)]
    home_url: Option<String>,

    /// HTTP timeout in seconds, applied to every request.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Output JSON file, overwritten on every run. Also reads XTID_OUTPUT.
    #[arg(short, long)]
    output: Option<String>,

    /// HTTP method of the example request.
    #[arg(long, default_value = DEFAULT_SAMPLE_METHOD)]
    method: String,

    /// URL of the example request. Only its path is passed to the generator.
    #[arg(long, default_value = DEFAULT_SAMPLE_URL)]
    sample_url: String,

    /// Generator helper command line, e.g. "python3 tid_helper.py".
    /// Also reads XTID_GENERATOR.
    #[arg(long)]
    generator: Option<String>,

    /// Seconds the generator helper gets per request.
    #[arg(long, default_value_t = DEFAULT_HELPER_TIMEOUT.as_secs())]
    generator_timeout: u64,

    /// Fetch the landing page through the twitter.com -> x.com migration flow.
    #[arg(long)]
    migrate: bool,
}

impl RunArgs {
    fn to_config(&self) -> DumpConfig {
        self.to_config_with(|name| std::env::var(name).ok())
    }

    /// Build the config, reading `XTID_*` variables through `env`.
    fn to_config_with(&self, env: impl Fn(&str) -> Option<String>) -> DumpConfig {
        DumpConfig {
            home_url: resolve_home_url_with(self.home_url.as_deref(), env(HOME_URL_ENV)),
            timeout: Duration::from_secs(self.timeout),
            output: resolve_output_path_with(self.output.as_deref(), env(OUTPUT_ENV)),
            sample_method: self.method.to_ascii_uppercase(),
            sample_url: self.sample_url.clone(),
            landing: if self.migrate {
                LandingStrategy::Migrate
            } else {
                LandingStrategy::Direct
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, build the generator, and dump its state (default).
    Dump,

    /// Only fetch the landing page and print the on-demand asset URL.
    Locate,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   xtid-dump completions bash > ~/.local/share/bash-completion/completions/xtid-dump
    ///   xtid-dump completions zsh > ~/.zfunc/_xtid-dump
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Dump) {
        Commands::Dump => dump(&cli.run).await?,
        Commands::Locate => locate(&cli.run).await?,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "xtid-dump", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn dump(args: &RunArgs) -> anyhow::Result<()> {
    // Resolved before any network I/O so a missing helper fails fast.
    let command = resolve_generator_command(args.generator.as_deref())?;
    let factory = ExternalGeneratorFactory::from_command_line(&command)?
        .with_timeout(Duration::from_secs(args.generator_timeout));

    let pipeline = DumpPipeline::new(args.to_config(), factory)?;
    let mut stdout = std::io::stdout().lock();
    let report = pipeline.run(&mut stdout).await?;

    tracing::info!(
        "Dumped {} fields from {} to {}",
        report.record.len(),
        report.asset_url,
        report.output.display()
    );
    Ok(())
}

async fn locate(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.to_config();
    config.validate()?;

    let client = HttpClient::new(config.timeout)?;
    let document = fetch_landing_page(&client, &config.home_url, config.landing).await?;
    let asset_url = AssetLocator::default().require(&document)?;
    println!("{asset_url}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_match_library() {
        let cli = Cli::parse_from(["xtid-dump", "--home-url", "https://x.com", "-o", "out.json"]);
        assert!(cli.command.is_none());
        let cfg = cli.run.to_config();
        assert_eq!(cfg.home_url, "https://x.com");
        assert_eq!(cfg.output, std::path::PathBuf::from("out.json"));
        assert_eq!(cfg.sample_method, "GET");
        assert_eq!(cfg.sample_url, DEFAULT_SAMPLE_URL);
        assert_eq!(cfg.timeout, Duration::from_secs(20));
        assert_eq!(cfg.landing, LandingStrategy::Direct);
    }

    #[test]
    fn test_env_fills_unset_flags() {
        let env = |name: &str| match name {
            HOME_URL_ENV => Some("http://127.0.0.1:9000".to_string()),
            OUTPUT_ENV => Some("from-env.json".to_string()),
            _ => None,
        };

        let cli = Cli::parse_from(["xtid-dump"]);
        let cfg = cli.run.to_config_with(env);
        assert_eq!(cfg.home_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.output, std::path::PathBuf::from("from-env.json"));

        let cli = Cli::parse_from(["xtid-dump", "-o", "flag.json"]);
        let cfg = cli.run.to_config_with(env);
        assert_eq!(cfg.home_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.output, std::path::PathBuf::from("flag.json"));
    }

    #[test]
    fn test_unset_env_falls_back_to_defaults() {
        let cli = Cli::parse_from(["xtid-dump"]);
        let cfg = cli.run.to_config_with(|_| None);
        assert_eq!(cfg.home_url, "https://x.com");
        assert_eq!(cfg.output, std::path::PathBuf::from("x_tid_state.json"));
    }

    #[test]
    fn test_migrate_and_method_flags() {
        let cli = Cli::parse_from(["xtid-dump", "--migrate", "--method", "post", "locate"]);
        assert!(matches!(cli.command, Some(Commands::Locate)));
        let cfg = cli.run.to_config();
        assert_eq!(cfg.landing, LandingStrategy::Migrate);
        assert_eq!(cfg.sample_method, "POST");
    }
}
