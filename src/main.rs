mod client;
mod config;
mod hosts;
mod model;
mod rows;
mod scenarios;
mod triggers;

use crate::client::ApiClient;
use crate::config::{Config, Scope, resolve, save};
use crate::rows::StepEncoding;
use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "zbxctl",
    version,
    about = "Export, import and bulk-update Zabbix web scenarios and triggers"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "Zabbix frontend URL override (otherwise ZABBIX_URL or config)"
    )]
    url: Option<String>,

    #[arg(long, global = true, help = "API token override (takes precedence over user/password)")]
    token: Option<String>,

    #[arg(long, global = true, help = "User name for user.login")]
    user: Option<String>,

    #[arg(long, global = true, help = "Password for user.login")]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist --url/--token/--user/--password to the chosen scope
    Configure {
        #[arg(
            long,
            value_enum,
            default_value_t = ScopeArg::User,
            help = "Where to write the config (local project dir or user config dir)"
        )]
        scope: ScopeArg,
    },
    /// Export a host's web scenarios and derived triggers to CSV
    Export {
        #[arg(long, value_name = "HOST")]
        host: String,
        #[arg(long, value_name = "FILE", help = "Defaults to <HOST>_web_scenarios.csv")]
        scenario_file: Option<PathBuf>,
        #[arg(long, value_name = "FILE", help = "Defaults to <HOST>_triggers.csv")]
        trigger_file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = StepFormat::Legacy)]
        step_format: StepFormat,
    },
    /// Create web scenarios on a host from a scenario CSV file
    ImportScenarios {
        #[arg(long, value_name = "HOST")]
        host: String,
        #[arg(long, value_name = "FILE", help = "Defaults to <HOST>_web_scenarios.csv")]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = StepFormat::Legacy)]
        step_format: StepFormat,
    },
    /// Create triggers from a trigger CSV file
    ImportTriggers {
        #[arg(long, value_name = "HOST")]
        host: String,
        #[arg(long, value_name = "FILE", help = "Defaults to <HOST>_triggers.csv")]
        file: Option<PathBuf>,
    },
    /// Set every step timeout of every web scenario (also resets the delay to 1m)
    UpdateTimeout {
        #[arg(
            long,
            value_name = "HOST",
            required = true,
            use_value_delimiter = true,
            value_delimiter = ','
        )]
        host: Vec<String>,
        #[arg(long, default_value = "60s")]
        timeout: String,
    },
    /// Enable manual close on every trigger of the given hosts
    ManualClose {
        #[arg(
            long,
            value_name = "HOST",
            required = true,
            use_value_delimiter = true,
            value_delimiter = ','
        )]
        host: Vec<String>,
    },
    /// Check that the URL and credentials are accepted
    Validate,
    /// Show current configuration (secrets masked)
    ConfigShow,
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum StepFormat {
    /// `name (url - status_codes - required)` joined by ` | `
    Legacy,
    /// JSON array of step objects
    Json,
}

impl From<StepFormat> for StepEncoding {
    fn from(value: StepFormat) -> Self {
        match value {
            StepFormat::Legacy => StepEncoding::Legacy,
            StepFormat::Json => StepEncoding::Json,
        }
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("reading current directory")?;

    match &cli.command {
        Commands::Configure { scope } => {
            if cli.url.is_none()
                && cli.token.is_none()
                && cli.user.is_none()
                && cli.password.is_none()
            {
                return Err(anyhow!(
                    "Provide at least one of --url, --token, --user or --password"
                ));
            }
            let mut existing = config::load_scope((*scope).into(), &cwd)?;
            if let Some(url) = &cli.url {
                existing.url = Some(url.clone());
            }
            if let Some(token) = &cli.token {
                existing.token = Some(token.clone());
            }
            if let Some(user) = &cli.user {
                existing.user = Some(user.clone());
            }
            if let Some(password) = &cli.password {
                existing.password = Some(password.clone());
            }
            let path = save((*scope).into(), &existing, &cwd)?;
            println!("Saved connection settings to {}", path.display());
            return Ok(());
        }
        Commands::ConfigShow => {
            let merged = config::load(&cwd)?;
            println!("{}", serde_json::to_string_pretty(&config::masked(&merged))?);
            return Ok(());
        }
        Commands::Completion { shell } => {
            print_completion(*shell);
            return Ok(());
        }
        _ => {}
    }

    let overrides = Config {
        url: cli.url.clone(),
        token: cli.token.clone(),
        user: cli.user.clone(),
        password: cli.password.clone(),
    };
    let effective = resolve(&cwd, overrides)?;
    let client = ApiClient::connect(&effective.base_url, &effective.credential)?;

    match cli.command {
        Commands::Export {
            host,
            scenario_file,
            trigger_file,
            step_format,
        } => {
            let scenario_file = scenario_file.unwrap_or_else(|| scenario_csv(&host));
            let trigger_file = trigger_file.unwrap_or_else(|| trigger_csv(&host));
            let exported =
                client.export_to_csv(&host, &scenario_file, &trigger_file, step_format.into())?;
            if exported > 0 {
                println!(
                    "Exported {exported} web scenario(s) to {} and {}",
                    scenario_file.display(),
                    trigger_file.display()
                );
            } else {
                println!("Nothing exported for {host}");
            }
        }
        Commands::ImportScenarios {
            host,
            file,
            step_format,
        } => {
            let file = file.unwrap_or_else(|| scenario_csv(&host));
            let created = client.import_scenarios_from_csv(&host, &file, step_format.into())?;
            println!("Created {created} web scenario(s) on {host}");
        }
        Commands::ImportTriggers { host, file } => {
            let file = file.unwrap_or_else(|| trigger_csv(&host));
            let created = client.import_triggers_from_csv(&host, &file)?;
            println!("Created {created} trigger(s) for {host}");
        }
        Commands::UpdateTimeout { host, timeout } => {
            for host in &host {
                let updated = client.update_web_scenario_timeout(host, &timeout)?;
                println!("Updated {updated} web scenario(s) on {host}");
            }
        }
        Commands::ManualClose { host } => {
            for host in &host {
                let updated = client.enable_manual_close_triggers(host)?;
                println!("Enabled manual close on {updated} trigger(s) of {host}");
            }
        }
        Commands::Validate => {
            println!("Validating {} ...", client.endpoint());
            let count = client.call("host.get", &json!({ "countOutput": true }))?;
            let count = count.as_str().map(str::to_owned).unwrap_or_else(|| count.to_string());
            println!("Zabbix API: ok ({count} host(s) visible)");
        }
        Commands::Configure { .. } | Commands::ConfigShow | Commands::Completion { .. } => {
            unreachable!("handled earlier")
        }
    }

    Ok(())
}

fn scenario_csv(host: &str) -> PathBuf {
    PathBuf::from(format!("{host}_web_scenarios.csv"))
}

fn trigger_csv(host: &str) -> PathBuf {
    PathBuf::from(format!("{host}_triggers.csv"))
}

fn print_completion(shell: CompletionShell) {
    use clap_complete::{generate, shells};
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin, &mut std::io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, &mut std::io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin, &mut std::io::stdout()),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin, &mut std::io::stdout())
        }
    }
}
