//! CLI entry point
//!
//! Collects targets from arguments, `--list` files and the interactive
//! repository browser, then mirrors them one after another. A failing target
//! is reported and the next one is attempted; the exit code is 1 if any
//! target failed.

use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser};
use gitdig::config::{APP_NAME, APP_VERSION};
use gitdig::github::{
    GitHubClient, format_repository_list, prompt_selection, read_targets_file, resolve_targets,
};
use gitdig::{Config, Mirror, OutputMode};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Download directories from GitHub repositories without cloning them
#[derive(Parser, Debug)]
#[command(name = "gitdig", version, about)]
struct Cli {
    /// Repository paths or URLs (owner/repo[/tree/branch]/path)
    targets: Vec<String>,

    /// GitHub repository URL or path
    #[arg(short = 'u', long = "url")]
    url: Option<String>,

    /// GitHub API token for authentication
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output directory (or archive path with --zip)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Download directories recursively [default: true]
    #[arg(
        short = 'r',
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    recursive: Option<bool>,

    /// Number of concurrent downloads [default: 5]
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Create a ZIP archive instead of a directory tree
    #[arg(long)]
    zip: bool,

    /// Show what would be downloaded without downloading
    #[arg(long)]
    preview: bool,

    /// Only download new or changed files
    #[arg(long)]
    update: bool,

    /// File containing a list of repositories to download
    #[arg(long = "list", value_name = "FILE")]
    list: Option<PathBuf>,

    /// Number of retries for failed downloads [default: 3]
    #[arg(long)]
    retries: Option<u32>,

    /// GitHub user or organization for interactive repository selection
    #[arg(long)]
    user: Option<String>,

    /// Interactive mode for selecting a repository
    #[arg(short = 'i', long)]
    interactive: bool,

    /// TOML configuration file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    /// File (or default) configuration with flags applied on top
    fn build_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => Config::default(),
        };

        if self.token.is_some() {
            config.token = self.token.clone();
        }
        if self.output.is_some() {
            config.output_dir = self.output.clone();
        }
        if let Some(recursive) = self.recursive {
            config.recursive = recursive;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(retries) = self.retries {
            config.retry.max_retries = retries;
        }
        config.verbose |= self.verbose;
        config.preview |= self.preview;
        config.update |= self.update;
        if self.zip {
            config.output = OutputMode::Archive;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "gitdig=debug" } else { "gitdig=info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Let the user pick one repository of `owner`; returns its `owner/name`
async fn browse_repositories(config: &Config, owner: &str) -> anyhow::Result<String> {
    println!("Fetching repositories for {owner}...");
    let client = GitHubClient::new(&config.http, config.resolve_token())?;
    let repos = client
        .list_repositories(owner)
        .await
        .context("failed to get repositories")?;
    if repos.is_empty() {
        anyhow::bail!("no repositories found for {owner}");
    }

    println!("\n{}", format_repository_list(owner, &repos));
    let count = repos.len();
    let index = tokio::task::spawn_blocking(move || {
        prompt_selection(std::io::stdin().lock(), std::io::stdout(), count)
    })
    .await??;

    let selected = &repos[index];
    println!("Selected: {}", selected.full_name);
    Ok(selected.full_name.clone())
}

async fn read_line(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    Ok(line.trim().to_string())
}

async fn collect_inputs(cli: &Cli, config: &Config) -> anyhow::Result<Vec<String>> {
    let mut inputs = cli.targets.clone();
    if let Some(url) = &cli.url {
        inputs.push(url.clone());
    }
    if let Some(list) = &cli.list {
        inputs.extend(read_targets_file(list)?);
    }
    if cli.user.is_some() || cli.interactive {
        let owner = match &cli.user {
            Some(user) => user.clone(),
            None => read_line("Enter GitHub username or organization: ").await?,
        };
        inputs.push(browse_repositories(config, &owner).await?);
    }
    Ok(inputs)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.build_config()?;
    init_tracing(config.verbose);

    println!("\n{APP_NAME} v{APP_VERSION} - GitHub Repository Downloader\n");

    let inputs = match collect_inputs(&cli, &config).await {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return Ok(ExitCode::FAILURE);
        }
    };
    if inputs.is_empty() {
        eprintln!(
            "Error: No target specified. Use -u, --list, --user or provide a path argument.\n"
        );
        Cli::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    }

    let targets = resolve_targets(&inputs, config.output_dir.as_deref(), config.is_archive())?;
    let preview = config.preview;
    let mirror = Mirror::new(config)?;

    let mut any_failed = false;
    for (i, target) in targets.iter().enumerate() {
        if i > 0 && !preview {
            println!("\nProcessing next target ({}/{})...", i + 1, targets.len());
        }
        if let Err(e) = mirror.download_target(target).await {
            any_failed = true;
            eprintln!("Error: {e}");
            if i + 1 < targets.len() {
                eprintln!("Continuing to next target...");
            }
        }
    }

    Ok(if any_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
