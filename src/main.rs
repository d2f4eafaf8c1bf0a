use anyhow::Result;
use bugdrill::api::{self, ApiError, ReviewRequest, StressRequest};
use bugdrill::catalog::catalog;
use bugdrill::config::{self, Config};
use bugdrill::generate::{GenerationAdapter, NullGenerator, OpenRouterGenerator};
use bugdrill::github::{GitHubClient, SourceControl};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "bugdrill",
    about = "Plants practice bugs in a repository and reviews the fixes",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inject bugs into one file of a repository branch
    Stress {
        /// Repository owner (user or organization)
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// Branch to stress
        #[arg(long, default_value = "main")]
        branch: String,

        /// Candidate file paths (exactly one will be mutated)
        #[arg(required = true)]
        files: Vec<String>,

        /// Difficulty: low, medium, or high
        #[arg(short, long)]
        difficulty: Option<String>,

        /// Optional focus hint forwarded to the generator (clipped to 200 chars)
        #[arg(long)]
        context: Option<String>,

        /// Exact number of bugs to plant, overriding the difficulty range
        #[arg(long)]
        bugs: Option<usize>,
    },

    /// Analyze a fix commit for leftover anti-patterns
    Review {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Commit sha of the fix
        sha: String,
    },

    /// List the branches of a repository
    Branches {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,
    },

    /// List the built-in mutation rules
    Rules,

    /// Store GitHub and OpenRouter credentials
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bugdrill=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(api_err) = err.downcast_ref::<ApiError>() {
                eprintln!("Error ({}): {}", api_err.status(), api_err);
            } else {
                eprintln!("Error: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Stress {
            owner,
            repo,
            branch,
            files,
            difficulty,
            context,
            bugs,
        } => {
            let config = Config::load();
            let token = api::require_credential(config.github_token(), "GitHub")?;
            let client = GitHubClient::new(&owner, &repo, &token)?;

            let request = StressRequest {
                owner,
                repo,
                branch,
                files,
                context,
                difficulty,
                target_bug_count: bugs,
            };

            let mut rng = fastrand::Rng::new();
            let response = match config.openrouter_api_key() {
                Some(key) => {
                    let adapter = GenerationAdapter::new(OpenRouterGenerator::new(key));
                    api::run_stress(&client, &adapter, &request, &mut rng).await?
                }
                None => {
                    let adapter = GenerationAdapter::new(NullGenerator);
                    api::run_stress(&client, &adapter, &request, &mut rng).await?
                }
            };

            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Command::Review { owner, repo, sha } => {
            let config = Config::load();
            let token = api::require_credential(config.github_token(), "GitHub")?;
            let client = GitHubClient::new(&owner, &repo, &token)?;

            let request = ReviewRequest { owner, repo, sha };
            let analysis = api::run_review(&client, &request).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }

        Command::Branches { owner, repo } => {
            let config = Config::load();
            let token = api::require_credential(config.github_token(), "GitHub")?;
            let client = GitHubClient::new(&owner, &repo, &token)?;

            for branch in client.list_branches().await? {
                println!("{}", branch);
            }
        }

        Command::Rules => {
            for rule in catalog() {
                println!("{:<22} {}", rule.name(), rule.description());
            }
        }

        Command::Setup => {
            config::setup_interactive().map_err(|e| anyhow::anyhow!(e))?;
        }
    }
    Ok(())
}
