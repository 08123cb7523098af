/// Velyra Memory CLI
///
/// Usage:
///   velyra [--db-path <path>] <command>
///
/// Results are printed to stdout as JSON; logs go to stderr (RUST_LOG controls verbosity).
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use velyra_memory::{MemoryConfig, VelyraMemory};
use velyra_schemas::{
    AccountId, CampaignInput, ErrorReport, SimilarQuery, DEFAULT_COUNTRY, DEFAULT_PLATFORM,
};

#[derive(Parser, Debug)]
#[command(name = "velyra")]
#[command(about = "Campaign outcome memory and heuristic recommendations")]
struct Args {
    /// Path to SQLite database file (overrides VELYRA_DB_PATH)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Learn from a finished campaign (JSON from --file or stdin)
    Learn {
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Recommend strategies for a new campaign
    Recommend {
        #[arg(long)]
        niche: String,
        #[arg(long, default_value = DEFAULT_COUNTRY)]
        country: String,
        #[arg(long, default_value = DEFAULT_PLATFORM)]
        platform: String,
        #[arg(long, default_value_t = 1000.0)]
        budget: f64,
    },

    /// Aggregated intelligence for a niche
    Niche { niche: String },

    /// Statistics and recent campaigns of an account
    Account { account_id: String },

    /// Record an error so it can be avoided later (JSON from --file or stdin)
    RecordError {
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Past campaigns matching a context
    Similar {
        #[arg(long)]
        niche: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        platform: Option<String>,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Table counts and cache size
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = MemoryConfig::from_env();
    if let Some(path) = args.db_path {
        config.db_path = path;
    }

    let mut memory = VelyraMemory::open(config)
        .context("Failed to open memory database")?;

    match args.command {
        Command::Learn { file } => {
            let input: CampaignInput = read_json(file.as_ref())?;
            let outcome = memory.learn_from_campaign(input)?;
            print_json(&outcome)?;
        }
        Command::Recommend {
            niche,
            country,
            platform,
            budget,
        } => {
            let recommendations = memory.get_recommendations(&niche, &country, &platform, budget)?;
            print_json(&recommendations)?;
        }
        Command::Niche { niche } => {
            print_json(&memory.get_niche_intelligence(&niche)?)?;
        }
        Command::Account { account_id } => {
            print_json(&memory.get_account_history(&AccountId(account_id))?)?;
        }
        Command::RecordError { file } => {
            let report: ErrorReport = read_json(file.as_ref())?;
            let outcome = memory.record_error(&report)?;
            info!("Error {} recorded (new: {})", outcome.error_id, outcome.is_new);
            print_json(&outcome)?;
        }
        Command::Similar {
            niche,
            country,
            platform,
            limit,
        } => {
            let defaults = SimilarQuery::default();
            let query = SimilarQuery {
                niche: niche.unwrap_or(defaults.niche),
                country: country.unwrap_or(defaults.country),
                platform: platform.unwrap_or(defaults.platform),
            };
            print_json(&memory.get_similar_campaigns(&query, limit)?)?;
        }
        Command::Status => {
            print_json(&memory.system_status()?)?;
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(file: Option<&PathBuf>) -> Result<T> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    serde_json::from_str(&raw).context("Invalid JSON input")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_recommend_defaults() {
        let args = Args::try_parse_from(["velyra", "recommend", "--niche", "saas"]).unwrap();
        assert!(args.db_path.is_none());
        match args.command {
            Command::Recommend {
                niche,
                country,
                platform,
                budget,
            } => {
                assert_eq!(niche, "saas");
                assert_eq!(country, "BR");
                assert_eq!(platform, "facebook");
                assert_eq!(budget, 1000.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_recommend_requires_niche() {
        assert!(Args::try_parse_from(["velyra", "recommend"]).is_err());
    }

    #[test]
    fn test_global_db_path_after_subcommand() {
        let args =
            Args::try_parse_from(["velyra", "status", "--db-path", "/tmp/velyra.db"]).unwrap();
        assert_eq!(args.db_path, Some(PathBuf::from("/tmp/velyra.db")));
        assert!(matches!(args.command, Command::Status));
    }

    #[test]
    fn test_learn_and_record_error_inputs() {
        let args = Args::try_parse_from(["velyra", "learn", "--file", "campaign.json"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Learn { file: Some(ref f) } if f == &PathBuf::from("campaign.json")
        ));

        let args = Args::try_parse_from(["velyra", "record-error"]).unwrap();
        assert!(matches!(args.command, Command::RecordError { file: None }));
    }

    #[test]
    fn test_similar_and_positional_commands() {
        let args = Args::try_parse_from(["velyra", "similar", "--niche", "pets", "--limit", "2"])
            .unwrap();
        match args.command {
            Command::Similar {
                niche,
                country,
                limit,
                ..
            } => {
                assert_eq!(niche.as_deref(), Some("pets"));
                assert!(country.is_none());
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = Args::try_parse_from(["velyra", "account", "acct_42"]).unwrap();
        assert!(matches!(args.command, Command::Account { ref account_id } if account_id == "acct_42"));

        let args = Args::try_parse_from(["velyra", "niche", "ecommerce"]).unwrap();
        assert!(matches!(args.command, Command::Niche { ref niche } if niche == "ecommerce"));
    }

    #[test]
    fn test_read_json_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("error.json");
        std::fs::write(&path, r#"{"type": "pixel", "context": "checkout"}"#).unwrap();

        let report: ErrorReport = read_json(Some(&path)).unwrap();
        assert_eq!(report.error_type, "pixel");
        assert_eq!(report.context, "checkout");

        std::fs::write(&path, "not json").unwrap();
        assert!(read_json::<ErrorReport>(Some(&path)).is_err());
    }
}
