//! saga-preview - resolve a progression intent from JSON files.
//!
//! ```text
//! saga-preview <catalog.json> <snapshot.json> <intent.json> [--modifiers <file>] [--apply]
//! ```
//!
//! Prints the preview (delta and expected version) as pretty JSON. With
//! `--apply` the delta is also committed to an in-memory record and the
//! commit receipt is printed instead. Rejected intents print their
//! structured reason and exit non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use saga_domain::{CharacterSnapshot, InMemoryCatalog, Modifier, ProgressionError, ProgressionIntent};
use saga_engine::infrastructure::config::{read_json_file, EngineConfig, DEFAULT_LOG_FILTER};
use saga_engine::use_cases::progression::ProgressionUseCaseError;
use saga_engine::App;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str =
    "usage: saga-preview <catalog.json> <snapshot.json> <intent.json> [--modifiers <file>] [--apply]";

#[derive(Debug)]
struct Args {
    catalog: PathBuf,
    snapshot: PathBuf,
    intent: PathBuf,
    modifiers: Option<PathBuf>,
    apply: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut positional = Vec::new();
        let mut modifiers = None;
        let mut apply = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--apply" => apply = true,
                "--modifiers" => {
                    let path = args.next().context("--modifiers needs a file path")?;
                    modifiers = Some(PathBuf::from(path));
                }
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                _ => positional.push(PathBuf::from(&arg)),
            }
        }

        let [catalog, snapshot, intent]: [PathBuf; 3] = positional
            .try_into()
            .map_err(|_| anyhow::anyhow!(USAGE))?;

        Ok(Self {
            catalog,
            snapshot,
            intent,
            modifiers,
            apply,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env()?;

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    let rules = config.load_ruleset()?;
    let catalog: InMemoryCatalog = read_json_file(&args.catalog)?;
    let snapshot: CharacterSnapshot = read_json_file(&args.snapshot)?;
    let intent: ProgressionIntent = read_json_file(&args.intent)?;

    let character_id = snapshot.id();
    let (app, records, modifiers) = App::in_memory(Arc::new(catalog), Arc::new(rules));
    records.seed(snapshot);
    if let Some(path) = &args.modifiers {
        let active: Vec<Modifier> = read_json_file(path)?;
        modifiers.set(character_id, active);
    }

    let progression = &app.use_cases.progression;
    let output = if args.apply {
        progression
            .level_up(character_id, &intent)
            .await
            .map(|applied| serde_json::to_string_pretty(&applied))
    } else {
        progression
            .preview(character_id, &intent)
            .await
            .map(|preview| serde_json::to_string_pretty(&preview))
    };

    match output {
        Ok(json) => {
            println!("{}", json?);
            Ok(())
        }
        Err(err) => {
            if let Some(rejection) = rejection_json(&err)? {
                println!("{rejection}");
            }
            Err(err.into())
        }
    }
}

/// Structured output for rejections the player can act on.
fn rejection_json(err: &ProgressionUseCaseError) -> anyhow::Result<Option<String>> {
    let value = match err.progression() {
        Some(ProgressionError::Validation(report)) => {
            serde_json::json!({ "validation": report })
        }
        Some(ProgressionError::IncompleteIntent(missing)) => {
            serde_json::json!({ "incompleteIntent": missing })
        }
        _ => return Ok(None),
    };
    Ok(Some(serde_json::to_string_pretty(&value)?))
}
