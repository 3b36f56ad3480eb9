use anyhow::{bail, Context, Result};
use section_sync::backend::http::HttpBackend;
use section_sync::config::{Config, SectionDefinition};
use section_sync::editor::{self, SectionEditor};
use section_sync::form::FormTree;
use section_sync::i18n::LanguageRegistry;
use std::path::Path;
use tracing::{info, warn};

fn print_usage() {
    println!(
        r#"section-sync - reconcile a section editor with the content backend

USAGE:
    section-sync <COMMAND>

COMMANDS:
    load              Fetch the subsection and print its form tree as JSON
    validate <file>   Check a form tree JSON file (item counts and fields)
    save <file>       Save a form tree JSON file and print the outcome
    help              Show this message

ENVIRONMENT:
    BACKEND_API_URL          Content API base URL (required)
    BACKEND_API_TOKEN        Bearer token
    SECTION_DEFINITION_FILE  Section definition JSON (default: data/section.json)
    TRANSLATION_BATCH_SIZE   Translations per bulk request (default: 20)
    SYNC_DEBOUNCE_MS         Shared-field propagation delay (default: 100)
    REQUEST_TIMEOUT_SECS     HTTP timeout (default: 30)"#
    );
}

fn read_form(path: &str) -> Result<FormTree> {
    let content = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read form file {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid form tree in {}", path))
}

async fn load_command(config: &Config, definition: SectionDefinition) -> Result<()> {
    let backend = HttpBackend::from_config(config)?;
    let mut editor = SectionEditor::new(backend, definition).with_config(config);
    let form = editor.load().await?;
    println!("{}", serde_json::to_string_pretty(form)?);
    Ok(())
}

fn validate_command(definition: &SectionDefinition, file: &str) -> Result<()> {
    let form = read_form(file)?;
    let languages = LanguageRegistry::from_records(&definition.languages, &definition.language_ids);
    let validation = editor::validate(&form, &languages, &definition.schema);

    println!("{}", serde_json::to_string_pretty(&validation)?);
    if !validation.ok {
        bail!(
            "Form is invalid: {} count mismatches, {} field issues",
            validation.mismatches.len(),
            validation.issues.len()
        );
    }
    Ok(())
}

async fn save_command(config: &Config, definition: SectionDefinition, file: &str) -> Result<()> {
    let form = read_form(file)?;
    let backend = HttpBackend::from_config(config)?;
    let mut editor = SectionEditor::new(backend, definition).with_config(config);
    editor.load().await?;
    editor.replace_form(form);

    let outcome = editor.save().await?;
    for failure in &outcome.upload_failures {
        warn!("{}", failure);
    }
    info!(
        "Saved subsection {} ({} created, {} updated, {} deleted)",
        outcome.sub_section_id, outcome.created, outcome.updated, outcome.deleted
    );
    println!("{}", serde_json::to_string_pretty(&editor.metrics().report())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("section_sync=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Ok(());
    }
    let command = args[1].as_str();
    let file = args.get(2).map(String::as_str);

    if matches!(command, "--help" | "-h" | "help") {
        print_usage();
        return Ok(());
    }

    let config = Config::from_env()?;
    let definition = SectionDefinition::load(&config.section_definition_file)?;
    info!("Section '{}' ({} fields)", definition.slug, definition.schema.fields.len());

    match (command, file) {
        ("load", _) => load_command(&config, definition).await,
        ("validate", Some(file)) => validate_command(&definition, file),
        ("save", Some(file)) => save_command(&config, definition, file).await,
        ("validate" | "save", None) => {
            eprintln!("Missing <file> argument for '{}'", command);
            print_usage();
            std::process::exit(1);
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}
