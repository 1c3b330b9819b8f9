use anyhow::Context;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use gauge_core::error::OrchestrationError;
use gauge_eval::prelude::*;
use gauge_evaluators::registry::EvaluatorRegistry;

use crate::cli::{Command, ListArgs, OutputFormat, RunArgs};
use crate::exit_codes;

pub async fn dispatch(cmd: Command, cancel: CancellationToken) -> anyhow::Result<i32> {
    let registry = EvaluatorRegistry::with_builtins();
    match cmd {
        Command::Run(args) => run(&args, &registry, cancel).await,
        Command::List(args) => {
            println!("{}", list(&args, &registry)?);
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run(
    args: &RunArgs,
    registry: &EvaluatorRegistry,
    cancel: CancellationToken,
) -> anyhow::Result<i32> {
    let mut config = EvaluationConfig::from_path(&args.config)
        .with_context(|| format!("loading run config {}", args.config.display()))?;
    if let Some(n) = args.max_evaluators {
        config.max_evaluators_in_parallel = n;
    }
    if let Some(n) = args.max_evaluations {
        config.max_evaluations_in_parallel = n;
    }
    let dataset = Dataset::from_path(&args.entries)
        .with_context(|| format!("loading entries {}", args.entries.display()))?;
    tracing::info!(
        dataset = %dataset.name,
        entries = dataset.len(),
        evaluators = config.evaluators.len(),
        "loaded run"
    );

    let orchestrator = Orchestrator::from_config(&config, registry)?;
    match orchestrator.run(dataset.into_entries(), cancel).await {
        Ok(set) => {
            println!("{}", render(&set, args.format)?);
            Ok(exit_codes::SUCCESS)
        }
        Err(OrchestrationError::Interrupted { partial }) => {
            eprintln!(
                "Interrupted: {} of {} evaluators completed",
                partial.completed(),
                partial.total()
            );
            Ok(exit_codes::INTERRUPTED)
        }
        Err(err) => Err(err.into()),
    }
}

fn render(set: &ResultSet, format: OutputFormat) -> anyhow::Result<String> {
    let out = match format {
        OutputFormat::Table => set.to_table().to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(&set.to_table())?,
        OutputFormat::List => serde_json::to_string_pretty(&set.to_list())?,
    };
    Ok(out)
}

fn list(args: &ListArgs, registry: &EvaluatorRegistry) -> anyhow::Result<String> {
    let definitions = registry.definitions();
    if args.json {
        let listing: Vec<Value> = definitions
            .iter()
            .map(|def| {
                json!({
                    "definition": def,
                    "default_settings": registry.default_settings(def.id),
                })
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&listing)?);
    }

    let mut lines = Vec::with_capacity(definitions.len());
    for def in definitions {
        let mut line = format!("{:<32} {}", def.id, def.name);
        if def.is_guardrail {
            line.push_str(" [guardrail]");
        }
        if !def.env_vars.is_empty() {
            line.push_str(&format!(" (env: {})", def.env_vars.join(", ")));
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn run_args(config: std::path::PathBuf, entries: std::path::PathBuf, format: OutputFormat) -> RunArgs {
        RunArgs {
            config,
            entries,
            format,
            max_evaluators: None,
            max_evaluations: Some(4),
        }
    }

    #[tokio::test]
    async fn run_prints_table_for_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(
            dir.path(),
            "run.yaml",
            "evaluators:\n  - id: langevals/competitor_blocklist\n    settings:\n      competitors: [OpenAI]\n",
        );
        let entries = write(dir.path(), "rows.jsonl", "{\"input\": \"mentions OpenAI\"}\n");

        let registry = EvaluatorRegistry::with_builtins();
        let code = run(
            &run_args(config, entries, OutputFormat::Table),
            &registry,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(code, exit_codes::SUCCESS);
    }

    #[tokio::test]
    async fn run_reports_interruption() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "run.json", r#"{"evaluators": [{"id": "example/word_count"}]}"#);
        let entries = write(dir.path(), "rows.json", r#"[{"output": "one two"}]"#);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let registry = EvaluatorRegistry::with_builtins();
        let code = run(&run_args(config, entries, OutputFormat::List), &registry, cancel)
            .await
            .unwrap();
        assert_eq!(code, exit_codes::INTERRUPTED);
    }

    #[tokio::test]
    async fn unknown_evaluator_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "run.yaml", "evaluators:\n  - id: ragas/faithfulness\n");
        let entries = write(dir.path(), "rows.yaml", "- input: hi\n");

        let registry = EvaluatorRegistry::with_builtins();
        let err = run(
            &run_args(config, entries, OutputFormat::Table),
            &registry,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("ragas/faithfulness"));
    }

    #[tokio::test]
    async fn missing_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let entries = write(dir.path(), "rows.yaml", "- input: hi\n");
        let registry = EvaluatorRegistry::with_builtins();
        let err = run(
            &run_args(dir.path().join("absent.yaml"), entries, OutputFormat::Table),
            &registry,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("absent.yaml"));
    }

    #[tokio::test]
    async fn render_formats() {
        let registry = EvaluatorRegistry::with_builtins();
        let config = EvaluationConfig::new()
            .with_evaluator(EvaluatorSpec::new("example/word_count"));
        let set = Orchestrator::from_config(&config, &registry)
            .unwrap()
            .run(
                vec![gauge_core::entry::Entry::new().with_output("three small words")],
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let table = render(&set, OutputFormat::Table).unwrap();
        assert!(table.lines().next().unwrap().starts_with("output"));
        assert!(table.contains("Example Evaluator"));

        let records: Value = serde_json::from_str(&render(&set, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(records[0]["Example Evaluator"], json!(3.0));
        assert_eq!(records[0]["Example Evaluator_details"], json!("Words found: 3"));

        let listing: Value = serde_json::from_str(&render(&set, OutputFormat::List).unwrap()).unwrap();
        assert_eq!(listing["Example Evaluator"][0]["status"], json!("processed"));
    }

    #[test]
    fn list_shows_every_builtin() {
        let registry = EvaluatorRegistry::with_builtins();
        let text = list(&ListArgs { json: false }, &registry).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(text.contains("openai/moderation"));
        assert!(text.contains("OPENAI_API_KEY"));

        let json_text = list(&ListArgs { json: true }, &registry).unwrap();
        let listing: Value = serde_json::from_str(&json_text).unwrap();
        assert_eq!(listing.as_array().unwrap().len(), 6);
        assert!(listing.as_array().unwrap().iter().any(|item| {
            item["definition"]["id"] == "custom/similarity"
                && item["default_settings"]["threshold"] == json!(0.3)
        }));
    }
}
