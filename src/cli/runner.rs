//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::entity::{describe, ResolvedOptions};
use crate::extract::JsonExtractor;
use crate::fetch::{Fetcher, FileFetcher, Request};
use crate::http::HttpFetcher;
use crate::loader::{load_definition, ParserDefinition};
use crate::output::{results_to_json, write_results_to_parquet};
use crate::parser::EntityParser;
use anyhow::{bail, Context};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> anyhow::Result<()> {
        match &self.cli.command {
            Commands::Run {
                definition,
                input,
                output_dir,
                format,
            } => {
                self.parse(definition, input, output_dir.as_deref(), *format)
                    .await
            }
            Commands::Validate { definition } => self.validate(definition),
        }
    }

    fn load(path: &Path) -> anyhow::Result<ParserDefinition> {
        load_definition(path)
            .with_context(|| format!("Invalid definition '{}'", path.display()))
    }

    /// Parse an input and print or write the results
    async fn parse(
        &self,
        definition: &Path,
        input: &str,
        output_dir: Option<&Path>,
        format: OutputFormat,
    ) -> anyhow::Result<()> {
        if format == OutputFormat::Parquet && output_dir.is_none() {
            bail!("Parquet format requires --output-dir");
        }

        let def = Self::load(definition)?;
        let request = Request::parse(input)?;
        let fetcher: Arc<dyn Fetcher> = if request.is_file() {
            Arc::new(FileFetcher::new())
        } else {
            Arc::new(HttpFetcher::with_config(def.http_config())?)
        };

        let parser = EntityParser::new(
            &def.entity_graph()?,
            def.parser_settings(),
            fetcher,
            Arc::new(JsonExtractor::new()),
        )?;
        info!(definition = %def.name, input = %request.url, "Running definition");

        let results = parser
            .parse_all(request)
            .await
            .with_context(|| format!("Parsing '{input}' failed"))?;

        if let Some(dir) = output_dir {
            let paths = write_results_to_parquet(dir, &results, None)?;
            for path in &paths {
                info!(path = %path.display(), "Wrote entity");
            }
        }

        match format {
            OutputFormat::Json | OutputFormat::Pretty => {
                Self::output(format, &results_to_json(&results));
            }
            OutputFormat::Parquet => {
                let counts: serde_json::Map<String, Value> = results
                    .iter()
                    .map(|(name, result)| (name.to_string(), json!(result.len())))
                    .collect();
                Self::output(format, &json!({ "rows": counts }));
            }
        }
        Ok(())
    }

    /// Validate a definition and print its entity tree
    fn validate(&self, definition: &Path) -> anyhow::Result<()> {
        let def = Self::load(definition)?;
        let settings = def.parser_settings();
        let entities = def.entity_graph()?.resolve(&ResolvedOptions {
            nesting: settings.nesting,
            ignore_following_errors: settings.ignore_following_errors,
        })?;

        println!("Definition '{}' is valid", def.name);
        print!("{}", describe(&entities));
        Ok(())
    }

    fn output(format: OutputFormat, msg: &Value) {
        match format {
            OutputFormat::Json | OutputFormat::Parquet => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
