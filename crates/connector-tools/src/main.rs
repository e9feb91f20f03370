//! `connector`: drive the Dify and RAGFlow clients from the shell.
//!
//! Credentials come from `--config <file>` (JSON with `api_key` and
//! `base_url`) or from `DIFY_API_KEY`/`DIFY_BASE_URL` and
//! `RAGFLOW_API_KEY`/`RAGFLOW_BASE_URL`, with a `.env` file loaded first.
//! Results go to stdout, logs to stderr (warnings only unless `-v` is given).

use std::io::{Read as _, Write as _};
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use connector_core::{ClientConfig, ConnectorError, init_observability, verbosity_level};
use connector_dify::{
    ChatRequest, DifyClient, ResponseMode, StreamEvent, WorkflowOutput, WorkflowRequest,
};
use connector_ragflow::{ListDatasetsQuery, ListDocumentsQuery, RagflowClient};
use connector_tools::{CitedDocuments, resolve_document_links};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "connector", about = "Talk to Dify apps and RAGFlow knowledge bases.")]
struct Cli {
    /// JSON file with `api_key` and `base_url`; overrides the environment.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output on stderr; repeat for more detail.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a document to Dify and print its file id.
    Upload {
        path: PathBuf,
        #[arg(long, default_value = connector_dify::request::DEFAULT_USER)]
        user: String,
    },
    /// Send a chat message to a Dify app.
    Chat {
        query: String,
        #[command(flatten)]
        run: RunArgs,
        /// Continue an existing conversation.
        #[arg(long)]
        conversation_id: Option<String>,
        /// Print the full answer (ids, usage, cited resources) as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run a Dify workflow.
    Workflow {
        /// Id of a previously uploaded file, passed as the `files` input.
        #[arg(long)]
        file_id: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// List RAGFlow datasets.
    Datasets {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// List one page of documents in a RAGFlow dataset.
    Documents {
        dataset_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
        #[arg(long, default_value = "")]
        keywords: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Download a RAGFlow document to a local file.
    Download {
        dataset_id: String,
        document_id: String,
        dest: PathBuf,
    },
    /// Turn a knowledge-retrieval result into RAGFlow document URLs.
    CiteLinks {
        /// RAGFlow dataset that every cited title is looked up in.
        dataset_id: String,
        /// Retrieval result JSON; read from stdin when omitted.
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// App input as `name=value`; repeatable.
    #[arg(long = "input", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    inputs: Vec<(String, String)>,
    #[arg(long, default_value = connector_dify::request::DEFAULT_USER)]
    user: String,
    /// Wait for the whole result instead of streaming it.
    #[arg(long)]
    blocking: bool,
}

impl RunArgs {
    fn mode(&self) -> ResponseMode {
        if self.blocking {
            ResponseMode::Blocking
        } else {
            ResponseMode::Streaming
        }
    }
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_observability(verbosity_level(cli.verbose, cli.quiet));

    if let Err(err) = run(cli) {
        tracing::error!(
            event = "cli.failed",
            domain = "cli",
            code = err.kind(),
            error = %err
        );
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ConnectorError> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Upload { path, user } => {
            let client = DifyClient::new(load_config(config, "DIFY")?)?;
            println!("{}", client.upload_file(&path, &user)?);
        }
        Command::Chat {
            query,
            run,
            conversation_id,
            json,
        } => {
            let client = DifyClient::new(load_config(config, "DIFY")?)?;
            let mut request = ChatRequest::new(query)
                .user(run.user.clone())
                .response_mode(run.mode());
            for (name, value) in run.inputs {
                request = request.input(name, value);
            }
            if let Some(id) = conversation_id {
                request = request.conversation_id(id);
            }
            let answer = client.chat_with(&request, |event| {
                if !json {
                    print_progress(event);
                }
            })?;
            if json {
                print_json(&answer)?;
            } else if run.blocking {
                println!("{}", answer.text);
            } else {
                println!();
            }
            if let Some(id) = &answer.conversation_id {
                tracing::info!(event = "cli.chat_done", domain = "cli", conversation_id = %id);
            }
        }
        Command::Workflow { file_id, run } => {
            let client = DifyClient::new(load_config(config, "DIFY")?)?;
            let mut request = match file_id {
                Some(id) => WorkflowRequest::for_uploaded_document(id),
                None => WorkflowRequest::new(),
            }
            .user(run.user.clone())
            .response_mode(run.mode());
            for (name, value) in run.inputs {
                request = request.input(name, value);
            }
            match client.run_workflow_with(&request, print_progress)? {
                WorkflowOutput::Blocking { raw } => print_json(&raw)?,
                WorkflowOutput::Streamed(result) => {
                    println!();
                    print_json(&result)?;
                }
            }
        }
        Command::Datasets { name, id } => {
            let client = RagflowClient::new(load_config(config, "RAGFLOW")?)?;
            let mut query = ListDatasetsQuery::default();
            if let Some(name) = name {
                query = query.name(name);
            }
            if let Some(id) = id {
                query = query.id(id);
            }
            print_json(&client.list_datasets(&query)?)?;
        }
        Command::Documents {
            dataset_id,
            page,
            page_size,
            keywords,
            name,
        } => {
            let client = RagflowClient::new(load_config(config, "RAGFLOW")?)?;
            let query = ListDocumentsQuery::default()
                .page(page)
                .page_size(page_size)
                .keywords(keywords)
                .name(name);
            print_json(&client.list_documents(&dataset_id, &query)?)?;
        }
        Command::Download {
            dataset_id,
            document_id,
            dest,
        } => {
            let client = RagflowClient::new(load_config(config, "RAGFLOW")?)?;
            let written = client.download_document_to(&dataset_id, &document_id, &dest)?;
            println!("{} ({written} bytes)", dest.display());
        }
        Command::CiteLinks { dataset_id, input } => {
            let client = RagflowClient::new(load_config(config, "RAGFLOW")?)?;
            let raw = read_input(input)?;
            let cited = CitedDocuments::from_retrieval_json(&raw)?;
            let urls = resolve_document_links(&client, &dataset_id, &cited)?;
            print_json(&serde_json::json!({ "result": urls }))?;
        }
    }
    Ok(())
}

fn load_config(
    path: Option<&std::path::Path>,
    env_prefix: &str,
) -> Result<ClientConfig, ConnectorError> {
    match path {
        Some(path) => ClientConfig::from_json_file(path),
        None => ClientConfig::from_env(env_prefix),
    }
}

fn print_progress(event: &StreamEvent) {
    if let Some(text) = event.progress_text() {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), ConnectorError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| ConnectorError::Decode(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn read_input(path: Option<PathBuf>) -> Result<String, ConnectorError> {
    match path {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| ConnectorError::io(path.display().to_string(), &e)),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(|e| ConnectorError::io("<stdin>", &e))?;
            Ok(raw)
        }
    }
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    if name.is_empty() {
        return Err(format!("empty input name in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write as _;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_val_splits_on_first_equals() {
        assert_eq!(
            parse_key_val("expr=a=b"),
            Ok(("expr".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn chat_arguments_parse() {
        let cli = Cli::try_parse_from([
            "connector",
            "--config",
            "dify.json",
            "chat",
            "hello",
            "--input",
            "lang=en",
            "--blocking",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("dify.json")));
        let Command::Chat { query, run, .. } = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(query, "hello");
        assert_eq!(run.inputs, vec![("lang".to_string(), "en".to_string())]);
        assert_eq!(run.user, "user");
        assert!(matches!(run.mode(), ResponseMode::Blocking));
    }

    #[test]
    fn verbosity_flags_are_global() {
        let cli = Cli::try_parse_from(["connector", "datasets", "-vv"]).expect("parse");
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);

        let cli = Cli::try_parse_from(["connector", "-q", "chat", "hi", "--json"]).expect("parse");
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Chat { json: true, .. }));

        assert!(Cli::try_parse_from(["connector", "-q", "-v", "datasets"]).is_err());
    }

    #[test]
    fn config_file_takes_precedence_over_environment() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"api_key":"k","base_url":"http://rag.local"}}"#).expect("write");
        let config = load_config(Some(file.path()), "CONNECTOR_TOOLS_TEST_UNSET").expect("config");
        assert_eq!(config.base_url, "http://rag.local");
        assert_eq!(
            load_config(None, "CONNECTOR_TOOLS_TEST_UNSET")
                .expect_err("unset env")
                .kind(),
            "config"
        );
    }
}
