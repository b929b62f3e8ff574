use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use platen::channel::{ClientIdentity, ReplyMode};
use platen::job::{JobRequest, JobSpec, OptionValue, WarningPolicy};
use platen::protocol;
use platen::session::{Session, SessionConfig};
use platen::wire;
use platen::worker::mock::MockEngine;
use platen::worker::service::{Worker, WorkerOpts};

#[derive(Parser)]
#[command(name = "platen", version, about = "Feed pages to the rendering press.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Submit one rendering job and print the outcome
    Submit {
        /// Resource to render (URL or file:// reference)
        url: String,

        #[command(flatten)]
        conn: ConnArgs,

        /// Document-wide option, repeatable (e.g. size.pageSize=A4)
        #[arg(short, long, value_name = "KEY=VALUE")]
        global: Vec<String>,

        /// Per-object option, repeatable (e.g. web.enableJavascript=true)
        #[arg(short, long, value_name = "KEY=VALUE")]
        object: Vec<String>,

        /// Abort the render when a warning contains this word, repeatable
        #[arg(long, value_name = "WORD")]
        abort_on: Vec<String>,
    },
    /// Submit the same request N times sequentially over one channel
    Batch {
        /// Resource to render
        url: String,

        /// Number of submissions
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        #[command(flatten)]
        conn: ConnArgs,
    },
    /// Run a loopback worker with a stub engine (probing without a cluster)
    Serve {
        /// Endpoint to bind, tcp://host:port
        #[arg(short, long, default_value = protocol::DEFAULT_ENDPOINT)]
        bind: String,

        /// Output directory for rendered artifacts
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Worker id used in artifact names
        #[arg(long, default_value_t = 1)]
        id: u32,

        /// Append document bytes to successful replies as an extra frame
        #[arg(long, default_value_t = false)]
        inline_document: bool,
    },
    /// Ask the worker behind an endpoint to shut down
    Stop {
        #[command(flatten)]
        conn: ConnArgs,
    },
}

#[derive(clap::Args)]
struct ConnArgs {
    /// Cluster entry point
    #[arg(short, long, default_value = protocol::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Send and receive deadline in milliseconds
    #[arg(short, long, default_value_t = 10_000)]
    timeout: u64,

    /// Identity string prefixed to every message
    #[arg(long)]
    identity: Option<String>,

    /// Receive replies as frame sequences instead of a joined payload
    #[arg(long, default_value_t = false)]
    multipart: bool,
}

impl ConnArgs {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: self.endpoint.clone(),
            send_timeout: Duration::from_millis(self.timeout),
            recv_timeout: Duration::from_millis(self.timeout),
            identity: self.identity.as_deref().map(ClientIdentity::from),
            reply_mode: if self.multipart {
                ReplyMode::Multi
            } else {
                ReplyMode::Single
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Command::Submit {
            url,
            conn,
            global,
            object,
            abort_on,
        } => {
            let request = build_request(url, &global, &object, &abort_on)?;
            let mut session = Session::connect(&conn.session_config()).await?;
            let response = session.submit(&request).await?;
            match response.to_result() {
                Ok(artifact) => println!("=> {artifact}"),
                Err(e) => anyhow::bail!(e),
            }
        }

        Command::Batch { url, count, conn } => {
            let mut session = Session::connect(&conn.session_config()).await?;
            let request = JobRequest::Bare(url);
            let outcomes = session
                .submit_batch(std::iter::repeat_n(request, count))
                .await;

            let mut failures = 0usize;
            for (i, outcome) in outcomes.iter().enumerate() {
                match outcome {
                    Ok(response) => {
                        println!(
                            ">> {} RESP: {} {}",
                            i + 1,
                            response.status(),
                            response.detail()
                        )
                    }
                    Err(e) => {
                        failures += 1;
                        println!(">> {} FAILED: {e}", i + 1);
                    }
                }
            }
            println!("{} submitted, {} failed", outcomes.len(), failures);
        }

        Command::Serve {
            bind,
            output,
            id,
            inline_document,
        } => {
            tokio::fs::create_dir_all(&output).await?;
            let listener = tokio::net::TcpListener::bind(wire::parse_endpoint(&bind)?).await?;
            let mut opts = WorkerOpts::new(id, output);
            opts.inline_document = inline_document;
            let worker = Worker::new(Arc::new(MockEngine::new()), opts);
            worker.serve(listener).await?;
        }

        Command::Stop { conn } => {
            let mut session = Session::connect(&conn.session_config()).await?;
            let response = session
                .submit(&JobRequest::Bare(protocol::MSG_STOP.to_string()))
                .await?;
            println!("=> {}", response.detail());
        }
    }

    Ok(())
}

fn build_request(
    url: String,
    global: &[String],
    object: &[String],
    abort_on: &[String],
) -> anyhow::Result<JobRequest> {
    if global.is_empty() && object.is_empty() && abort_on.is_empty() {
        return Ok(JobRequest::Bare(url));
    }

    let mut spec = JobSpec::new(url);
    for entry in global {
        let (key, value) = parse_option(entry)?;
        spec.global.insert(key, value);
    }
    for entry in object {
        let (key, value) = parse_option(entry)?;
        spec.object.insert(key, value);
    }
    if !abort_on.is_empty() {
        spec.on_warning = WarningPolicy::abort_on(abort_on.iter().cloned());
    }
    Ok(JobRequest::Structured(spec))
}

/// Parse `key=value`, guessing the scalar kind the way the wire format
/// would: bool, then integer, then float, then string.
fn parse_option(entry: &str) -> anyhow::Result<(String, OptionValue)> {
    let (key, raw) = entry
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("option {entry:?} is not of the form key=value"))?;

    let value = if let Ok(b) = raw.parse::<bool>() {
        OptionValue::Bool(b)
    } else if let Ok(u) = raw.parse::<u64>() {
        OptionValue::Uint(u)
    } else if let Ok(i) = raw.parse::<i64>() {
        OptionValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        OptionValue::Float(f)
    } else {
        OptionValue::String(raw.to_string())
    };
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_option_guesses_kinds() {
        assert_eq!(
            parse_option("collate=true").unwrap().1,
            OptionValue::Bool(true)
        );
        assert_eq!(parse_option("copies=2").unwrap().1, OptionValue::Uint(2));
        assert_eq!(
            parse_option("pageOffset=-1").unwrap().1,
            OptionValue::Int(-1)
        );
        assert_eq!(
            parse_option("toc.fontScale=0.5").unwrap().1,
            OptionValue::Float(0.5)
        );
        assert_eq!(
            parse_option("size.pageSize=A4").unwrap().1,
            OptionValue::String("A4".to_string())
        );
    }

    #[test]
    fn parse_option_requires_equals() {
        assert!(parse_option("collate").is_err());
    }

    #[test]
    fn bare_request_without_options() {
        let request = build_request("https://example.com".to_string(), &[], &[], &[]).unwrap();
        assert_eq!(request, JobRequest::Bare("https://example.com".to_string()));
    }

    #[test]
    fn options_promote_to_a_structured_request() {
        let request = build_request(
            "https://example.com".to_string(),
            &["size.pageSize=A4".to_string()],
            &[],
            &["error".to_string()],
        )
        .unwrap();
        let JobRequest::Structured(spec) = request else {
            panic!("expected structured request");
        };
        assert_eq!(
            spec.global.get("size.pageSize"),
            Some(&OptionValue::String("A4".to_string()))
        );
        assert!(spec.on_warning.trigger_words.contains("error"));
    }
}
