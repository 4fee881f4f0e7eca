//! Load a CSV file into Salesforce, or extract query rows, through the
//! asynchronous Bulk API.
//!
//! ```sh
//! cargo run --bin bulk-load -- options.json insert Account accounts.csv
//! cargo run --bin bulk-load -- options.json upsert Contact contacts.csv Email__c
//! cargo run --bin bulk-load -- options.json query Account "SELECT Id, Name FROM Account"
//! ```
//!
//! `options.json` holds the login and optional engine settings:
//!
//! ```json
//! {
//!   "login": { "username": "...", "password": "...", "token": "...", "login_url": "https://test.salesforce.com" },
//!   "bulk": { "batch_size": 5000, "timeout": 2, "header_policy": "widen" }
//! }
//! ```
//!
//! A pre-established session can be given instead of `login`:
//! `"session": { "instance": "https://acme.my.salesforce.com", "token": "00D..." }`.
//! Set `RUST_LOG=busbar_sf_async_bulk=debug` for request-level logs.

use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use busbar_sf_async_bulk::{
    AsyncBulkClient, BulkOptions, JobRequest, Operation, OperationResult, Record, ResultFilter,
};
use busbar_sf_session::{LoginOptions, SessionInfo, SoapSession, StaticSession};

const USAGE: &str = "usage: bulk-load <options.json> <operation> <object> <input.csv | soql> [external-id-field]";

#[derive(Deserialize)]
struct Options {
    login: Option<LoginOptions>,
    session: Option<SessionOptions>,
    #[serde(default)]
    bulk: BulkOptions,
}

#[derive(Deserialize)]
struct SessionOptions {
    instance: String,
    token: String,
}

struct Args {
    options: String,
    operation: Operation,
    object: String,
    input: String,
    external_id: Option<String>,
}

impl Args {
    fn parse() -> Result<Self, Box<dyn Error>> {
        let mut args = std::env::args().skip(1);
        let mut next = |name: &str| args.next().ok_or_else(|| format!("missing {name}\n{USAGE}"));
        let options = next("options file")?;
        let operation = Operation::from_str(&next("operation")?)?;
        let object = next("object")?;
        let input = next("input")?;
        let external_id = args.next();
        Ok(Self {
            options,
            operation,
            object,
            input,
            external_id,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every record succeeded.
async fn run() -> Result<bool, Box<dyn Error>> {
    let args = Args::parse()?;
    let contents = std::fs::read_to_string(&args.options)?;
    let options: Options = serde_json::from_str(&contents)?;
    let config = options.bulk.into_config();

    let mut soap = None;
    let session: Arc<dyn SessionInfo> = match (options.login, options.session) {
        (Some(login), _) => {
            let login = Arc::new(SoapSession::new(login));
            let result = login.connect().await?;
            eprintln!("Logged in to {}", result.instance_url);
            soap = Some(login.clone());
            login
        }
        (None, Some(session)) => Arc::new(StaticSession::new(session.instance, session.token)),
        (None, None) => return Err("options need either \"login\" or \"session\"".into()),
    };

    let client = AsyncBulkClient::connect(session, config)?;
    let outcome = execute(&client, &args).await;

    if let Some(soap) = soap {
        if let Err(e) = soap.disconnect().await {
            tracing::warn!(error = %e, "Logout failed");
        }
    }
    outcome
}

async fn execute(client: &AsyncBulkClient, args: &Args) -> Result<bool, Box<dyn Error>> {
    if args.operation.is_query() {
        let rows = client.query(&args.object, &args.input).await?;
        write_rows(&rows)?;
        eprintln!("{} rows", rows.len());
        return Ok(true);
    }

    let records = read_records(Path::new(&args.input))?;
    let mut request = JobRequest::new(args.operation, &args.object);
    if let Some(field) = &args.external_id {
        request = request.with_external_id_field(field);
    }

    let outcome = client.perform(request, records).await?;
    print_summary(&outcome);
    Ok(outcome.is_successful())
}

fn read_records(path: &Path) -> Result<Vec<Record>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let header = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(header.iter().zip(row.iter()).collect());
    }
    Ok(records)
}

fn write_rows(rows: &[Record]) -> Result<(), Box<dyn Error>> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    let header: Vec<&str> = first.keys().collect();
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(header.iter().map(|key| row.get(key).unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}

fn print_summary(outcome: &OperationResult) {
    let info = outcome.job.info();
    let results = &outcome.results;
    println!("Job {} {}", outcome.job.id(), outcome.job.state().map_or("?", |s| s.as_str()));
    println!("  batches:   {}", outcome.job.batches().len());
    println!("  processed: {}", info.number_records_processed);
    println!("  created:   {}", results.count(ResultFilter::Created));
    println!("  updated:   {}", results.count(ResultFilter::Updated));
    println!("  failed:    {}", results.count(ResultFilter::Error));

    for (line, result) in results.iter().enumerate().filter(|(_, r)| r.is_error()) {
        eprintln!(
            "  row {}: {}",
            line + 1,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}
