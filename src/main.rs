use clap::{Parser as ClapParser, Subcommand};
use rql::{
    NormalizeOptions,
    cli::{self, CheckOptions, CheckResult, CliError},
    output::{to_json, to_json_pretty},
};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "rql")]
#[command(about = "rql - Resource Query Language: query JSON arrays with URL-safe query strings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and execute a query
    Check {
        /// The query to execute, e.g. 'age=lt=30&sort(-age)'
        query: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Value for the next $N placeholder (JSON, or plain text)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,

        /// Primary-key attribute
        #[arg(long)]
        primary_key: Option<String>,
    },

    /// Print the sort, select, paging and primary-key facts of a query
    Normalize {
        query: String,

        /// Ceiling for limit() counts
        #[arg(long)]
        hard_limit: Option<usize>,

        /// Primary-key attribute
        #[arg(long, default_value = "id")]
        primary_key: String,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the canonical form of a query
    Format { query: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            query,
            input,
            params,
            pretty,
            syntax_only,
            primary_key,
        } => run_check(query, input, params, pretty, syntax_only, primary_key),
        Commands::Normalize {
            query,
            hard_limit,
            primary_key,
            pretty,
        } => run_normalize(&query, hard_limit, primary_key, pretty),
        Commands::Format { query } => cli::format_query(&query).map(|canonical| println!("{}", canonical)),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(
    query: String,
    input: Option<String>,
    params: Vec<String>,
    pretty: bool,
    syntax_only: bool,
    primary_key: Option<String>,
) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !syntax_only && !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer)
        }
        None => None,
    };

    let options = CheckOptions {
        query,
        input,
        params,
        syntax_only,
        primary_key,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid(canonical) => println!("Syntax is valid: {}", canonical),
        CheckResult::Success(output) => {
            let json = if pretty { to_json_pretty(&output) } else { to_json(&output) };
            println!("{}", json);
        }
    }
    Ok(())
}

fn run_normalize(
    query: &str,
    hard_limit: Option<usize>,
    primary_key: String,
    pretty: bool,
) -> Result<(), CliError> {
    let mut options = NormalizeOptions::default().primary_key(primary_key);
    options.hard_limit = hard_limit;

    let normalized = cli::normalize_query(query, &options)?;
    let json = if pretty {
        serde_json::to_string_pretty(&normalized)
    } else {
        serde_json::to_string(&normalized)
    }?;
    println!("{}", json);
    Ok(())
}
