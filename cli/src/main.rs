//! steemrpc CLI: call node methods and follow the chain from the terminal.
//!
//! Usage:
//! ```bash
//! # Call a catalog method
//! steemrpc call --transport http --url https://api.steemit.com \
//!     --method get_block --params '[1]'
//!
//! # Current head / irreversible block number
//! steemrpc head --mode irreversible
//!
//! # Follow operations as they are produced
//! steemrpc stream --kind operations --count 20
//! ```

use std::env;
use std::process;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use steemrpc_api::{ClientOptions, MethodCatalog, Steem, StreamConfig, StreamMode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "head" => cmd_head(&args[2..]).await,
        "stream" => cmd_stream(&args[2..]).await,
        "methods" => {
            cmd_methods();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("steemrpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("steemrpc {}", env!("CARGO_PKG_VERSION"));
    println!("Call Steem node methods and follow the chain\n");
    println!("USAGE:");
    println!("    steemrpc <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    call       Call a catalog method");
    println!("    head       Print the current block number");
    println!("    stream     Follow block numbers, blocks, transactions or operations");
    println!("    methods    List catalog methods");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("GLOBAL FLAGS:");
    println!("    --transport <http|ws>   Transport (default: $STEEMRPC_TRANSPORT or ws)");
    println!("    --url <URL>             Node endpoint for the selected transport\n");
    println!("CALL FLAGS:");
    println!("    --method <NAME>         Local method name, e.g. get_block  [required]");
    println!("    --params <JSON>         Positional arguments as a JSON array\n");
    println!("HEAD / STREAM FLAGS:");
    println!("    --mode <head|irreversible>");
    println!("    --kind <numbers|blocks|transactions|operations>  (stream, default: numbers)");
    println!("    --interval <MS>         Poll interval (stream, default: 200)");
    println!("    --count <N>             Stop after N items (stream)");
}

/// Client options from the environment, overridden by `--transport` / `--url`.
fn client(args: &[String]) -> Result<Steem, String> {
    let mut options = ClientOptions::from_env();
    if let Some(transport) = parse_flag(args, "--transport") {
        options.transport = Some(transport);
    }
    if let Some(url) = parse_flag(args, "--url") {
        match options.transport_kind().map_err(|e| e.to_string())? {
            steemrpc_api::TransportKind::Http => options.transport_options.uri = url,
            steemrpc_api::TransportKind::Ws => options.transport_options.websocket = url,
        }
    }
    Steem::new(options).map_err(|e| e.to_string())
}

fn parse_mode(args: &[String]) -> Result<StreamMode, String> {
    match parse_flag(args, "--mode") {
        Some(mode) => mode.parse().map_err(|e: steemrpc_api::Error| e.to_string()),
        None => Ok(StreamMode::Head),
    }
}

async fn cmd_call(args: &[String]) -> Result<(), String> {
    let method = parse_flag(args, "--method").ok_or("--method is required")?;
    let params = match parse_flag(args, "--params") {
        Some(raw) => match serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string())? {
            Value::Array(items) => items,
            other => vec![other],
        },
        None => Vec::new(),
    };

    let steem = client(args)?;
    let result = steem.call(&method, params).await.map_err(|e| e.to_string());
    steem.stop().await;

    println!("{}", serde_json::to_string_pretty(&result?).unwrap_or_default());
    Ok(())
}

async fn cmd_head(args: &[String]) -> Result<(), String> {
    let mode = parse_mode(args)?;
    let steem = client(args)?;

    let start = std::time::Instant::now();
    let props = steem
        .get_dynamic_global_properties()
        .await
        .map_err(|e| e.to_string());
    let latency = start.elapsed();
    steem.stop().await;
    let props = props?;

    println!("  Endpoint:     {}", steem.transport().url());
    println!("  Block number: {} ({mode})", mode.select(&props));
    println!("  Latency:      {}ms", latency.as_millis());
    Ok(())
}

async fn cmd_stream(args: &[String]) -> Result<(), String> {
    let mut config = StreamConfig {
        mode: parse_mode(args)?,
        ..StreamConfig::default()
    };
    if let Some(ms) = parse_flag(args, "--interval") {
        let ms: u64 = ms.parse().map_err(|_| format!("invalid --interval {ms:?}"))?;
        config = config.with_interval(Duration::from_millis(ms));
    }
    let count = match parse_flag(args, "--count") {
        Some(n) => Some(n.parse::<usize>().map_err(|_| format!("invalid --count {n:?}"))?),
        None => None,
    };
    let kind = parse_flag(args, "--kind").unwrap_or_else(|| "numbers".into());

    let steem = client(args)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<Value, String>>();
    let handle = match kind.as_str() {
        "numbers" => steem.stream_block_number(config, move |item| {
            let _ = tx.send(item.map(Value::from).map_err(|e| e.to_string()));
        }),
        "blocks" => steem.stream_block(config, move |item| {
            let _ = tx.send(
                item.map_err(|e| e.to_string())
                    .and_then(|b| serde_json::to_value(b).map_err(|e| e.to_string())),
            );
        }),
        "transactions" => steem.stream_transactions(config, move |item| {
            let _ = tx.send(
                item.map_err(|e| e.to_string())
                    .and_then(|t| serde_json::to_value(t).map_err(|e| e.to_string())),
            );
        }),
        "operations" => steem.stream_operations(config, move |item| {
            let _ = tx.send(item.map_err(|e| e.to_string()));
        }),
        other => return Err(format!("unknown --kind {other:?}")),
    };

    let mut seen = 0usize;
    let outcome = loop {
        if count.is_some_and(|n| seen >= n) {
            break Ok(());
        }
        let item = tokio::select! {
            item = rx.recv() => item,
            _ = tokio::signal::ctrl_c() => break Ok(()),
        };
        match item {
            Some(Ok(value)) => {
                println!("{value}");
                seen += 1;
            }
            Some(Err(e)) => break Err(e),
            None => break Ok(()),
        }
    };

    handle.cancel();
    steem.stop().await;
    tracing::debug!(kind = %kind, items = seen, "stream finished");
    outcome
}

fn cmd_methods() {
    let catalog = MethodCatalog::builtin();
    println!("{} methods:\n", catalog.len());
    for descriptor in catalog.iter() {
        println!(
            "  {:<45} {:<24} [{}]",
            descriptor.name(),
            descriptor.endpoint,
            descriptor.params.join(", ")
        );
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
