use anyhow::Result;
use clap::{Parser, Subcommand};
use flockmem::{parse_command, Command, Session};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memctl")]
#[command(about = "CLI for reading and writing flockmem addresses")]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:9000")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Status,
    Read {
        address: u32,

        #[arg(short, long)]
        sequence: Option<u64>,
    },
    Write {
        address: u32,
        value: i64,
    },
    /// Runs `read <addr>` / `write <addr> <value>` lines from a file in one session.
    Script {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base_url = cli.addr;

    match cli.command {
        Commands::Status => {
            let resp: Value = client
                .get(format!("{}/status", base_url))
                .send()
                .await?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Commands::Read { address, sequence } => {
            let resp = read(&client, &base_url, address, sequence).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Commands::Write { address, value } => {
            let resp = write(&client, &base_url, address, value, None).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Commands::Script { file } => {
            let script = std::fs::read_to_string(&file)?;
            let mut session = Session::new();

            for line in script.lines() {
                let command = match parse_command(line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(reason) => {
                        eprintln!("Invalid command {:?}: {}", line.trim(), reason);
                        continue;
                    }
                };

                match command {
                    Command::Read { address } => {
                        let known = session.known_sequence(address);
                        let resp = read(&client, &base_url, address.value(), Some(known)).await?;
                        if let Some(error) = resp["error"].as_str() {
                            eprintln!("Read of address {} failed: {}", address, error);
                            continue;
                        }
                        println!("Value at address {}: {}", address, resp["value"]);
                    }
                    Command::Write { address, value } => {
                        let known = session.known_sequence(address);
                        let resp =
                            write(&client, &base_url, address.value(), value, Some(known)).await?;
                        if let Some(error) = resp["error"].as_str() {
                            eprintln!("Write of {} at address {} failed: {}", value, address, error);
                            continue;
                        }
                        if let Some(sequence) = resp["sequence"].as_u64() {
                            session.observe(address, sequence);
                        }
                        println!("Wrote {} at address {}: {}", value, address, resp);
                    }
                }
            }
            println!("Finished processing {:?}", file);
        }
    }

    Ok(())
}

async fn read(
    client: &reqwest::Client,
    base_url: &str,
    address: u32,
    sequence: Option<u64>,
) -> Result<Value> {
    let body = serde_json::json!({ "address": address, "sequence": sequence });
    let resp: Value = client
        .post(format!("{}/read", base_url))
        .json(&body)
        .send()
        .await?
        .json()
        .await?;
    Ok(resp)
}

async fn write(
    client: &reqwest::Client,
    base_url: &str,
    address: u32,
    value: i64,
    sequence: Option<u64>,
) -> Result<Value> {
    let body = serde_json::json!({ "address": address, "value": value, "sequence": sequence });
    let resp: Value = client
        .post(format!("{}/write", base_url))
        .json(&body)
        .send()
        .await?
        .json()
        .await?;
    Ok(resp)
}
