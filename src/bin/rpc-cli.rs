use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "rpc-cli")]
#[command(about = "Management CLI for the RPC connection manager", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "RPC_MANAGER_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show endpoint health and the current endpoint
    Status,
    /// Register a new upstream endpoint
    Add { endpoint: String },
    /// Remove an upstream endpoint and its stats
    Remove { endpoint: String },
    /// Clear an endpoint's errors and route traffic to it now
    Prioritize { endpoint: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let endpoints_url = format!("{}/admin/endpoints", cli.url);
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Add { endpoint } => client
            .post(&endpoints_url)
            .json(&json!({ "url": endpoint })),
        Commands::Remove { endpoint } => client
            .delete(&endpoints_url)
            .json(&json!({ "url": endpoint })),
        Commands::Prioritize { endpoint } => client
            .post(format!("{}/prioritize", endpoints_url))
            .json(&json!({ "url": endpoint })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
