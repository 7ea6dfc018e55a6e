use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Management CLI for the edge control plane", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Node sync API base URL
    #[arg(short, long, default_value = "http://localhost:8080")]
    sync_url: String,

    /// Admin bearer key
    #[arg(short, long, env = "EDGE_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check control plane status
    Status,
    /// List nodes or clusters with unapplied changes
    Pending {
        #[arg(long, default_value = "nodes")]
        scope: String,
    },
    /// Print the composed config of an entity
    Compose {
        /// cluster, node, server, group, reverse-proxy or origin
        kind: String,
        id: i64,
    },
    /// Run the health check of a cluster
    Health { cluster_id: i64 },
    /// List recorded operator messages
    Messages,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.key))?);

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Pending { scope } => {
            client
                .get(format!("{}/api/v1/sync/pending", cli.sync_url))
                .query(&[("scope", scope)])
                .send()
                .await?
        }
        Commands::Compose { kind, id } => {
            client
                .get(format!("{}/api/v1/sync/config/{}/{}", cli.sync_url, kind, id))
                .send()
                .await?
        }
        Commands::Health { cluster_id } => {
            client
                .post(format!("{}/admin/clusters/{}/health-check/execute", cli.url, cluster_id))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Messages => {
            client
                .get(format!("{}/admin/messages", cli.url))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
