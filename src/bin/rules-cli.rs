use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "rules-cli")]
#[command(about = "Management CLI for the Traefik config manager", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all rules
    List,
    /// Show one rule
    Get { id: String },
    /// Print a rule's YAML file
    Yaml { id: String },
    /// Delete a rule and its file
    Delete { id: String },
    /// Reconcile the index with the dynamic directory
    Resync,
    /// List middleware names referenced by rules
    Middlewares,
    /// Check manager health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::List => {
            let res = client.get(format!("{}/api/rules", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Get { id } => {
            let res = client.get(format!("{}/api/rules/{}", base, id)).send().await?;
            print_json(res).await?;
        }
        Commands::Yaml { id } => {
            let res = client
                .get(format!("{}/api/rules/{}/yaml", base, id))
                .send()
                .await?;
            if check_status(&res) {
                print!("{}", res.text().await?);
            } else {
                print_error(res).await;
            }
        }
        Commands::Delete { id } => {
            let res = client
                .delete(format!("{}/api/rules/{}", base, id))
                .send()
                .await?;
            if res.status() == StatusCode::NO_CONTENT {
                println!("Deleted {}", id);
            } else {
                print_error(res).await;
            }
        }
        Commands::Resync => {
            let res = client.post(format!("{}/api/resync", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Middlewares => {
            let res = client.get(format!("{}/api/middlewares", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_json(res).await?;
        }
    }

    Ok(())
}

fn check_status(res: &reqwest::Response) -> bool {
    res.status().is_success()
}

async fn print_error(res: reqwest::Response) {
    eprintln!("Error: API returned status {}", res.status());
    if let Ok(text) = res.text().await {
        eprintln!("Response: {}", text);
    }
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !check_status(&res) {
        print_error(res).await;
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
