use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use forward_proxy::observability::feed::FeedPage;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Control plane CLI for the forward proxy", long_about = None)]
struct Cli {
    /// Base URL of the admin API.
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// Admin bearer token.
    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DimensionArg {
    Ip,
    Url,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Whitelist,
    Blacklist,
}

#[derive(Subcommand)]
enum Commands {
    /// Show proxy status
    Status,
    /// Show the four access lists
    Policy,
    /// Replace one access list with comma-separated entries
    SetPolicy {
        #[arg(value_enum)]
        dimension: DimensionArg,
        #[arg(value_enum)]
        kind: KindArg,
        /// e.g. "10.0.0.1, 10.0.0.2"; empty clears the list
        #[arg(default_value = "")]
        entries: String,
    },
    /// Show cache size and settings
    Cache,
    /// Change cache TTL or switch caching on/off
    SetCache {
        #[arg(long)]
        ttl: Option<u64>,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Drop every cached response
    ClearCache,
    /// Stop accepting proxy connections
    Pause,
    /// Accept proxy connections again
    Resume,
    /// Print the request log
    Logs {
        /// Keep polling for new lines
        #[arg(short, long)]
        follow: bool,
        #[arg(long, default_value_t = 1)]
        interval_secs: u64,
        /// Show at most this many of the most recent lines per poll
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
}

impl DimensionArg {
    fn as_path(self) -> &'static str {
        match self {
            DimensionArg::Ip => "ip",
            DimensionArg::Url => "url",
        }
    }
}

impl KindArg {
    fn as_path(self) -> &'static str {
        match self {
            KindArg::Whitelist => "whitelist",
            KindArg::Blacklist => "blacklist",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/admin/status")).send().await?;
            print_response(res).await?;
        }
        Commands::Policy => {
            let res = client.get(format!("{base}/admin/policy")).send().await?;
            print_response(res).await?;
        }
        Commands::SetPolicy {
            dimension,
            kind,
            entries,
        } => {
            let res = client
                .put(format!(
                    "{base}/admin/policy/{}/{}",
                    dimension.as_path(),
                    kind.as_path()
                ))
                .json(&json!({ "raw": entries }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Cache => {
            let res = client.get(format!("{base}/admin/cache")).send().await?;
            print_response(res).await?;
        }
        Commands::SetCache {
            ttl,
            enable,
            disable,
        } => {
            let enabled = match (enable, disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let res = client
                .put(format!("{base}/admin/cache/settings"))
                .json(&json!({ "ttl_secs": ttl, "enabled": enabled }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ClearCache => {
            let res = client.delete(format!("{base}/admin/cache")).send().await?;
            print_response(res).await?;
        }
        Commands::Pause => set_running(&client, base, false).await?,
        Commands::Resume => set_running(&client, base, true).await?,
        Commands::Logs {
            follow,
            interval_secs,
            limit,
        } => {
            let mut cursor = 0;
            loop {
                let res = client
                    .get(format!("{base}/admin/logs"))
                    .query(&[("since", cursor.to_string()), ("limit", limit.to_string())])
                    .send()
                    .await?;
                if !res.status().is_success() {
                    return print_response(res).await;
                }
                let page: FeedPage = res.json().await?;
                for line in &page.lines {
                    println!("{:>6}  {}", line.seq, line.message);
                }
                cursor = page.next;

                if !follow {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(interval_secs.max(1))).await;
            }
        }
    }

    Ok(())
}

async fn set_running(
    client: &reqwest::Client,
    base: &str,
    running: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let res = client
        .put(format!("{base}/admin/listener"))
        .json(&json!({ "running": running }))
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
