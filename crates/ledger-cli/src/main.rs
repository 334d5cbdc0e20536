use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the ledger node control API")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:3001)
    #[arg(long, global = true, default_value = "http://127.0.0.1:3001")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's chain
    Blocks,
    /// Mine a block carrying the given payload
    Mine {
        /// Block payload
        #[arg(long)]
        data: String,
    },
    /// List connected peers
    Peers,
    /// Ask the node to connect to a peer
    AddPeer {
        /// Peer websocket URL (e.g. ws://127.0.0.1:6002)
        #[arg(long)]
        peer: String,
    },
}

#[derive(Serialize)]
struct MineOut {
    data: String,
}

#[derive(Serialize)]
struct PeerOut {
    peer: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let node = cli.node.trim_end_matches('/');
    let res = match cli.cmd {
        Command::Blocks => client.get(format!("{node}/blocks")).send().await?,
        Command::Mine { data } => {
            client
                .post(format!("{node}/mineBlock"))
                .json(&MineOut { data })
                .send()
                .await?
        }
        Command::Peers => client.get(format!("{node}/peers")).send().await?,
        Command::AddPeer { peer } => {
            client
                .post(format!("{node}/addPeer"))
                .json(&PeerOut { peer })
                .send()
                .await?
        }
    };

    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
