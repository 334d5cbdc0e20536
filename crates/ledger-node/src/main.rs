use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use ledger_core::{chain::Chain, constants::HASH_HEX_SIZE, genesis_block, Block};
use ledger_p2p::{Node, P2pError};
use ledger_storage::MemoryStore;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "Proof-of-work ledger peer")]
struct Args {
    /// Address of the HTTP control API, e.g. 127.0.0.1:3001
    #[arg(long, env = "HTTP_LISTEN", default_value = "127.0.0.1:3001")]
    http_listen: String,

    /// Address to accept websocket peers on, e.g. 127.0.0.1:6001
    #[arg(long, env = "P2P_LISTEN", default_value = "127.0.0.1:6001")]
    p2p_listen: String,

    /// Peers to dial at startup, e.g. ws://127.0.0.1:6002
    #[arg(long, env = "PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Clone)]
struct AppState {
    node: Node<MemoryStore>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
struct MineIn {
    data: String,
}

#[derive(Deserialize)]
struct PeerIn {
    peer: String,
}

#[derive(Serialize)]
struct PeerAdded {
    peer: String,
    connection: String,
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<P2pError> for ApiError {
    fn from(err: P2pError) -> Self {
        let status = match err {
            P2pError::WebSocket(_) | P2pError::Io(_) => StatusCode::BAD_GATEWAY,
            P2pError::Chain(ledger_core::ChainError::MiningAborted)
            | P2pError::Chain(ledger_core::ChainError::StaleHead) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, err.to_string())
    }
}

impl From<ledger_core::ChainError> for ApiError {
    fn from(err: ledger_core::ChainError) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

async fn blocks(State(state): State<AppState>) -> Result<Json<Vec<Block>>, ApiError> {
    Ok(Json(state.node.current_chain()?))
}

async fn mine_block(
    State(state): State<AppState>,
    Json(body): Json<MineIn>,
) -> Result<Json<Block>, ApiError> {
    Ok(Json(state.node.mine_new_block(body.data).await?))
}

async fn peers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.node.list_peers())
}

async fn add_peer(
    State(state): State<AppState>,
    Json(body): Json<PeerIn>,
) -> Result<Json<PeerAdded>, ApiError> {
    let id = state.node.add_peer(&body.peer).await?;
    Ok(Json(PeerAdded {
        peer: body.peer,
        connection: id.to_string(),
    }))
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// `/` and `/add-peers` are kept as aliases for older clients.
fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/blocks", get(blocks))
        .route("/mineBlock", post(mine_block))
        .route("/peers", get(peers))
        .route("/addPeer", post(add_peer))
        .route("/add-peers", post(add_peer))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let genesis = genesis_block();
    if genesis.hash.len() != HASH_HEX_SIZE {
        warn!(
            "genesis hash is {} hex digits, expected {}; it is matched verbatim",
            genesis.hash.len(),
            HASH_HEX_SIZE
        );
    }

    let chain = Chain::new(Arc::new(MemoryStore::new()));
    chain.ensure_genesis()?;
    let node = Node::new(chain);

    let p2p_addr = node.listen(&args.p2p_listen).await?;
    info!("p2p listening on ws://{p2p_addr}");

    for peer in args.peers.iter().filter(|p| !p.is_empty()) {
        let node = node.clone();
        let peer = peer.clone();
        tokio::spawn(async move {
            if let Err(e) = node.add_peer(&peer).await {
                warn!("bootstrap peer {} unreachable: {}", peer, e);
            }
        });
    }

    let app = router(AppState { node });

    let addr: SocketAddr = args.http_listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
