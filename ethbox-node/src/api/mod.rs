//! HTTP API and read-only gateway exposed by the node.
use std::convert::Infallible;
use std::sync::Arc;

use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::node::Node;

mod error;
mod handlers;
mod server;

pub(crate) use server::ApiServer;

/// Streaming related headers clients may send and read.
pub(crate) const STREAM_HEADERS: &str = "X-Stream-Output, X-Chunked-Output, X-Content-Length";

const MAX_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

fn with_node(node: Arc<Node>) -> impl Filter<Extract = (Arc<Node>,), Error = Infallible> + Clone {
    warp::any().map(move || node.clone())
}

fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_headers(vec![
            "content-type",
            "x-stream-output",
            "x-chunked-output",
            "x-content-length",
        ])
}

/// Routes of the `/api/v0` listener.
pub(crate) fn api_routes(
    node: Arc<Node>
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static {
    // go-ipfs style clients POST every command, older ones GET.
    let command = warp::get().or(warp::post()).unify();

    let block_get = warp::path!("api" / "v0" / "block" / "get")
        .and(command.clone())
        .and(warp::query::<handlers::ArgQuery>())
        .and(with_node(node.clone()))
        .and_then(handlers::block_get);

    let block_stat = warp::path!("api" / "v0" / "block" / "stat")
        .and(command.clone())
        .and(warp::query::<handlers::ArgQuery>())
        .and(with_node(node.clone()))
        .and_then(handlers::block_stat);

    let block_put = warp::path!("api" / "v0" / "block" / "put")
        .and(warp::post())
        .and(warp::query::<handlers::PutQuery>())
        .and(warp::body::content_length_limit(MAX_BLOCK_SIZE))
        .and(warp::body::bytes())
        .and(with_node(node.clone()))
        .and_then(handlers::block_put);

    let block_rm = warp::path!("api" / "v0" / "block" / "rm")
        .and(command.clone())
        .and(warp::query::<handlers::ArgQuery>())
        .and(with_node(node.clone()))
        .and_then(handlers::block_rm);

    let refs_local = warp::path!("api" / "v0" / "refs" / "local")
        .and(command.clone())
        .and(with_node(node.clone()))
        .and_then(handlers::refs_local);

    let version = warp::path!("api" / "v0" / "version")
        .and(command.clone())
        .and_then(handlers::version);

    let id = warp::path!("api" / "v0" / "id")
        .and(command)
        .and(with_node(node))
        .and_then(handlers::id);

    block_get
        .or(block_stat)
        .or(block_put)
        .or(block_rm)
        .or(refs_local)
        .or(version)
        .or(id)
        .recover(error::handle_rejection)
        .with(cors())
        .with(warp::reply::with::header("Access-Control-Allow-Headers", STREAM_HEADERS))
        .with(warp::reply::with::header("Access-Control-Expose-Headers", STREAM_HEADERS))
}

/// Routes of the read-only gateway listener.
pub(crate) fn gateway_routes(
    node: Arc<Node>
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static {
    warp::path!("ipfs" / String)
        .and(warp::get())
        .and(with_node(node))
        .and_then(handlers::gateway_get)
        .recover(error::handle_rejection)
        .with(cors())
        .with(warp::reply::with::header("Access-Control-Allow-Headers", STREAM_HEADERS))
        .with(warp::reply::with::header("Access-Control-Expose-Headers", STREAM_HEADERS))
}
