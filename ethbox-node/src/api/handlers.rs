use std::sync::Arc;

use bytes::Bytes;
use ethbox_cid::Codec;
use ethbox_cid::ContentIdentifier;
use ethbox_cid::HashFunction;
use serde_derive::Deserialize;
use serde_json::json;
use warp::Rejection;
use warp::Reply;

use crate::api::error::ApiError;
use crate::metrics::Metrics;
use crate::node::Node;
use crate::node::PutError;

const DEFAULT_PUT_FORMAT: Codec = Codec::DagPb;
const DEFAULT_PUT_HASH: HashFunction = HashFunction::Sha2_256;

#[derive(Deserialize, Debug)]
pub(crate) struct ArgQuery {
    pub(crate) arg: String,
}

/// Unknown names fail the query extraction itself and surface as a 400.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct PutQuery {
    pub(crate) format: Option<Codec>,
    pub(crate) mhtype: Option<HashFunction>,
}

/// Accepts both a bare identifier and an `/ipfs/<cid>` path.
fn parse_identifier(arg: &str) -> Result<ContentIdentifier, Rejection> {
    let arg = arg.strip_prefix("/ipfs/").unwrap_or(arg);
    arg.parse().map_err(|err| {
        warp::reject::custom(ApiError::bad_request(format!(
            "invalid content identifier `{arg}`: {err}"
        )))
    })
}

pub(crate) async fn block_get(
    query: ArgQuery,
    node: Arc<Node>,
) -> Result<impl Reply, Rejection> {
    let metrics = Metrics::new();
    metrics.increment_api_requests("block/get");

    let id = parse_identifier(&query.arg)?;
    let data = node
        .block_get(&id)
        .await
        .map_err(|err| ApiError::store("block/get", err))?;
    metrics.observe_block_size("block/get", data.len());

    Ok(data.to_vec())
}

pub(crate) async fn block_stat(
    query: ArgQuery,
    node: Arc<Node>,
) -> Result<impl Reply, Rejection> {
    Metrics::new().increment_api_requests("block/stat");

    let id = parse_identifier(&query.arg)?;
    let stat = node
        .block_stat(&id)
        .await
        .map_err(|err| ApiError::store("block/stat", err))?;

    Ok(warp::reply::json(&stat))
}

pub(crate) async fn block_put(
    query: PutQuery,
    body: Bytes,
    node: Arc<Node>,
) -> Result<impl Reply, Rejection> {
    let metrics = Metrics::new();
    metrics.increment_api_requests("block/put");

    let format = query.format.unwrap_or(DEFAULT_PUT_FORMAT);
    let mhtype = query.mhtype.unwrap_or(DEFAULT_PUT_HASH);

    let size = body.len();
    let id = node
        .block_put(body, format, mhtype)
        .await
        .map_err(|err| {
            match err {
                PutError::Store(err) => ApiError::store("block/put", err),
                err => warp::reject::custom(ApiError::bad_request(err.to_string())),
            }
        })?;
    metrics.observe_block_size("block/put", size);

    Ok(warp::reply::json(&json!({
        "Key": id.to_string(),
        "Size": size,
    })))
}

pub(crate) async fn block_rm(
    query: ArgQuery,
    node: Arc<Node>,
) -> Result<impl Reply, Rejection> {
    Metrics::new().increment_api_requests("block/rm");

    let id = parse_identifier(&query.arg)?;
    node.block_rm(&id)
        .await
        .map_err(|err| ApiError::store("block/rm", err))?;

    Ok(warp::reply::json(&json!({ "Hash": id.to_string() })))
}

/// Newline delimited `{"Ref", "Err"}` objects, one per local block.
pub(crate) async fn refs_local(node: Arc<Node>) -> Result<impl Reply, Rejection> {
    Metrics::new().increment_api_requests("refs/local");

    let refs = node
        .refs_local()
        .await
        .map_err(|err| ApiError::store("refs/local", err))?;

    let mut body = String::new();
    for id in refs {
        body.push_str(&json!({ "Ref": id.to_string(), "Err": "" }).to_string());
        body.push('\n');
    }

    let reply = warp::reply::with_header(body, "Content-Type", "application/json");
    Ok(warp::reply::with_header(reply, "X-Chunked-Output", "1"))
}

pub(crate) async fn version() -> Result<impl Reply, Rejection> {
    Metrics::new().increment_api_requests("version");

    Ok(warp::reply::json(&json!({
        "Version": env!("CARGO_PKG_VERSION"),
        "System": format!("{}/{}", std::env::consts::ARCH, std::env::consts::OS),
    })))
}

pub(crate) async fn id(node: Arc<Node>) -> Result<impl Reply, Rejection> {
    Metrics::new().increment_api_requests("id");

    let addresses = &node.repo().config().addresses;
    let api = node
        .repo()
        .api_addr()
        .unwrap_or_else(|| addresses.api.clone());

    Ok(warp::reply::json(&json!({
        "AgentVersion": format!("ethbox/{}", env!("CARGO_PKG_VERSION")),
        "Addresses": [api, addresses.gateway.clone()],
    })))
}

/// Serves the raw bytes of a block under `/ipfs/<cid>`.
pub(crate) async fn gateway_get(
    cid: String,
    node: Arc<Node>,
) -> Result<impl Reply, Rejection> {
    let metrics = Metrics::new();
    metrics.increment_api_requests("gateway");

    let id = parse_identifier(&cid)?;
    let data = node
        .block_get(&id)
        .await
        .map_err(|err| ApiError::store("gateway", err))?;
    metrics.observe_block_size("gateway", data.len());

    let reply = warp::reply::with_header(data.to_vec(), "X-Content-Length", data.len().to_string());
    Ok(warp::reply::with_header(reply, "Cache-Control", "public, max-age=29030400, immutable"))
}
