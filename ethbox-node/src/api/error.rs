use std::convert::Infallible;

use ethbox_fetch::FetchError;
use ethbox_store::StoreError;
use serde_derive::Serialize;
use tracing::debug;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::Rejection;
use warp::Reply;

use crate::metrics::Metrics;

/// Failure of an API call, rendered as an error body by [`handle_rejection`].
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl Reject for ApiError {}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Maps a store failure of `route`, counting it.
    pub(crate) fn store(
        route: &'static str,
        err: StoreError,
    ) -> Rejection {
        let (status, kind) = match &err {
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::Remote(FetchError::RemoteFetch {
                status: 404, ..
            }) => (StatusCode::NOT_FOUND, "remote_not_found"),
            StoreError::Remote(fetch) => (StatusCode::BAD_GATEWAY, fetch.kind()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
        };
        Metrics::new().increment_api_errors(route, kind);
        warp::reject::custom(Self {
            status,
            message: err.to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    message: String,
    code: u8,
    r#type: &'static str,
}

/// Renders rejections as `{"Message", "Code", "Type"}` bodies.
pub(crate) async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api) = err.find::<ApiError>() {
        (api.status, api.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "404 page not found".to_string())
    } else if let Some(query) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, query.to_string())
    } else if let Some(length) = err.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, length.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        debug!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:?}"))
    };

    let body = ErrorBody {
        message,
        code: 0,
        r#type: "error",
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
