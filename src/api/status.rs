use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use warp::http::Method;
use warp::http::StatusCode;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::metrics::gather_metrics;
use crate::store::WorkloadStore;
use crate::Result;

/// `/status` answers GET with the store snapshot and every other method
/// with 405. `/metrics` serves the Prometheus text format.
pub fn routes(
    store: Arc<WorkloadStore>
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let status = warp::path!("status")
        .and(warp::method())
        .and(with_store(store))
        .map(status_handler);

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .map(gather_metrics);

    status.or(metrics)
}

fn with_store(
    store: Arc<WorkloadStore>
) -> impl Filter<Extract = (Arc<WorkloadStore>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn status_handler(
    method: Method,
    store: Arc<WorkloadStore>,
) -> warp::reply::Response {
    if method != Method::GET {
        return warp::reply::with_status("method not allowed", StatusCode::METHOD_NOT_ALLOWED)
            .into_response();
    }
    warp::reply::json(&store.get_workloads()).into_response()
}

/// Binds the status server on `addr`; the returned future serves until
/// `cancel` fires.
pub fn bind_status_server(
    addr: SocketAddr,
    store: Arc<WorkloadStore>,
    cancel: CancellationToken,
) -> Result<(SocketAddr, impl Future<Output = ()>)> {
    let (bound, server) = warp::serve(routes(store))
        .try_bind_with_graceful_shutdown(addr, async move { cancel.cancelled().await })?;
    info!("Status server listening on {}", bound);
    Ok((bound, server))
}
