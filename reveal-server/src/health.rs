use warp::Filter;

/// Liveness probe. Ported from the raw TCP health listener pattern to a warp
/// filter since the process already runs a warp server for the main surface.
pub fn route() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
	warp::path("health").and(warp::get()).map(|| warp::reply::with_status("ok", warp::http::StatusCode::OK))
}
