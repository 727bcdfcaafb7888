use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::models::channel::{BindingStatus, ChannelId, ChannelState};
use crate::service::state_sink::ChannelCache;
use crate::tasks::scheduler_core::SchedulerCore;

#[derive(Debug, Serialize)]
struct ChannelView {
    channel: ChannelId,
    /// `None` until the first reconcile publishes the channel.
    state: Option<ChannelState>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// `GET /channels`, `GET /channels/{id}`, `POST /channels/{id}/refresh`, `GET /status`.
pub fn routes(
    core: Arc<SchedulerCore>,
    cache: Arc<ChannelCache>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("channels")
        .and(warp::get())
        .and(with_cache(cache.clone()))
        .map(|cache: Arc<ChannelCache>| {
            let views: Vec<ChannelView> = cache
                .snapshot()
                .into_iter()
                .map(|(channel, state)| ChannelView { channel, state })
                .collect();
            warp::reply::json(&views)
        });

    let single = warp::path!("channels" / String)
        .and(warp::get())
        .and(with_cache(cache.clone()))
        .map(|id: String, cache: Arc<ChannelCache>| match id.parse::<ChannelId>() {
            Ok(channel) => warp::reply::with_status(
                warp::reply::json(&ChannelView {
                    channel,
                    state: cache.get(channel),
                }),
                StatusCode::OK,
            ),
            Err(error) => not_found(error),
        });

    let refresh = warp::path!("channels" / String / "refresh")
        .and(warp::post())
        .and(with_core(core))
        .and(with_cache(cache.clone()))
        .map(
            |id: String, core: Arc<SchedulerCore>, cache: Arc<ChannelCache>| match id
                .parse::<ChannelId>()
            {
                Ok(channel) => {
                    core.refresh_channel(channel);
                    warp::reply::with_status(
                        warp::reply::json(&ChannelView {
                            channel,
                            state: cache.get(channel),
                        }),
                        StatusCode::OK,
                    )
                }
                Err(error) => not_found(error),
            },
        );

    let status = warp::path!("status")
        .and(warp::get())
        .and(with_cache(cache))
        .map(|cache: Arc<ChannelCache>| {
            let status: BindingStatus = cache.status();
            warp::reply::json(&status)
        });

    list.or(single).or(refresh).or(status)
}

fn not_found(error: String) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error }), StatusCode::NOT_FOUND)
}

fn with_core(
    core: Arc<SchedulerCore>,
) -> impl Filter<Extract = (Arc<SchedulerCore>,), Error = Infallible> + Clone {
    warp::any().map(move || core.clone())
}

fn with_cache(
    cache: Arc<ChannelCache>,
) -> impl Filter<Extract = (Arc<ChannelCache>,), Error = Infallible> + Clone {
    warp::any().map(move || cache.clone())
}
