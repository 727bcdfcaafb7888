use std::sync::Arc;

use chrono::Utc;

use crate::clients::calendar_client::{CalendarSource, HttpCalendarSource};
use crate::config::BindingConfig;
use crate::error::{CalendarError, ConfigError};
use crate::handlers::http;
use crate::models::timeline::EventTimeline;
use crate::service::command_dispatcher::ItemRegistry;
use crate::service::projection::Projection;
use crate::service::state_sink::{ChannelCache, FanoutSink, LoggingSink, StateSink};
use crate::tasks::scheduler_core::{Collaborators, SchedulerCore};
use crate::tasks::timers::{SystemClock, TokioScheduler};

/// Activates the binding, serves the HTTP surface and tears down on Ctrl-C.
pub async fn run_binding(config: BindingConfig) -> Result<(), ConfigError> {
    let cache = Arc::new(ChannelCache::new());
    let sink = FanoutSink::new(vec![
        cache.clone() as Arc<dyn StateSink>,
        Arc::new(LoggingSink),
    ]);
    let core = SchedulerCore::new(
        config.clone(),
        Collaborators {
            source: Arc::new(HttpCalendarSource::new()),
            scheduler: Arc::new(TokioScheduler),
            clock: Arc::new(SystemClock),
            sink: Arc::new(sink),
            dispatcher: Arc::new(ItemRegistry::new(config.items.clone())),
        },
    );
    core.activate()?;

    tracing::info!(bind = %config.http_bind, "serving channel state");
    let routes = http::routes(core.clone(), cache);
    tokio::select! {
        _ = warp::serve(routes).run(config.http_bind) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }
    core.deactivate().await;
    Ok(())
}

/// One fetch, projected as of now. Arms no timers.
pub async fn project_once(
    config: &BindingConfig,
    source: &dyn CalendarSource,
) -> Result<Projection, CalendarError> {
    let text = source.fetch(&config.url).await?;
    let timeline = EventTimeline::from_ics(&text, config.timezone)?;
    let now = Utc::now();
    Ok(Projection::from_timeline(
        &timeline,
        now,
        Some(now),
        config.notification_offset,
    ))
}
