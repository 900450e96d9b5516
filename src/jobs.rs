use apalis::cron::CronStream;
use apalis::prelude::*;
use apalis::utils::TokioExecutor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::{modules, types};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick(DateTime<Utc>);

impl From<DateTime<Utc>> for Tick {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t)
    }
}

impl Job for Tick {
    const NAME: &'static str = "drivehub::jobs::Tick";
}

/// Expired otp records are reclaimed on a timer; `verify` checks expiry
/// itself, so this is housekeeping, not a correctness requirement.
pub fn monitor(ctx: Arc<types::Context>) -> Monitor<TokioExecutor> {
    let schedule =
        apalis::cron::Schedule::from_str("0 */10 * * * *").expect("Invalid reaper schedule");

    let reaper_ctx = ctx.clone();
    let worker = WorkerBuilder::new("otp-reaper")
        .stream(CronStream::new(schedule).into_stream())
        .build_fn(move |_tick: Tick| {
            let ctx = reaper_ctx.clone();
            async move {
                modules::auth::service::otp::reap_expired(ctx).await;
                Ok::<(), apalis::prelude::Error>(())
            }
        });

    Monitor::<TokioExecutor>::new().register_with_count(1, worker)
}
