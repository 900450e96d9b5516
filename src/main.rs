use drivehub_backend_rs::{
    app::App,
    jobs,
    types::{Config, Context, ToContext},
};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let ctx: Arc<Context> = Arc::new(Config::default().to_context().await);

    let app = App::new(ctx.clone());

    let http = app.serve();
    let job_monitor = async {
        jobs::monitor(ctx.clone())
            .run()
            .await
            .expect("Job monitor exited")
    };

    tokio::join!(http, job_monitor);
}
