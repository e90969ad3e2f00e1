use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;

/// Local HTTP target for `loadr` demos.
#[derive(Debug, Parser)]
#[command(name = "loadr-testserver", version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let listener = TcpListener::bind(args.bind).await?;
    let addr = listener.local_addr()?;
    let app = loadr_testserver::router(loadr_testserver::TestServerStats::default());

    // Scripts wait for this line before starting a run.
    println!("HTTP_URL=http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
