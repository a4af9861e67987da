mod args;

use std::{io::Write, sync::Arc, time::Duration};

use clap::Parser;
use env_logger::{Builder, Env};

use ws_rs::{
    context::Ctx,
    net::lookup_host,
    tcp::{ws_serve, ServerConfig},
};

use args::Args;

#[tokio::main]
async fn main() {
    // 1. Parses the command line arguments and initializes logger
    let args = Args::parse();

    init_logger(args.verbose);

    let listen_addr = match lookup_host(&args.listen_addr).await {
        Ok(addr) => addr,
        Err(e) => {
            log::error!("Resolve {} failed: {}", args.listen_addr, e);
            return;
        }
    };

    // 2. Prepares the server configuration and shared context
    let config = ServerConfig {
        path: args.path,
        buf_capacity: args.buf_capacity,
        timeout: Duration::from_secs(args.timeout),
    };

    let ctx = Arc::new(Ctx::new());

    // 3. Starts the WebSocket endpoint
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        res = ws_serve(listen_addr, config, ctx) => {
            match res {
                Ok(_) => {}
                Err(e) => log::error!("Unable to start ws-rs: {}", e),
            }
        },
    }
}

fn init_logger(verbose: bool) {
    let fallback_filter = match verbose {
        true => "ws_rs=debug",
        false => "ws_rs=info",
    };

    let env = Env::default().default_filter_or(fallback_filter);

    Builder::from_env(env)
        .format(|buf, record| {
            let timestamp = buf.timestamp_millis();
            let style = buf.default_level_style(record.level());

            writeln!(
                buf,
                "[{} {}] {}",
                timestamp,
                style.value(record.level()),
                record.args()
            )
        })
        .init();
}
