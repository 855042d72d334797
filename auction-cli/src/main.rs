mod app;
mod config;
mod log;
mod params;

use std::{io, process::ExitCode};

use auction_gateway_client::gateway::rest::RestGateway;

#[tokio::main]
async fn main() -> ExitCode {
    log::init();

    let code = app::run(
        std::env::args_os(),
        config::read_config,
        RestGateway::new(),
        &mut io::stdout(),
        &mut io::stderr(),
    )
    .await;
    ExitCode::from(code)
}
