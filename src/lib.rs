pub mod analysis;
pub mod cli;
pub mod commands;
pub mod error;
pub mod forwarder;
pub mod models;
pub mod store;

use clap::Parser;

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("could not start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(message) = runtime.block_on(cli::execute(cli)) {
        log::error!("{message}");
        std::process::exit(1);
    }
}
