use cts602::{boot, cli};

#[tokio::main]
async fn main() {
    boot::init_logging();
    let matches = cli::parse_args();

    if let Err(err) = cli::actions::run(&matches).await {
        log::error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
