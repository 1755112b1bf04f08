#[tokio::main]
async fn main() {
    if let Err(err) = vkv::cli::run_cli().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
