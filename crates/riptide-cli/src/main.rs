#[tokio::main]
async fn main() {
    let exit_code = riptide_cli::run().await;
    std::process::exit(exit_code);
}
