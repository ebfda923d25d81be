#[tokio::main]
async fn main() -> std::io::Result<()> {
    campus_server::run_with_config().await
}
