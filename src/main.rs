#[tokio::main]
async fn main() {
    if let Err(e) = soul_agentd::run().await {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}
