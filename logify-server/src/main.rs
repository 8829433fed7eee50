#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use logify_http::serve;

#[derive(Parser)]
#[command(name = "logify", about = "Multi-tenant log ingestion and search server")]
struct Cli {
    #[arg(long, env = "LOGIFY_DATA_DIR", default_value = "./data")]
    data_dir: String,
    #[arg(long, env = "LOGIFY_BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind_addr: String,
    /// Document store backend: `memory` or `opensearch`
    #[arg(long, env = "LOGIFY_STORE", default_value = "memory")]
    store: String,
    #[arg(long, env = "LOGIFY_OPENSEARCH_URL", default_value = "http://localhost:9200")]
    opensearch_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    std::env::set_var("LOGIFY_DATA_DIR", &cli.data_dir);
    std::env::set_var("LOGIFY_BIND_ADDR", &cli.bind_addr);
    std::env::set_var("LOGIFY_STORE", &cli.store);
    std::env::set_var("LOGIFY_OPENSEARCH_URL", &cli.opensearch_url);
    serve().await
}
