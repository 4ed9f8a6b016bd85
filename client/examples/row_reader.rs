//! Submits a query and prints its rows through the typed cursor.
//!
//! Usage: `cargo run --example row_reader -- http://localhost:7432 "SELECT 1"`

use quarry_client::{QueryClient, SessionConfig, TransferMode};
use tonic::transport::Channel;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let endpoint = args
        .next()
        .unwrap_or_else(|| "http://localhost:7432".to_string());
    let sql = args
        .next()
        .unwrap_or_else(|| "SELECT * FROM information_schema.tables".to_string());

    let channel = Channel::from_shared(endpoint)?.connect().await?;
    let client = QueryClient::from_channel(channel, SessionConfig::default());

    let mut rows = client.query(sql, TransferMode::Adaptive);
    let mut count = 0u64;
    while rows.next().await? {
        let first = rows.get_string(1)?.unwrap_or_default();
        println!("{first}");
        count += 1;
    }
    println!("{count} rows");
    Ok(())
}
