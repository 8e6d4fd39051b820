use feedrank::app;
use feedrank::error::FeedRankError;

#[tokio::main]
async fn main() -> Result<(), FeedRankError> {
    app::run().await
}
