mod cycle;
mod host;
mod retry;
mod store;
mod webapp;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
