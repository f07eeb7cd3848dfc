//! Blocking drain example.
//!
//! `run_blocking()` flushes the pending batch without `.await`. It is safe
//! from plain synchronous code and from inside a running tokio runtime,
//! which makes it the right flush for drop guards, FFI callbacks, and
//! notebook-style shells that cannot await at the point of the flush.
//!
//! Run with: cargo run --example blocking_script

use chrono::Utc;
use serde_json::json;
use tessera_sdk::{TesseraClient, TesseraResult, WorkspaceSpec};

// No .await in sight: callable from anywhere
fn flush(client: &TesseraClient) -> TesseraResult<()> {
    let results = client.run_blocking()?;
    println!("flushed {} tasks", results.len());
    Ok(())
}

#[tokio::main]
async fn main() -> TesseraResult<()> {
    tracing_subscriber::fmt::init();

    let client = TesseraClient::builder().playground().build()?;

    // A fresh workspace per run keeps the example re-runnable
    let workspace = client
        .workspaces()
        .create_workspace(WorkspaceSpec {
            name: format!("scripts-{}", Utc::now().timestamp()),
            description: None,
        })
        .await?;
    client.set_workspace(workspace.id);
    client.set_menu_path("Scripts");

    client
        .data_sets()
        .append_data(
            "heartbeat",
            vec![json!({"at": Utc::now().to_rfc3339(), "ok": true})],
        )
        .await?;

    println!("{} tasks pending", client.pending_tasks().await.len());

    // We are inside a tokio runtime here and the blocking drain is still fine
    flush(&client)?;

    Ok(())
}
