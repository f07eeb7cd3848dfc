//! Call batching example.
//!
//! Queues a whole publish -- boards, dataset rows, an action -- locally,
//! then flushes everything in one concurrent wave with `run()`. Nothing
//! touches the network until the flush.
//!
//! Run with: cargo run --example batched_actions

use serde_json::json;
use tessera_sdk::{
    ActionSpec, BoardSpec, TesseraClient, TesseraError, TesseraResult, WorkspaceSpec,
};

#[tokio::main]
async fn main() -> TesseraResult<()> {
    tracing_subscriber::fmt::init();

    let client = TesseraClient::builder().playground().build()?;

    // Workspace creation is strict, so a re-run of this example falls back
    // to the existing one
    let workspace = match client
        .workspaces()
        .create_workspace(WorkspaceSpec {
            name: "metrics".to_string(),
            description: None,
        })
        .await
    {
        Ok(created) => created,
        Err(err) if matches!(err.root_cause(), TesseraError::Conflict { .. }) => {
            client
                .workspaces()
                .get_workspace(None, Some("metrics"))
                .await?
        }
        Err(err) => return Err(err),
    };
    client.set_workspace(workspace.id);
    client.set_menu_path("Examples/Batching");

    // These queue locally
    for name in ["revenue", "pipeline", "churn"] {
        client
            .boards()
            .create_board(BoardSpec {
                name: name.to_string(),
                description: None,
                order: None,
            })
            .await?;
    }
    client
        .data_sets()
        .append_data(
            "daily-revenue",
            vec![
                json!({"day": "2024-05-01", "value": 1200}),
                json!({"day": "2024-05-02", "value": 1350}),
            ],
        )
        .await?;
    client
        .actions()
        .create_action(ActionSpec {
            name: "nightly-refresh".to_string(),
            code: Some("print('refreshing dashboards')".to_string()),
            description: Some("Refreshes every board at 02:00".to_string()),
        })
        .await?;

    let pending = client.pending_tasks().await;
    println!("{} tasks queued:", pending.len());
    for task in &pending {
        println!("  {task}");
    }

    // One concurrent wave; results come back in submission order
    let results = client.run().await?;
    println!("\nBatch finished with {} results:", results.len());
    for (task, result) in pending.iter().zip(&results) {
        println!("  {task}: {result}");
    }

    Ok(())
}
