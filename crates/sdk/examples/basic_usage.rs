//! Basic SDK usage example.
//!
//! This example connects to a local Tessera playground, selects a
//! workspace, and walks the read surface of the API.
//!
//! Run with: cargo run --example basic_usage

use tessera_sdk::{TesseraClient, TesseraResult, WorkspaceSpec};

#[tokio::main]
async fn main() -> TesseraResult<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    // A playground client needs no base URL or organization
    let client = TesseraClient::builder().playground().build()?;

    // List workspaces and pick (or create) one to work in
    println!("Listing workspaces...");
    let workspaces = client.workspaces().list_workspaces().await?;
    println!("Found {} workspaces", workspaces.len());

    let sales = match workspaces.iter().find(|ws| ws.name == "sales") {
        Some(ws) => ws.clone(),
        None => {
            println!("Creating the sales workspace...");
            client
                .workspaces()
                .create_workspace(WorkspaceSpec {
                    name: "sales".to_string(),
                    description: Some("Quarterly sales dashboards".to_string()),
                })
                .await?
        }
    };
    client.set_workspace(sales.id);
    println!("Working in workspace '{}' ({})", sales.name, sales.id);

    // List boards in the selected workspace
    println!("\nListing boards...");
    let boards = client.boards().list_boards().await?;
    println!("Found {} boards", boards.len());
    for board in boards.iter().take(5) {
        println!("  Board: {} ({})", board.name, board.id);
    }

    // List actions in the organization
    println!("\nListing actions...");
    let actions = client.actions().list_actions().await?;
    println!("Found {} actions", actions.len());
    for action in actions.iter().take(5) {
        println!("  Action: {} ({})", action.name, action.id);
    }

    // Everything the client has seen, as one JSON tree
    let snapshot = client.organization_snapshot().await;
    println!("\nCached resource tree:");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    println!("\nBasic usage example completed successfully!");
    Ok(())
}
