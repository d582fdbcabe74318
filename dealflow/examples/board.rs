//! Walks a small pipeline through the board against the in-memory service.
//!
//! Run with `RUST_LOG=dealflow=debug` to see every remote call.

use dealflow::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&TracingConfig::new())?;

    let records = Arc::new(InMemoryRecordService::new().with_latency(Duration::from_millis(20)));
    let store = Arc::new(
        DealStore::new(records.clone()).with_event_sink(Arc::new(LoggingEventSink::default())),
    );
    store.list_all().await?;

    let drafts = [
        ("Platform rollout", "Initech", "48000", "Lead"),
        ("Support renewal", "Globex", "12000", "Qualified"),
        ("Analytics add-on", "Acme Corp", "9500", "Proposal"),
    ];
    let mut ids = Vec::new();
    for (name, company, value, stage) in drafts {
        let draft = DealDraft::new()
            .name(name)
            .company(company)
            .value(value)
            .stage(stage)
            .expected_close_date("2025-06-30");
        ids.push(store.create(&draft).await?.id);
    }

    let board = PipelineBoard::new(store.clone());
    board.request_stage_change(ids[0], "Negotiation").await?;
    board.request_stage_change(ids[1], "Closed Won").await?;

    for column in board.columns() {
        println!(
            "{:<12} {:>2} deals  {:>10.2}",
            column.stage.label(),
            column.aggregate.count,
            column.aggregate.total_value
        );
    }

    let summary = board.summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);

    records.set_available(false);
    let draft = DealDraft::new()
        .name("Offline lead")
        .company("Hooli")
        .value(3000)
        .expected_close_date("2025-07-15");
    let offline = store.create(&draft).await?;
    println!("Kept locally as {} while offline", offline.id);

    Ok(())
}
