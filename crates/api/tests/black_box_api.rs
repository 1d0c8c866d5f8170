use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use stockrecon_core::{BatchId, MovementId, VariantId};
use stockrecon_infra::reconcile::ReconcileEngine;
use stockrecon_infra::store::{InMemoryAggregateStore, InMemoryLedgerStore};
use stockrecon_inventory::{InventorySummary, MovementKind, PurchaseBatch, StockMovement};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    ledger: Arc<InMemoryLedgerStore>,
    aggregate: Arc<InMemoryAggregateStore>,
}

impl TestServer {
    async fn spawn() -> Self {
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let aggregate = Arc::new(InMemoryAggregateStore::new());
        let engine = ReconcileEngine::new(ledger.clone(), aggregate.clone());

        // Same router as prod, bound to an ephemeral port.
        let app = stockrecon_api::app::build_app(engine);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            ledger,
            aggregate,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn add_batch(&self, variant_id: VariantId, remaining: i64, unit_cost: i64) -> BatchId {
        let batch = PurchaseBatch {
            id: BatchId::new(),
            variant_id,
            unit_cost: Decimal::from(unit_cost),
            remaining_quantity: Decimal::from(remaining),
            received_at: Utc::now(),
        };
        let id = batch.id;
        self.ledger.insert_batch(batch).unwrap();
        id
    }

    fn add_movement(&self, variant_id: VariantId, kind: MovementKind, batch_id: BatchId) -> MovementId {
        let movement = StockMovement {
            id: MovementId::new(),
            variant_id,
            batch_id: Some(batch_id),
            kind,
            quantity_delta: Decimal::from(10),
            occurred_at: Utc::now(),
        };
        let id = movement.id;
        self.ledger.insert_movement(movement).unwrap();
        id
    }

    fn seed_summary(&self, variant_id: VariantId, quantity: i64) {
        self.aggregate
            .seed(InventorySummary {
                variant_id,
                total_quantity: Decimal::from(quantity),
                average_cost: Decimal::ONE,
                last_updated: Utc::now(),
            })
            .unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn decimal(value: &serde_json::Value) -> Decimal {
    value.as_str().expect("decimal as string").parse().unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn drift_is_reported_repaired_and_verified() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let variant_id = VariantId::new();
    srv.add_batch(variant_id, 10, 2);
    srv.add_batch(variant_id, 5, 8);
    srv.seed_summary(variant_id, 999);

    // Verify sees the drift
    let res = client.get(srv.url("/admin/inventory/verify")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["clean"], json!(false));
    let found = body["discrepancies"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["variant_id"], json!(variant_id.to_string()));
    assert_eq!(decimal(&found[0]["difference"]), Decimal::from(984));

    // Reconcile (no body → defaults)
    let res = client.post(srv.url("/admin/inventory/reconcile")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: serde_json::Value = res.json().await.unwrap();
    assert_eq!(report["dry_run"], json!(false));
    assert_eq!(report["variants_changed"], json!(1));
    assert_eq!(report["variants_updated"], json!(1));
    assert!(report["anomalies"].as_array().unwrap().is_empty());

    // Summary row now matches the ledger
    let res = client
        .get(srv.url(&format!("/admin/inventory/summaries/{}", variant_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(decimal(&summary["total_quantity"]), Decimal::from(15));
    assert_eq!(decimal(&summary["average_cost"]), Decimal::from(4));

    // And verify is clean
    let body: serde_json::Value = client
        .get(srv.url("/admin/inventory/verify"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["clean"], json!(true));
    assert!(body["discrepancies"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_leaves_stores_alone() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let variant_id = VariantId::new();
    srv.add_batch(variant_id, 3, 1);
    srv.seed_summary(variant_id, 50);

    let res = client
        .post(srv.url("/admin/inventory/reconcile"))
        .json(&json!({ "dry_run": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: serde_json::Value = res.json().await.unwrap();
    assert_eq!(report["dry_run"], json!(true));
    assert_eq!(report["variants_changed"], json!(1));
    assert_eq!(report["variants_updated"], json!(0));

    let summary: serde_json::Value = client
        .get(srv.url(&format!("/admin/inventory/summaries/{}", variant_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&summary["total_quantity"]), Decimal::from(50));
}

#[tokio::test]
async fn orphans_are_listed_then_collected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let variant_id = VariantId::new();
    let batch_id = srv.add_batch(variant_id, 10, 1);
    let purchase = srv.add_movement(variant_id, MovementKind::Purchase, batch_id);
    let sale = srv.add_movement(variant_id, MovementKind::Sale, batch_id);
    srv.ledger.remove_batch(batch_id).unwrap();

    let body: serde_json::Value = client
        .get(srv.url("/admin/inventory/orphans"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["movements"][0]["id"], json!(purchase.to_string()));
    assert_eq!(body["movements"][0]["kind"], json!("purchase"));

    let res = client
        .post(srv.url("/admin/inventory/orphans/collect"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["movements_removed"], json!(1));

    assert!(!srv.ledger.contains_movement(purchase).unwrap());
    assert!(srv.ledger.contains_movement(sale).unwrap());
}

#[tokio::test]
async fn anomalies_are_reported_not_failed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let variant_id = VariantId::new();
    srv.add_batch(variant_id, -1, 4);

    let res = client
        .post(srv.url("/admin/inventory/reconcile"))
        .json(&json!({ "collect_orphans": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: serde_json::Value = res.json().await.unwrap();
    let anomalies = report["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["kind"], json!("negative_remaining"));
    assert_eq!(anomalies[0]["variant_id"], json!(variant_id.to_string()));

    let inspection: serde_json::Value = client
        .get(srv.url(&format!("/admin/inventory/variants/{}/inspect", variant_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(inspection["in_sync"], json!(false));
    assert_eq!(inspection["batch_count"], json!(1));
    assert_eq!(inspection["anomaly"]["kind"], json!("negative_remaining"));
}

#[tokio::test]
async fn unknown_and_invalid_variants() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url(&format!("/admin/inventory/summaries/{}", VariantId::new())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url("/admin/inventory/summaries/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], json!("invalid_id"));
}

#[tokio::test]
async fn malformed_reconcile_body_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/admin/inventory/reconcile"))
        .header("content-type", "application/json")
        .body("{\"dry_run\": \"maybe\"}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unavailable_store_is_retryable_503() {
    let srv = TestServer::spawn().await;
    srv.ledger.set_unavailable(true);

    let res = reqwest::Client::new()
        .post(srv.url("/admin/inventory/reconcile"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["retryable"], json!(true));
    assert_eq!(body["error"], json!("store_unavailable"));
}
