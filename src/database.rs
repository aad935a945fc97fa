use mongodb::{bson::doc, options::IndexOptions, Client, Database, IndexModel};
use std::sync::OnceLock;

use crate::models::risk_assessment::RiskAssessment;

static DB: OnceLock<Database> = OnceLock::new();

pub async fn connect(uri: String) {
    let client = Client::with_uri_str(uri)
        .await
        .expect("Failed to connect to database");
    let db = client.database("fir");

    ensure_indexes(&db).await;

    DB.set(db).ok();
}

/// One risk assessment per report is enforced by the store itself; the
/// lifecycle precondition check alone cannot stop two concurrent assessors.
async fn ensure_indexes(db: &Database) {
    let unique_report = IndexModel::builder()
        .keys(doc! { "report_id": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();

    db.collection::<RiskAssessment>("risk_assessments")
        .create_index(unique_report, None)
        .await
        .expect("Failed to create risk assessment index");
}

pub fn get_db() -> Database {
    DB.get().expect("Database is not available yet!").clone()
}
