use crate::database::get_db;
use crate::error::ReportError;

use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

/// One flattened answer of a report. Rows are written once as a batch right
/// after the report itself and are never updated or deleted.
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub report_id: ObjectId,
    pub question_key: String,
    pub answer_value: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportDetailResponse {
    pub _id: String,
    pub question_key: String,
    pub answer_value: String,
}

impl ReportDetail {
    /// Inserts the flattened batch. A report that already has details keeps
    /// them untouched: retrying a half-finished submission must never
    /// duplicate rows, so the retry becomes a conflict instead.
    pub async fn save_batch(
        report_id: &ObjectId,
        entries: &[(&'static str, String)],
    ) -> Result<usize, ReportError> {
        let db: Database = get_db();
        let collection: Collection<ReportDetail> = db.collection::<ReportDetail>("fir_details");

        if Self::exists_for_report(report_id).await? {
            return Err(ReportError::Conflict("REPORT_DETAILS_ALREADY_EXIST"));
        }

        let details: Vec<ReportDetail> = entries
            .iter()
            .map(|(question_key, answer_value)| ReportDetail {
                _id: Some(ObjectId::new()),
                report_id: *report_id,
                question_key: question_key.to_string(),
                answer_value: answer_value.clone(),
            })
            .collect();

        collection
            .insert_many(details, None)
            .await
            .map_err(|_| ReportError::Storage("REPORT_DETAILS_INSERT_FAILED"))
            .map(|result| result.inserted_ids.len())
    }
    pub async fn exists_for_report(report_id: &ObjectId) -> Result<bool, ReportError> {
        let db: Database = get_db();
        let collection: Collection<ReportDetail> = db.collection::<ReportDetail>("fir_details");

        collection
            .count_documents(doc! { "report_id": report_id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
            .map(|count| count > 0)
    }
    /// Rows come back in insertion order, which is the fixed schema order
    /// the report page groups by.
    pub async fn find_by_report(
        report_id: &ObjectId,
    ) -> Result<Vec<ReportDetailResponse>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<ReportDetail> = db.collection::<ReportDetail>("fir_details");

        let pipeline = vec![
            doc! { "$match": { "report_id": report_id } },
            doc! {
                "$project": {
                    "_id": { "$toString": "$_id" },
                    "question_key": "$question_key",
                    "answer_value": "$answer_value",
                }
            },
        ];

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))?;
        let mut details: Vec<ReportDetailResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            if let Ok(detail) = from_document::<ReportDetailResponse>(doc) {
                details.push(detail);
            }
        }
        Ok(details)
    }
}
