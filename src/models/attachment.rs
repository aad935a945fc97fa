use crate::database::get_db;
use crate::error::ReportError;

use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

/// One uploaded evidence file. `storage_path` is the servable locator for
/// the stored bytes; rows are inserted one per upload, independent of the
/// detail batch.
#[derive(Debug, Deserialize, Serialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub report_id: ObjectId,
    pub storage_path: String,
    pub file_type: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct AttachmentResponse {
    pub _id: String,
    pub storage_path: String,
    pub file_type: String,
}

impl Attachment {
    pub async fn save(&mut self) -> Result<ObjectId, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Attachment> = db.collection::<Attachment>("attachments");

        self._id = Some(ObjectId::new());

        collection
            .insert_one(self, None)
            .await
            .map_err(|_| ReportError::Storage("INSERTING_FAILED"))
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_by_report(
        report_id: &ObjectId,
    ) -> Result<Vec<AttachmentResponse>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Attachment> = db.collection::<Attachment>("attachments");

        let pipeline = vec![
            doc! { "$match": { "report_id": report_id } },
            doc! {
                "$project": {
                    "_id": { "$toString": "$_id" },
                    "storage_path": "$storage_path",
                    "file_type": "$file_type",
                }
            },
        ];

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))?;
        let mut attachments: Vec<AttachmentResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            if let Ok(attachment) = from_document::<AttachmentResponse>(doc) {
                attachments.push(attachment);
            }
        }
        Ok(attachments)
    }
}
