use crate::database::get_db;
use crate::error::{CreateError, ReportError};

use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, to_bson, DateTime, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use super::attachment::{Attachment, AttachmentResponse};
use super::location::{LocationSelection, Site};
use super::profile::{ReportAction, Role};
use super::report_attributes::ReportAttributes;
use super::report_detail::{ReportDetail, ReportDetailResponse};
use super::risk_assessment::{RiskAssessment, RiskAssessmentRequest, RiskAssessmentResponse};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    NearMiss,
    Injury,
    Illness,
}

impl std::fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportCategory::NearMiss => write!(f, "near_miss"),
            ReportCategory::Injury => write!(f, "injury"),
            ReportCategory::Illness => write!(f, "illness"),
        }
    }
}

/// Report status is monotonic: submitted, forwarded, resolved, and nothing
/// ever moves backwards.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Submitted,
    Forwarded,
    Resolved,
}

impl ReportStatus {
    pub fn can_advance_to(&self, next: &ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::Submitted, ReportStatus::Forwarded)
                | (ReportStatus::Forwarded, ReportStatus::Resolved)
        )
    }
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Resolved)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Submitted => write!(f, "submitted"),
            ReportStatus::Forwarded => write!(f, "forwarded"),
            ReportStatus::Resolved => write!(f, "resolved"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub ref_no: i64,
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub created_by: ObjectId,
    pub site_id: Option<ObjectId>,
    pub department_id: Option<ObjectId>,
    pub area_id: Option<ObjectId>,
    pub equipment_id: Option<ObjectId>,
    pub created_at: DateTime,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportRequest {
    #[serde(flatten)]
    pub attributes: ReportAttributes,
    #[serde(default)]
    pub location: LocationSelection,
}
#[derive(Debug, Default)]
pub struct ReportQuery {
    pub _id: Option<ObjectId>,
    pub status: Option<ReportStatus>,
    pub created_by: Option<ObjectId>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportResponse {
    pub _id: String,
    pub ref_no: i64,
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub created_at: String,
    pub reporter_name: Option<String>,
    pub site_id: Option<String>,
    pub department_id: Option<String>,
    pub area_id: Option<String>,
    pub equipment_id: Option<String>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportViewResponse {
    pub report: ReportResponse,
    pub details: Vec<ReportDetailResponse>,
    pub attachments: Vec<AttachmentResponse>,
    pub risk_assessment: Option<RiskAssessmentResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Counter {
    _id: String,
    seq: i64,
}

impl Report {
    /// Files a new report: location chain resolution, report row at
    /// `submitted`, then the flattened detail batch. The steps are not
    /// atomic; once the report row exists a later failure is handed back
    /// with the id so the caller resumes instead of re-creating.
    pub async fn create(
        created_by: &ObjectId,
        role: &Role,
        request: ReportRequest,
    ) -> Result<ObjectId, CreateError> {
        if !role.permits(&ReportAction::CreateReport) {
            return Err(CreateError::before(ReportError::Validation("UNAUTHORIZED")));
        }

        let site = request.location.resolve().await.map_err(CreateError::before)?;
        let ref_no = Self::next_ref_no().await.map_err(CreateError::before)?;

        let mut report = Report {
            _id: None,
            ref_no,
            category: request.attributes.category(),
            status: ReportStatus::Submitted,
            created_by: *created_by,
            site_id: request.location.site_id,
            department_id: request.location.department_id,
            area_id: request.location.area_id,
            equipment_id: request.location.equipment_id,
            created_at: DateTime::now(),
        };
        let report_id = report.save().await.map_err(CreateError::before)?;

        let entries = request
            .attributes
            .flatten(site.as_ref().map(|site| site.name.as_str()));
        if let Err(error) = ReportDetail::save_batch(&report_id, &entries).await {
            tracing::error!(
                report_id = %report_id,
                code = error.code(),
                "report row written but detail batch failed"
            );
            return Err(CreateError::partial(report_id, error));
        }

        tracing::info!(
            report_id = %report_id,
            ref_no,
            category = %report.category,
            "report submitted"
        );
        Ok(report_id)
    }

    /// Resume path for a submission whose detail batch never landed. Only
    /// the reporter may resume, the payload category must match the stored
    /// report, and existing details turn the call into a conflict.
    pub async fn resume_details(
        report_id: &ObjectId,
        principal_id: &ObjectId,
        role: &Role,
        attributes: &ReportAttributes,
    ) -> Result<usize, ReportError> {
        if !role.permits(&ReportAction::CreateReport) {
            return Err(ReportError::Validation("UNAUTHORIZED"));
        }

        let report = Self::find_by_id(report_id)
            .await?
            .ok_or(ReportError::NotFound("REPORT_NOT_FOUND"))?;
        if report.created_by != *principal_id {
            return Err(ReportError::Validation("UNAUTHORIZED"));
        }
        if attributes.category() != report.category {
            return Err(ReportError::Validation("CATEGORY_MISMATCH"));
        }

        let site = match report.site_id {
            Some(site_id) => Site::find_by_id(&site_id).await?,
            None => None,
        };
        let entries = attributes.flatten(site.as_ref().map(|site| site.name.as_str()));
        let inserted = ReportDetail::save_batch(report_id, &entries).await?;

        tracing::info!(report_id = %report_id, inserted, "detail batch resumed");
        Ok(inserted)
    }

    /// Attaches a risk assessment and forwards the report. Requires the
    /// assessor capability, a report still at `submitted` and no prior
    /// assessment; the status update follows the insert and is not rolled
    /// back on failure.
    pub async fn assess(
        report_id: &ObjectId,
        assessed_by: &ObjectId,
        role: &Role,
        request: RiskAssessmentRequest,
    ) -> Result<ObjectId, ReportError> {
        if !role.permits(&ReportAction::CreateRiskAssessment) {
            return Err(ReportError::Validation("UNAUTHORIZED"));
        }

        let mut report = Self::find_by_id(report_id)
            .await?
            .ok_or(ReportError::NotFound("REPORT_NOT_FOUND"))?;
        if !report.status.can_advance_to(&ReportStatus::Forwarded) {
            return Err(ReportError::Conflict("INVALID_STATUS_TRANSITION"));
        }
        if RiskAssessment::find_by_report(report_id).await?.is_some() {
            return Err(ReportError::Conflict("RISK_ASSESSMENT_ALREADY_EXISTS"));
        }

        let mut assessment = RiskAssessment::new(
            *report_id,
            request.severity,
            request.likelihood,
            request.mitigation_plan,
            *assessed_by,
        )?;
        let assessment_id = assessment.save().await?;

        report.update_status(ReportStatus::Forwarded).await?;

        tracing::info!(
            report_id = %report_id,
            score = assessment.score(),
            band = %assessment.band(),
            "report forwarded"
        );
        Ok(assessment_id)
    }

    /// Final transition: a forwarded report is resolved and the loop is
    /// closed. Terminal; there is no way back.
    pub async fn close(report_id: &ObjectId, role: &Role) -> Result<ObjectId, ReportError> {
        if !role.permits(&ReportAction::CloseLoop) {
            return Err(ReportError::Validation("UNAUTHORIZED"));
        }

        let mut report = Self::find_by_id(report_id)
            .await?
            .ok_or(ReportError::NotFound("REPORT_NOT_FOUND"))?;
        if !report.status.can_advance_to(&ReportStatus::Resolved) {
            return Err(ReportError::Conflict("INVALID_STATUS_TRANSITION"));
        }

        report.update_status(ReportStatus::Resolved).await?;

        tracing::info!(report_id = %report_id, "report resolved");
        Ok(*report_id)
    }

    async fn save(&mut self) -> Result<ObjectId, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("fir_reports");

        self._id = Some(ObjectId::new());

        collection
            .insert_one(self, None)
            .await
            .map_err(|_| ReportError::Storage("INSERTING_FAILED"))
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    async fn update_status(&mut self, status: ReportStatus) -> Result<(), ReportError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("fir_reports");

        let _id = self._id.ok_or(ReportError::Storage("REPORT_MISSING_ID"))?;

        collection
            .update_one(
                doc! { "_id": _id },
                doc! { "$set": { "status": to_bson::<ReportStatus>(&status).unwrap() } },
                None,
            )
            .await
            .map_err(|_| ReportError::Storage("REPORT_STATUS_UPDATE_FAILED"))?;

        self.status = status;
        Ok(())
    }
    /// Human-readable sequence handed out by the store, one counter per
    /// collection.
    async fn next_ref_no() -> Result<i64, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Counter> = db.collection::<Counter>("counters");

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        collection
            .find_one_and_update(
                doc! { "_id": "fir_reports" },
                doc! { "$inc": { "seq": 1 } },
                options,
            )
            .await
            .map_err(|_| ReportError::Storage("REF_NO_ALLOCATION_FAILED"))?
            .map(|counter| counter.seq)
            .ok_or(ReportError::Storage("REF_NO_ALLOCATION_FAILED"))
    }

    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Report>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("fir_reports");

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
    pub async fn find_many(query: &ReportQuery) -> Result<Vec<ReportResponse>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("fir_reports");

        let mut pipeline: Vec<Document> = Vec::new();

        let mut filter = doc! {};
        if let Some(_id) = query._id {
            filter.insert("_id", _id);
        }
        if let Some(status) = &query.status {
            filter.insert("status", to_bson::<ReportStatus>(status).unwrap());
        }
        if let Some(created_by) = query.created_by {
            filter.insert("created_by", created_by);
        }
        if !filter.is_empty() {
            pipeline.push(doc! { "$match": filter });
        }

        pipeline.push(doc! { "$sort": { "created_at": -1 } });

        if let Some(limit) = query.limit {
            pipeline.push(doc! {
                "$limit": to_bson::<usize>(&limit).unwrap()
            });
        }

        pipeline.push(doc! {
            "$lookup": {
                "from": "profiles",
                "localField": "created_by",
                "foreignField": "_id",
                "as": "reporter",
            }
        });
        pipeline.push(doc! {
            "$unwind": {
                "path": "$reporter",
                "preserveNullAndEmptyArrays": true,
            }
        });
        pipeline.push(doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "ref_no": "$ref_no",
                "category": "$category",
                "status": "$status",
                "created_at": { "$toString": "$created_at" },
                "reporter_name": "$reporter.full_name",
                "site_id": {
                    "$cond": ["$site_id", { "$toString": "$site_id" }, to_bson::<Option<String>>(&None).unwrap()]
                },
                "department_id": {
                    "$cond": ["$department_id", { "$toString": "$department_id" }, to_bson::<Option<String>>(&None).unwrap()]
                },
                "area_id": {
                    "$cond": ["$area_id", { "$toString": "$area_id" }, to_bson::<Option<String>>(&None).unwrap()]
                },
                "equipment_id": {
                    "$cond": ["$equipment_id", { "$toString": "$equipment_id" }, to_bson::<Option<String>>(&None).unwrap()]
                },
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))?;
        let mut reports: Vec<ReportResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            if let Ok(report) = from_document::<ReportResponse>(doc) {
                reports.push(report);
            }
        }
        Ok(reports)
    }
    /// Everything the report page needs in one response: the report row,
    /// its details, attachments and the assessment when one exists.
    pub async fn find_detail_by_id(
        report_id: &ObjectId,
    ) -> Result<Option<ReportViewResponse>, ReportError> {
        let reports = Self::find_many(&ReportQuery {
            _id: Some(*report_id),
            ..Default::default()
        })
        .await?;
        let report = match reports.into_iter().next() {
            Some(report) => report,
            None => return Ok(None),
        };

        let details = ReportDetail::find_by_report(report_id).await?;
        let attachments = Attachment::find_by_report(report_id).await?;
        let risk_assessment = RiskAssessment::find_by_report(report_id).await?;

        Ok(Some(ReportViewResponse {
            report,
            details,
            attachments,
            risk_assessment,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_walks_forward_only() {
        assert!(ReportStatus::Submitted.can_advance_to(&ReportStatus::Forwarded));
        assert!(ReportStatus::Forwarded.can_advance_to(&ReportStatus::Resolved));

        assert!(!ReportStatus::Submitted.can_advance_to(&ReportStatus::Resolved));
        assert!(!ReportStatus::Forwarded.can_advance_to(&ReportStatus::Submitted));
        assert!(!ReportStatus::Resolved.can_advance_to(&ReportStatus::Submitted));
        assert!(!ReportStatus::Resolved.can_advance_to(&ReportStatus::Forwarded));
    }

    #[test]
    fn no_status_advances_to_itself() {
        for status in [
            ReportStatus::Submitted,
            ReportStatus::Forwarded,
            ReportStatus::Resolved,
        ] {
            assert!(!status.can_advance_to(&status));
        }
    }

    #[test]
    fn resolved_is_the_only_terminal_status() {
        assert!(!ReportStatus::Submitted.is_terminal());
        assert!(!ReportStatus::Forwarded.is_terminal());
        assert!(ReportStatus::Resolved.is_terminal());
    }

    #[test]
    fn category_and_status_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReportCategory::NearMiss).unwrap(),
            "\"near_miss\""
        );
        assert_eq!(
            serde_json::to_string(&ReportStatus::Submitted).unwrap(),
            "\"submitted\""
        );
        assert_eq!(
            serde_json::from_str::<ReportStatus>("\"forwarded\"").unwrap(),
            ReportStatus::Forwarded
        );
    }
}
