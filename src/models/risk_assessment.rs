use crate::database::get_db;
use crate::error::ReportError;

use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

/// Quantified risk attached by an assessor before a report is forwarded.
/// Written once; intended to be unique per report (backed by the store
/// index created at startup).
#[derive(Debug, Deserialize, Serialize)]
pub struct RiskAssessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub report_id: ObjectId,
    pub severity: u8,
    pub likelihood: u8,
    pub mitigation_plan: String,
    pub assessed_by: ObjectId,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct RiskAssessmentRequest {
    pub severity: u8,
    pub likelihood: u8,
    pub mitigation_plan: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct RiskAssessmentResponse {
    pub _id: String,
    pub report_id: String,
    pub severity: u8,
    pub likelihood: u8,
    pub score: u8,
    pub band: RiskBand,
    pub mitigation_plan: String,
    pub assessed_by: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: u8) -> RiskBand {
        if score >= 12 {
            RiskBand::High
        } else if score >= 6 {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBand::Low => write!(f, "low"),
            RiskBand::Medium => write!(f, "medium"),
            RiskBand::High => write!(f, "high"),
        }
    }
}

impl RiskAssessment {
    /// Severity and likelihood are validated before anything is written.
    pub fn new(
        report_id: ObjectId,
        severity: u8,
        likelihood: u8,
        mitigation_plan: String,
        assessed_by: ObjectId,
    ) -> Result<Self, ReportError> {
        if !(1..=5).contains(&severity) {
            return Err(ReportError::Validation("SEVERITY_OUT_OF_RANGE"));
        }
        if !(1..=5).contains(&likelihood) {
            return Err(ReportError::Validation("LIKELIHOOD_OUT_OF_RANGE"));
        }
        Ok(Self {
            _id: None,
            report_id,
            severity,
            likelihood,
            mitigation_plan,
            assessed_by,
        })
    }

    /// The same product feeds the live preview and the persisted record.
    pub fn score(&self) -> u8 {
        self.severity * self.likelihood
    }
    pub fn band(&self) -> RiskBand {
        RiskBand::from_score(self.score())
    }

    pub async fn save(&mut self) -> Result<ObjectId, ReportError> {
        let db: Database = get_db();
        let collection: Collection<RiskAssessment> =
            db.collection::<RiskAssessment>("risk_assessments");

        self._id = Some(ObjectId::new());

        collection
            .insert_one(self, None)
            .await
            .map_err(|_| ReportError::Conflict("RISK_ASSESSMENT_INSERT_REJECTED"))
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_by_report(
        report_id: &ObjectId,
    ) -> Result<Option<RiskAssessmentResponse>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<RiskAssessment> =
            db.collection::<RiskAssessment>("risk_assessments");

        let assessment = collection
            .find_one(doc! { "report_id": report_id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))?;

        Ok(assessment.map(|assessment| RiskAssessmentResponse {
            _id: assessment
                ._id
                .map(|_id| _id.to_string())
                .unwrap_or_default(),
            report_id: assessment.report_id.to_string(),
            severity: assessment.severity,
            likelihood: assessment.likelihood,
            score: assessment.score(),
            band: assessment.band(),
            mitigation_plan: assessment.mitigation_plan.clone(),
            assessed_by: assessment.assessed_by.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(severity: u8, likelihood: u8) -> RiskAssessment {
        RiskAssessment::new(
            ObjectId::new(),
            severity,
            likelihood,
            "Guard rail retrofit".to_string(),
            ObjectId::new(),
        )
        .unwrap()
    }

    #[test]
    fn score_is_the_plain_product() {
        assert_eq!(assessment(1, 1).score(), 1);
        assert_eq!(assessment(3, 4).score(), 12);
        assert_eq!(assessment(5, 5).score(), 25);
    }

    #[test]
    fn score_stays_in_domain_for_all_inputs() {
        for severity in 1..=5 {
            for likelihood in 1..=5 {
                let score = assessment(severity, likelihood).score();
                assert!((1..=25).contains(&score));
            }
        }
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(RiskBand::from_score(5), RiskBand::Low);
        assert_eq!(RiskBand::from_score(6), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(11), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(12), RiskBand::High);
        assert_eq!(RiskBand::from_score(25), RiskBand::High);
        assert_eq!(RiskBand::from_score(1), RiskBand::Low);
    }

    #[test]
    fn out_of_range_inputs_are_rejected() {
        let report_id = ObjectId::new();
        let assessor = ObjectId::new();
        assert_eq!(
            RiskAssessment::new(report_id, 0, 3, String::new(), assessor).unwrap_err(),
            ReportError::Validation("SEVERITY_OUT_OF_RANGE")
        );
        assert_eq!(
            RiskAssessment::new(report_id, 6, 3, String::new(), assessor).unwrap_err(),
            ReportError::Validation("SEVERITY_OUT_OF_RANGE")
        );
        assert_eq!(
            RiskAssessment::new(report_id, 3, 0, String::new(), assessor).unwrap_err(),
            ReportError::Validation("LIKELIHOOD_OUT_OF_RANGE")
        );
        assert_eq!(
            RiskAssessment::new(report_id, 3, 6, String::new(), assessor).unwrap_err(),
            ReportError::Validation("LIKELIHOOD_OUT_OF_RANGE")
        );
    }

    #[test]
    fn severe_probable_incident_bands_high() {
        let assessment = assessment(4, 3);
        assert_eq!(assessment.score(), 12);
        assert_eq!(assessment.band(), RiskBand::High);
    }
}
