use std::{
    fs::{create_dir_all, rename},
    path::PathBuf,
};

use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use mime_guess::get_mime_extensions_str;
use mongodb::bson::{doc, oid::ObjectId};
use serde::Deserialize;
use std::str::FromStr;

use crate::error::{CreateError, ReportError};
use crate::models::{
    attachment::Attachment,
    profile::{ProfileAuthentication, ReportAction},
    report::{Report, ReportQuery, ReportRequest, ReportStatus},
    report_attributes::ReportAttributes,
    risk_assessment::RiskAssessmentRequest,
};
use crate::routes::error_response;

#[derive(Debug, Deserialize)]
pub struct ReportListParams {
    pub status: Option<ReportStatus>,
    pub created_by: Option<String>,
    pub limit: Option<usize>,
}
#[derive(Debug, MultipartForm)]
pub struct AttachmentMultipartRequest {
    #[multipart(rename = "file")]
    pub file: TempFile,
}

fn create_error_response(failure: CreateError) -> HttpResponse {
    // A partial failure still created the report row; hand the id back so
    // the caller can resume the remaining steps.
    match failure.report_id {
        Some(report_id) => {
            let body = doc! {
                "error": failure.error.code(),
                "report_id": report_id.to_string(),
            };
            match failure.error {
                ReportError::Validation(_) => HttpResponse::BadRequest().json(body),
                ReportError::NotFound(_) => HttpResponse::NotFound().json(body),
                ReportError::Conflict(_) => HttpResponse::Conflict().json(body),
                ReportError::Storage(_) => HttpResponse::InternalServerError().json(body),
            }
        }
        None => error_response(failure.error),
    }
}

#[get("/reports")]
pub async fn get_reports(params: web::Query<ReportListParams>, req: HttpRequest) -> HttpResponse {
    if req.extensions().get::<ProfileAuthentication>().is_none() {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let created_by = match &params.created_by {
        Some(created_by) => match ObjectId::from_str(created_by) {
            Ok(created_by) => Some(created_by),
            Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
        },
        None => None,
    };
    let query: ReportQuery = ReportQuery {
        _id: None,
        status: params.status,
        created_by,
        limit: params.limit,
    };

    match Report::find_many(&query).await {
        Ok(reports) => HttpResponse::Ok().json(reports),
        Err(error) => error_response(error),
    }
}
#[get("/reports/{report_id}")]
pub async fn get_report(report_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    if req.extensions().get::<ProfileAuthentication>().is_none() {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let report_id = match ObjectId::from_str(&report_id.into_inner()) {
        Ok(report_id) => report_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Report::find_detail_by_id(&report_id).await {
        Ok(Some(view)) => HttpResponse::Ok().json(view),
        Ok(None) => HttpResponse::NotFound().body("REPORT_NOT_FOUND"),
        Err(error) => error_response(error),
    }
}
#[post("/reports")]
pub async fn create_report(payload: web::Json<ReportRequest>, req: HttpRequest) -> HttpResponse {
    let auth = match req.extensions().get::<ProfileAuthentication>().cloned() {
        Some(auth) => auth,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !auth.role.permits(&ReportAction::CreateReport) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    match Report::create(&auth._id, &auth.role, payload.into_inner()).await {
        Ok(report_id) => HttpResponse::Created().body(report_id.to_string()),
        Err(failure) => create_error_response(failure),
    }
}
#[post("/reports/{report_id}/details")]
pub async fn create_report_details(
    report_id: web::Path<String>,
    payload: web::Json<ReportAttributes>,
    req: HttpRequest,
) -> HttpResponse {
    let auth = match req.extensions().get::<ProfileAuthentication>().cloned() {
        Some(auth) => auth,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !auth.role.permits(&ReportAction::CreateReport) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let report_id = match ObjectId::from_str(&report_id.into_inner()) {
        Ok(report_id) => report_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Report::resume_details(&report_id, &auth._id, &auth.role, &payload.into_inner()).await {
        Ok(inserted) => HttpResponse::Created().body(inserted.to_string()),
        Err(error) => error_response(error),
    }
}
#[post("/reports/{report_id}/attachments")]
pub async fn create_report_attachment(
    report_id: web::Path<String>,
    form: MultipartForm<AttachmentMultipartRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let auth = match req.extensions().get::<ProfileAuthentication>().cloned() {
        Some(auth) => auth,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !auth.role.permits(&ReportAction::CreateReport) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let report_id = match ObjectId::from_str(&report_id.into_inner()) {
        Ok(report_id) => report_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let report = match Report::find_by_id(&report_id).await {
        Ok(Some(report)) => report,
        Ok(None) => return HttpResponse::NotFound().body("REPORT_NOT_FOUND"),
        Err(error) => return error_response(error),
    };
    if report.created_by != auth._id {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let content_type = match &form.file.content_type {
        Some(content_type) => content_type.essence_str().to_string(),
        None => return HttpResponse::BadRequest().body("ATTACHMENT_INVALID_MIME"),
    };
    let ext = match get_mime_extensions_str(&content_type).and_then(|exts| exts.first()) {
        Some(ext) => *ext,
        None => return HttpResponse::BadRequest().body("ATTACHMENT_INVALID_MIME"),
    };

    let save_dir = format!("./files/reports/{}/", report_id);
    if create_dir_all(&save_dir).is_err() {
        return HttpResponse::InternalServerError().body("DIRECTORY_CREATION_FAILED");
    }

    let file_id = ObjectId::new();
    let file_name = format!("{}.{}", file_id, ext);
    let file_path_temp = form.file.file.path();
    let file_path = PathBuf::from(save_dir + &file_name);
    if rename(file_path_temp, &file_path).is_err() {
        return HttpResponse::InternalServerError().body("ATTACHMENT_RENAME_FAILED");
    }

    let mut attachment: Attachment = Attachment {
        _id: None,
        report_id,
        storage_path: format!(
            "/files?kind=report_attachment&name={}/{}",
            report_id, file_name
        ),
        file_type: content_type,
    };

    match attachment.save().await {
        Ok(attachment_id) => {
            tracing::info!(report_id = %report_id, attachment_id = %attachment_id, "evidence attached");
            HttpResponse::Created().body(attachment_id.to_string())
        }
        // The stored file stays where it is; the caller retries the row
        // insert against the same report.
        Err(error) => error_response(error),
    }
}
#[post("/reports/{report_id}/assessment")]
pub async fn create_risk_assessment(
    report_id: web::Path<String>,
    payload: web::Json<RiskAssessmentRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let auth = match req.extensions().get::<ProfileAuthentication>().cloned() {
        Some(auth) => auth,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !auth.role.permits(&ReportAction::CreateRiskAssessment) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let report_id = match ObjectId::from_str(&report_id.into_inner()) {
        Ok(report_id) => report_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Report::assess(&report_id, &auth._id, &auth.role, payload.into_inner()).await {
        Ok(assessment_id) => HttpResponse::Created().body(assessment_id.to_string()),
        Err(error) => error_response(error),
    }
}
#[post("/reports/{report_id}/close")]
pub async fn close_report(report_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    let auth = match req.extensions().get::<ProfileAuthentication>().cloned() {
        Some(auth) => auth,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !auth.role.permits(&ReportAction::CloseLoop) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let report_id = match ObjectId::from_str(&report_id.into_inner()) {
        Ok(report_id) => report_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Report::close(&report_id, &auth.role).await {
        Ok(report_id) => HttpResponse::Ok().body(report_id.to_string()),
        Err(error) => error_response(error),
    }
}
