use actix_web::{get, web, HttpResponse};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::ReportError;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    ReportAttachment,
}

#[derive(Deserialize)]
pub struct FileQueryParams {
    pub kind: FileKind,
    pub name: String,
}

pub mod location;
pub mod profile;
pub mod report;

pub fn error_response(error: ReportError) -> HttpResponse {
    match error {
        ReportError::Validation(code) => HttpResponse::BadRequest().body(code),
        ReportError::NotFound(code) => HttpResponse::NotFound().body(code),
        ReportError::Conflict(code) => HttpResponse::Conflict().body(code),
        ReportError::Storage(code) => HttpResponse::InternalServerError().body(code),
    }
}

#[get("/files")]
pub async fn get_file(query: web::Query<FileQueryParams>) -> HttpResponse {
    let path = match query.kind {
        FileKind::ReportAttachment => format!("./files/reports/{}", query.name),
    };
    if let Ok(file) = fs::read(path.clone()) {
        let mime = from_path(path).first_or_octet_stream();
        HttpResponse::Ok().content_type(mime).body(file)
    } else {
        HttpResponse::NotFound().body("CONTENT_NOT_FOUND")
    }
}
