use actix_web::{get, web, HttpResponse};
use mongodb::bson::oid::ObjectId;
use std::str::FromStr;

use crate::models::location::{Area, Department, Equipment, Site};
use crate::routes::error_response;

#[get("/sites")]
pub async fn get_sites() -> HttpResponse {
    match Site::find_many().await {
        Ok(sites) => HttpResponse::Ok().json(sites),
        Err(error) => error_response(error),
    }
}
#[get("/sites/{site_id}/departments")]
pub async fn get_site_departments(site_id: web::Path<String>) -> HttpResponse {
    let site_id = match ObjectId::from_str(&site_id.into_inner()) {
        Ok(site_id) => site_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Department::find_by_site(&site_id).await {
        Ok(departments) => HttpResponse::Ok().json(departments),
        Err(error) => error_response(error),
    }
}
#[get("/departments/{department_id}/areas")]
pub async fn get_department_areas(department_id: web::Path<String>) -> HttpResponse {
    let department_id = match ObjectId::from_str(&department_id.into_inner()) {
        Ok(department_id) => department_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Area::find_by_department(&department_id).await {
        Ok(areas) => HttpResponse::Ok().json(areas),
        Err(error) => error_response(error),
    }
}
#[get("/areas/{area_id}/equipment")]
pub async fn get_area_equipment(area_id: web::Path<String>) -> HttpResponse {
    let area_id = match ObjectId::from_str(&area_id.into_inner()) {
        Ok(area_id) => area_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Equipment::find_by_area(&area_id).await {
        Ok(equipment) => HttpResponse::Ok().json(equipment),
        Err(error) => error_response(error),
    }
}
