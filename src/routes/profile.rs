use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use regex::Regex;
use std::str::FromStr;

use crate::models::profile::{
    Profile, ProfileAuthentication, ProfileCredential, ProfileRequest, ProfileResponse, Role,
};
use crate::routes::error_response;

#[post("/profiles/login")]
pub async fn login(payload: web::Json<ProfileCredential>) -> HttpResponse {
    let payload: ProfileCredential = payload.into_inner();

    match payload.authenticate().await {
        Ok((token, profile)) => HttpResponse::Ok().json(doc! {
            "token": to_bson::<String>(&token).unwrap(),
            "profile": to_bson::<ProfileResponse>(&profile).unwrap(),
        }),
        Err(error) => error_response(error),
    }
}
#[post("/profiles")]
pub async fn create_profile(payload: web::Json<ProfileRequest>, req: HttpRequest) -> HttpResponse {
    let payload: ProfileRequest = payload.into_inner();
    let email_regex: Regex = Regex::new(
        r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})",
    )
    .unwrap();

    if payload.password.len() < 8 {
        return HttpResponse::BadRequest().body("PROFILE_MUST_HAVE_VALID_PASSWORD");
    }
    if !email_regex.is_match(&payload.email) {
        return HttpResponse::BadRequest().body("PROFILE_MUST_HAVE_VALID_EMAIL");
    }

    // An empty roster bootstraps itself; afterwards only a safety manager
    // may add principals.
    match Profile::count().await {
        Ok(0) => (),
        Ok(_) => {
            let issuer = req.extensions().get::<ProfileAuthentication>().cloned();
            match issuer {
                Some(issuer) if issuer.role == Role::SafetyManager => (),
                _ => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
            }
        }
        Err(error) => return error_response(error),
    }

    match Profile::find_by_email(&payload.email).await {
        Ok(Some(_)) => return HttpResponse::BadRequest().body("PROFILE_ALREADY_EXIST"),
        Ok(None) => (),
        Err(error) => return error_response(error),
    }

    let mut profile: Profile = Profile {
        _id: None,
        full_name: payload.full_name,
        email: payload.email,
        password: payload.password,
        role: payload.role,
    };

    match profile.save().await {
        Ok(id) => HttpResponse::Created().body(id.to_string()),
        Err(error) => error_response(error),
    }
}
#[get("/profiles/{profile_id}")]
pub async fn get_profile(profile_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    if req.extensions().get::<ProfileAuthentication>().is_none() {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let profile_id: String = profile_id.into_inner();
    if let Ok(profile_id) = ObjectId::from_str(&profile_id) {
        match Profile::find_detail_by_id(&profile_id).await {
            Ok(Some(profile)) => HttpResponse::Ok().json(profile),
            Ok(None) => HttpResponse::NotFound().body("PROFILE_NOT_FOUND"),
            Err(error) => error_response(error),
        }
    } else {
        HttpResponse::BadRequest().body("INVALID_ID")
    }
}
