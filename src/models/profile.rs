use crate::database::get_db;
use crate::error::ReportError;

use actix_service::{self, Transform};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse},
    Error, HttpMessage,
};
use chrono::Utc;
use futures::{
    future::{ready, LocalBoxFuture, Ready},
    stream::StreamExt,
    FutureExt,
};
use jsonwebtoken::{self, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::{
    bson::{doc, from_document, oid::ObjectId},
    Collection, Database,
};
use pwhash::bcrypt;
use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, rc::Rc, str::FromStr, sync::OnceLock};

struct Keys {
    private_access: String,
    public_access: String,
}

static KEYS: OnceLock<Keys> = OnceLock::new();

/// Principal roles. Administration of the roster happens outside this
/// server; the core only reads the role for gating.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SafetyEngineer,
    SafetyManager,
    DeptManager,
}

/// The gated lifecycle actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportAction {
    CreateReport,
    CreateRiskAssessment,
    CloseLoop,
}

impl Role {
    /// Capability table for the report lifecycle. This answers role ×
    /// action only; stateful preconditions (report status, existing
    /// assessment) are re-checked by the transitions themselves.
    pub fn permits(&self, action: &ReportAction) -> bool {
        matches!(
            (self, action),
            (Role::SafetyEngineer, ReportAction::CreateReport)
                | (Role::SafetyManager, ReportAction::CreateRiskAssessment)
                | (Role::DeptManager, ReportAction::CloseLoop)
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProfileClaims {
    aud: String,
    exp: i64,
    iss: String,
    sub: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ProfileCredential {
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ProfileRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ProfileResponse {
    pub _id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}
#[derive(Debug)]
pub struct ProfileAuthenticationData {
    pub _id: ObjectId,
    pub role: Role,
}
pub struct ProfileAuthenticationMiddleware<S> {
    service: Rc<S>,
}
pub struct ProfileAuthenticationMiddlewareFactory;

pub type ProfileAuthentication = Rc<ProfileAuthenticationData>;

impl Profile {
    pub async fn save(&mut self) -> Result<ObjectId, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Profile> = db.collection::<Profile>("profiles");

        self._id = Some(ObjectId::new());

        if let Ok(hash) = bcrypt::hash(&self.password) {
            self.password = hash;
            collection
                .insert_one(self, None)
                .await
                .map_err(|_| ReportError::Storage("INSERTING_FAILED"))
                .map(|result| result.inserted_id.as_object_id().unwrap())
        } else {
            Err(ReportError::Storage("HASHING_FAILED"))
        }
    }
    pub async fn count() -> Result<u64, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Profile> = db.collection::<Profile>("profiles");

        collection
            .count_documents(doc! {}, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Profile>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Profile> = db.collection::<Profile>("profiles");

        collection
            .find_one(doc! { "_id": _id }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
    pub async fn find_by_email(email: &String) -> Result<Option<Profile>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Profile> = db.collection::<Profile>("profiles");

        collection
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))
    }
    pub async fn find_detail_by_id(_id: &ObjectId) -> Result<Option<ProfileResponse>, ReportError> {
        let db: Database = get_db();
        let collection: Collection<Profile> = db.collection::<Profile>("profiles");

        let pipeline = vec![
            doc! { "$match": { "_id": _id } },
            doc! {
                "$project": {
                    "_id": { "$toString": "$_id" },
                    "full_name": "$full_name",
                    "email": "$email",
                    "role": "$role",
                }
            },
        ];

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(|_| ReportError::Storage("QUERY_FAILED"))?;

        if let Some(Ok(doc)) = cursor.next().await {
            let profile = from_document::<ProfileResponse>(doc)
                .map_err(|_| ReportError::Storage("QUERY_FAILED"))?;
            Ok(Some(profile))
        } else {
            Ok(None)
        }
    }
}

impl ProfileCredential {
    pub async fn authenticate(&self) -> Result<(String, ProfileResponse), ReportError> {
        let profile = match Profile::find_by_email(&self.email).await? {
            Some(profile) => profile,
            None => return Err(ReportError::Validation("INVALID_COMBINATION")),
        };
        if !bcrypt::verify(self.password.clone(), &profile.password) {
            return Err(ReportError::Validation("INVALID_COMBINATION"));
        }

        let _id = profile
            ._id
            .ok_or(ReportError::Storage("PROFILE_MISSING_ID"))?;
        let claims: ProfileClaims = ProfileClaims {
            sub: ObjectId::to_string(&_id),
            exp: Utc::now().timestamp() + 86400,
            iss: "fir-server".to_string(),
            aud: "fir-web".to_string(),
        };

        let header: Header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(keys().private_access.as_bytes())
            .map_err(|_| ReportError::Storage("TOKEN_GENERATING_FAILED"))?;
        let token =
            encode(&header, &claims, &key).map_err(|_| ReportError::Storage("TOKEN_GENERATING_FAILED"))?;

        Ok((
            token,
            ProfileResponse {
                _id: _id.to_string(),
                full_name: profile.full_name,
                email: profile.email,
                role: profile.role,
            },
        ))
    }
    pub fn verify(token: &str) -> Option<ObjectId> {
        let validation: Validation = Validation::new(Algorithm::RS256);
        let key = DecodingKey::from_rsa_pem(keys().public_access.as_bytes()).ok()?;
        let data = decode::<ProfileClaims>(token, &key, &validation).ok()?;
        ObjectId::from_str(&data.claims.sub).ok()
    }
}

impl<S, B> Service<ServiceRequest> for ProfileAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv: Rc<S> = self.service.clone();

        async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|header| header.to_str().ok())
                .and_then(|header| header.strip_prefix("Bearer "))
                .map(|token| token.to_string());
            if let Some(token) = token {
                if let Some(_id) = ProfileCredential::verify(&token) {
                    if let Ok(Some(profile)) = Profile::find_by_id(&_id).await {
                        let auth_data: ProfileAuthenticationData = ProfileAuthenticationData {
                            _id,
                            role: profile.role,
                        };
                        req.extensions_mut()
                            .insert::<ProfileAuthentication>(Rc::new(auth_data));
                    }
                }
            }
            let res: ServiceResponse<B> = srv.call(req).await?;
            Ok(res)
        }
        .boxed_local()
    }
}
impl<S, B> Transform<S, ServiceRequest> for ProfileAuthenticationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ProfileAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProfileAuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub fn load_keys() {
    let private_access =
        read_to_string("./keys/private_access.key").expect("LOAD_FAILED_PRIVATE_ACCESS");
    let public_access =
        read_to_string("./keys/public_access.pem").expect("LOAD_FAILED_PUBLIC_ACCESS");
    KEYS.set(Keys {
        private_access,
        public_access,
    })
    .ok();
}

fn keys() -> &'static Keys {
    KEYS.get().expect("Signing keys are not loaded yet!")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Role; 3] = [Role::SafetyEngineer, Role::SafetyManager, Role::DeptManager];
    const ACTIONS: [ReportAction; 3] = [
        ReportAction::CreateReport,
        ReportAction::CreateRiskAssessment,
        ReportAction::CloseLoop,
    ];

    #[test]
    fn engineer_files_reports() {
        assert!(Role::SafetyEngineer.permits(&ReportAction::CreateReport));
        assert!(!Role::SafetyManager.permits(&ReportAction::CreateReport));
        assert!(!Role::DeptManager.permits(&ReportAction::CreateReport));
    }

    #[test]
    fn manager_assesses_risk() {
        assert!(Role::SafetyManager.permits(&ReportAction::CreateRiskAssessment));
        assert!(!Role::SafetyEngineer.permits(&ReportAction::CreateRiskAssessment));
        assert!(!Role::DeptManager.permits(&ReportAction::CreateRiskAssessment));
    }

    #[test]
    fn dept_manager_closes_loop() {
        assert!(Role::DeptManager.permits(&ReportAction::CloseLoop));
        assert!(!Role::SafetyEngineer.permits(&ReportAction::CloseLoop));
        assert!(!Role::SafetyManager.permits(&ReportAction::CloseLoop));
    }

    #[test]
    fn every_role_holds_exactly_one_capability() {
        for role in ROLES {
            let granted = ACTIONS
                .iter()
                .filter(|action| role.permits(action))
                .count();
            assert_eq!(granted, 1);
        }
    }

    #[test]
    fn role_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::SafetyEngineer).unwrap(),
            "\"safety_engineer\""
        );
        assert_eq!(
            serde_json::to_string(&Role::DeptManager).unwrap(),
            "\"dept_manager\""
        );
    }
}
