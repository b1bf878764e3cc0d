use std::fmt::Display;
use rocket::http::Status;
use rocket::Request;
use rocket::response::Responder;
use rocket::response::status::Custom;
use rocket_okapi::{okapi, JsonSchema, OpenApiError};
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use tracing::error;

#[derive(Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed tenant identifier, rejected before any lookup.
    BadTenantId(String),
    /// No catalog row for the supplied tenant id.
    UnknownTenant(String),
    /// The tenant exists but is not in the Active state.
    TenantNotActive(String),
    /// The owner already has a live tenant.
    DuplicateTenant(String),
    /// The requested status change is not a legal lifecycle transition.
    InvalidStateTransition(String),
    /// A scoped handle was requested without a bound tenant. Programming
    /// error on the caller's side; never falls back to a namespace.
    NoTenantBound,
    /// Provisioning failed and was rolled back; the tenant row carries the
    /// ProvisionFailed status for operator follow-up.
    ProvisionFailure(String),
    /// A connection crossed the namespace boundary contract. Fatal for the
    /// request, always alerted.
    IsolationViolation(String),
    Database(rusqlite::Error),
    Other(String),
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'static> {
        let (status, message) = match self {
            ApiError::BadTenantId(e) => (Status::BadRequest, e),
            ApiError::UnknownTenant(id) => (Status::NotFound, format!("unknown tenant {id}")),
            ApiError::TenantNotActive(id) => (Status::Conflict, format!("tenant {id} is not active")),
            ApiError::DuplicateTenant(email) => (Status::Conflict, format!("{email} already owns a tenant")),
            ApiError::InvalidStateTransition(e) => (Status::Conflict, e),
            ApiError::NoTenantBound => {
                error!("scoped acquire without a bound tenant");
                (Status::InternalServerError, "no tenant bound".to_string())
            },
            ApiError::ProvisionFailure(e) => (Status::InternalServerError, e),
            ApiError::IsolationViolation(e) => {
                error!(violation = %e, "tenant isolation violation");
                (Status::InternalServerError, "tenant isolation violation".to_string())
            },
            ApiError::Database(e) => (Status::InternalServerError, e.to_string()),
            ApiError::Other(e) => (Status::InternalServerError, e),
        };

        let body = rocket::serde::json::Json(ErrorResponse {
            error: message,
        });

        Custom(status, body).respond_to(req)
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{Responses, Response as OpenApiResponse, RefOr};

        let schema = gen.json_schema::<ErrorResponse>();
        let json_response = OpenApiResponse {
            description: "API error".to_owned(),
            content: {
                let mut map = okapi::Map::new();
                map.insert(
                    "application/json".to_owned(),
                    okapi::openapi3::MediaType {
                        schema: Some(schema),
                        ..Default::default()
                    },
                );
                map
            },
            ..Default::default()
        };

        let mut responses = Responses::default();
        for code in &[400, 404, 409, 500] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(json_response.clone()),
            );
        }

        Ok(responses)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(error: rusqlite::Error) -> Self {
        ApiError::Database(error)
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(error: r2d2::Error) -> Self {
        ApiError::Other(format!("DB pool error: {error}"))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        // Keep taxonomy errors intact when they bubble through anyhow.
        match error.downcast::<ApiError>() {
            Ok(api) => api,
            Err(other) => ApiError::Other(other.to_string()),
        }
    }
}

impl std::error::Error for ApiError {}
