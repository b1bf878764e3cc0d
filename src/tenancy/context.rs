use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use const_format::concatcp;
use parking_lot::RwLock;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, Parameter, ParameterValue};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tracing::{error, trace, warn};
use crate::constants::TENANT_HEADER;
use crate::data::enums::TenantStatus;
use crate::data::error::ApiError;
use crate::data::objects::AppState;
use crate::data::tenant::{parse_tenant_id, Tenant};

/// Request-scoped binding of the current tenant. Never persisted, never a
/// process-wide singleton: one context exists per logical unit of work and
/// is dropped with it.
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant: Tenant,
    pub bound_at: i64,
}

/// The binding slot threaded through the call chain to the connection
/// provider. An unbound slot fails every scoped acquire instead of
/// defaulting to some namespace.
#[derive(Clone, Debug)]
pub struct TenantBinding {
    inner: Option<TenantContext>,
}

impl TenantBinding {
    pub fn unbound() -> Self {
        Self { inner: None }
    }

    pub fn bind(tenant: Tenant) -> Self {
        Self {
            inner: Some(TenantContext {
                tenant,
                bound_at: chrono::Utc::now().timestamp(),
            }),
        }
    }

    pub fn context(&self) -> Result<&TenantContext, ApiError> {
        self.inner.as_ref().ok_or(ApiError::NoTenantBound)
    }
}

/// Per-tenant counters of requests currently bound, used to drain a tenant
/// before its namespace is decommissioned.
#[derive(Clone, Default)]
pub struct ActiveRequests {
    counters: Arc<RwLock<HashMap<String, Arc<AtomicI64>>>>,
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new unit of work against the tenant. The returned guard
    /// decrements on Drop, on success and failure paths alike.
    pub fn begin(&self, tenant_id: &str) -> InFlightGuard {
        let counter = {
            let mut counters = self.counters.write();
            counters
                .entry(tenant_id.to_string())
                .or_insert_with(|| Arc::new(AtomicI64::new(0)))
                .clone()
        };
        counter.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { counter }
    }

    pub fn in_flight(&self, tenant_id: &str) -> i64 {
        self.counters
            .read()
            .get(tenant_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

pub struct InFlightGuard {
    counter: Arc<AtomicI64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Rocket guard implementation: the request-binding middleware.
///
/// Resolves the X-Tenant-ID header through the catalog before any handler
/// logic runs. Missing or malformed identifiers are rejected with 400,
/// unknown tenants with 404 and non-Active tenants with 409. The guard
/// value is handed to the handler and dropped when the request ends, so a
/// reused worker never carries one tenant's binding into the next request.
pub struct BoundTenant {
    binding: TenantBinding,
    _in_flight: InFlightGuard,
}

impl BoundTenant {
    pub fn binding(&self) -> &TenantBinding {
        &self.binding
    }

    pub fn tenant(&self) -> &Tenant {
        // A BoundTenant is only ever constructed around a bound slot.
        &self.binding.context().expect("BoundTenant without context").tenant
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BoundTenant {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = request.rocket().state::<AppState>() else {
            error!("AppState not managed; cannot bind tenant");
            return Outcome::Error((Status::InternalServerError, ()));
        };

        let Some(raw) = request.headers().get_one(TENANT_HEADER) else {
            warn!(uri = %request.uri(), "Request without tenant header");
            return Outcome::Error((Status::BadRequest, ()));
        };
        let Some(tenant_id) = parse_tenant_id(raw) else {
            warn!(value = raw, "Malformed tenant identifier");
            return Outcome::Error((Status::BadRequest, ()));
        };

        match state.catalog.find(&tenant_id).await {
            Ok(Some(tenant)) if tenant.status == TenantStatus::Active => {
                let in_flight = state.active.begin(&tenant.id);
                trace!(tenant = %tenant.id, namespace = %tenant.namespace, "Request bound");
                Outcome::Success(BoundTenant {
                    binding: TenantBinding::bind(tenant),
                    _in_flight: in_flight,
                })
            }
            Ok(Some(tenant)) => {
                warn!(tenant = %tenant.id, status = %tenant.status, "Binding refused; tenant not active");
                Outcome::Error((Status::Conflict, ()))
            }
            Ok(None) => {
                warn!(tenant = %tenant_id, "Binding refused; unknown tenant");
                Outcome::Error((Status::NotFound, ()))
            }
            Err(e) => {
                error!(error = %e, "Catalog lookup failed while binding");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

/// Generate OpenAPI documentation for the binding header
impl<'r> OpenApiFromRequest<'r> for BoundTenant {
    fn from_request_input(
        gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        let schema = gen.json_schema::<String>();
        Ok(RequestHeaderInput::Parameter(Parameter {
            name: TENANT_HEADER.to_owned(),
            location: "header".to_owned(),
            description: Some(
                concatcp!("Tenant identifier (UUID). Every request is bound to exactly one tenant via the ", TENANT_HEADER, " header.").to_owned(),
            ),
            required: true,
            deprecated: false,
            allow_empty_value: false,
            value: ParameterValue::Schema {
                style: None,
                explode: None,
                allow_reserved: false,
                schema,
                example: None,
                examples: None,
            },
            extensions: Object::default(),
        }))
    }
}
