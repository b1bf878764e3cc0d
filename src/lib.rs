use std::fs;
use std::sync::Arc;
use rocket::{Build, Rocket};
use rocket::http::Method;
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::rapidoc::{make_rapidoc, GeneralConfig, RapiDocConfig};
use rocket_okapi::settings::UrlObject;
use tracing_subscriber::EnvFilter;
use crate::api::*;
use crate::constants::{API_PORT, TENANCY_VERSION};
use crate::data::objects::AppState;
use crate::db::TenantCatalog;
use crate::settings::{DrainSettings, Settings};
use crate::tenancy::context::ActiveRequests;
use crate::tenancy::lifecycle::TenantLifecycleService;
use crate::tenancy::provider::ScopedConnectionProvider;
use crate::tenancy::provisioner::SchemaProvisioner;

mod api;
pub mod auth;
pub mod constants;
pub mod data;
pub mod db;
mod helper;
pub mod settings;
pub mod tenancy;

pub async fn create_rocket() -> Rocket<Build> {
    println!("Starting QuizForge Tenancy API");
    println!("Version {TENANCY_VERSION}");

    println!("Loading settings from file");
    let settings = Settings::load_from_file(None).expect("Failed loading settings");

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    println!("Using data directory at {}", settings.data_dir);
    let state = build_state(&settings).expect("Failed to initialize tenancy state");

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Put, Method::Delete]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true);

    println!("Initialization complete.");

    rocket::build()
        .configure(rocket::Config::figment().merge(("port", API_PORT)))
        .manage(state)
        .mount(
            "/api",
            openapi_get_routes![
                version,
                create_tenant,
                list_tenants,
                get_tenant,
                update_tenant,
                retry_provision,
                migrate_tenant,
                tenant_stats,
                delete_tenant,
                create_tenant_user,
                list_tenant_users
            ],
        )
        .mount(
            "/api",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("General", "/api/openapi.json")],
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
        .attach(cors.to_cors().expect("Invalid CORS configuration"))
}

fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
    fs::create_dir_all(&settings.data_dir)?;
    let catalog = TenantCatalog::new(&settings.catalog_path(), settings.pool_size)?;
    let provisioner = Arc::new(SchemaProvisioner::new(settings.namespace_dir())?);
    let provider = ScopedConnectionProvider::new(catalog.shared_pool(), settings.namespace_dir());
    let active = ActiveRequests::new();
    let lifecycle = TenantLifecycleService::new(
        catalog.clone(),
        provisioner.clone(),
        provider.clone(),
        active.clone(),
        settings.drain.clone(),
    );

    Ok(AppState {
        catalog,
        provider,
        provisioner,
        lifecycle,
        active,
        settings: settings.clone(),
    })
}

pub async fn create_test_rocket() -> Rocket<Build> {
    create_test_rocket_with_pool(5).await
}

/// Test rocket over a throwaway data directory. The pool size is
/// configurable so tests can force physical-connection reuse.
pub async fn create_test_rocket_with_pool(pool_size: u32) -> Rocket<Build> {
    let data_dir = std::env::temp_dir()
        .join(format!("quizforge-test-{}", uuid::Uuid::new_v4().simple()));
    let settings = Settings {
        data_dir: data_dir.to_string_lossy().into_owned(),
        pool_size,
        drain: DrainSettings {
            window_secs: 1,
            poll_ms: 10,
        },
        log_filter: "warn".to_string(),
    };

    let state = build_state(&settings).expect("Failed to initialize tenancy state");

    rocket::build()
        .manage(state)
        .mount(
            "/",
            openapi_get_routes![
                version,
                create_tenant,
                list_tenants,
                get_tenant,
                update_tenant,
                retry_provision,
                migrate_tenant,
                tenant_stats,
                delete_tenant,
                create_tenant_user,
                list_tenant_users
            ],
        )
}
