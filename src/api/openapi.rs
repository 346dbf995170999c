//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the dropzone-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the dropzone-dl REST API
///
/// The OpenAPI document can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "dropzone-dl REST API",
        version = "0.1.0",
        description = "Per-user media download commands: submit a URL, choose audio, video or both, follow progress and manage stored files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Commands
        crate::api::routes::submit_url,
        crate::api::routes::select,
        crate::api::routes::get_download,
        crate::api::routes::cancel_download,
        crate::api::routes::clear_download,

        // System
        crate::api::routes::start,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::UserId,
        crate::types::Status,
        crate::types::MediaKind,
        crate::types::MediaChoice,
        crate::types::DeliveryKind,
        crate::types::TaskInfo,
        crate::types::Event,

        crate::downloader::SessionPrompt,
        crate::downloader::Accepted,
        crate::downloader::ClearOutcome,

        crate::api::routes::SubmitUrlRequest,
        crate::api::routes::SelectionRequest,
        crate::api::routes::MessageResponse,
        crate::api::routes::TaskReport,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "users", description = "Per-user commands - URL intake, selection, status, cancel and cleanup"),
        (name = "system", description = "System endpoints - Greeting, health, OpenAPI spec, events"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the `X-Api-Key` header scheme
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
