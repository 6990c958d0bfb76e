//! OpenAPI/Utoipa configuration.

use crate::api::{health::MISC_TAG, me::ACCOUNT_TAG};
use crate::oauth2::OAUTH2_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("agw_<prefix>_<secret>")
                .description(Some(
                    "API key issued at the end of `/v1/auth/{provider}/callback`.",
                ))
                .build();
            components.add_security_scheme("ApiKey", SecurityScheme::Http(bearer));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Agent Gateway API",
        version = "1.0.0",
        description = "Sign-in, API key issuance and account endpoints of the agent gateway."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "Browser sign-in through external identity providers"),
        (name = ACCOUNT_TAG, description = "Endpoints authenticated with an API key")
    )
)]
pub struct ApiDoc;
