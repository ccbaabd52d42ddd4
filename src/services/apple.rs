//! Apple App Site Association document, generated per tenant so universal
//! links open the app registered for the serving domain.

use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;

use crate::middleware::current_tenant;

pub struct AppleService;

impl AppleService {
    /// GET /.well-known/apple-app-site-association
    pub async fn site_association(req: HttpRequest) -> HttpResponse {
        let Some(tenant) = current_tenant(&req) else {
            return HttpResponse::NotFound()
                .json(json!({ "error": "App not configured for this domain" }));
        };

        HttpResponse::Ok().json(json!({
            "applinks": {
                "apps": [],
                "details": [
                    {
                        "appID": format!("{}.{}", tenant.team_id, tenant.bundle_id),
                        "paths": [
                            "/api/v1/track/click",
                            "/t",
                            "/click",
                            "/track",
                            "/*"
                        ]
                    }
                ]
            }
        }))
    }
}
