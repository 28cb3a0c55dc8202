use crate::utils::ApiTags;
use poem_openapi::{payload::PlainText, OpenApi};

#[derive(Default)]
pub struct HealthCheck;

#[OpenApi(prefix_path = "/health/", tag = "ApiTags::HealthCheck")]
impl HealthCheck {
    #[oai(path = "/liveness", method = "get")]
    async fn liveness(&self) -> PlainText<String> {
        PlainText("OK".to_string())
    }

    // stateless service, ready as soon as it listens
    #[oai(path = "/readiness", method = "get")]
    async fn readiness(&self) -> PlainText<String> {
        PlainText("OK".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poem::{test::TestClient, Route};
    use poem_openapi::OpenApiService;

    #[tokio::test]
    async fn test_probes() {
        let service = OpenApiService::new(HealthCheck, "TikLoad", "1.0");
        let cli = TestClient::new(Route::new().nest("/api", service));

        for probe in ["/api/health/liveness", "/api/health/readiness"] {
            let resp = cli.get(probe).send().await;
            resp.assert_status_is_ok();
            resp.assert_text("OK").await;
        }
    }
}
