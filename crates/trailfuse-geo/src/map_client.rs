//! Static map image client

use async_trait::async_trait;
use trailfuse_core::error::{Result, TrailError};
use trailfuse_core::ports::{MapImage, MapImageProvider};

/// Fetches map backgrounds from a URL template.
///
/// The template's `{bbox}`, `{width}` and `{height}` placeholders are
/// substituted per request.
pub struct StaticMapClient {
    url_template: String,

    /// HTTP client
    client: reqwest::Client,
}

impl StaticMapClient {
    pub fn new(url_template: impl Into<String>) -> Result<Self> {
        let url_template = url_template.into();
        if !url_template.contains("{bbox}") {
            return Err(TrailError::ConfigInvalid {
                key: "map_provider_url".to_string(),
                reason: "URL template must contain a {bbox} placeholder".to_string(),
            });
        }
        Ok(Self { url_template, client: reqwest::Client::new() })
    }

    /// Request URL for a bounding box and image size
    pub fn url_for(&self, bbox: &str, width: u32, height: u32) -> String {
        self.url_template
            .replace("{bbox}", bbox)
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string())
    }
}

#[async_trait]
impl MapImageProvider for StaticMapClient {
    async fn fetch(&self, bbox: &str, width: u32, height: u32) -> Result<MapImage> {
        let url = self.url_for(bbox, width, height);
        tracing::debug!(%url, "Fetching map image");

        let response = self.client.get(&url).send().await.map_err(|e| TrailError::MapFetch {
            reason: format!("Failed to connect to map provider: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrailError::MapFetch {
                reason: format!("Map provider error ({}): {}", status, error_text),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| TrailError::MapFetch {
            reason: format!("Failed to read map image: {}", e),
        })?;

        Ok(MapImage { bytes: bytes.to_vec(), content_type, width, height })
    }

    fn name(&self) -> &str {
        "static-map"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_template_substitution() {
        let client =
            StaticMapClient::new("https://maps.example/img?bbox={bbox}&size={width}x{height}")
                .unwrap();
        assert_eq!(
            client.url_for("3,1,4,2", 800, 600),
            "https://maps.example/img?bbox=3,1,4,2&size=800x600"
        );
    }

    #[test]
    fn test_template_requires_bbox() {
        assert!(matches!(
            StaticMapClient::new("https://maps.example/img"),
            Err(TrailError::ConfigInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_map_error() {
        let client = StaticMapClient::new("http://127.0.0.1:9/map?bbox={bbox}").unwrap();
        let result = client.fetch("0,0,1,1", 10, 10).await;
        assert!(matches!(result, Err(TrailError::MapFetch { .. })));
    }
}
