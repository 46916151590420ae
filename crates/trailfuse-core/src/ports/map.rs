use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Raster map background fetched for a GPS bounding box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapImage {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

impl MapImage {
    /// Size of the image payload in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Port for static map image providers
#[async_trait]
pub trait MapImageProvider: Send + Sync {
    /// Fetch a map image covering `bbox` (`minLng,minLat,maxLng,maxLat`)
    async fn fetch(&self, bbox: &str, width: u32, height: u32) -> Result<MapImage>;

    /// Provider name for logs and reports
    fn name(&self) -> &str;
}
