use crate::scan::Symbol;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

/// `(key, value)` pairs serialized as a JSON object, keeping their order
pub struct OrderedMap(pub Vec<(&'static str, &'static str)>);

impl Serialize for OrderedMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A base 64 image sent as a JSON body, optionally a data URI
#[derive(Deserialize)]
pub struct B64Image {
    pub image: Option<String>,
}

impl std::fmt::Debug for B64Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.image {
            Some(image) => write!(f, "B64Image {{ image: <{} chars> }}", image.len()),
            None => write!(f, "B64Image {{ image: None }}"),
        }
    }
}

/// A request to render a barcode. `text` and `type` are the field names
/// older clients send
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(alias = "text")]
    pub content: Option<String>,

    #[serde(alias = "type")]
    pub barcode_type: Option<String>,
}

/// Any failed request
#[derive(Debug, serde::Serialize)]
pub struct Failure {
    pub success: bool,
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Failure {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub results: Vec<Symbol>,
    pub count: usize,
    pub message: String,
}

impl From<Vec<Symbol>> for ScanResponse {
    fn from(results: Vec<Symbol>) -> Self {
        let count = results.len();
        ScanResponse {
            success: true,
            results,
            count,
            message: format!("found {count} barcode(s)"),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub image_url: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(serde::Serialize)]
pub struct SupportedTypesResponse {
    pub success: bool,
    pub types: OrderedMap,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(serde::Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: OrderedMap,
}
