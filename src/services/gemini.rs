//! REST client for a Gemini-style `generateContent` image endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::image_service::{ImageGenerator, ServiceError};
use crate::models::{
    ColorSpec, EncodedImage, GenerationSettings, RecolorSettings, ServiceConfig, SizeClass,
    SourceImage, Tier,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http: reqwest::Client,
    config: ServiceConfig,
}

impl GeminiClient {
    pub fn new(config: ServiceConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn endpoint(&self, tier: Tier) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_for(tier)
        )
    }

    async fn call(&self, tier: Tier, request: GenerateRequest) -> Result<EncodedImage, ServiceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::new("API key missing"))?;
        let url = self.endpoint(tier);

        tracing::debug!(url = %url, tier = %tier, "Calling image service");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::new(format!("network error: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::new(format!("network error: {e}")))?;

        if !status.is_success() {
            let description = describe_error(status.as_u16(), &body);
            tracing::debug!(status = status.as_u16(), error = %description, "Image service returned error");
            return Err(ServiceError::new(description));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::new(format!("invalid response: {e}")))?;
        extract_image(parsed)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    fn check_ready(&self, tier: Tier) -> Result<(), String> {
        let has_key = self
            .config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if !has_key {
            return Err("no API key configured (set GEMINI_API_KEY)".to_string());
        }
        if tier == Tier::Pro && !self.config.pro_enabled {
            return Err("pro tier is not enabled for this account".to_string());
        }
        Ok(())
    }

    async fn recolor(
        &self,
        image: &SourceImage,
        color: &ColorSpec,
        settings: &RecolorSettings,
    ) -> Result<EncodedImage, ServiceError> {
        let prompt = recolor_prompt(color, settings.instructions.as_deref());
        let parts = vec![
            Part::inline(&image.image),
            Part::Text { text: prompt },
        ];
        let request = GenerateRequest::new(parts, settings.tier, settings.size_class, None);
        self.call(settings.tier, request).await
    }

    async fn generate(&self, settings: &GenerationSettings) -> Result<EncodedImage, ServiceError> {
        let parts = vec![Part::Text {
            text: settings.prompt.clone(),
        }];
        let request = GenerateRequest::new(
            parts,
            settings.tier,
            settings.size_class,
            settings.aspect_ratio.clone(),
        );
        self.call(settings.tier, request).await
    }
}

fn recolor_prompt(color: &ColorSpec, instructions: Option<&str>) -> String {
    let mut prompt = format!(
        "Recolor the main garment in this photo to {} (hex {}). \
         Keep the fabric texture, folds, shadows, highlights, stitching and \
         hardware unchanged. Do not alter the background, the model, the \
         framing or any other object. Return only the edited image.",
        color.name(),
        color.hex()
    );
    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nAdditional instructions: ");
        prompt.push_str(extra);
    }
    prompt
}

/// Format a non-2xx response as `"{code} {STATUS}: {message}"`.
///
/// Falls back to the raw body when it is not the structured error envelope.
fn describe_error(code: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => {
            let status = error.status.unwrap_or_default();
            let message = error.message.unwrap_or_default();
            format!("{code} {status}: {message}")
        }
        Err(_) => format!("{code}: {}", body.trim()),
    }
}

fn extract_image(response: GenerateResponse) -> Result<EncodedImage, ServiceError> {
    let inline = response
        .candidates
        .into_iter()
        .flat_map(|c| c.content.map(|c| c.parts).unwrap_or_default())
        .find_map(|p| p.inline_data)
        .ok_or_else(|| ServiceError::new("model returned no image"))?;

    let data = BASE64
        .decode(inline.data.as_bytes())
        .map_err(|e| ServiceError::new(format!("invalid image data: {e}")))?;
    Ok(EncodedImage::new(inline.mime_type, data))
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn new(parts: Vec<Part>, tier: Tier, size: SizeClass, aspect_ratio: Option<String>) -> Self {
        // Only the pro model accepts an explicit output size
        let image_size = (tier == Tier::Pro).then(|| size.as_str().to_string());
        let image_config = (image_size.is_some() || aspect_ratio.is_some()).then_some(ImageConfig {
            image_size,
            aspect_ratio,
        });
        Self {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    fn inline(image: &EncodedImage) -> Self {
        Part::Inline {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: BASE64.encode(image.bytes()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}
