use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use booth_contracts::events::{BoothEvent, SessionLog};
use reqwest::blocking::multipart::Form as MultipartForm;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub mod capture;
pub mod crop;
pub mod delivery;

const RUNWARE_API_URL: &str = "https://api.runware.ai/v1";
const RUNWARE_MODEL: &str = "runware:97@1";
const FAL_API_URL: &str = "https://fal.run/fal-ai/flux-pro/kontext";
const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GOOGLE_MODEL: &str = "gemini-2.5-flash-image-preview";
const IMGBB_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const INFERENCE_TIMEOUT: Duration = Duration::from_secs(120);

pub const DEFAULT_PROVIDER_PRIORITY: &str = "runware,fal,google";

/// One edit request: the guest's captured portrait plus the composed prompt.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub image_data_uri: String,
    pub prompt: String,
}

impl EditRequest {
    pub fn new(image_data_uri: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            image_data_uri: image_data_uri.into(),
            prompt: prompt.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !is_data_image_url(&self.image_data_uri) {
            bail!("image must be a data:image/... URL");
        }
        if self.prompt.trim().is_empty() {
            bail!("prompt must not be empty");
        }
        Ok(())
    }
}

/// What a provider hands back: either a hosted URL or inline bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderImage {
    Url(String),
    Inline { base64: String, mime: String },
}

/// A backend capable of editing an image against a prompt.
pub trait ImageEditProvider {
    fn id(&self) -> &'static str;
    /// Whether the provider has credentials available right now.
    fn configured(&self) -> bool;
    fn edit(&self, request: &EditRequest) -> Result<ProviderImage>;
}

/// The final transform outcome handed to delivery and the HTTP layer.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub provider: String,
    pub bytes: Vec<u8>,
    pub data_uri: String,
    /// Publicly shareable link when one exists: the provider's own hosted
    /// URL, or a republished copy of an inline result.
    pub public_url: Option<String>,
    pub prompt_used: String,
}

// ---------------------------------------------------------------------------
// Runware

pub struct RunwareAdapter {
    http: HttpClient,
    api_key: Option<String>,
    api_url: String,
}

impl Default for RunwareAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RunwareAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpClient::new(),
            api_key: non_empty_env("RUNWARE_API_KEY"),
            api_url: RUNWARE_API_URL.to_string(),
        }
    }

    fn post_tasks(&self, tasks: Value, timeout: Duration) -> Result<Vec<Value>> {
        let response = self
            .http
            .post(&self.api_url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(&tasks)
            .send()
            .context("runware request failed")?;
        let parsed = response_json_or_error("runware", response)?;
        if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                bail!(
                    "runware reported errors: {}",
                    truncate_text(&Value::Array(errors.clone()).to_string(), 500)
                );
            }
        }
        let rows = parsed
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if rows.is_empty() {
            bail!(
                "runware response carried no task data: {}",
                truncate_text(&parsed.to_string(), 500)
            );
        }
        Ok(rows)
    }

    /// Registers the source image and returns the Runware-side image UUID.
    fn upload_image(&self, api_key: &str, data_uri: &str) -> Result<String> {
        let task_uuid = Uuid::new_v4().to_string();
        let tasks = json!([
            { "taskType": "authentication", "apiKey": api_key },
            { "taskType": "imageUpload", "taskUUID": task_uuid, "image": data_uri },
        ]);
        let rows = self.post_tasks(tasks, UPLOAD_TIMEOUT)?;
        runware_image_uuid(&rows, &task_uuid)
    }

    fn run_inference(&self, api_key: &str, image_uuid: &str, prompt: &str) -> Result<String> {
        let task_uuid = Uuid::new_v4().to_string();
        let tasks = json!([
            { "taskType": "authentication", "apiKey": api_key },
            {
                "taskType": "imageInference",
                "taskUUID": task_uuid,
                "outputType": "URL",
                "outputFormat": "JPG",
                "positivePrompt": prompt,
                "seedImage": image_uuid,
                "model": RUNWARE_MODEL,
                "width": 1024,
                "height": 1024,
                "steps": 28,
                "CFGScale": 3.5,
                "numberResults": 1,
                "deliveryMethod": "sync",
            },
        ]);
        let rows = self.post_tasks(tasks, INFERENCE_TIMEOUT)?;
        runware_image_url(&rows)
    }
}

/// Pulls the uploaded image's UUID out of the Runware task rows; failures
/// carry a bounded excerpt of the rows for diagnosis.
fn runware_image_uuid(rows: &[Value], task_uuid: &str) -> Result<String> {
    rows.iter()
        .find(|row| {
            row.get("taskType").and_then(Value::as_str) == Some("imageUpload")
                && row.get("taskUUID").and_then(Value::as_str) == Some(task_uuid)
        })
        .and_then(|row| row.get("imageUUID").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "runware upload response missing imageUUID: {}",
                truncate_text(&Value::from(rows.to_vec()).to_string(), 500)
            )
        })
}

fn runware_image_url(rows: &[Value]) -> Result<String> {
    rows.iter()
        .find(|row| row.get("taskType").and_then(Value::as_str) == Some("imageInference"))
        .and_then(|row| {
            row.get("imageURL")
                .and_then(Value::as_str)
                .or_else(|| {
                    row.get("images")
                        .and_then(Value::as_array)
                        .and_then(|images| images.first())
                        .and_then(|first| first.get("imageURL"))
                        .and_then(Value::as_str)
                })
                .map(str::to_string)
        })
        .ok_or_else(|| {
            anyhow::anyhow!(
                "runware inference response missing imageURL: {}",
                truncate_text(&Value::from(rows.to_vec()).to_string(), 500)
            )
        })
}

impl ImageEditProvider for RunwareAdapter {
    fn id(&self) -> &'static str {
        "runware"
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn edit(&self, request: &EditRequest) -> Result<ProviderImage> {
        let api_key = self
            .api_key
            .as_deref()
            .context("RUNWARE_API_KEY is not set")?;
        let image_uuid = self
            .upload_image(api_key, &request.image_data_uri)
            .context("runware image upload failed")?;
        let url = self
            .run_inference(api_key, &image_uuid, &request.prompt)
            .context("runware inference failed")?;
        Ok(ProviderImage::Url(url))
    }
}

// ---------------------------------------------------------------------------
// fal.ai

pub struct FalAdapter {
    http: HttpClient,
    api_key: Option<String>,
    api_url: String,
}

impl Default for FalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FalAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpClient::new(),
            api_key: non_empty_env("FAL_KEY").or_else(|| non_empty_env("FAL_API_KEY")),
            api_url: FAL_API_URL.to_string(),
        }
    }
}

impl ImageEditProvider for FalAdapter {
    fn id(&self) -> &'static str {
        "fal"
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn edit(&self, request: &EditRequest) -> Result<ProviderImage> {
        let api_key = self
            .api_key
            .as_deref()
            .context("FAL_KEY / FAL_API_KEY is not set")?;
        let payload = json!({
            "prompt": request.prompt,
            "image_url": request.image_data_uri,
        });
        let response = self
            .http
            .post(&self.api_url)
            .timeout(INFERENCE_TIMEOUT)
            .header(AUTHORIZATION, format!("Key {api_key}"))
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .context("fal request failed")?;
        let parsed = response_json_or_error("fal", response)?;
        let mut urls = Vec::new();
        extract_image_urls(&parsed, &mut urls);
        urls.into_iter()
            .next()
            .map(ProviderImage::Url)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "fal response carried no image URL: {}",
                    truncate_text(&parsed.to_string(), 500)
                )
            })
    }
}

/// Walks a provider response for hosted image URLs under the usual keys.
fn extract_image_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for key in ["url", "image", "images", "output"] {
                if let Some(nested) = map.get(key) {
                    if let Some(url) = nested.as_str() {
                        if is_http_image_url(url) {
                            out.push(url.to_string());
                        }
                    } else {
                        extract_image_urls(nested, out);
                    }
                }
            }
        }
        Value::Array(rows) => {
            for row in rows {
                extract_image_urls(row, out);
            }
        }
        _ => {}
    }
}

fn is_http_image_url(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

// ---------------------------------------------------------------------------
// Google Gemini

pub struct GoogleAdapter {
    http: HttpClient,
    api_key: Option<String>,
    api_base: String,
}

impl Default for GoogleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleAdapter {
    pub fn new() -> Self {
        Self {
            http: HttpClient::new(),
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            api_base: GOOGLE_API_BASE.to_string(),
        }
    }
}

impl ImageEditProvider for GoogleAdapter {
    fn id(&self) -> &'static str {
        "google"
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn edit(&self, request: &EditRequest) -> Result<ProviderImage> {
        let api_key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY / GOOGLE_API_KEY is not set")?;
        let (mime, data) = strip_data_uri(&request.image_data_uri)
            .context("gemini requires an inline base64 image")?;
        let payload = json!({
            "contents": [{
                "parts": [
                    { "text": request.prompt },
                    { "inline_data": { "mime_type": mime, "data": data } },
                ],
            }],
            "generationConfig": { "responseModalities": ["IMAGE"] },
        });
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, GOOGLE_MODEL, api_key
        );
        let response = self
            .http
            .post(&url)
            .timeout(INFERENCE_TIMEOUT)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .context("gemini request failed")?;
        let parsed = response_json_or_error("gemini", response)?;
        extract_gemini_inline_image(&parsed).ok_or_else(|| {
            anyhow::anyhow!(
                "gemini response carried no inline image: {}",
                truncate_text(&parsed.to_string(), 500)
            )
        })
    }
}

fn extract_gemini_inline_image(parsed: &Value) -> Option<ProviderImage> {
    let parts = parsed
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    for part in parts {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object);
        let Some(inline) = inline else {
            continue;
        };
        let Some(data) = inline.get("data").and_then(Value::as_str) else {
            continue;
        };
        let mime = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        return Some(ProviderImage::Inline {
            base64: data.to_string(),
            mime: mime.to_string(),
        });
    }
    None
}

// ---------------------------------------------------------------------------
// Republishing

/// Best-effort image host: inline results get republished so share links and
/// QR codes have a real URL to point at.
pub struct HostingClient {
    http: HttpClient,
    api_key: String,
    api_url: String,
}

impl HostingClient {
    pub fn from_env() -> Option<Self> {
        let api_key = non_empty_env("IMGBB_API_KEY")?;
        Some(Self {
            http: HttpClient::new(),
            api_key,
            api_url: IMGBB_UPLOAD_URL.to_string(),
        })
    }

    pub fn publish(&self, image_base64: &str) -> Result<String> {
        let form = MultipartForm::new().text("image", image_base64.to_string());
        let response = self
            .http
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .context("imgbb request failed")?;
        let parsed = response_json_or_error("imgbb", response)?;
        if parsed.get("success").and_then(Value::as_bool) != Some(true) {
            bail!(
                "imgbb rejected the upload: {}",
                truncate_text(&parsed.to_string(), 500)
            );
        }
        parsed
            .get("data")
            .and_then(|data| data.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("imgbb response missing data.url"))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator

/// Runs the provider chain in priority order and normalizes whichever result
/// comes back first.
pub struct TransformOrchestrator {
    providers: Vec<Box<dyn ImageEditProvider>>,
    hosting: Option<HostingClient>,
    http: HttpClient,
    log: Option<SessionLog>,
}

impl TransformOrchestrator {
    /// Builds the chain from the environment. BOOTH_PROVIDER_PRIORITY
    /// reorders or restricts it; unknown names are ignored.
    pub fn from_env() -> Self {
        let priority =
            non_empty_env("BOOTH_PROVIDER_PRIORITY").unwrap_or_else(|| DEFAULT_PROVIDER_PRIORITY.to_string());
        let mut providers: Vec<Box<dyn ImageEditProvider>> = Vec::new();
        for name in priority.split(',') {
            match name.trim().to_ascii_lowercase().as_str() {
                "runware" => providers.push(Box::new(RunwareAdapter::new())),
                "fal" => providers.push(Box::new(FalAdapter::new())),
                "google" | "gemini" => providers.push(Box::new(GoogleAdapter::new())),
                _ => {}
            }
        }
        Self {
            providers,
            hosting: HostingClient::from_env(),
            http: HttpClient::new(),
            log: None,
        }
    }

    pub fn with_providers(providers: Vec<Box<dyn ImageEditProvider>>) -> Self {
        Self {
            providers,
            hosting: None,
            http: HttpClient::new(),
            log: None,
        }
    }

    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.id()).collect()
    }

    pub fn is_configured(&self, provider_id: &str) -> bool {
        self.providers
            .iter()
            .any(|provider| provider.id() == provider_id && provider.configured())
    }

    /// Like `transform`, but the named provider is tried first. The rest of
    /// the chain stays available as fallback.
    pub fn transform_with_preferred(
        &self,
        preferred: &str,
        request: &EditRequest,
    ) -> Result<TransformResult> {
        let mut order: Vec<usize> = (0..self.providers.len()).collect();
        if let Some(pos) = self
            .providers
            .iter()
            .position(|provider| provider.id() == preferred)
        {
            order.retain(|idx| *idx != pos);
            order.insert(0, pos);
        }
        self.run_chain(&order, request)
    }

    pub fn transform(&self, request: &EditRequest) -> Result<TransformResult> {
        let order: Vec<usize> = (0..self.providers.len()).collect();
        self.run_chain(&order, request)
    }

    fn run_chain(&self, order: &[usize], request: &EditRequest) -> Result<TransformResult> {
        request.validate()?;
        let fingerprint = request_fingerprint(request);
        let mut failures: Vec<String> = Vec::new();
        let mut attempted = false;
        for idx in order {
            let provider = &self.providers[*idx];
            if !provider.configured() {
                self.record(BoothEvent::ProviderSkipped {
                    provider: provider.id().to_string(),
                    reason: "not configured".to_string(),
                });
                continue;
            }
            attempted = true;
            self.record(BoothEvent::ProviderAttempted {
                provider: provider.id().to_string(),
                request: fingerprint.clone(),
            });
            match provider.edit(request) {
                Ok(image) => {
                    let result = self.finish(provider.id(), image, request)?;
                    self.record(BoothEvent::TransformCompleted {
                        provider: result.provider.clone(),
                        request: fingerprint.clone(),
                        public_url: result.public_url.clone(),
                    });
                    return Ok(result);
                }
                Err(err) => {
                    let detail = error_chain_text(&err, 500);
                    self.record(BoothEvent::ProviderFailed {
                        provider: provider.id().to_string(),
                        error: detail.clone(),
                    });
                    failures.push(format!("{}: {detail}", provider.id()));
                }
            }
        }
        if !attempted {
            bail!("no image providers configured");
        }
        bail!("all providers failed: {}", failures.join(" | "));
    }

    /// Normalizes a provider result so callers always get raw bytes, a data
    /// URI, and the best available public link.
    fn finish(
        &self,
        provider_id: &str,
        image: ProviderImage,
        request: &EditRequest,
    ) -> Result<TransformResult> {
        match image {
            ProviderImage::Url(url) => {
                let (bytes, mime) = self.download(&url)?;
                let data_uri = format!("data:{mime};base64,{}", BASE64.encode(&bytes));
                Ok(TransformResult {
                    provider: provider_id.to_string(),
                    bytes,
                    data_uri,
                    public_url: Some(url),
                    prompt_used: request.prompt.clone(),
                })
            }
            ProviderImage::Inline { base64, mime } => {
                let bytes = BASE64
                    .decode(base64.as_bytes())
                    .with_context(|| format!("{provider_id} returned invalid base64"))?;
                // Republish failures are logged, never fatal. The inline
                // result still works for on-screen display and email.
                let public_url = self.hosting.as_ref().and_then(|hosting| {
                    match hosting.publish(&base64) {
                        Ok(url) => Some(url),
                        Err(err) => {
                            self.record(BoothEvent::RepublishFailed {
                                provider: provider_id.to_string(),
                                error: error_chain_text(&err, 500),
                            });
                            None
                        }
                    }
                });
                let data_uri = format!("data:{mime};base64,{base64}");
                Ok(TransformResult {
                    provider: provider_id.to_string(),
                    bytes,
                    data_uri,
                    public_url,
                    prompt_used: request.prompt.clone(),
                })
            }
        }
    }

    fn download(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let response = self
            .http
            .get(url)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .with_context(|| format!("downloading result image from {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("result image download failed ({})", status.as_u16());
        }
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());
        let bytes = response.bytes().context("reading result image body")?;
        Ok((bytes.to_vec(), mime))
    }

    fn record(&self, event: BoothEvent) {
        // Logging never fails a transform.
        if let Some(log) = &self.log {
            let _ = log.record(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn is_data_image_url(value: &str) -> bool {
    value.starts_with("data:image/")
}

/// Splits a `data:<mime>;base64,<payload>` URI into its mime and payload.
pub fn strip_data_uri(value: &str) -> Option<(String, String)> {
    let rest = value.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(";base64,")?;
    if header.is_empty() || payload.is_empty() {
        return None;
    }
    Some((header.to_string(), payload.to_string()))
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn request_fingerprint(request: &EditRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.prompt.as_bytes());
    hasher.update(request.image_data_uri.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::bail;
    use serde_json::json;

    use super::{
        extract_gemini_inline_image, extract_image_urls, runware_image_url, runware_image_uuid,
        strip_data_uri, EditRequest, ImageEditProvider, ProviderImage, TransformOrchestrator,
        BASE64,
    };
    use base64::Engine as _;

    struct ScriptedProvider {
        id: &'static str,
        configured: bool,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(id: &'static str, configured: bool, fail: bool) -> Self {
            Self {
                id,
                configured,
                fail,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ImageEditProvider for ScriptedProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn configured(&self) -> bool {
            self.configured
        }

        fn edit(&self, _request: &EditRequest) -> anyhow::Result<ProviderImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("{} backend exploded", self.id);
            }
            Ok(ProviderImage::Inline {
                base64: BASE64.encode(format!("{} bytes", self.id)),
                mime: "image/png".to_string(),
            })
        }
    }

    fn request() -> EditRequest {
        EditRequest::new("data:image/jpeg;base64,Zm9v", "make it stylish")
    }

    #[test]
    fn rejects_non_data_url_input() {
        let orchestrator = TransformOrchestrator::with_providers(vec![Box::new(
            ScriptedProvider::new("runware", true, false),
        )]);
        let bad = EditRequest::new("https://example.com/photo.jpg", "prompt");
        assert!(orchestrator.transform(&bad).is_err());
    }

    #[test]
    fn rejects_blank_prompt() {
        let orchestrator = TransformOrchestrator::with_providers(vec![Box::new(
            ScriptedProvider::new("runware", true, false),
        )]);
        let bad = EditRequest::new("data:image/jpeg;base64,Zm9v", "   ");
        assert!(orchestrator.transform(&bad).is_err());
    }

    #[test]
    fn skips_unconfigured_providers_and_uses_the_next() {
        let skipped = ScriptedProvider::new("runware", false, false);
        let skipped_calls = Arc::clone(&skipped.calls);
        let orchestrator = TransformOrchestrator::with_providers(vec![
            Box::new(skipped),
            Box::new(ScriptedProvider::new("fal", true, false)),
        ]);
        let result = orchestrator.transform(&request()).expect("fal succeeds");
        assert_eq!(result.provider, "fal");
        assert_eq!(skipped_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn falls_back_after_a_provider_failure() {
        let failing = ScriptedProvider::new("runware", true, true);
        let failing_calls = Arc::clone(&failing.calls);
        let orchestrator = TransformOrchestrator::with_providers(vec![
            Box::new(failing),
            Box::new(ScriptedProvider::new("google", true, false)),
        ]);
        let result = orchestrator.transform(&request()).expect("google succeeds");
        assert_eq!(result.provider, "google");
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert!(result.data_uri.starts_with("data:image/png;base64,"));
        assert_eq!(result.public_url, None);
        assert_eq!(result.bytes, b"google bytes");
    }

    #[test]
    fn aggregates_every_failure_when_the_chain_exhausts() {
        let orchestrator = TransformOrchestrator::with_providers(vec![
            Box::new(ScriptedProvider::new("runware", true, true)),
            Box::new(ScriptedProvider::new("fal", true, true)),
        ]);
        let err = orchestrator.transform(&request()).expect_err("all fail");
        let text = err.to_string();
        assert!(text.contains("runware"));
        assert!(text.contains("fal"));
    }

    #[test]
    fn nothing_configured_is_a_distinct_error() {
        let orchestrator = TransformOrchestrator::with_providers(vec![
            Box::new(ScriptedProvider::new("runware", false, false)),
            Box::new(ScriptedProvider::new("fal", false, false)),
        ]);
        let err = orchestrator.transform(&request()).expect_err("none run");
        assert!(err.to_string().contains("no image providers configured"));
    }

    #[test]
    fn preferred_provider_jumps_the_queue() {
        let first = ScriptedProvider::new("runware", true, false);
        let first_calls = Arc::clone(&first.calls);
        let orchestrator = TransformOrchestrator::with_providers(vec![
            Box::new(first),
            Box::new(ScriptedProvider::new("google", true, false)),
        ]);
        let result = orchestrator
            .transform_with_preferred("google", &request())
            .expect("google first");
        assert_eq!(result.provider, "google");
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn strip_data_uri_splits_mime_and_payload() {
        assert_eq!(
            strip_data_uri("data:image/png;base64,QUJD"),
            Some(("image/png".to_string(), "QUJD".to_string()))
        );
        assert_eq!(strip_data_uri("https://example.com/a.png"), None);
        assert_eq!(strip_data_uri("data:image/png;base64,"), None);
    }

    #[test]
    fn runware_upload_rows_yield_the_matching_image_uuid() {
        let rows = vec![
            json!({ "taskType": "imageUpload", "taskUUID": "other", "imageUUID": "wrong" }),
            json!({ "taskType": "imageUpload", "taskUUID": "task-1", "imageUUID": "img-1" }),
        ];
        assert_eq!(runware_image_uuid(&rows, "task-1").unwrap(), "img-1");
    }

    #[test]
    fn runware_upload_errors_carry_a_response_excerpt() {
        let rows = vec![json!({ "taskType": "imageUpload", "taskUUID": "task-1" })];
        let err = runware_image_uuid(&rows, "task-1").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("missing imageUUID"));
        assert!(text.contains("\"taskUUID\":\"task-1\""));
    }

    #[test]
    fn runware_inference_rows_yield_a_url_flat_or_nested() {
        let flat = vec![json!({
            "taskType": "imageInference",
            "imageURL": "https://im.runware.ai/a.jpg",
        })];
        assert_eq!(runware_image_url(&flat).unwrap(), "https://im.runware.ai/a.jpg");

        let nested = vec![json!({
            "taskType": "imageInference",
            "images": [{ "imageURL": "https://im.runware.ai/b.jpg" }],
        })];
        assert_eq!(runware_image_url(&nested).unwrap(), "https://im.runware.ai/b.jpg");
    }

    #[test]
    fn runware_inference_errors_carry_a_response_excerpt() {
        let rows = vec![json!({ "taskType": "imageInference", "cost": 0.0042 })];
        let err = runware_image_url(&rows).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("missing imageURL"));
        assert!(text.contains("imageInference"));
    }

    #[test]
    fn fal_style_responses_yield_their_first_url() {
        let parsed = json!({
            "images": [
                { "url": "https://cdn.example.com/a.jpg" },
                { "url": "https://cdn.example.com/b.jpg" },
            ],
        });
        let mut urls = Vec::new();
        extract_image_urls(&parsed, &mut urls);
        assert_eq!(urls.first().map(String::as_str), Some("https://cdn.example.com/a.jpg"));

        let nested = json!({ "output": { "image": { "url": "https://cdn.example.com/c.jpg" } } });
        urls.clear();
        extract_image_urls(&nested, &mut urls);
        assert_eq!(urls, vec!["https://cdn.example.com/c.jpg".to_string()]);
    }

    #[test]
    fn gemini_inline_payloads_parse_under_both_casings() {
        let camel = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "describing" },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "QUJD" } },
                ]},
            }],
        });
        assert_eq!(
            extract_gemini_inline_image(&camel),
            Some(ProviderImage::Inline {
                base64: "QUJD".to_string(),
                mime: "image/jpeg".to_string(),
            })
        );

        let snake = json!({
            "candidates": [{
                "content": { "parts": [
                    { "inline_data": { "data": "QUJD" } },
                ]},
            }],
        });
        assert_eq!(
            extract_gemini_inline_image(&snake),
            Some(ProviderImage::Inline {
                base64: "QUJD".to_string(),
                mime: "image/png".to_string(),
            })
        );
    }
}
