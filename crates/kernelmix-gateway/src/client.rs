//! REST client for the kernel gateway API.
//!
//! | Call | Endpoint |
//! |------|----------|
//! | list specs | `GET /api/kernelspecs` |
//! | one spec | `GET /api/kernelspecs/{name}` |
//! | list kernels | `GET /api/kernels` |
//! | start | `POST /api/kernels` |
//! | model | `GET /api/kernels/{id}` |
//! | shutdown | `DELETE /api/kernels/{id}` |
//! | interrupt | `POST /api/kernels/{id}/interrupt` |
//! | restart | `POST /api/kernels/{id}/restart` |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value, json};

use kernelmix_core::{BackendError, BackendResult, StartOptions};
use kernelmix_types::{ExecutionState, KernelModel, KernelSpec};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, map_http_status, map_reqwest_error};

/// Environment variable the gateway reads a requested kernel id from.
const KERNEL_ID_ENV: &str = "KERNEL_ID";

/// Environment variable the gateway reads a kernel working directory from.
const KERNEL_WORKING_DIR_ENV: &str = "KERNEL_WORKING_DIR";

/// Thin typed wrapper over the gateway's REST endpoints.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base: Url,
    config: GatewayConfig,
    headers: Vec<(String, String)>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(GatewayError::InvalidUrl(config.url.clone()));
        }
        let base = Url::parse(config.http_base())
            .map_err(|_| GatewayError::InvalidUrl(config.url.clone()))?;

        let headers = request_headers(&config);
        let mut default_headers = HeaderMap::new();
        for (name, value) in &headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                GatewayError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| GatewayError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            default_headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            http,
            base,
            config,
            headers,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Headers sent with every request (auth first, then configured extras).
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Endpoint URL under the gateway base. Each segment is percent-encoded,
    /// so kernel names and ids never change the route.
    fn url(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Protocol(format!("gateway URL {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> BackendResult<String> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(map_http_status(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn get_json(&self, segments: &[&str]) -> BackendResult<Value> {
        let url = self.url(segments)?;
        tracing::debug!(url = %url, "GET");
        let body = self.send(self.http.get(url)).await?;
        parse_json(&body)
    }

    async fn post_json(&self, segments: &[&str], payload: &Value) -> BackendResult<Value> {
        let url = self.url(segments)?;
        tracing::debug!(url = %url, "POST");
        let body = self.send(self.http.post(url).json(payload)).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        parse_json(&body)
    }

    async fn delete(&self, segments: &[&str]) -> BackendResult<()> {
        let url = self.url(segments)?;
        tracing::debug!(url = %url, "DELETE");
        self.send(self.http.delete(url)).await.map(|_| ())
    }

    // =========================================================================
    // Kernel specs
    // =========================================================================

    pub async fn kernel_specs(&self) -> BackendResult<Vec<KernelSpec>> {
        let body = self.get_json(&["api", "kernelspecs"]).await?;
        let specs = body
            .get("kernelspecs")
            .and_then(Value::as_object)
            .ok_or_else(|| BackendError::Protocol("kernelspecs listing missing 'kernelspecs'".into()))?;
        specs
            .iter()
            .map(|(name, entry)| parse_spec(name, entry))
            .collect()
    }

    pub async fn kernel_spec(&self, name: &str) -> BackendResult<KernelSpec> {
        let body = self.get_json(&["api", "kernelspecs", name]).await?;
        parse_spec(name, &body)
    }

    // =========================================================================
    // Kernels
    // =========================================================================

    pub async fn list_kernels(&self) -> BackendResult<Vec<KernelModel>> {
        let body = self.get_json(&["api", "kernels"]).await?;
        body.as_array()
            .ok_or_else(|| BackendError::Protocol("kernel listing is not an array".into()))?
            .iter()
            .map(parse_model)
            .collect()
    }

    /// Start a kernel, returning the gateway's model for it.
    pub async fn start_kernel(&self, name: &str, options: &StartOptions) -> BackendResult<KernelModel> {
        let mut env: BTreeMap<String, String> = options
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(id) = options.kernel_id {
            env.insert(KERNEL_ID_ENV.to_string(), id.to_string());
        }
        if let Some(cwd) = &options.cwd {
            env.insert(KERNEL_WORKING_DIR_ENV.to_string(), cwd.clone());
        }
        let payload = json!({ "name": name, "env": env });
        let body = self.post_json(&["api", "kernels"], &payload).await?;
        parse_model(&body)
    }

    pub async fn kernel_model(&self, kernel_id: &str) -> BackendResult<KernelModel> {
        let body = self.get_json(&["api", "kernels", kernel_id]).await?;
        parse_model(&body)
    }

    pub async fn shutdown_kernel(&self, kernel_id: &str) -> BackendResult<()> {
        self.delete(&["api", "kernels", kernel_id]).await
    }

    pub async fn interrupt_kernel(&self, kernel_id: &str) -> BackendResult<()> {
        self.post_json(&["api", "kernels", kernel_id, "interrupt"], &json!({}))
            .await
            .map(|_| ())
    }

    pub async fn restart_kernel(&self, kernel_id: &str) -> BackendResult<()> {
        self.post_json(&["api", "kernels", kernel_id, "restart"], &json!({}))
            .await
            .map(|_| ())
    }
}

/// Auth header first, then configured extras.
fn request_headers(config: &GatewayConfig) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if let Some(token) = config.resolve_auth_token() {
        headers.push((AUTHORIZATION.as_str().to_string(), format!("token {}", token)));
    }
    headers.extend(config.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
    headers
}

fn parse_json(body: &str) -> BackendResult<Value> {
    serde_json::from_str(body).map_err(|e| BackendError::Protocol(format!("invalid JSON response: {e}")))
}

/// Parse one `{name, spec: {display_name, language, metadata}, resources}` entry.
pub(crate) fn parse_spec(name: &str, entry: &Value) -> BackendResult<KernelSpec> {
    let spec = entry
        .get("spec")
        .ok_or_else(|| BackendError::Protocol(format!("kernel spec {name} missing 'spec'")))?;
    let name = entry.get("name").and_then(Value::as_str).unwrap_or(name);
    let display_name = spec
        .get("display_name")
        .and_then(Value::as_str)
        .unwrap_or(name);
    let language = spec.get("language").and_then(Value::as_str).unwrap_or_default();

    let mut parsed = KernelSpec::new(name, display_name, language);
    if let Some(metadata) = spec.get("metadata").and_then(Value::as_object) {
        parsed.metadata = metadata.clone();
    }
    Ok(parsed)
}

/// Parse a gateway kernel model, keeping the raw JSON in `additional`.
///
/// Unrecognized execution states become [`ExecutionState::Unknown`] rather
/// than failing the whole call.
pub(crate) fn parse_model(value: &Value) -> BackendResult<KernelModel> {
    let object: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| BackendError::Protocol("kernel model is not an object".into()))?;
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Protocol("kernel model missing 'id'".into()))?;
    let name = object.get("name").and_then(Value::as_str).unwrap_or_default();

    let mut model = KernelModel::new(id, name).with_additional(value.clone());
    if let Some(state) = object.get("execution_state").and_then(Value::as_str) {
        model = model.with_execution_state(state.parse().unwrap_or(ExecutionState::Unknown));
    }
    if let Some(at) = object
        .get("last_activity")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        model = model.with_last_activity(at.with_timezone(&Utc));
    }
    model.connections = object
        .get("connections")
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_keeps_raw_json() {
        let raw = json!({
            "id": "abc",
            "name": "python3",
            "last_activity": "2024-05-01T12:00:00.000000Z",
            "execution_state": "idle",
            "connections": 2,
            "kernel_host": "node-7"
        });
        let model = parse_model(&raw).unwrap();
        assert_eq!(model.id, "abc");
        assert_eq!(model.name, "python3");
        assert_eq!(model.execution_state, Some(ExecutionState::Idle));
        assert_eq!(model.connections, 2);
        assert!(model.last_activity.is_some());
        assert_eq!(model.additional, Some(raw));
    }

    #[test]
    fn test_parse_model_tolerates_unknown_state() {
        let model = parse_model(&json!({"id": "abc", "name": "x", "execution_state": "autorestarting"})).unwrap();
        assert_eq!(model.execution_state, Some(ExecutionState::Unknown));
    }

    #[test]
    fn test_parse_model_requires_id() {
        let err = parse_model(&json!({"name": "python3"})).unwrap_err();
        assert!(matches!(err, BackendError::Protocol(_)));
    }

    #[test]
    fn test_parse_spec_reads_nested_fields() {
        let entry = json!({
            "name": "python3",
            "spec": {
                "display_name": "Python 3",
                "language": "python",
                "argv": ["python", "-m", "ipykernel"],
                "metadata": {"debugger": true}
            },
            "resources": {}
        });
        let spec = parse_spec("python3", &entry).unwrap();
        assert_eq!(spec.display_name, "Python 3");
        assert_eq!(spec.language, "python");
        assert_eq!(spec.metadata["debugger"], true);
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            GatewayClient::new(GatewayConfig::new("gateway:8888")),
            Err(GatewayError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let client = GatewayClient::new(GatewayConfig::new("http://gw:8888/base/")).unwrap();
        let url = client.url(&["api", "kernelspecs", "py/3?x#y"]).unwrap();
        assert_eq!(url.as_str(), "http://gw:8888/base/api/kernelspecs/py%2F3%3Fx%23y");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let config = GatewayConfig::new("http://gw").with_header("bad header", "x");
        assert!(matches!(
            GatewayClient::new(config),
            Err(GatewayError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_auth_header_first() {
        let config = GatewayConfig::new("http://gw")
            .with_auth_token("s3cret")
            .with_header("X-Tenant", "lab");
        let client = GatewayClient::new(config).unwrap();
        assert_eq!(
            client.headers(),
            [
                ("authorization".to_string(), "token s3cret".to_string()),
                ("X-Tenant".to_string(), "lab".to_string()),
            ]
        );
    }
}
