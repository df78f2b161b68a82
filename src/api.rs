// API client module: a small blocking HTTP client for the backend that
// builds images and runs app variants. Every call is synchronous; the
// workflow never has more than one request in flight.

use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the path segment appended to the host.
pub const BACKEND_URL_SUFFIX_ENV: &str = "BACKEND_URL_SUFFIX";
pub const DEFAULT_BACKEND_URL_SUFFIX: &str = "api";

/// Image descriptor returned by the build endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Image {
    pub docker_id: String,
    #[serde(default)]
    pub tags: String,
}

#[derive(Serialize, Debug)]
struct AddVariantRequest<'a> {
    variant_name: String,
    docker_id: &'a str,
    tags: &'a str,
    base_name: &'a str,
    config_name: &'a str,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AddVariantResponse {
    pub variant_id: String,
}

#[derive(Serialize, Debug)]
struct VariantAction {
    action: &'static str,
}

#[derive(Serialize, Debug)]
struct VariantActionRequest {
    action: VariantAction,
}

#[derive(Deserialize, Debug)]
struct Uri {
    uri: String,
}

/// A variant as the backend reports it.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AppVariant {
    pub app_id: String,
    pub app_name: String,
    pub variant_id: String,
    pub variant_name: String,
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(default)]
    pub config_name: Option<String>,
    #[serde(default)]
    pub previous_variant_name: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// Subset of the user profile the CLI needs.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: String,
}

/// The backend operations the variant workflow depends on.
pub trait Backend {
    /// Uploads a packed build context; returns the built image.
    fn build_image(&self, app_id: &str, base_name: &str, archive: &Path) -> Result<Image>;

    /// Registers a new variant for `base_name` from a built image.
    fn add_variant(
        &self,
        app_id: &str,
        base_name: &str,
        config_name: &str,
        image: &Image,
    ) -> Result<AddVariantResponse>;

    /// Swaps the image of an existing variant. The backend restarts a
    /// running container by itself.
    fn update_variant_image(&self, variant_id: &str, image: &Image) -> Result<()>;

    /// Starts the variant's container and returns its service URL.
    fn start_variant(&self, variant_id: &str) -> Result<String>;

    fn remove_variant(&self, variant_id: &str) -> Result<()>;

    fn list_app_variants(&self, app_id: &str) -> Result<Vec<AppVariant>>;

    fn user_profile(&self) -> Result<UserProfile>;
}

/// Blocking client for the backend REST API. Holds the reqwest client, the
/// API base URL and an optional API key sent on every call.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// `<host>/<suffix>`, with the suffix from `BACKEND_URL_SUFFIX` or `api`.
pub fn api_base_url(host: &str) -> String {
    let suffix = std::env::var(BACKEND_URL_SUFFIX_ENV)
        .unwrap_or_else(|_| DEFAULT_BACKEND_URL_SUFFIX.into());
    join_base_url(host, &suffix)
}

fn join_base_url(host: &str, suffix: &str) -> String {
    format!("{}/{}", host.trim_end_matches('/'), suffix.trim_matches('/'))
}

impl ApiClient {
    /// Create a client for `host`. Image builds can take minutes, so
    /// requests have no timeout.
    pub fn new(host: &str, api_key: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: api_base_url(host),
            api_key: api_key.map(str::to_string),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authorization header carrying the raw API key, when one is set.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            let val = HeaderValue::from_str(key).context("API key is not a valid header value")?;
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends a request and turns non-2xx responses into errors with the
    /// server's body attached.
    fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let res = req
            .headers(self.auth_headers()?)
            .send()
            .with_context(|| format!("Failed to send {} request", what))?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            anyhow::bail!("{} failed: {} - {}", what, status, txt);
        }
        Ok(res)
    }
}

impl Backend for ApiClient {
    fn build_image(&self, app_id: &str, base_name: &str, archive: &Path) -> Result<Image> {
        let url = self.url("containers/build_image/");
        log::debug!("POST {} (app_id={}, base_name={})", url, app_id, base_name);

        let file = File::open(archive).context("Failed to open build archive")?;
        let part = multipart::Part::reader(file)
            .file_name("docker.tar.gz")
            .mime_str("application/gzip")?;
        let form = multipart::Form::new().part("tar_file", part);

        let req = self
            .client
            .post(&url)
            .query(&[("app_id", app_id), ("base_name", base_name)])
            .multipart(form);
        let res = self.send(req, "Build image")?;
        res.json().context("Parsing build image response json")
    }

    fn add_variant(
        &self,
        app_id: &str,
        base_name: &str,
        config_name: &str,
        image: &Image,
    ) -> Result<AddVariantResponse> {
        let url = self.url(&format!("apps/{}/variant/from-image/", app_id));
        log::debug!("POST {}", url);
        let body = AddVariantRequest {
            variant_name: format!("{}.{}", base_name, config_name),
            docker_id: &image.docker_id,
            tags: &image.tags,
            base_name,
            config_name,
        };
        let res = self.send(self.client.post(&url).json(&body), "Add variant")?;
        res.json().context("Parsing add variant response json")
    }

    fn update_variant_image(&self, variant_id: &str, image: &Image) -> Result<()> {
        let url = self.url(&format!("variants/{}/image/", variant_id));
        log::debug!("PUT {}", url);
        self.send(self.client.put(&url).json(image), "Update variant image")?;
        Ok(())
    }

    fn start_variant(&self, variant_id: &str) -> Result<String> {
        let url = self.url(&format!("variants/{}/", variant_id));
        log::debug!("PUT {} (START)", url);
        let body = VariantActionRequest {
            action: VariantAction { action: "START" },
        };
        let res = self.send(self.client.put(&url).json(&body), "Start variant")?;
        let uri: Uri = res.json().context("Parsing start variant response json")?;
        Ok(uri.uri)
    }

    fn remove_variant(&self, variant_id: &str) -> Result<()> {
        let url = self.url(&format!("variants/{}/", variant_id));
        log::debug!("DELETE {}", url);
        self.send(self.client.delete(&url), "Remove variant")?;
        Ok(())
    }

    fn list_app_variants(&self, app_id: &str) -> Result<Vec<AppVariant>> {
        let url = self.url(&format!("apps/{}/variants/", app_id));
        log::debug!("GET {}", url);
        let res = self.send(self.client.get(&url), "List variants")?;
        res.json().context("Parsing variant list json")
    }

    fn user_profile(&self) -> Result<UserProfile> {
        let url = self.url("profile/");
        log::debug!("GET {}", url);
        let res = self.send(self.client.get(&url), "User profile")?;
        res.json().context("Parsing user profile json")
    }
}
