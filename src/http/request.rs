use bytes::Bytes;
use url::Url;

/// Placeholder replaced with the absolute target URL.
pub const URL_PLACEHOLDER: &str = "{url}";
/// Placeholder replaced with the target host.
pub const HOST_PLACEHOLDER: &str = "{host}";
/// Placeholder replaced with the path and query.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// The fixed request a probe sends on every attempt.
///
/// Rendered once at construction from a template; the driver writes the same
/// bytes on every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Absolute URL of the target, e.g. `https://v1.hitokoto.cn/?c=f`
    pub url: Url,
    /// Wire bytes of the request
    pub bytes: Bytes,
}

impl ProbeRequest {
    /// Render `template` against `url`.
    ///
    /// `{url}`, `{host}` and `{path}` are substituted; everything else is sent
    /// as written.
    pub fn render(template: &str, url: Url) -> Self {
        let host = url.host_str().unwrap_or_default().to_string();
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let text = template
            .replace(URL_PLACEHOLDER, url.as_str())
            .replace(HOST_PLACEHOLDER, &host)
            .replace(PATH_PLACEHOLDER, &path);

        Self {
            url,
            bytes: Bytes::from(text),
        }
    }

    /// Host part of the target URL.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Port of the target URL, falling back to the scheme default.
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(443)
    }

    /// `true` when the target uses `https`.
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
