use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-loopback host.
    #[error("Insecure URL: HTTPS required (except localhost for testing)")]
    Insecure,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates the content API base URL.
///
/// HTTPS is required, except for loopback hosts which may use plain HTTP so
/// the client can be pointed at a local mock backend. The returned URL always
/// ends in `/` so relative endpoint paths join under it instead of replacing
/// its last segment.
///
/// # Examples
///
/// ```
/// use gstv_feed::util::validate_endpoint;
///
/// let url = validate_endpoint("https://backend.example.com/v2").unwrap();
/// assert_eq!(url.as_str(), "https://backend.example.com/v2/");
///
/// assert!(validate_endpoint("http://127.0.0.1:8080").is_ok());
/// assert!(validate_endpoint("http://backend.example.com").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                tracing::error!(base_url = %url_str, "Rejecting non-HTTPS API base URL");
                return Err(UrlValidationError::Insecure);
            }
            tracing::warn!(base_url = %url_str, "Using non-HTTPS API base URL (localhost only)");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Validates a URL before handing it to the system browser.
///
/// Only public http(s) URLs are accepted: localhost and private ranges are
/// rejected so article data cannot steer the browser at internal services.
///
/// # Examples
///
/// ```
/// use gstv_feed::util::validate_url_for_open;
///
/// assert!(validate_url_for_open("https://www.gstv.in/gujarat/rain-alert").is_ok());
/// assert!(validate_url_for_open("http://192.168.1.1/admin").is_err());
/// assert!(validate_url_for_open("file:///etc/passwd").is_err());
/// ```
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host == "localhost" {
            return Err(UrlValidationError::Localhost);
        }
        if let Some(ip) = host_ip(host) {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host_ip(host).is_some_and(|ip| ip.is_loopback()),
        None => false,
    }
}

/// Strip brackets from IPv6 hosts before parsing.
fn host_ip(host: &str) -> Option<IpAddr> {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
        .parse()
        .ok()
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
