use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported scheme '{0}' (only http and https feeds are supported)")]
    UnsupportedScheme(String),
    #[error("feed URL has no host")]
    MissingHost,
    #[error("feed URL points at a private address: {0}")]
    PrivateHost(String),
}

/// Which hosts a feed URL may point at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostPolicy {
    /// Accept any host
    #[default]
    AllowPrivate,
    /// Reject localhost, loopback, link-local and private ranges
    PublicOnly,
}

/// Check that `input` is an absolute http(s) URL with a host acceptable
/// under `policy`, returning the parsed URL.
///
/// ```
/// use gator::util::{validate_feed_url, HostPolicy};
///
/// assert!(validate_feed_url("https://blog.boot.dev/index.xml", HostPolicy::PublicOnly).is_ok());
/// assert!(validate_feed_url("file:///etc/passwd", HostPolicy::AllowPrivate).is_err());
/// assert!(validate_feed_url("http://127.0.0.1/rss", HostPolicy::PublicOnly).is_err());
/// ```
pub fn validate_feed_url(input: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(input.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h,
        _ => return Err(UrlValidationError::MissingHost),
    };

    if policy == HostPolicy::PublicOnly && is_private_host(host) {
        return Err(UrlValidationError::PrivateHost(host.to_owned()));
    }

    Ok(url)
}

fn is_private_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    // IPv6 hosts come back bracketed from host_str()
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        Ok(IpAddr::V6(v6)) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
        Err(_) => false,
    }
}
