use crate::wire::error::{WireError, WireResult};

const DEFAULT_UPLOAD_PATH: &str = "/upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Parsed upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Parse an endpoint URL.
    ///
    /// A bare `host[:port][/path]` without a scheme is accepted and treated as
    /// http. An explicit port overrides the scheme default. A missing path
    /// defaults to `/upload`.
    pub fn parse(url: &str) -> WireResult<Self> {
        let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else {
            (Scheme::Http, url)
        };

        if rest.is_empty() {
            return Err(WireError::InvalidUrl(url.to_string()));
        }

        let (authority, path) = match rest.find('/') {
            Some(0) => return Err(WireError::InvalidUrl(url.to_string())),
            Some(idx) => (&rest[..idx], rest[idx..].to_string()),
            None => (rest, DEFAULT_UPLOAD_PATH.to_string()),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port_str)) => {
                let port: u16 = port_str
                    .parse()
                    .map_err(|_| WireError::InvalidUrl(url.to_string()))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(WireError::InvalidUrl(url.to_string()));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path,
        })
    }

    /// `host:port` as sent in the Host header.
    pub fn host_header(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let ep = Endpoint::parse("http://collector.local/api/upload").unwrap();
        assert_eq!(ep.scheme, Scheme::Http);
        assert_eq!(ep.host, "collector.local");
        assert_eq!(ep.port, 80);
        assert_eq!(ep.path, "/api/upload");
    }

    #[test]
    fn test_parse_https_default_port() {
        let ep = Endpoint::parse("https://collector.local/upload").unwrap();
        assert_eq!(ep.scheme, Scheme::Https);
        assert_eq!(ep.port, 443);
    }

    #[test]
    fn test_explicit_port_overrides_scheme_default() {
        let ep = Endpoint::parse("https://collector.local:8443/upload").unwrap();
        assert_eq!(ep.port, 8443);
        assert_eq!(ep.host, "collector.local");
    }

    #[test]
    fn test_missing_path_defaults_to_upload() {
        let ep = Endpoint::parse("http://collector.local:9000").unwrap();
        assert_eq!(ep.path, "/upload");
        assert_eq!(ep.port, 9000);
    }

    #[test]
    fn test_bare_host_without_scheme() {
        let ep = Endpoint::parse("collector.local").unwrap();
        assert_eq!(ep.scheme, Scheme::Http);
        assert_eq!(ep.port, 80);
        assert_eq!(ep.path, "/upload");
    }

    #[test]
    fn test_host_header_includes_port() {
        let ep = Endpoint::parse("http://10.0.0.2:8080/upload").unwrap();
        assert_eq!(ep.host_header(), "10.0.0.2:8080");
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Endpoint::parse("http://host:notaport/upload").is_err());
        assert!(Endpoint::parse("http://host:70000/upload").is_err());
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse("http://").is_err());
        assert!(Endpoint::parse("http:///upload").is_err());
    }
}
