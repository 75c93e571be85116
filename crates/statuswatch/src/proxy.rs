//! Relay routes tried when the direct upstream call is blocked
//!
//! Each route has its own way of wrapping the upstream request: most embed
//! the full percent-encoded target URL in a GET, one forwards the original
//! form POST through a path prefix. The list is fixed configuration and is
//! walked in order by the fallback chain.

/// How a route reaches the upstream API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// GET `{base}{percent-encoded target URL}`
    WrappedGet,
    /// POST the original form body to `{base}{target URL}`
    PrefixedPost,
}

/// One relay endpoint, immutable configuration
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    pub name: &'static str,
    pub base: &'static str,
    pub kind: RouteKind,
}

/// A fully built request for one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRequest {
    Get { url: String },
    PostForm { url: String },
}

impl ProxyRoute {
    /// Build this route's request for a direct URL and its query string
    pub fn request(&self, direct_url: &str, query: &str) -> ProxyRequest {
        match self.kind {
            RouteKind::WrappedGet => {
                let target = format!("{}?{}", direct_url, query);
                ProxyRequest::Get {
                    url: format!("{}{}", self.base, encode(&target)),
                }
            }
            RouteKind::PrefixedPost => ProxyRequest::PostForm {
                url: format!("{}{}", self.base, direct_url),
            },
        }
    }
}

/// The default relay list, in fallback order
pub fn default_routes() -> Vec<ProxyRoute> {
    vec![
        ProxyRoute {
            name: "AllOrigins",
            base: "https://api.allorigins.win/raw?url=",
            kind: RouteKind::WrappedGet,
        },
        ProxyRoute {
            name: "JSONP.io",
            base: "https://jsonp.afeld.me/?url=",
            kind: RouteKind::WrappedGet,
        },
        ProxyRoute {
            name: "ProxyHerd",
            base: "https://api.proxyherd.com/v1/?url=",
            kind: RouteKind::WrappedGet,
        },
        ProxyRoute {
            name: "CorsProxy.org",
            base: "https://corsproxy.org/?",
            kind: RouteKind::WrappedGet,
        },
        ProxyRoute {
            name: "CORS.SH",
            base: "https://proxy.cors.sh/",
            kind: RouteKind::PrefixedPost,
        },
    ]
}

fn encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_get_embeds_encoded_target() {
        let route = ProxyRoute {
            name: "AllOrigins",
            base: "https://api.allorigins.win/raw?url=",
            kind: RouteKind::WrappedGet,
        };
        let request = route.request("https://api.example.com/v2/getMonitors", "api_key=abc");
        match request {
            ProxyRequest::Get { url } => {
                assert!(url.starts_with("https://api.allorigins.win/raw?url="));
                assert!(url.contains("https%3A%2F%2Fapi.example.com"));
                assert!(url.contains("api_key%3Dabc"));
                // the target must not appear unencoded
                assert!(!url.contains("getMonitors?api_key"));
            }
            other => panic!("expected Get, got {other:?}"),
        }
    }

    #[test]
    fn prefixed_post_keeps_target_unencoded() {
        let route = ProxyRoute {
            name: "CORS.SH",
            base: "https://proxy.cors.sh/",
            kind: RouteKind::PrefixedPost,
        };
        let request = route.request("https://api.example.com/v2/getMonitors", "api_key=abc");
        assert_eq!(
            request,
            ProxyRequest::PostForm {
                url: "https://proxy.cors.sh/https://api.example.com/v2/getMonitors".to_string()
            }
        );
    }

    #[test]
    fn default_route_order_is_stable() {
        let names: Vec<&str> = default_routes().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["AllOrigins", "JSONP.io", "ProxyHerd", "CorsProxy.org", "CORS.SH"]
        );
    }
}
