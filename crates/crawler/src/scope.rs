//! Domain scoping
//!
//! A link is in scope when it is http(s) and shares the page's registrable
//! domain (eTLD+1 per the Public Suffix List).

use url::{Host, Url};

/// Same-site predicate
///
/// The suffix list is compiled into `psl`, so construction is free and the
/// predicate never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainScope;

impl DomainScope {
    pub fn new() -> Self {
        Self
    }

    pub fn is_in_scope(&self, page_url: &Url, link_url: &Url) -> bool {
        if !link_url.scheme().starts_with("http") {
            return false;
        }

        match (registrable_domain(page_url), registrable_domain(link_url)) {
            (Some(page), Some(link)) => page == link,
            _ => false,
        }
    }
}

/// Registrable domain of a URL's host.
///
/// IP addresses and hosts with no registrable part (e.g. `localhost`)
/// stand for themselves.
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => {
            let host = domain.trim_end_matches('.').to_ascii_lowercase();
            match psl::domain(host.as_bytes()) {
                Some(registrable) => {
                    Some(String::from_utf8_lossy(registrable.as_bytes()).into_owned())
                }
                None => Some(host),
            }
        }
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}
