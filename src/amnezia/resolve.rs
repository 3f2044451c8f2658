//! Lenient parsing of the free-form peer settings that feed the link.

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 51820;
pub const DEFAULT_DNS_PRIMARY: &str = "1.1.1.1";
pub const DEFAULT_DNS_SECONDARY: &str = "1.0.0.1";
pub const DEFAULT_ALLOWED_IPS: &str = "0.0.0.0/0,::/0";

/// Splits `host:port`. A value without a port, or one that cannot be split,
/// is used as host as a whole; an unparsable port keeps the default.
pub fn parse_endpoint_host_port(endpoint: &str) -> (String, u16) {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return (DEFAULT_HOST.to_string(), DEFAULT_PORT);
    }

    let Some((host, port)) = split_host_port(endpoint) else {
        return (endpoint.to_string(), DEFAULT_PORT);
    };

    let host = match host.trim() {
        "" => DEFAULT_HOST.to_string(),
        h => h.to_string(),
    };
    let port = port.parse::<u16>().unwrap_or(DEFAULT_PORT);

    (host, port)
}

/// First two entries of a comma separated DNS list, filled up with the
/// default resolvers.
pub fn pick_dns_servers(dns: &str) -> (String, String) {
    let fallback = format!("{DEFAULT_DNS_PRIMARY},{DEFAULT_DNS_SECONDARY}");
    let mut parts = split_csv_or_default(dns, &fallback).into_iter();

    let dns1 = parts.next().unwrap_or_else(|| DEFAULT_DNS_PRIMARY.to_string());
    let dns2 = parts.next().unwrap_or_else(|| DEFAULT_DNS_SECONDARY.to_string());
    (dns1, dns2)
}

/// Splits a comma separated list, dropping blanks. Input without any
/// entries uses `fallback` instead.
pub fn split_csv_or_default(value: &str, fallback: &str) -> Vec<String> {
    let items = split_csv(value);
    if items.is_empty() {
        return split_csv(fallback);
    }
    items
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().replace(' ', ""))
        .filter(|item| !item.is_empty())
        .collect()
}

fn split_host_port(endpoint: &str) -> Option<(&str, &str)> {
    if let Some(rest) = endpoint.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        return Some((host, port));
    }

    let (host, port) = endpoint.rsplit_once(':')?;
    if host.contains(':') {
        // bare IPv6 address, no port
        return None;
    }
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_host_port() {
        let cases = [
            ("", "127.0.0.1", 51820),
            ("   ", "127.0.0.1", 51820),
            ("192.168.1.1:51821", "192.168.1.1", 51821),
            ("192.168.1.1", "192.168.1.1", 51820),
            ("vpn.example.com:443", "vpn.example.com", 443),
            ("vpn.example.com", "vpn.example.com", 51820),
            ("[::1]:51821", "::1", 51821),
            ("[2001:db8::1]:8080", "2001:db8::1", 8080),
            ("2001:db8::1", "2001:db8::1", 51820),
            ("vpn.example.com:abc", "vpn.example.com", 51820),
            (":51821", "127.0.0.1", 51821),
        ];

        for (endpoint, host, port) in cases {
            assert_eq!(
                parse_endpoint_host_port(endpoint),
                (host.to_string(), port),
                "endpoint {endpoint:?}"
            );
        }
    }

    #[test]
    fn test_pick_dns_servers() {
        let cases = [
            ("", ("1.1.1.1", "1.0.0.1")),
            ("8.8.8.8", ("8.8.8.8", "1.0.0.1")),
            ("8.8.8.8,8.8.4.4", ("8.8.8.8", "8.8.4.4")),
            (" 8.8.8.8 , 8.8.4.4 ", ("8.8.8.8", "8.8.4.4")),
            ("1.1.1.1,8.8.8.8,9.9.9.9", ("1.1.1.1", "8.8.8.8")),
            (",,", ("1.1.1.1", "1.0.0.1")),
        ];

        for (dns, (dns1, dns2)) in cases {
            assert_eq!(pick_dns_servers(dns), (dns1.to_string(), dns2.to_string()), "dns {dns:?}");
        }
    }

    #[test]
    fn test_split_csv_or_default() {
        let cases: [(&str, &[&str]); 8] = [
            ("", &["a", "b"]),
            ("   ", &["a", "b"]),
            (",,", &["a", "b"]),
            (" , ", &["a", "b"]),
            ("x", &["x"]),
            ("x,y,z", &["x", "y", "z"]),
            (" x , y , z ", &["x", "y", "z"]),
            ("x,,y", &["x", "y"]),
        ];

        for (value, expected) in cases {
            assert_eq!(split_csv_or_default(value, "a,b"), expected, "value {value:?}");
        }
    }
}
