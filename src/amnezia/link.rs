use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

use super::framing::qt_compress;
use super::resolve::{parse_endpoint_host_port, pick_dns_servers, split_csv_or_default, DEFAULT_ALLOWED_IPS};
use crate::domain::keys::public_key_from_private_key;
use crate::domain::{AdvancedSecurity, Interface, Peer};
use crate::error::{AppError, Result};

pub const LINK_SCHEME: &str = "vpn://";
pub const CONTAINER_NAME: &str = "amnezia-awg";
pub const TRANSPORT_PROTO: &str = "udp";
pub const DEFAULT_LINK_MTU: u32 = 1280;
pub const DEFAULT_LINK_KEEPALIVE: u32 = 25;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    containers: Vec<Container<'a>>,
    #[serde(rename = "defaultContainer")]
    default_container: &'a str,
    description: &'a str,
    dns1: String,
    dns2: String,
    #[serde(rename = "hostName")]
    host_name: &'a str,
}

#[derive(Debug, Serialize)]
struct Container<'a> {
    awg: AwgContainer<'a>,
    container: &'a str,
}

#[derive(Debug, Serialize)]
struct AwgContainer<'a> {
    #[serde(flatten)]
    params: &'a AwgParams,
    last_config: String,
    port: String,
    transport_proto: &'a str,
}

#[derive(Debug, Serialize)]
struct LastConfig<'a> {
    #[serde(flatten)]
    params: &'a AwgParams,

    allowed_ips: Vec<String>,

    #[serde(rename = "clientId")]
    client_id: &'a str,
    client_ip: String,
    client_priv_key: &'a str,
    client_pub_key: &'a str,

    config: &'a str,

    #[serde(rename = "hostName")]
    host_name: &'a str,
    mtu: String,
    persistent_keep_alive: String,
    port: u16,
    psk_key: &'a str,
    server_pub_key: &'a str,
}

/// Obfuscation fields as the client expects them: all values are strings,
/// S3/S4 and I1..I5 are left out when unset.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct AwgParams {
    #[serde(rename = "H1")]
    h1: String,
    #[serde(rename = "H2")]
    h2: String,
    #[serde(rename = "H3")]
    h3: String,
    #[serde(rename = "H4")]
    h4: String,
    #[serde(rename = "Jc")]
    jc: String,
    #[serde(rename = "Jmax")]
    jmax: String,
    #[serde(rename = "Jmin")]
    jmin: String,
    #[serde(rename = "S1")]
    s1: String,
    #[serde(rename = "S2")]
    s2: String,

    #[serde(rename = "S3", skip_serializing_if = "Option::is_none")]
    s3: Option<String>,
    #[serde(rename = "S4", skip_serializing_if = "Option::is_none")]
    s4: Option<String>,
    #[serde(rename = "I1", skip_serializing_if = "Option::is_none")]
    i1: Option<String>,
    #[serde(rename = "I2", skip_serializing_if = "Option::is_none")]
    i2: Option<String>,
    #[serde(rename = "I3", skip_serializing_if = "Option::is_none")]
    i3: Option<String>,
    #[serde(rename = "I4", skip_serializing_if = "Option::is_none")]
    i4: Option<String>,
    #[serde(rename = "I5", skip_serializing_if = "Option::is_none")]
    i5: Option<String>,
}

impl From<&AdvancedSecurity> for AwgParams {
    fn from(adv: &AdvancedSecurity) -> Self {
        let [h1, h2, h3, h4] = adv.magic_headers().map(|h| h.unwrap_or_default().to_string());
        let [i1, i2, i3, i4, i5] = adv.special_junk_packets().map(|i| i.map(str::to_string));

        Self {
            h1,
            h2,
            h3,
            h4,
            jc: adv.junk_packet_count.to_string(),
            jmax: adv.junk_packet_max_size.to_string(),
            jmin: adv.junk_packet_min_size.to_string(),
            s1: adv.init_packet_junk_size.to_string(),
            s2: adv.response_packet_junk_size.to_string(),
            s3: adv.cookie_reply_packet_junk_size().map(|v| v.to_string()),
            s4: adv.transport_packet_junk_size().map(|v| v.to_string()),
            i1,
            i2,
            i3,
            i4,
            i5,
        }
    }
}

/// Builds the `vpn://` import link of `peer` for the AmneziaVPN client.
///
/// `iface` is the interface owning the peer and must carry obfuscation
/// parameters. `config_text` is the rendered plain-text configuration of the
/// peer, embedded as is. The output only depends on the inputs; the
/// compression level changes the size of the link, not its decoded content.
pub fn build_vpn_link(
    peer: Option<&Peer>,
    iface: &Interface,
    description: &str,
    config_text: &str,
    compression_level: u32,
) -> Result<String> {
    let peer = peer.ok_or_else(|| AppError::precondition("missing peer"))?;
    if peer.interface_identifier != iface.identifier {
        return Err(AppError::precondition(format!(
            "peer {} does not belong to interface {}",
            peer.identifier, iface.identifier
        )));
    }
    let adv = iface
        .advanced_security()
        .filter(|adv| !adv.is_empty())
        .ok_or_else(|| AppError::precondition(format!("interface {} has no advanced security", iface.identifier)))?;

    let (host, port) = parse_endpoint_host_port(peer.endpoint.get_value());
    let (dns1, dns2) = pick_dns_servers(peer.interface.dns_str.get_value());

    let key_pair = &peer.interface.key_pair;
    let client_pub_key = public_key_from_private_key(&key_pair.private_key)
        .unwrap_or_else(|| key_pair.public_key.clone());

    let client_ip = peer
        .interface
        .addresses
        .first()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default();

    let mtu = match *peer.interface.mtu.get_value() {
        0 => DEFAULT_LINK_MTU,
        mtu => mtu,
    };
    let keepalive = match *peer.persistent_keepalive.get_value() {
        0 => DEFAULT_LINK_KEEPALIVE,
        keepalive => keepalive,
    };

    let params = AwgParams::from(adv);

    let last_config = LastConfig {
        params: &params,
        allowed_ips: split_csv_or_default(peer.allowed_ips_str.get_value(), DEFAULT_ALLOWED_IPS),
        client_id: &client_pub_key,
        client_ip,
        client_priv_key: &key_pair.private_key,
        client_pub_key: &client_pub_key,
        config: config_text,
        host_name: &host,
        mtu: mtu.to_string(),
        persistent_keep_alive: keepalive.to_string(),
        port,
        psk_key: peer.preshared_key.trim(),
        server_pub_key: peer.endpoint_public_key.get_value().trim(),
    };
    let last_config = serde_json::to_string(&last_config)?;

    let envelope = Envelope {
        containers: vec![Container {
            awg: AwgContainer {
                params: &params,
                last_config,
                port: port.to_string(),
                transport_proto: TRANSPORT_PROTO,
            },
            container: CONTAINER_NAME,
        }],
        default_container: CONTAINER_NAME,
        description,
        dns1,
        dns2,
        host_name: &host,
    };
    let payload = serde_json::to_vec(&envelope)?;

    let framed = qt_compress(&payload, compression_level)?;
    tracing::debug!(
        peer = %peer.identifier,
        payload_len = payload.len(),
        framed_len = framed.len(),
        "built amnezia vpn link"
    );

    Ok(format!("{LINK_SCHEME}{}", URL_SAFE_NO_PAD.encode(framed)))
}

/// Decodes a `vpn://` link back into its JSON payload.
pub fn decode_vpn_link(link: &str) -> Result<serde_json::Value> {
    let encoded = link
        .trim()
        .strip_prefix(LINK_SCHEME)
        .ok_or_else(|| AppError::precondition(format!("link does not start with {LINK_SCHEME}")))?;
    let framed = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
        AppError::Framing(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let payload = super::framing::qt_uncompress(&framed)?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfigOption, InterfaceIdentifier, KeyPair, PeerIdentifier};
    use crate::domain::parse_cidr;

    fn awg_params() -> AdvancedSecurity {
        AdvancedSecurity {
            junk_packet_count: 4,
            junk_packet_min_size: 40,
            junk_packet_max_size: 70,
            init_packet_junk_size: 15,
            response_packet_junk_size: 68,
            init_packet_magic_header: Some("1020325451".to_string()),
            response_packet_magic_header: Some("3288052141".to_string()),
            underload_packet_magic_header: Some("1766607858".to_string()),
            transport_packet_magic_header: Some("2528465083".to_string()),
            ..Default::default()
        }
    }

    fn fixture(params: Option<AdvancedSecurity>) -> (Interface, Peer) {
        let mut iface = Interface::new(InterfaceIdentifier::from("awg0"));
        iface.key_pair = KeyPair::generate();
        iface.peer_defaults.endpoint = "vpn.example.com:51821".to_string();
        iface.set_advanced_security(params);

        let mut peer = Peer::new(PeerIdentifier::from("peer-1"), &iface);
        peer.interface.addresses = vec![parse_cidr("10.8.1.2/32").unwrap()];
        peer.interface.dns_str = ConfigOption::new("8.8.8.8, 8.8.4.4".to_string(), true);
        peer.allowed_ips_str = ConfigOption::new("10.8.1.0/24, ,192.168.0.0/16".to_string(), true);
        peer.preshared_key = " psk== ".to_string();
        (iface, peer)
    }

    #[test]
    fn test_missing_peer_or_params() {
        let (iface, peer) = fixture(Some(awg_params()));
        let err = build_vpn_link(None, &iface, "d", "", 8).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));

        let (plain, _) = fixture(None);
        let mut plain_peer = peer.clone();
        plain_peer.interface_identifier = plain.identifier.clone();
        let err = build_vpn_link(Some(&plain_peer), &plain, "d", "", 8).unwrap_err();
        assert!(err.to_string().contains("no advanced security"));

        let other = Interface::new(InterfaceIdentifier::from("awg1"));
        assert!(build_vpn_link(Some(&peer), &other, "d", "", 8).is_err());
    }

    #[test]
    fn test_link_payload() {
        let (iface, peer) = fixture(Some(awg_params()));
        let link = build_vpn_link(Some(&peer), &iface, "awg0 - peer-1", "[Interface]\n", 8).unwrap();

        let encoded = link.strip_prefix(LINK_SCHEME).unwrap();
        assert!(!encoded.is_empty());
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+') && !encoded.contains('/'));

        let payload = decode_vpn_link(&link).unwrap();
        assert_eq!(payload["defaultContainer"], "amnezia-awg");
        assert_eq!(payload["description"], "awg0 - peer-1");
        assert_eq!(payload["dns1"], "8.8.8.8");
        assert_eq!(payload["dns2"], "8.8.4.4");
        assert_eq!(payload["hostName"], "vpn.example.com");

        let container = &payload["containers"][0];
        assert_eq!(container["container"], "amnezia-awg");
        let awg = &container["awg"];
        assert_eq!(awg["Jc"], "4");
        assert_eq!(awg["Jmin"], "40");
        assert_eq!(awg["Jmax"], "70");
        assert_eq!(awg["S1"], "15");
        assert_eq!(awg["S2"], "68");
        assert_eq!(awg["H1"], "1020325451");
        assert_eq!(awg["H4"], "2528465083");
        assert_eq!(awg["port"], "51821");
        assert_eq!(awg["transport_proto"], "udp");
        for key in ["S3", "S4", "I1", "I2", "I3", "I4", "I5"] {
            assert!(awg.get(key).is_none(), "{key} should be omitted");
        }

        let last: serde_json::Value = serde_json::from_str(awg["last_config"].as_str().unwrap()).unwrap();
        let expected_pub = public_key_from_private_key(&peer.interface.key_pair.private_key).unwrap();
        assert_eq!(last["Jc"], "4");
        assert_eq!(last["allowed_ips"], serde_json::json!(["10.8.1.0/24", "192.168.0.0/16"]));
        assert_eq!(last["clientId"], expected_pub.as_str());
        assert_eq!(last["client_pub_key"], expected_pub.as_str());
        assert_eq!(last["client_priv_key"], peer.interface.key_pair.private_key.as_str());
        assert_eq!(last["client_ip"], "10.8.1.2");
        assert_eq!(last["config"], "[Interface]\n");
        assert_eq!(last["hostName"], "vpn.example.com");
        assert_eq!(last["mtu"], "1280");
        assert_eq!(last["persistent_keep_alive"], "25");
        assert_eq!(last["port"], 51821);
        assert_eq!(last["psk_key"], "psk==");
        assert_eq!(last["server_pub_key"], iface.key_pair.public_key.as_str());
        assert!(last.get("S3").is_none());
    }

    #[test]
    fn test_field_order_matches_client_format() {
        let (iface, peer) = fixture(Some(awg_params()));
        let link = build_vpn_link(Some(&peer), &iface, "d", "", 8).unwrap();
        let framed = URL_SAFE_NO_PAD.decode(link.trim_start_matches(LINK_SCHEME)).unwrap();
        let payload = String::from_utf8(crate::amnezia::qt_uncompress(&framed).unwrap()).unwrap();

        assert!(payload.starts_with(r#"{"containers":[{"awg":{"H1":"1020325451","H2":"3288052141","H3":"1766607858","H4":"2528465083","Jc":"4","Jmax":"70","Jmin":"40","S1":"15","S2":"68","last_config":"#));
        assert!(payload.ends_with(r#""port":"51821","transport_proto":"udp"},"container":"amnezia-awg"}],"defaultContainer":"amnezia-awg","description":"d","dns1":"8.8.8.8","dns2":"8.8.4.4","hostName":"vpn.example.com"}"#));
    }

    #[test]
    fn test_optional_fields_and_overrides() {
        let params = AdvancedSecurity {
            cookie_reply_packet_junk_size: Some(20),
            transport_packet_junk_size: Some(0),
            first_special_junk_packet: Some(" <b 0xf6ab3267fa> ".to_string()),
            third_special_junk_packet: Some("".to_string()),
            ..awg_params()
        };
        let (iface, mut peer) = fixture(Some(params));
        peer.interface.mtu = ConfigOption::new(1380, true);
        peer.persistent_keepalive = ConfigOption::new(15, true);
        peer.endpoint = ConfigOption::new("[2001:db8::1]:443".to_string(), true);
        peer.interface.dns_str = ConfigOption::new(String::new(), true);

        let payload = decode_vpn_link(&build_vpn_link(Some(&peer), &iface, "d", "", 1).unwrap()).unwrap();
        let awg = &payload["containers"][0]["awg"];
        assert_eq!(awg["S3"], "20");
        assert!(awg.get("S4").is_none());
        assert_eq!(awg["I1"], "<b 0xf6ab3267fa>");
        assert!(awg.get("I3").is_none());
        assert_eq!(awg["port"], "443");
        assert_eq!(payload["hostName"], "2001:db8::1");
        assert_eq!(payload["dns1"], "1.1.1.1");
        assert_eq!(payload["dns2"], "1.0.0.1");

        let last: serde_json::Value = serde_json::from_str(awg["last_config"].as_str().unwrap()).unwrap();
        assert_eq!(last["S3"], "20");
        assert_eq!(last["I1"], "<b 0xf6ab3267fa>");
        assert_eq!(last["mtu"], "1380");
        assert_eq!(last["persistent_keep_alive"], "15");
        assert_eq!(last["port"], 443);
    }

    #[test]
    fn test_defaults_without_endpoint_and_keys() {
        let (iface, mut peer) = fixture(Some(awg_params()));
        peer.endpoint = ConfigOption::new("  ".to_string(), true);
        peer.allowed_ips_str = ConfigOption::new(String::new(), true);
        peer.interface.key_pair = KeyPair {
            private_key: String::new(),
            public_key: "stored-public-key".to_string(),
        };
        peer.interface.addresses.clear();

        let payload = decode_vpn_link(&build_vpn_link(Some(&peer), &iface, "d", "", 8).unwrap()).unwrap();
        assert_eq!(payload["hostName"], "127.0.0.1");
        assert_eq!(payload["containers"][0]["awg"]["port"], "51820");

        let last: serde_json::Value =
            serde_json::from_str(payload["containers"][0]["awg"]["last_config"].as_str().unwrap()).unwrap();
        assert_eq!(last["allowed_ips"], serde_json::json!(["0.0.0.0/0", "::/0"]));
        assert_eq!(last["client_pub_key"], "stored-public-key");
        assert_eq!(last["clientId"], "stored-public-key");
        assert_eq!(last["client_ip"], "");
    }

    #[test]
    fn test_deterministic_across_levels() {
        let (iface, peer) = fixture(Some(awg_params()));
        let a = build_vpn_link(Some(&peer), &iface, "d", "cfg", 8).unwrap();
        let b = build_vpn_link(Some(&peer), &iface, "d", "cfg", 8).unwrap();
        assert_eq!(a, b);

        let fast = build_vpn_link(Some(&peer), &iface, "d", "cfg", 1).unwrap();
        assert_eq!(decode_vpn_link(&a).unwrap(), decode_vpn_link(&fast).unwrap());
    }
}
