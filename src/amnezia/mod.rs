//! Import links for the AmneziaVPN client.
//!
//! A link is `vpn://` followed by the unpadded URL-safe base64 encoding of a
//! [`qt_compress`] framed JSON document describing one `amnezia-awg`
//! container.

mod framing;
mod link;
mod resolve;

pub use framing::{qt_compress, qt_uncompress, DEFAULT_COMPRESSION_LEVEL};
pub use link::{build_vpn_link, decode_vpn_link, CONTAINER_NAME, LINK_SCHEME};
pub use resolve::{parse_endpoint_host_port, pick_dns_servers, split_csv_or_default};
