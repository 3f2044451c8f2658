//! Obfuscation parameters of an AmneziaWG interface.
//!
//! Field names follow the short AmneziaWG keys (`jc`, `jmin`, `s1`, `h1`, `i1`, ...)
//! so the same block can be written in the provisioning section of the
//! configuration file and stored alongside an interface.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// I1..I5 must be shorter than this many bytes.
pub const MAX_SPECIAL_JUNK_PACKET_LEN: usize = 5 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdvancedSecurity {
    #[serde(rename = "jc")]
    pub junk_packet_count: u16,
    #[serde(rename = "jmin")]
    pub junk_packet_min_size: u16,
    #[serde(rename = "jmax")]
    pub junk_packet_max_size: u16,

    #[serde(rename = "s1")]
    pub init_packet_junk_size: u16,
    #[serde(rename = "s2")]
    pub response_packet_junk_size: u16,
    #[serde(rename = "s3", skip_serializing_if = "Option::is_none")]
    pub cookie_reply_packet_junk_size: Option<u16>,
    #[serde(rename = "s4", skip_serializing_if = "Option::is_none")]
    pub transport_packet_junk_size: Option<u16>,

    #[serde(rename = "h1", skip_serializing_if = "Option::is_none")]
    pub init_packet_magic_header: Option<String>,
    #[serde(rename = "h2", skip_serializing_if = "Option::is_none")]
    pub response_packet_magic_header: Option<String>,
    #[serde(rename = "h3", skip_serializing_if = "Option::is_none")]
    pub underload_packet_magic_header: Option<String>,
    #[serde(rename = "h4", skip_serializing_if = "Option::is_none")]
    pub transport_packet_magic_header: Option<String>,

    #[serde(rename = "i1", skip_serializing_if = "Option::is_none")]
    pub first_special_junk_packet: Option<String>,
    #[serde(rename = "i2", skip_serializing_if = "Option::is_none")]
    pub second_special_junk_packet: Option<String>,
    #[serde(rename = "i3", skip_serializing_if = "Option::is_none")]
    pub third_special_junk_packet: Option<String>,
    #[serde(rename = "i4", skip_serializing_if = "Option::is_none")]
    pub fourth_special_junk_packet: Option<String>,
    #[serde(rename = "i5", skip_serializing_if = "Option::is_none")]
    pub fifth_special_junk_packet: Option<String>,
}

/// A setting that is accepted but most likely not what the operator meant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

impl AdvancedSecurity {
    /// True when every field is at its zero value. An empty block is treated
    /// exactly like a missing one.
    pub fn is_empty(&self) -> bool {
        self.junk_packet_count == 0
            && self.junk_packet_min_size == 0
            && self.junk_packet_max_size == 0
            && self.init_packet_junk_size == 0
            && self.response_packet_junk_size == 0
            && self.cookie_reply_packet_junk_size().is_none()
            && self.transport_packet_junk_size().is_none()
            && self.magic_headers().iter().all(Option::is_none)
            && self.special_junk_packets().iter().all(Option::is_none)
    }

    /// S3, `None` when unset or zero.
    pub fn cookie_reply_packet_junk_size(&self) -> Option<u16> {
        self.cookie_reply_packet_junk_size.filter(|v| *v != 0)
    }

    /// S4, `None` when unset or zero.
    pub fn transport_packet_junk_size(&self) -> Option<u16> {
        self.transport_packet_junk_size.filter(|v| *v != 0)
    }

    /// H1..H4, trimmed, blank values reported as `None`.
    pub fn magic_headers(&self) -> [Option<&str>; 4] {
        [
            present(&self.init_packet_magic_header),
            present(&self.response_packet_magic_header),
            present(&self.underload_packet_magic_header),
            present(&self.transport_packet_magic_header),
        ]
    }

    /// I1..I5, trimmed, blank values reported as `None`.
    pub fn special_junk_packets(&self) -> [Option<&str>; 5] {
        [
            present(&self.first_special_junk_packet),
            present(&self.second_special_junk_packet),
            present(&self.third_special_junk_packet),
            present(&self.fourth_special_junk_packet),
            present(&self.fifth_special_junk_packet),
        ]
    }

    /// Copy with trimmed strings and absent values collapsed to `None`.
    pub fn normalized(&self) -> Self {
        let [h1, h2, h3, h4] = self.magic_headers().map(|v| v.map(str::to_string));
        let [i1, i2, i3, i4, i5] = self.special_junk_packets().map(|v| v.map(str::to_string));

        Self {
            junk_packet_count: self.junk_packet_count,
            junk_packet_min_size: self.junk_packet_min_size,
            junk_packet_max_size: self.junk_packet_max_size,
            init_packet_junk_size: self.init_packet_junk_size,
            response_packet_junk_size: self.response_packet_junk_size,
            cookie_reply_packet_junk_size: self.cookie_reply_packet_junk_size(),
            transport_packet_junk_size: self.transport_packet_junk_size(),
            init_packet_magic_header: h1,
            response_packet_magic_header: h2,
            underload_packet_magic_header: h3,
            transport_packet_magic_header: h4,
            first_special_junk_packet: i1,
            second_special_junk_packet: i2,
            third_special_junk_packet: i3,
            fourth_special_junk_packet: i4,
            fifth_special_junk_packet: i5,
        }
    }

    /// Checks the cross-field rules of the block. `field` prefixes every
    /// reported error and warning.
    pub fn validate(&self, field: &str) -> Result<Vec<ValidationWarning>, ValidationError> {
        let mut warnings = Vec::new();

        if self.junk_packet_count > 0 {
            if self.junk_packet_min_size == 0 || self.junk_packet_max_size == 0 {
                return Err(ValidationError::new(field, "jmin and jmax must be > 0 when jc > 0"));
            }
            if self.junk_packet_min_size > self.junk_packet_max_size {
                return Err(ValidationError::new(field, "jmin must be <= jmax"));
            }
        } else if self.junk_packet_min_size != 0 || self.junk_packet_max_size != 0 {
            warnings.push(ValidationWarning {
                field: field.to_string(),
                message: "jmin/jmax set but jc=0; junk packets disabled".to_string(),
            });
        }

        let headers = [
            ("init_packet_magic_header (h1)", &self.init_packet_magic_header),
            ("response_packet_magic_header (h2)", &self.response_packet_magic_header),
            ("underload_packet_magic_header (h3)", &self.underload_packet_magic_header),
            ("transport_packet_magic_header (h4)", &self.transport_packet_magic_header),
        ];
        for (name, value) in headers {
            if let Some(raw) = value {
                let raw = raw.trim();
                if !raw.is_empty() && parse_magic_header(raw).is_none() {
                    return Err(ValidationError::new(
                        format!("{field}.{name}"),
                        format!("must be a uint32 (decimal or 0x...), got {raw:?}"),
                    ));
                }
            }
        }

        let junk_packets = [
            ("first_special_junk_packet (i1)", &self.first_special_junk_packet),
            ("second_special_junk_packet (i2)", &self.second_special_junk_packet),
            ("third_special_junk_packet (i3)", &self.third_special_junk_packet),
            ("fourth_special_junk_packet (i4)", &self.fourth_special_junk_packet),
            ("fifth_special_junk_packet (i5)", &self.fifth_special_junk_packet),
        ];
        for (name, value) in junk_packets {
            if let Some(raw) = value {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Err(ValidationError::new(format!("{field}.{name}"), "must not be empty"));
                }
                if raw.len() >= MAX_SPECIAL_JUNK_PACKET_LEN {
                    return Err(ValidationError::new(
                        format!("{field}.{name}"),
                        format!("must be shorter than {MAX_SPECIAL_JUNK_PACKET_LEN} bytes"),
                    ));
                }
            }
        }

        Ok(warnings)
    }
}

/// Parses a magic header as decimal or `0x` prefixed hexadecimal u32.
pub fn parse_magic_header(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse::<u32>().ok(),
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
