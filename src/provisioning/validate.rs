use std::collections::HashSet;

use crate::config::ProvisioningInterface;
use crate::domain::keys::public_key_from_private_key;
use crate::domain::{parse_cidr, InterfaceMode, ValidationWarning};
use crate::error::ValidationError;

/// Checks the provisioning entries in order and stops at the first invalid
/// one. Returns the hints collected for entries that are valid but look
/// misconfigured.
pub fn validate_provisioning_interfaces(
    interfaces: &[ProvisioningInterface],
) -> Result<Vec<ValidationWarning>, ValidationError> {
    let mut warnings = Vec::new();
    let mut seen = HashSet::with_capacity(interfaces.len());

    for (idx, iface) in interfaces.iter().enumerate() {
        let id = iface.identifier.trim();
        if id.is_empty() {
            return Err(ValidationError::new(
                format!("provisioning.interfaces[{idx}].identifier"),
                "must not be empty",
            ));
        }
        if !seen.insert(id) {
            return Err(ValidationError::new(
                "provisioning.interfaces.identifier",
                format!("{id:?} is not unique"),
            ));
        }

        let field = format!("provisioning.interfaces[{id}]");

        if InterfaceMode::parse_or_default(&iface.mode).is_none() {
            return Err(ValidationError::new(
                format!("{field}.mode"),
                format!("must be one of: server, client, any (got {:?})", iface.mode),
            ));
        }

        if !iface.private_key.trim().is_empty() && public_key_from_private_key(&iface.private_key).is_none() {
            return Err(ValidationError::new(
                format!("{field}.private_key"),
                "must be a base64 encoded 32 byte key",
            ));
        }

        validate_cidrs(&format!("{field}.addresses"), &iface.addresses)?;
        validate_cidrs(&format!("{field}.peer_def_allowed_ips"), &iface.peer_def_allowed_ips)?;
        validate_cidrs(&format!("{field}.peer_def_network"), &iface.peer_def_network)?;

        if let Some(adv) = &iface.advanced_security {
            warnings.extend(adv.validate(&format!("{field}.advanced_security"))?);
        }

        if !iface.dns.is_empty() && iface.peer_def_dns.is_empty() {
            warnings.push(ValidationWarning {
                field: format!("{field}.dns"),
                message: "interface dns set but peer_def_dns is empty; peers will not inherit dns".to_string(),
            });
        }
        if iface.mtu != 0 && iface.peer_def_mtu == 0 {
            warnings.push(ValidationWarning {
                field: format!("{field}.mtu"),
                message: format!(
                    "interface mtu {} set but peer_def_mtu is not set; peers will use default mtu",
                    iface.mtu
                ),
            });
        }
    }

    Ok(warnings)
}

fn validate_cidrs(field: &str, cidrs: &[String]) -> Result<(), ValidationError> {
    for (i, raw) in cidrs.iter().enumerate() {
        parse_cidr(raw).map_err(|e| ValidationError::new(format!("{field}[{i}]"), e.to_string()))?;
    }
    Ok(())
}
