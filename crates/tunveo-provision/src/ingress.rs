//! Validation and `auto` hostname substitution for inbound rule sets

use tunveo_cfapi::{IngressRule, CATCH_ALL_SERVICE};

use crate::error::ProvisionError;

/// Hostname placeholder replaced by a generated name (matched case-insensitively)
pub const AUTO_HOSTNAME: &str = "auto";

pub fn is_auto(rule: &IngressRule) -> bool {
    rule.hostname
        .as_deref()
        .is_some_and(|h| h.eq_ignore_ascii_case(AUTO_HOSTNAME))
}

/// The rule set must be non-empty and end with its only catch-all
pub fn validate(ingress: &[IngressRule]) -> Result<(), ProvisionError> {
    let Some((last, rest)) = ingress.split_last() else {
        return Err(ProvisionError::InvalidIngress(
            "at least one rule is required".to_string(),
        ));
    };

    if !last.is_catch_all() {
        return Err(ProvisionError::InvalidIngress(
            "the last rule must be a catch-all without a hostname".to_string(),
        ));
    }
    if last.service != CATCH_ALL_SERVICE {
        return Err(ProvisionError::InvalidIngress(format!(
            "the catch-all rule must use service '{}'",
            CATCH_ALL_SERVICE
        )));
    }

    for (index, rule) in rest.iter().enumerate() {
        match rule.hostname.as_deref() {
            None => {
                return Err(ProvisionError::InvalidIngress(format!(
                    "rule {} has no hostname; only the last rule may be a catch-all",
                    index
                )))
            }
            Some(h) if h.trim().is_empty() => {
                return Err(ProvisionError::InvalidIngress(format!(
                    "rule {} has an empty hostname",
                    index
                )))
            }
            Some(_) => {}
        }
        if rule.service.trim().is_empty() {
            return Err(ProvisionError::InvalidIngress(format!(
                "rule {} has no service",
                index
            )));
        }
    }

    Ok(())
}

/// Replace every `auto` hostname with `hostname`
///
/// Returns the number of rules rewritten.
pub fn substitute_auto(ingress: &mut [IngressRule], hostname: &str) -> usize {
    let mut replaced = 0;
    for rule in ingress.iter_mut().filter(|r| is_auto(r)) {
        rule.hostname = Some(hostname.to_string());
        replaced += 1;
    }
    replaced
}

/// Distinct hostnames that will receive a DNS alias, in rule order
pub fn routed_hostnames(ingress: &[IngressRule]) -> Vec<String> {
    let mut hostnames: Vec<String> = Vec::new();
    for hostname in ingress.iter().filter_map(IngressRule::aliased_hostname) {
        if !hostnames.iter().any(|h| h == hostname) {
            hostnames.push(hostname.to_string());
        }
    }
    hostnames
}
