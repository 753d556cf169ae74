//! Per-packet rule evaluation
//!
//! Every field of a rule is an independent filter; a rule matches only
//! when all of its present filters pass. A rule with no filters at all
//! matches every packet. At most one alert per rule per packet.

use crate::core::{Alert, PacketEvent};

use super::loader::{CompiledRule, RuleSet};

/// Check one rule against one packet.
///
/// An address filter fails when the packet lacks that address. A payload
/// pattern fails when the packet carries no payload.
pub fn rule_matches(rule: &CompiledRule, event: &PacketEvent) -> bool {
    if let Some(want) = rule.src_ip {
        match event.src_ip {
            Some(have) if have == want => {}
            _ => return false,
        }
    }
    if let Some(want) = rule.dst_ip {
        match event.dst_ip {
            Some(have) if have == want => {}
            _ => return false,
        }
    }
    if let Some(want) = rule.protocol {
        match event.protocol {
            Some(have) if have == want => {}
            _ => return false,
        }
    }
    if let Some(pattern) = &rule.pattern {
        match event.payload_text() {
            Some(text) => {
                if !pattern.is_match(&text) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

/// Evaluate a packet against every rule in declaration order
pub fn evaluate(set: &RuleSet, event: &PacketEvent) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for rule in set.rules() {
        if rule_matches(rule, event) {
            alerts.push(Alert::signature(
                event.timestamp,
                rule.id.clone(),
                rule.description.clone(),
                rule.confidence,
                event.src_ip,
                event.dst_ip,
                event.protocol,
            ));
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AlertContext, AlertKind};
    use chrono::Utc;
    use std::net::{IpAddr, Ipv4Addr};

    fn event(src: &str, dst: &str, proto: u8) -> PacketEvent {
        PacketEvent::new(Utc::now(), src.parse().unwrap(), dst.parse().unwrap(), proto, 100)
    }

    fn ruleset(content: &str) -> RuleSet {
        RuleSet::parse(content)
    }

    #[test]
    fn test_payload_pattern_match() {
        let set = ruleset("[[rules]]\nid = \"r1\"\npattern = \"attack\"\n");
        let evt =
            event("10.0.0.1", "10.0.0.2", 6).with_payload(b"an ATTACK string".to_vec());
        let alerts = evaluate(&set, &evt);
        assert_eq!(alerts.len(), 1);
        match &alerts[0].context {
            AlertContext::Signature { rule_id, .. } => assert_eq!(rule_id, "r1"),
            other => panic!("unexpected context: {other:?}"),
        }
    }

    #[test]
    fn test_pattern_requires_payload() {
        let set = ruleset("[[rules]]\npattern = \"attack\"\n");
        let evt = event("10.0.0.1", "10.0.0.2", 6);
        assert!(evaluate(&set, &evt).is_empty());
    }

    #[test]
    fn test_address_filter() {
        let set = ruleset("[[rules]]\nid = \"r1\"\nsrc_ip = \"10.0.0.1\"\n");
        assert_eq!(evaluate(&set, &event("10.0.0.1", "10.0.0.2", 6)).len(), 1);
        assert!(evaluate(&set, &event("10.0.0.9", "10.0.0.2", 6)).is_empty());
    }

    #[test]
    fn test_address_filter_fails_without_address() {
        let set = ruleset("[[rules]]\nsrc_ip = \"10.0.0.1\"\n");
        let evt = PacketEvent {
            timestamp: Utc::now(),
            src_ip: None,
            dst_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            protocol: Some(6),
            length: 64,
            payload: None,
        };
        assert!(evaluate(&set, &evt).is_empty());
    }

    #[test]
    fn test_protocol_filter() {
        let set = ruleset("[[rules]]\nprotocol = 17\n");
        assert!(evaluate(&set, &event("10.0.0.1", "10.0.0.2", 6)).is_empty());
        assert_eq!(evaluate(&set, &event("10.0.0.1", "10.0.0.2", 17)).len(), 1);
    }

    #[test]
    fn test_filter_only_rule_fires_without_payload() {
        let set = ruleset("[[rules]]\nid = \"r1\"\nsrc_ip = \"10.0.0.1\"\nprotocol = 6\n");
        let evt = event("10.0.0.1", "10.0.0.2", 6);
        assert_eq!(evaluate(&set, &evt).len(), 1);
    }

    #[test]
    fn test_multiple_rules_one_alert_each() {
        let set = ruleset(
            "[[rules]]\nid = \"a\"\nprotocol = 6\n\n[[rules]]\nid = \"b\"\nsrc_ip = \"10.0.0.1\"\n",
        );
        let alerts = evaluate(&set, &event("10.0.0.1", "10.0.0.2", 6));
        assert_eq!(alerts.len(), 2);
        // declaration order preserved
        match &alerts[0].context {
            AlertContext::Signature { rule_id, .. } => assert_eq!(rule_id, "a"),
            other => panic!("unexpected context: {other:?}"),
        }
        assert!(alerts.iter().all(|a| a.alert_type == AlertKind::Signature));
    }

    #[test]
    fn test_all_filters_must_pass() {
        let set = ruleset("[[rules]]\nsrc_ip = \"10.0.0.1\"\npattern = \"x\"\n");
        // address matches but payload pattern does not
        let evt = event("10.0.0.1", "10.0.0.2", 6).with_payload(b"nothing here".to_vec());
        assert!(evaluate(&set, &evt).is_empty());
    }
}
