//! ARN helpers
//!
//! ELBv2 ARNs look like
//! `arn:aws:elasticloadbalancing:us-east-1:123456789012:loadbalancer/app/web/50dc6c495c0c9188`.

/// Resource part of an ARN (everything after the fifth colon)
pub fn resource_part(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    if parts.next()? != "arn" {
        return None;
    }
    parts.nth(4)
}

/// Suffix used by CloudWatch dimensions.
///
/// Load balancers drop the `loadbalancer/` prefix (`app/web/50dc6c495c0c9188`);
/// target groups and trust stores keep the full resource
/// (`targetgroup/web/73e2d6bc24d8a067`).
pub fn arn_suffix(arn: &str) -> String {
    match resource_part(arn) {
        Some(resource) => resource
            .strip_prefix("loadbalancer/")
            .unwrap_or(resource)
            .to_string(),
        None => String::new(),
    }
}

/// Load balancer type encoded in a load balancer, listener or rule ARN
pub fn load_balancer_type(arn: &str) -> Option<&'static str> {
    let resource = resource_part(arn)?;
    let kind = resource.split('/').nth(1)?;
    match kind {
        "app" => Some("application"),
        "net" => Some("network"),
        "gwy" => Some("gateway"),
        _ => None,
    }
}

/// Listener ARN a listener rule ARN belongs to
pub fn listener_arn_from_rule_arn(rule_arn: &str) -> Option<String> {
    let (head, resource) = rule_arn.rsplit_once(':')?;
    let resource = resource.strip_prefix("listener-rule/")?;
    let (listener, _rule_id) = resource.rsplit_once('/')?;
    Some(format!("{}:listener/{}", head, listener))
}

/// Region of an ARN
pub fn region(arn: &str) -> Option<&str> {
    let region = arn.split(':').nth(3)?;
    if region.is_empty() { None } else { Some(region) }
}
