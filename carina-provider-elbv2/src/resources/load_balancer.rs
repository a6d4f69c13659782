//! elbv2.load_balancer

use std::collections::HashMap;
use std::time::Duration;

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::wait::StateWaiter;

use super::{desired_tags, existing, set_changed, wait_error};
use crate::api::{ApiResult, Lookup};
use crate::arn::arn_suffix;
use crate::attributes::{self, LOAD_BALANCER, Scope};
use crate::model::{Attributes, CreateLoadBalancerInput, LoadBalancer, SubnetMapping, Tags};
use crate::naming;
use crate::provider::Elbv2Provider;
use crate::tags;
use crate::utils::{
    Attrs, api_error, get_blocks, get_bool, get_str, get_string, get_string_map, get_strings, put,
    string_list, string_map,
};

pub const TYPE: &str = "elbv2.load_balancer";

const NAME_MAX: usize = 32;

fn scope(lb_type: &str) -> Scope<'_> {
    Scope {
        load_balancer_type: Some(lb_type),
        ..Default::default()
    }
}

fn expand_subnet_mappings(attrs: &Attrs) -> Vec<SubnetMapping> {
    get_blocks(attrs, "subnet_mapping")
        .into_iter()
        .map(|m| SubnetMapping {
            subnet_id: get_string(m, "subnet_id").unwrap_or_default(),
            allocation_id: get_string(m, "allocation_id"),
            private_ipv4_address: get_string(m, "private_ipv4_address"),
            ipv6_address: get_string(m, "ipv6_address"),
        })
        .collect()
}

pub(crate) async fn find(provider: &Elbv2Provider, arn: &str) -> ApiResult<Option<LoadBalancer>> {
    match provider.api.describe_load_balancers(Lookup::arn(arn)).await {
        Ok(found) => Ok(found.into_iter().next()),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Poll until the load balancer is `active`; `failed` ends the wait with its reason
async fn wait_active(
    provider: &Elbv2Provider,
    id: &ResourceId,
    arn: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    let waiter = StateWaiter::new(&["provisioning"], &["active"], timeout)
        .with_delay(provider.timeouts.load_balancer_delay)
        .with_poll_interval(provider.timeouts.load_balancer_poll);

    waiter
        .wait(move || async move {
            let Some(lb) = find(provider, arn)
                .await
                .map_err(api_error(id, "describing load balancer"))?
            else {
                return Ok(None);
            };
            let state = lb.state.clone().unwrap_or_default();
            if state == "failed" {
                return Err(ProviderError::new(format!(
                    "load balancer {} failed to provision: {}",
                    arn,
                    lb.state_reason.as_deref().unwrap_or("no reason given")
                ))
                .for_resource(id.clone()));
            }
            Ok(Some(((), state)))
        })
        .await
        .map_err(|e| wait_error(id, "waiting for load balancer to become active", e))?;
    Ok(())
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;

    let name = naming::truncate(
        naming::name_or_prefix(get_str(attrs, "name"), get_str(attrs, "name_prefix"), "tf-lb-"),
        NAME_MAX,
    );
    let lb_type = get_str(attrs, "load_balancer_type").unwrap_or("application");
    let scheme = match (lb_type, get_bool(attrs, "internal")) {
        ("gateway", _) => None,
        (_, Some(true)) => Some("internal".to_string()),
        _ => Some("internet-facing".to_string()),
    };

    let input = CreateLoadBalancerInput {
        name: name.clone(),
        load_balancer_type: Some(lb_type.to_string()),
        scheme,
        subnets: get_strings(attrs, "subnets"),
        subnet_mappings: expand_subnet_mappings(attrs),
        security_groups: get_strings(attrs, "security_groups"),
        ip_address_type: get_string(attrs, "ip_address_type"),
        customer_owned_ipv4_pool: get_string(attrs, "customer_owned_ipv4_pool"),
        tags: get_string_map(attrs, "tags"),
    };

    log::info!("creating {} load balancer {}", lb_type, name);
    let lb = provider
        .api
        .create_load_balancer(input)
        .await
        .map_err(api_error(id, format!("creating load balancer {}", name)))?;

    let desired = attributes::expand(LOAD_BALANCER, attrs, &scope(lb_type));
    if !desired.is_empty() {
        provider
            .api
            .modify_load_balancer_attributes(&lb.arn, &desired)
            .await
            .map_err(api_error(id, "setting load balancer attributes"))?;
    }

    wait_active(provider, id, &lb.arn, provider.timeouts.load_balancer_create).await?;

    read(provider, id, Some(&lb.arn)).await
}

pub async fn read(
    provider: &Elbv2Provider,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(arn) = identifier else {
        return Ok(State::not_found(id.clone()));
    };

    let Some(lb) = find(provider, arn)
        .await
        .map_err(api_error(id, "describing load balancer"))?
    else {
        log::warn!("load balancer {} not found, removing from state", arn);
        return Ok(State::not_found(id.clone()));
    };

    let api_attributes = provider
        .api
        .describe_load_balancer_attributes(arn)
        .await
        .map_err(api_error(id, "describing load balancer attributes"))?;
    let tags = provider
        .api
        .describe_tags(arn)
        .await
        .map_err(api_error(id, "listing load balancer tags"))?;

    Ok(existing(id, arn, flatten_load_balancer(&lb, &api_attributes, &tags)))
}

/// State attributes of a load balancer (shared with the data source)
pub fn flatten_load_balancer(lb: &LoadBalancer, api_attributes: &Attributes, tags: &Tags) -> Attrs {
    let lb_type = lb.load_balancer_type.as_deref().unwrap_or("application");
    let mut attrs = attributes::flatten(LOAD_BALANCER, api_attributes, &scope(lb_type));

    attrs.insert("arn".to_string(), Value::from(lb.arn.as_str()));
    attrs.insert("id".to_string(), Value::from(lb.arn.as_str()));
    attrs.insert("arn_suffix".to_string(), Value::from(arn_suffix(&lb.arn)));
    attrs.insert("name".to_string(), Value::from(lb.name.as_str()));
    put(&mut attrs, "name_prefix", naming::prefix_from_name(&lb.name));
    attrs.insert("load_balancer_type".to_string(), Value::from(lb_type));
    attrs.insert(
        "internal".to_string(),
        Value::from(lb.scheme.as_deref() == Some("internal")),
    );
    put(&mut attrs, "dns_name", lb.dns_name.clone());
    put(&mut attrs, "zone_id", lb.canonical_hosted_zone_id.clone());
    put(&mut attrs, "vpc_id", lb.vpc_id.clone());
    put(&mut attrs, "ip_address_type", lb.ip_address_type.clone());
    put(&mut attrs, "customer_owned_ipv4_pool", lb.customer_owned_ipv4_pool.clone());
    attrs.insert(
        "security_groups".to_string(),
        string_list(lb.security_groups.iter().cloned()),
    );
    attrs.insert(
        "subnets".to_string(),
        string_list(lb.availability_zones.iter().filter_map(|az| az.subnet_id.clone())),
    );
    attrs.insert(
        "subnet_mapping".to_string(),
        Value::List(
            lb.availability_zones
                .iter()
                .map(|az| {
                    let mut mapping = HashMap::new();
                    put(&mut mapping, "subnet_id", az.subnet_id.clone());
                    put(&mut mapping, "outpost_id", az.outpost_id.clone());
                    if let Some(address) = az.addresses.first() {
                        put(&mut mapping, "allocation_id", address.allocation_id.clone());
                        put(
                            &mut mapping,
                            "private_ipv4_address",
                            address.private_ipv4_address.clone(),
                        );
                        put(&mut mapping, "ipv6_address", address.ipv6_address.clone());
                    }
                    Value::Map(mapping)
                })
                .collect(),
        ),
    );
    attrs.insert("tags".to_string(), string_map(tags));
    attrs
}

fn subnet_ids(attrs: &Attrs) -> Vec<String> {
    let mut ids: Vec<String> = get_blocks(attrs, "subnet_mapping")
        .into_iter()
        .filter_map(|m| get_string(m, "subnet_id"))
        .collect();
    ids.sort();
    ids
}

pub async fn update(
    provider: &Elbv2Provider,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = &to.attributes;
    let lb_type = get_str(attrs, "load_balancer_type").unwrap_or("application");

    if attrs.contains_key("security_groups") && set_changed(&from.attributes, attrs, "security_groups")
    {
        let groups = get_strings(attrs, "security_groups");
        log::info!("setting security groups of {} to {:?}", arn, groups);
        provider
            .api
            .set_security_groups(arn, &groups)
            .await
            .map_err(api_error(id, "setting security groups"))?;
    }

    let subnets_changed = attrs.contains_key("subnets") && set_changed(&from.attributes, attrs, "subnets");
    let mappings_changed =
        attrs.contains_key("subnet_mapping") && subnet_ids(&from.attributes) != subnet_ids(attrs);
    if subnets_changed || mappings_changed {
        log::info!("setting subnets of {}", arn);
        provider
            .api
            .set_subnets(arn, &get_strings(attrs, "subnets"), &expand_subnet_mappings(attrs))
            .await
            .map_err(api_error(id, "setting subnets"))?;
    }

    if let Some(ip_address_type) = get_str(attrs, "ip_address_type")
        && get_str(&from.attributes, "ip_address_type") != Some(ip_address_type)
    {
        log::info!("setting IP address type of {} to {}", arn, ip_address_type);
        provider
            .api
            .set_ip_address_type(arn, ip_address_type)
            .await
            .map_err(api_error(id, "setting IP address type"))?;
    }

    let desired = attributes::expand(LOAD_BALANCER, attrs, &scope(lb_type));
    let current = provider
        .api
        .describe_load_balancer_attributes(arn)
        .await
        .map_err(api_error(id, "describing load balancer attributes"))?;
    let changes = attributes::changes(&desired, &current);
    if !changes.is_empty() {
        log::info!(
            "modifying load balancer attributes of {}: {:?}",
            arn,
            changes.keys().collect::<Vec<_>>()
        );
        provider
            .api
            .modify_load_balancer_attributes(arn, &changes)
            .await
            .map_err(api_error(id, "modifying load balancer attributes"))?;
    }

    if let Some(desired) = desired_tags(attrs) {
        tags::update(
            provider.api.as_ref(),
            arn,
            &get_string_map(&from.attributes, "tags"),
            &desired,
        )
        .await
        .map_err(api_error(id, "updating tags"))?;
    }

    wait_active(provider, id, arn, provider.timeouts.load_balancer_update).await?;

    read(provider, id, Some(arn)).await
}

pub async fn delete(provider: &Elbv2Provider, id: &ResourceId, arn: &str) -> ProviderResult<()> {
    log::info!("deleting load balancer {}", arn);
    match provider.api.delete_load_balancer(arn).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(api_error(id, "deleting load balancer")(e)),
    }

    StateWaiter::new(
        &["active", "active_impaired", "provisioning", "failed"],
        &[],
        provider.timeouts.load_balancer_delete,
    )
    .with_poll_interval(provider.timeouts.load_balancer_poll)
    .wait(move || async move {
        let lb = find(provider, arn)
            .await
            .map_err(api_error(id, "describing load balancer"))?;
        Ok::<_, ProviderError>(lb.map(|lb| ((), lb.state.unwrap_or_default())))
    })
    .await
    .map_err(|e| wait_error(id, "waiting for load balancer deletion", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::codes;
    use crate::resources::test_support::{block, provider, resource, s, strings, tags};

    fn alb(pairs: Vec<(&str, Value)>) -> Resource {
        let mut r = resource(
            TYPE,
            "web",
            vec![
                ("name", s("web")),
                ("subnets", strings(&["subnet-a", "subnet-b"])),
                ("security_groups", strings(&["sg-1"])),
                ("idle_timeout", Value::Int(120)),
                ("enable_deletion_protection", Value::Bool(false)),
                ("load_balancer_type", s("application")),
            ],
        );
        for (k, v) in pairs {
            r.attributes.insert(k.to_string(), v);
        }
        r
    }

    #[tokio::test]
    async fn create_waits_until_active() {
        let (fake, provider) = provider();
        fake.set_provisioning_polls(2);

        let state = create(&provider, &alb(vec![])).await.unwrap();

        assert!(state.exists);
        let arn = state.identifier.clone().unwrap();
        assert!(arn.contains(":loadbalancer/app/web/"));
        assert!(fake.count("describe_load_balancers") >= 3);
        assert_eq!(state.attributes.get("idle_timeout"), Some(&Value::Int(120)));
        assert_eq!(state.attributes.get("internal"), Some(&Value::Bool(false)));
        assert_eq!(
            state.attributes.get("arn_suffix").and_then(Value::as_str),
            Some(arn.split(":loadbalancer/").nth(1).unwrap())
        );
        assert_eq!(
            fake.load_balancer_attributes(&arn).get("idle_timeout.timeout_seconds").map(String::as_str),
            Some("120")
        );
    }

    #[tokio::test]
    async fn failed_state_is_an_error_with_reason() {
        let (fake, provider) = provider();
        fake.set_provisioning_polls(1000);
        let lb = create_raw(&fake).await;
        fake.set_load_balancer_state(&lb, "failed", Some("subnet has no free addresses"));

        let id = ResourceId::new(TYPE, "web");
        let err = wait_active(&provider, &id, &lb, provider.timeouts.load_balancer_create)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("subnet has no free addresses"));
    }

    async fn create_raw(fake: &crate::testing::FakeElbV2) -> String {
        use crate::api::ElbV2Api;
        fake.create_load_balancer(CreateLoadBalancerInput {
            name: "raw".to_string(),
            subnets: vec!["subnet-a".to_string()],
            ..Default::default()
        })
        .await
        .unwrap()
        .arn
    }

    #[tokio::test]
    async fn generated_names_keep_their_prefix() {
        let (_, provider) = provider();
        let mut r = alb(vec![("name_prefix", s("web-"))]);
        r.attributes.remove("name");

        let state = create(&provider, &r).await.unwrap();
        let name = state.attributes.get("name").and_then(Value::as_str).unwrap();
        assert!(name.starts_with("web-"));
        assert!(name.len() <= NAME_MAX);
        assert_eq!(state.attributes.get("name_prefix"), Some(&s("web-")));
    }

    #[tokio::test]
    async fn network_attributes_are_not_written_to_application_load_balancers() {
        let (fake, provider) = provider();
        let r = alb(vec![
            ("enable_cross_zone_load_balancing", Value::Bool(true)),
            ("dns_record_client_routing_policy", s("any_availability_zone")),
        ]);
        let state = create(&provider, &r).await.unwrap();
        let api = fake.load_balancer_attributes(state.identifier.as_deref().unwrap());
        assert!(!api.contains_key("load_balancing.cross_zone.enabled"));
        assert!(!api.contains_key("dns_record.client_routing_policy"));
    }

    #[tokio::test]
    async fn access_logs_are_nested() {
        let (fake, provider) = provider();
        let r = alb(vec![(
            "access_logs",
            block(vec![("bucket", s("logs")), ("enabled", Value::Bool(true))]),
        )]);
        let state = create(&provider, &r).await.unwrap();
        let arn = state.identifier.as_deref().unwrap();
        assert_eq!(
            fake.load_balancer_attributes(arn).get("access_logs.s3.bucket").map(String::as_str),
            Some("logs")
        );
        let logs = state.attributes.get("access_logs").and_then(Value::as_map).unwrap();
        assert_eq!(logs.get("enabled"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn update_changes_only_what_differs() {
        let (fake, provider) = provider();
        let created = create(&provider, &alb(vec![("tags", tags(&[("env", "dev"), ("old", "x")]))]))
            .await
            .unwrap();
        let arn = created.identifier.clone().unwrap();

        let to = alb(vec![
            ("security_groups", strings(&["sg-1", "sg-2"])),
            ("idle_timeout", Value::Int(300)),
            ("tags", tags(&[("env", "prod")])),
        ]);
        let state = update(&provider, &to.id, &arn, &created, &to).await.unwrap();

        assert_eq!(fake.count("set_security_groups"), 1);
        assert_eq!(fake.count("set_subnets"), 0);
        assert_eq!(fake.count("set_ip_address_type"), 0);
        assert_eq!(state.attributes.get("idle_timeout"), Some(&Value::Int(300)));
        let tags = fake.tags_of(&arn);
        assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
        assert!(!tags.contains_key("old"));
    }

    #[tokio::test]
    async fn read_of_deleted_load_balancer_is_not_found() {
        let (_, provider) = provider();
        let created = create(&provider, &alb(vec![])).await.unwrap();
        let arn = created.identifier.clone().unwrap();

        delete(&provider, &created.id, &arn).await.unwrap();
        let state = read(&provider, &created.id, Some(&arn)).await.unwrap();
        assert!(!state.exists);

        // Deleting twice succeeds
        delete(&provider, &created.id, &arn).await.unwrap();
    }

    #[tokio::test]
    async fn deletion_protection_is_reported() {
        let (fake, provider) = provider();
        let created = create(&provider, &alb(vec![("enable_deletion_protection", Value::Bool(true))]))
            .await
            .unwrap();
        let err = delete(&provider, &created.id, created.identifier.as_deref().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains(codes::OPERATION_NOT_PERMITTED));
        assert!(fake.load_balancer(created.identifier.as_deref().unwrap()).is_some());
    }
}
