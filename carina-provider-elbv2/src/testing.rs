//! In-memory ELBv2 used by the provider tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{ApiError, ApiResult, ElbV2Api, Lookup, codes};
use crate::model::*;

const PREFIX: &str = "arn:aws:elasticloadbalancing:us-east-1:123456789012";

#[derive(Default)]
struct Inner {
    next_id: u64,
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<ApiError>>,
    /// Describe calls a new load balancer stays in `provisioning`
    provisioning_polls: u32,
    pending_polls: HashMap<String, u32>,
    /// Describe calls a new trust store stays in `CREATING`
    trust_store_polls: u32,
    load_balancers: BTreeMap<String, LoadBalancer>,
    lb_attributes: HashMap<String, Attributes>,
    target_groups: BTreeMap<String, TargetGroup>,
    tg_attributes: HashMap<String, Attributes>,
    targets: HashMap<String, Vec<TargetDescription>>,
    listeners: BTreeMap<String, Listener>,
    listener_attributes: HashMap<String, Attributes>,
    rules: BTreeMap<String, (String, Rule)>,
    trust_stores: BTreeMap<String, TrustStore>,
    revocations: HashMap<String, Vec<TrustStoreRevocation>>,
    tags: HashMap<String, Tags>,
}

impl Inner {
    fn id(&mut self) -> String {
        self.next_id += 1;
        format!("{:016x}", 0x50dc6c495c0c0000u64 + self.next_id)
    }

    fn enter(&mut self, op: &str) -> ApiResult<()> {
        self.calls.push(op.to_string());
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn referenced_target_groups(&self) -> Vec<(String, String)> {
        let mut refs = Vec::new();
        let actions = self
            .listeners
            .values()
            .map(|l| (&l.load_balancer_arn, &l.default_actions))
            .chain(self.rules.values().filter_map(|(listener, rule)| {
                self.listeners
                    .get(listener)
                    .map(|l| (&l.load_balancer_arn, &rule.actions))
            }));
        for (lb, actions) in actions {
            for action in actions {
                if let Some(arn) = &action.target_group_arn {
                    refs.push((arn.clone(), lb.clone()));
                }
                if let Some(forward) = &action.forward {
                    for tg in &forward.target_groups {
                        refs.push((tg.arn.clone(), lb.clone()));
                    }
                }
            }
        }
        refs
    }

    fn check_target_groups(&self, actions: &[Action]) -> ApiResult<()> {
        for action in actions {
            let arns = action
                .target_group_arn
                .iter()
                .chain(action.forward.iter().flat_map(|f| f.target_groups.iter().map(|t| &t.arn)));
            for arn in arns {
                if !self.target_groups.contains_key(arn) {
                    return Err(not_found(codes::TARGET_GROUP_NOT_FOUND, arn));
                }
            }
        }
        Ok(())
    }
}

fn not_found(code: &str, what: &str) -> ApiError {
    ApiError::new(code, format!("'{}' not found", what))
}

fn select<T: Clone>(
    items: &BTreeMap<String, T>,
    lookup: &Lookup,
    name_of: impl Fn(&T) -> &str,
    code: &str,
) -> ApiResult<Vec<T>> {
    match lookup {
        Lookup::All => Ok(items.values().cloned().collect()),
        Lookup::Arns(arns) => arns
            .iter()
            .map(|arn| items.get(arn).cloned().ok_or_else(|| not_found(code, arn)))
            .collect(),
        Lookup::Names(names) => names
            .iter()
            .map(|name| {
                items
                    .values()
                    .find(|item| name_of(item) == name)
                    .cloned()
                    .ok_or_else(|| not_found(code, name))
            })
            .collect(),
        Lookup::Parent(_) => Err(ApiError::new(
            codes::VALIDATION_ERROR,
            "lookup by parent is not supported here",
        )),
    }
}

/// Scriptable in-memory implementation of [`ElbV2Api`]
#[derive(Default)]
pub struct FakeElbV2 {
    inner: Mutex<Inner>,
}

impl FakeElbV2 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls of `op` with `code`
    pub fn fail_next(&self, op: &str, code: &str, times: usize) {
        let mut inner = self.inner.lock().unwrap();
        let queue = inner.failures.entry(op.to_string()).or_default();
        for _ in 0..times {
            queue.push_back(ApiError::new(code, "injected failure"));
        }
    }

    pub fn set_provisioning_polls(&self, polls: u32) {
        self.inner.lock().unwrap().provisioning_polls = polls;
    }

    pub fn set_trust_store_polls(&self, polls: u32) {
        self.inner.lock().unwrap().trust_store_polls = polls;
    }

    /// Force the state of a load balancer
    pub fn set_load_balancer_state(&self, arn: &str, state: &str, reason: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending_polls.remove(arn);
        if let Some(lb) = inner.load_balancers.get_mut(arn) {
            lb.state = Some(state.to_string());
            lb.state_reason = reason.map(str::to_string);
        }
    }

    /// Names of the operations called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == op)
            .count()
    }

    pub fn load_balancer(&self, arn: &str) -> Option<LoadBalancer> {
        self.inner.lock().unwrap().load_balancers.get(arn).cloned()
    }

    pub fn load_balancer_attributes(&self, arn: &str) -> Attributes {
        self.inner
            .lock()
            .unwrap()
            .lb_attributes
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn target_group_attributes(&self, arn: &str) -> Attributes {
        self.inner
            .lock()
            .unwrap()
            .tg_attributes
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn listener(&self, arn: &str) -> Option<Listener> {
        self.inner.lock().unwrap().listeners.get(arn).cloned()
    }

    pub fn listener_attributes(&self, arn: &str) -> Attributes {
        self.inner
            .lock()
            .unwrap()
            .listener_attributes
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn rule(&self, arn: &str) -> Option<Rule> {
        self.inner
            .lock()
            .unwrap()
            .rules
            .get(arn)
            .map(|(_, rule)| rule.clone())
    }

    pub fn registered_targets(&self, tg_arn: &str) -> Vec<TargetDescription> {
        self.inner
            .lock()
            .unwrap()
            .targets
            .get(tg_arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tags_of(&self, arn: &str) -> Tags {
        self.inner
            .lock()
            .unwrap()
            .tags
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ElbV2Api for FakeElbV2 {
    async fn create_load_balancer(&self, input: CreateLoadBalancerInput) -> ApiResult<LoadBalancer> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("create_load_balancer")?;
        if inner.load_balancers.values().any(|lb| lb.name == input.name) {
            return Err(ApiError::new(
                "DuplicateLoadBalancerName",
                format!("A load balancer with the name '{}' already exists", input.name),
            ));
        }
        let lb_type = input
            .load_balancer_type
            .clone()
            .unwrap_or_else(|| "application".to_string());
        let short = match lb_type.as_str() {
            "network" => "net",
            "gateway" => "gwy",
            _ => "app",
        };
        let id = inner.id();
        let arn = format!("{}:loadbalancer/{}/{}/{}", PREFIX, short, input.name, id);
        let subnets: Vec<SubnetMapping> = if input.subnet_mappings.is_empty() {
            input
                .subnets
                .iter()
                .map(|s| SubnetMapping {
                    subnet_id: s.clone(),
                    ..Default::default()
                })
                .collect()
        } else {
            input.subnet_mappings.clone()
        };
        let state = if inner.provisioning_polls > 0 {
            let polls = inner.provisioning_polls;
            inner.pending_polls.insert(arn.clone(), polls);
            "provisioning"
        } else {
            "active"
        };
        let lb = LoadBalancer {
            arn: arn.clone(),
            name: input.name.clone(),
            dns_name: Some(format!("{}-{}.us-east-1.elb.amazonaws.com", input.name, id)),
            canonical_hosted_zone_id: Some("Z35SXDOTRQ7X7K".to_string()),
            scheme: Some(input.scheme.unwrap_or_else(|| "internet-facing".to_string())),
            load_balancer_type: Some(lb_type),
            state: Some(state.to_string()),
            state_reason: None,
            vpc_id: Some("vpc-0a1b2c3d".to_string()),
            ip_address_type: Some(input.ip_address_type.unwrap_or_else(|| "ipv4".to_string())),
            security_groups: input.security_groups,
            availability_zones: subnets
                .into_iter()
                .map(|m| AvailabilityZone {
                    zone_name: Some("us-east-1a".to_string()),
                    subnet_id: Some(m.subnet_id),
                    outpost_id: None,
                    addresses: if m.allocation_id.is_some() || m.private_ipv4_address.is_some() {
                        vec![LoadBalancerAddress {
                            ip_address: None,
                            allocation_id: m.allocation_id,
                            private_ipv4_address: m.private_ipv4_address,
                            ipv6_address: m.ipv6_address,
                        }]
                    } else {
                        Vec::new()
                    },
                })
                .collect(),
            customer_owned_ipv4_pool: input.customer_owned_ipv4_pool,
        };
        inner.load_balancers.insert(arn.clone(), lb.clone());
        inner.tags.insert(arn, input.tags);
        Ok(lb)
    }

    async fn describe_load_balancers(&self, lookup: Lookup) -> ApiResult<Vec<LoadBalancer>> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_load_balancers")?;
        let found = select(
            &inner.load_balancers,
            &lookup,
            |lb| lb.name.as_str(),
            codes::LOAD_BALANCER_NOT_FOUND,
        )?;
        let mut result = Vec::new();
        for mut lb in found {
            if let Some(polls) = inner.pending_polls.get_mut(&lb.arn) {
                if *polls == 0 {
                    inner.pending_polls.remove(&lb.arn);
                    lb.state = Some("active".to_string());
                    inner.load_balancers.insert(lb.arn.clone(), lb.clone());
                } else {
                    *polls -= 1;
                }
            }
            result.push(lb);
        }
        Ok(result)
    }

    async fn delete_load_balancer(&self, arn: &str) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("delete_load_balancer")?;
        if inner
            .lb_attributes
            .get(arn)
            .is_some_and(|a| a.get("deletion_protection.enabled").map(String::as_str) == Some("true"))
        {
            return Err(ApiError::new(
                codes::OPERATION_NOT_PERMITTED,
                "Load balancer has deletion protection enabled",
            ));
        }
        inner.load_balancers.remove(arn);
        let listeners: Vec<String> = inner
            .listeners
            .values()
            .filter(|l| l.load_balancer_arn == arn)
            .map(|l| l.arn.clone())
            .collect();
        for listener in listeners {
            inner.listeners.remove(&listener);
            inner.rules.retain(|_, (l, _)| *l != listener);
        }
        Ok(())
    }

    async fn set_security_groups(&self, arn: &str, security_groups: &[String]) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("set_security_groups")?;
        let lb = inner
            .load_balancers
            .get_mut(arn)
            .ok_or_else(|| not_found(codes::LOAD_BALANCER_NOT_FOUND, arn))?;
        lb.security_groups = security_groups.to_vec();
        Ok(())
    }

    async fn set_subnets(
        &self,
        arn: &str,
        subnets: &[String],
        subnet_mappings: &[SubnetMapping],
    ) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("set_subnets")?;
        let lb = inner
            .load_balancers
            .get_mut(arn)
            .ok_or_else(|| not_found(codes::LOAD_BALANCER_NOT_FOUND, arn))?;
        let ids: Vec<String> = if subnet_mappings.is_empty() {
            subnets.to_vec()
        } else {
            subnet_mappings.iter().map(|m| m.subnet_id.clone()).collect()
        };
        lb.availability_zones = ids
            .into_iter()
            .map(|subnet_id| AvailabilityZone {
                zone_name: Some("us-east-1a".to_string()),
                subnet_id: Some(subnet_id),
                ..Default::default()
            })
            .collect();
        Ok(())
    }

    async fn set_ip_address_type(&self, arn: &str, ip_address_type: &str) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("set_ip_address_type")?;
        let lb = inner
            .load_balancers
            .get_mut(arn)
            .ok_or_else(|| not_found(codes::LOAD_BALANCER_NOT_FOUND, arn))?;
        lb.ip_address_type = Some(ip_address_type.to_string());
        Ok(())
    }

    async fn describe_load_balancer_attributes(&self, arn: &str) -> ApiResult<Attributes> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_load_balancer_attributes")?;
        if !inner.load_balancers.contains_key(arn) {
            return Err(not_found(codes::LOAD_BALANCER_NOT_FOUND, arn));
        }
        Ok(inner.lb_attributes.get(arn).cloned().unwrap_or_default())
    }

    async fn modify_load_balancer_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("modify_load_balancer_attributes")?;
        if !inner.load_balancers.contains_key(arn) {
            return Err(not_found(codes::LOAD_BALANCER_NOT_FOUND, arn));
        }
        inner
            .lb_attributes
            .entry(arn.to_string())
            .or_default()
            .extend(attributes.clone());
        Ok(())
    }

    async fn create_target_group(&self, input: CreateTargetGroupInput) -> ApiResult<TargetGroup> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("create_target_group")?;
        if inner.target_groups.values().any(|tg| tg.name == input.name) {
            return Err(ApiError::new(
                codes::DUPLICATE_TARGET_GROUP_NAME,
                format!("A target group with the same name '{}' exists", input.name),
            ));
        }
        let id = inner.id();
        let arn = format!("{}:targetgroup/{}/{}", PREFIX, input.name, id);
        let tg = TargetGroup {
            arn: arn.clone(),
            name: input.name,
            port: input.port,
            protocol: input.protocol,
            protocol_version: input.protocol_version,
            vpc_id: input.vpc_id,
            target_type: Some(input.target_type.unwrap_or_else(|| "instance".to_string())),
            ip_address_type: Some(input.ip_address_type.unwrap_or_else(|| "ipv4".to_string())),
            health_check: input.health_check,
            load_balancer_arns: Vec::new(),
        };
        inner.target_groups.insert(arn.clone(), tg.clone());
        inner.tags.insert(arn, input.tags);
        Ok(tg)
    }

    async fn describe_target_groups(&self, lookup: Lookup) -> ApiResult<Vec<TargetGroup>> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_target_groups")?;
        let refs = inner.referenced_target_groups();
        let mut found = match &lookup {
            Lookup::Parent(lb) => {
                let arns: Vec<&String> = refs.iter().filter(|(_, l)| l == lb).map(|(tg, _)| tg).collect();
                inner
                    .target_groups
                    .values()
                    .filter(|tg| arns.contains(&&tg.arn))
                    .cloned()
                    .collect()
            }
            _ => select(
                &inner.target_groups,
                &lookup,
                |tg| tg.name.as_str(),
                codes::TARGET_GROUP_NOT_FOUND,
            )?,
        };
        for tg in &mut found {
            let mut lbs: Vec<String> = refs
                .iter()
                .filter(|(arn, _)| *arn == tg.arn)
                .map(|(_, lb)| lb.clone())
                .collect();
            lbs.sort();
            lbs.dedup();
            tg.load_balancer_arns = lbs;
        }
        Ok(found)
    }

    async fn modify_target_group(
        &self,
        arn: &str,
        health_check: &HealthCheck,
    ) -> ApiResult<TargetGroup> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("modify_target_group")?;
        let tg = inner
            .target_groups
            .get_mut(arn)
            .ok_or_else(|| not_found(codes::TARGET_GROUP_NOT_FOUND, arn))?;
        tg.health_check = health_check.clone();
        Ok(tg.clone())
    }

    async fn delete_target_group(&self, arn: &str) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("delete_target_group")?;
        if inner.referenced_target_groups().iter().any(|(tg, _)| tg == arn) {
            return Err(ApiError::new(
                codes::RESOURCE_IN_USE,
                format!("Target group '{}' is currently in use by a listener or a rule", arn),
            ));
        }
        inner.target_groups.remove(arn);
        inner.targets.remove(arn);
        Ok(())
    }

    async fn describe_target_group_attributes(&self, arn: &str) -> ApiResult<Attributes> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_target_group_attributes")?;
        if !inner.target_groups.contains_key(arn) {
            return Err(not_found(codes::TARGET_GROUP_NOT_FOUND, arn));
        }
        Ok(inner.tg_attributes.get(arn).cloned().unwrap_or_default())
    }

    async fn modify_target_group_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("modify_target_group_attributes")?;
        if !inner.target_groups.contains_key(arn) {
            return Err(not_found(codes::TARGET_GROUP_NOT_FOUND, arn));
        }
        inner
            .tg_attributes
            .entry(arn.to_string())
            .or_default()
            .extend(attributes.clone());
        Ok(())
    }

    async fn register_targets(&self, arn: &str, targets: &[TargetDescription]) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("register_targets")?;
        let Some(group_port) = inner.target_groups.get(arn).map(|tg| tg.port) else {
            return Err(not_found(codes::TARGET_GROUP_NOT_FOUND, arn));
        };
        let registered = inner.targets.entry(arn.to_string()).or_default();
        for target in targets {
            // Targets registered without a port use the group's port
            let target = TargetDescription {
                port: target.port.or(group_port),
                ..target.clone()
            };
            if !registered.contains(&target) {
                registered.push(target);
            }
        }
        Ok(())
    }

    async fn deregister_targets(&self, arn: &str, targets: &[TargetDescription]) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("deregister_targets")?;
        let Some(group_port) = inner.target_groups.get(arn).map(|tg| tg.port) else {
            return Err(not_found(codes::TARGET_GROUP_NOT_FOUND, arn));
        };
        if let Some(registered) = inner.targets.get_mut(arn) {
            registered
                .retain(|t| !targets.iter().any(|d| d.id == t.id && d.port.or(group_port) == t.port));
        }
        Ok(())
    }

    async fn describe_target_health(
        &self,
        arn: &str,
        targets: &[TargetDescription],
    ) -> ApiResult<Vec<TargetHealth>> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_target_health")?;
        if !inner.target_groups.contains_key(arn) {
            return Err(not_found(codes::TARGET_GROUP_NOT_FOUND, arn));
        }
        let registered = inner.targets.get(arn).cloned().unwrap_or_default();
        if targets.is_empty() {
            return Ok(registered
                .into_iter()
                .map(|target| TargetHealth {
                    target,
                    state: Some("healthy".to_string()),
                    reason: None,
                })
                .collect());
        }
        Ok(targets
            .iter()
            .map(|wanted| {
                match registered
                    .iter()
                    .find(|t| t.id == wanted.id && (wanted.port.is_none() || t.port == wanted.port))
                {
                    Some(target) => TargetHealth {
                        target: target.clone(),
                        state: Some("healthy".to_string()),
                        reason: None,
                    },
                    None => TargetHealth {
                        target: wanted.clone(),
                        state: Some("unused".to_string()),
                        reason: Some("Target.NotRegistered".to_string()),
                    },
                }
            })
            .collect())
    }

    async fn create_listener(&self, input: CreateListenerInput) -> ApiResult<Listener> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("create_listener")?;
        let lb = inner
            .load_balancers
            .get(&input.load_balancer_arn)
            .cloned()
            .ok_or_else(|| not_found(codes::LOAD_BALANCER_NOT_FOUND, &input.load_balancer_arn))?;
        inner.check_target_groups(&input.default_actions)?;
        let id = inner.id();
        let lb_path = lb.arn.split(":loadbalancer/").nth(1).unwrap_or_default();
        let arn = format!("{}:listener/{}/{}", PREFIX, lb_path, id);
        let gateway = lb.load_balancer_type.as_deref() == Some("gateway");
        let listener = Listener {
            arn: arn.clone(),
            load_balancer_arn: input.load_balancer_arn,
            port: if gateway { Some(6081) } else { input.port },
            protocol: if gateway {
                Some("GENEVE".to_string())
            } else {
                input.protocol
            },
            ssl_policy: input.ssl_policy,
            certificates: input.certificates,
            default_actions: input.default_actions,
            alpn_policy: input.alpn_policy,
            mutual_authentication: input.mutual_authentication,
        };
        inner.listeners.insert(arn.clone(), listener.clone());
        inner.tags.insert(arn, input.tags);
        Ok(listener)
    }

    async fn describe_listeners(&self, lookup: Lookup) -> ApiResult<Vec<Listener>> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_listeners")?;
        match &lookup {
            Lookup::Parent(lb) => {
                if !inner.load_balancers.contains_key(lb) {
                    return Err(not_found(codes::LOAD_BALANCER_NOT_FOUND, lb));
                }
                Ok(inner
                    .listeners
                    .values()
                    .filter(|l| &l.load_balancer_arn == lb)
                    .cloned()
                    .collect())
            }
            _ => select(
                &inner.listeners,
                &lookup,
                |l| l.arn.as_str(),
                codes::LISTENER_NOT_FOUND,
            ),
        }
    }

    async fn modify_listener(&self, input: ModifyListenerInput) -> ApiResult<Listener> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("modify_listener")?;
        inner.check_target_groups(&input.default_actions)?;
        let listener = inner
            .listeners
            .get_mut(&input.listener_arn)
            .ok_or_else(|| not_found(codes::LISTENER_NOT_FOUND, &input.listener_arn))?;
        if input.port.is_some() {
            listener.port = input.port;
        }
        if input.protocol.is_some() {
            listener.protocol = input.protocol;
        }
        if input.ssl_policy.is_some() {
            listener.ssl_policy = input.ssl_policy;
        }
        if !input.certificates.is_empty() {
            listener.certificates = input.certificates;
        }
        if !input.default_actions.is_empty() {
            listener.default_actions = input.default_actions;
        }
        if !input.alpn_policy.is_empty() {
            listener.alpn_policy = input.alpn_policy;
        }
        if input.mutual_authentication.is_some() {
            listener.mutual_authentication = input.mutual_authentication;
        }
        Ok(listener.clone())
    }

    async fn delete_listener(&self, arn: &str) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("delete_listener")?;
        if inner.listeners.remove(arn).is_none() {
            return Err(not_found(codes::LISTENER_NOT_FOUND, arn));
        }
        inner.rules.retain(|_, (l, _)| l.as_str() != arn);
        Ok(())
    }

    async fn describe_listener_attributes(&self, arn: &str) -> ApiResult<Attributes> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_listener_attributes")?;
        if !inner.listeners.contains_key(arn) {
            return Err(not_found(codes::LISTENER_NOT_FOUND, arn));
        }
        Ok(inner.listener_attributes.get(arn).cloned().unwrap_or_default())
    }

    async fn modify_listener_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("modify_listener_attributes")?;
        if !inner.listeners.contains_key(arn) {
            return Err(not_found(codes::LISTENER_NOT_FOUND, arn));
        }
        inner
            .listener_attributes
            .entry(arn.to_string())
            .or_default()
            .extend(attributes.clone());
        Ok(())
    }

    async fn create_rule(&self, input: CreateRuleInput) -> ApiResult<Rule> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("create_rule")?;
        if !inner.listeners.contains_key(&input.listener_arn) {
            return Err(not_found(codes::LISTENER_NOT_FOUND, &input.listener_arn));
        }
        let priority = input.priority.to_string();
        if inner
            .rules
            .values()
            .any(|(l, r)| *l == input.listener_arn && r.priority == priority)
        {
            return Err(ApiError::new(
                codes::PRIORITY_IN_USE,
                format!("Priority '{}' is currently in use", priority),
            ));
        }
        inner.check_target_groups(&input.actions)?;
        let id = inner.id();
        let listener_path = input
            .listener_arn
            .split(":listener/")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        let arn = format!("{}:listener-rule/{}/{}", PREFIX, listener_path, id);
        let rule = Rule {
            arn: arn.clone(),
            priority,
            conditions: input.conditions,
            actions: input.actions,
            is_default: false,
        };
        inner
            .rules
            .insert(arn.clone(), (input.listener_arn, rule.clone()));
        inner.tags.insert(arn, input.tags);
        Ok(rule)
    }

    async fn describe_rules(&self, lookup: Lookup) -> ApiResult<Vec<Rule>> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_rules")?;
        match &lookup {
            Lookup::Parent(listener_arn) => {
                let listener = inner
                    .listeners
                    .get(listener_arn)
                    .ok_or_else(|| not_found(codes::LISTENER_NOT_FOUND, listener_arn))?;
                let mut rules: Vec<Rule> = inner
                    .rules
                    .values()
                    .filter(|(l, _)| l == listener_arn)
                    .map(|(_, r)| r.clone())
                    .collect();
                rules.push(Rule {
                    arn: format!("{}/default", listener.arn.replace(":listener/", ":listener-rule/")),
                    priority: "default".to_string(),
                    conditions: Vec::new(),
                    actions: listener.default_actions.clone(),
                    is_default: true,
                });
                Ok(rules)
            }
            Lookup::Arns(arns) => arns
                .iter()
                .map(|arn| {
                    inner
                        .rules
                        .get(arn)
                        .map(|(_, r)| r.clone())
                        .ok_or_else(|| not_found(codes::RULE_NOT_FOUND, arn))
                })
                .collect(),
            _ => Err(ApiError::new(
                codes::VALIDATION_ERROR,
                "rules are looked up by ARN or listener",
            )),
        }
    }

    async fn modify_rule(
        &self,
        arn: &str,
        conditions: &[RuleCondition],
        actions: &[Action],
    ) -> ApiResult<Rule> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("modify_rule")?;
        inner.check_target_groups(actions)?;
        let (_, rule) = inner
            .rules
            .get_mut(arn)
            .ok_or_else(|| not_found(codes::RULE_NOT_FOUND, arn))?;
        rule.conditions = conditions.to_vec();
        rule.actions = actions.to_vec();
        Ok(rule.clone())
    }

    async fn set_rule_priority(&self, arn: &str, priority: i32) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("set_rule_priority")?;
        let listener = inner
            .rules
            .get(arn)
            .map(|(l, _)| l.clone())
            .ok_or_else(|| not_found(codes::RULE_NOT_FOUND, arn))?;
        let priority = priority.to_string();
        if inner
            .rules
            .iter()
            .any(|(a, (l, r))| a.as_str() != arn && *l == listener && r.priority == priority)
        {
            return Err(ApiError::new(codes::PRIORITY_IN_USE, "priority in use"));
        }
        if let Some((_, rule)) = inner.rules.get_mut(arn) {
            rule.priority = priority;
        }
        Ok(())
    }

    async fn delete_rule(&self, arn: &str) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("delete_rule")?;
        inner
            .rules
            .remove(arn)
            .map(|_| ())
            .ok_or_else(|| not_found(codes::RULE_NOT_FOUND, arn))
    }

    async fn create_trust_store(
        &self,
        name: &str,
        _bundle: &S3Location,
        tags: &Tags,
    ) -> ApiResult<TrustStore> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("create_trust_store")?;
        if inner.trust_stores.values().any(|ts| ts.name == name) {
            return Err(ApiError::new(
                "DuplicateTrustStoreName",
                format!("A trust store with the name '{}' already exists", name),
            ));
        }
        let id = inner.id();
        let arn = format!("{}:truststore/{}/{}", PREFIX, name, id);
        let status = if inner.trust_store_polls > 0 {
            let polls = inner.trust_store_polls;
            inner.pending_polls.insert(arn.clone(), polls);
            "CREATING"
        } else {
            "ACTIVE"
        };
        let ts = TrustStore {
            arn: arn.clone(),
            name: name.to_string(),
            status: Some(status.to_string()),
            number_of_ca_certificates: Some(1),
            total_revoked_entries: Some(0),
        };
        inner.trust_stores.insert(arn.clone(), ts.clone());
        inner.tags.insert(arn, tags.clone());
        Ok(ts)
    }

    async fn describe_trust_stores(&self, lookup: Lookup) -> ApiResult<Vec<TrustStore>> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_trust_stores")?;
        let found = select(
            &inner.trust_stores,
            &lookup,
            |ts| ts.name.as_str(),
            codes::TRUST_STORE_NOT_FOUND,
        )?;
        let mut result = Vec::new();
        for mut ts in found {
            if let Some(polls) = inner.pending_polls.get_mut(&ts.arn) {
                if *polls == 0 {
                    inner.pending_polls.remove(&ts.arn);
                    ts.status = Some("ACTIVE".to_string());
                    inner.trust_stores.insert(ts.arn.clone(), ts.clone());
                } else {
                    *polls -= 1;
                }
            }
            result.push(ts);
        }
        Ok(result)
    }

    async fn modify_trust_store(&self, arn: &str, _bundle: &S3Location) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("modify_trust_store")?;
        if !inner.trust_stores.contains_key(arn) {
            return Err(not_found(codes::TRUST_STORE_NOT_FOUND, arn));
        }
        Ok(())
    }

    async fn delete_trust_store(&self, arn: &str) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("delete_trust_store")?;
        let in_use = inner.listeners.values().any(|l| {
            l.mutual_authentication
                .as_ref()
                .and_then(|m| m.trust_store_arn.as_deref())
                == Some(arn)
        });
        if in_use {
            return Err(ApiError::new(
                codes::TRUST_STORE_IN_USE,
                format!("Trust store '{}' is in use", arn),
            ));
        }
        inner
            .trust_stores
            .remove(arn)
            .map(|_| ())
            .ok_or_else(|| not_found(codes::TRUST_STORE_NOT_FOUND, arn))
    }

    async fn add_trust_store_revocation(
        &self,
        arn: &str,
        _revocations: &S3Location,
    ) -> ApiResult<TrustStoreRevocation> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("add_trust_store_revocation")?;
        if !inner.trust_stores.contains_key(arn) {
            return Err(not_found(codes::TRUST_STORE_NOT_FOUND, arn));
        }
        let list = inner.revocations.entry(arn.to_string()).or_default();
        let revocation = TrustStoreRevocation {
            trust_store_arn: arn.to_string(),
            revocation_id: list.len() as i64 + 1,
            revocation_type: Some("CRL".to_string()),
            number_of_revoked_entries: Some(3),
        };
        list.push(revocation.clone());
        Ok(revocation)
    }

    async fn describe_trust_store_revocations(
        &self,
        arn: &str,
        revocation_ids: &[i64],
    ) -> ApiResult<Vec<TrustStoreRevocation>> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_trust_store_revocations")?;
        if !inner.trust_stores.contains_key(arn) {
            return Err(not_found(codes::TRUST_STORE_NOT_FOUND, arn));
        }
        let list = inner.revocations.get(arn).cloned().unwrap_or_default();
        revocation_ids
            .iter()
            .map(|id| {
                list.iter()
                    .find(|r| r.revocation_id == *id)
                    .cloned()
                    .ok_or_else(|| not_found(codes::REVOCATION_ID_NOT_FOUND, &id.to_string()))
            })
            .collect()
    }

    async fn remove_trust_store_revocations(
        &self,
        arn: &str,
        revocation_ids: &[i64],
    ) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("remove_trust_store_revocations")?;
        let list = inner
            .revocations
            .get_mut(arn)
            .ok_or_else(|| not_found(codes::TRUST_STORE_NOT_FOUND, arn))?;
        for id in revocation_ids {
            if !list.iter().any(|r| r.revocation_id == *id) {
                return Err(not_found(codes::REVOCATION_ID_NOT_FOUND, &id.to_string()));
            }
        }
        list.retain(|r| !revocation_ids.contains(&r.revocation_id));
        Ok(())
    }

    async fn describe_tags(&self, arn: &str) -> ApiResult<Tags> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("describe_tags")?;
        Ok(inner.tags.get(arn).cloned().unwrap_or_default())
    }

    async fn add_tags(&self, arn: &str, tags: &Tags) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("add_tags")?;
        inner
            .tags
            .entry(arn.to_string())
            .or_default()
            .extend(tags.clone());
        Ok(())
    }

    async fn remove_tags(&self, arn: &str, keys: &[String]) -> ApiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("remove_tags")?;
        if let Some(tags) = inner.tags.get_mut(arn) {
            tags.retain(|k, _| !keys.contains(k));
        }
        Ok(())
    }
}
