//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.
//! References are resolved right before each effect runs, so values that
//! only become known during the apply (ARNs of freshly created resources)
//! flow into the resources that depend on them.

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resolver::Bindings;
use crate::resource::{ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Read succeeded
    Read { state: State },
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Replace succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    ///
    /// `bindings` is updated with every state the provider returns.
    pub async fn apply(&self, plan: &Plan, bindings: &mut Bindings) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect, bindings).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(e) => {
                    log::warn!("{} failed: {}", effect, e);
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        bindings: &mut Bindings,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Read { resource } => {
                let resolved = bindings.resolve_resource(resource);
                let state = self.provider.read_data_source(&resolved).await?;
                bindings.record(resource, &state);
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let resolved = bindings.resolve_resource(resource);
                let state = self.provider.create(&resolved).await?;
                bindings.record(resource, &state);
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let identifier = from.identifier.as_deref().ok_or_else(|| {
                    ProviderError::new("no identifier recorded for resource").for_resource(id.clone())
                })?;
                let resolved = bindings.resolve_resource(to);
                let state = self
                    .provider
                    .update(id, identifier, from, &resolved)
                    .await?;
                bindings.record(to, &state);
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { id, from, to, .. } => {
                if let Some(identifier) = from.identifier.as_deref() {
                    self.provider.delete(id, identifier).await?;
                }
                let resolved = bindings.resolve_resource(to);
                let state = self.provider.create(&resolved).await?;
                bindings.record(to, &state);
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, identifier } => {
                self.provider.delete(id, identifier).await?;
                Ok(EffectOutcome::Deleted { id: id.clone() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BoxFuture;
    use crate::resource::{Resource, Value};
    use crate::schema::ResourceSchema;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every call and echoes resolved attributes back
    #[derive(Default)]
    struct TestProvider {
        calls: Mutex<Vec<String>>,
        fail_create: bool,
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn schemas(&self) -> Vec<ResourceSchema> {
            vec![ResourceSchema::new("test")]
        }

        fn data_source_schemas(&self) -> Vec<ResourceSchema> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let mut attrs = HashMap::new();
            attrs.insert("arn".to_string(), Value::String("arn:existing".to_string()));
            let state = State::existing(resource.id.clone(), attrs).with_identifier("arn:existing");
            Box::pin(async move { Ok(state) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create {}", resource.id));
            let fail = self.fail_create;
            let mut attrs = resource.attributes.clone();
            let arn = format!("arn:{}", resource.id.name);
            attrs.insert("arn".to_string(), Value::String(arn.clone()));
            let state = State::existing(resource.id.clone(), attrs).with_identifier(arn);
            Box::pin(async move {
                if fail {
                    Err(ProviderError::new("boom"))
                } else {
                    Ok(state)
                }
            })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            self.calls.lock().unwrap().push(format!("update {}", id));
            let state = State::existing(id.clone(), to.attributes.clone());
            Box::pin(async move { Ok(state) })
        }

        fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {} {}", id, identifier));
            Box::pin(async { Ok(()) })
        }
    }

    fn bound(resource_type: &str, name: &str) -> Resource {
        Resource::new(resource_type, name).with_attribute("_binding", Value::String(name.to_string()))
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(TestProvider::default());
        let plan = Plan::new();
        let result = interpreter.apply(&plan, &mut Bindings::new()).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn create_resolves_references_from_earlier_effects() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(bound("elbv2.load_balancer", "lb")));
        plan.add(Effect::Create(bound("elbv2.listener", "http").with_attribute(
            "load_balancer_arn",
            Value::ResourceRef("lb".to_string(), "arn".to_string()),
        )));

        let mut bindings = Bindings::new();
        let result = interpreter.apply(&plan, &mut bindings).await;

        assert!(result.is_success());
        match &result.outcomes[1] {
            Ok(EffectOutcome::Created { state }) => assert_eq!(
                state.attributes.get("load_balancer_arn"),
                Some(&Value::String("arn:lb".to_string()))
            ),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            bindings.get("http", "arn"),
            Some(&Value::String("arn:http".to_string()))
        );
    }

    #[tokio::test]
    async fn replace_deletes_before_creating() {
        let provider = TestProvider::default();
        let interpreter = Interpreter::new(provider);
        let id = ResourceId::new("elbv2.target_group", "web");
        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            id: id.clone(),
            from: State::existing(id.clone(), HashMap::new()).with_identifier("arn:old"),
            to: bound("elbv2.target_group", "web"),
            changed_attributes: vec!["port".to_string()],
        });

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert!(result.is_success());

        let calls = interpreter.provider.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "delete elbv2.target_group.web arn:old".to_string(),
                "create elbv2.target_group.web".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_failure_unless_configured() {
        let provider = TestProvider {
            fail_create: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(provider);
        let mut plan = Plan::new();
        plan.add(Effect::Create(bound("elbv2.target_group", "a")));
        plan.add(Effect::Create(bound("elbv2.target_group", "b")));

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert!(!result.is_success());
        assert_eq!(result.outcomes.len(), 1);

        let interpreter = interpreter.with_config(InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        });
        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert_eq!(result.failure_count, 2);
        assert_eq!(result.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn read_effect_records_data_source() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Read {
            resource: bound("elbv2.load_balancer", "shared").with_read_only(true),
        });

        let mut bindings = Bindings::new();
        let result = interpreter.apply(&plan, &mut bindings).await;
        assert!(result.is_success());
        assert_eq!(
            bindings.get("shared", "arn"),
            Some(&Value::String("arn:existing".to_string()))
        );
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(TestProvider::default()).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "example")));

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;

        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Skipped { .. })
        ));
    }
}
