mod config;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use carina_core::differ::{create_plan, plan_orphans};
use carina_core::effect::Effect;
use carina_core::interpreter::{EffectOutcome, Interpreter, InterpreterConfig};
use carina_core::plan::Plan;
use carina_core::provider::Provider;
use carina_core::resolver::{Bindings, dependencies, sort_by_dependencies};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::ResourceSchema;
use carina_provider_elbv2::Elbv2Provider;
use carina_state::{LockInfo, StateBackend, StateFile, create_backend};

use config::{Loaded, data_source_schema_map, qualified_type, resource_schema_map};

#[derive(Parser)]
#[command(name = "carina")]
#[command(about = "Manage Elastic Load Balancing v2 infrastructure", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "carina.json")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Path to the configuration file
        #[arg(default_value = "carina.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to the configuration file
        #[arg(default_value = "carina.json")]
        file: PathBuf,
    },
    /// Destroy every resource recorded in the state
    Destroy {
        /// Path to the configuration file
        #[arg(default_value = "carina.json")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing object under management
    Import {
        /// Resource type (e.g. load_balancer)
        resource_type: String,
        /// Name to record the resource under
        name: String,
        /// Provider-side identifier, usually an ARN
        identifier: String,

        /// Path to the configuration file
        #[arg(long, short, default_value = "carina.json")]
        file: PathBuf,
    },
    /// Remove a stale state lock left behind by an interrupted run
    ForceUnlock {
        /// ID of the lock to remove
        lock_id: String,

        /// Path to the configuration file
        #[arg(long, short, default_value = "carina.json")]
        file: PathBuf,
    },
    /// Describe resource and data source schemas
    Schema {
        /// Only show this type
        resource_type: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file } => run_apply(&file).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Import {
            resource_type,
            name,
            identifier,
            file,
        } => run_import(&file, &resource_type, &name, &identifier).await,
        Commands::ForceUnlock { lock_id, file } => run_force_unlock(&file, &lock_id).await,
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let loaded = config::load(file)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", loaded.resources.len())
            .green()
            .bold()
    );

    for resource in &loaded.resources {
        let marker = if resource.is_data_source() { " (data)" } else { "" };
        println!("  • {}{}", resource.id, marker.dimmed());
    }

    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let loaded = config::load(file)?;
    let backend = open_backend(&loaded).await?;
    let state = read_state(backend.as_ref()).await?;
    let provider = connect(&loaded).await;

    let refreshed = refresh(&loaded, &state, &provider).await?;
    let plan = refreshed.plan(&state);
    print_plan(&plan);
    Ok(())
}

async fn run_apply(file: &Path) -> Result<(), String> {
    let loaded = config::load(file)?;
    let backend = open_backend(&loaded).await?;
    with_lock(backend.as_ref(), "apply", apply(&loaded, backend.as_ref())).await
}

async fn apply(loaded: &Loaded, backend: &dyn StateBackend) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    let provider = connect(loaded).await;
    let provider_name = provider.name();

    let refreshed = refresh(loaded, &state, &provider).await?;
    for current in refreshed.current.values() {
        state.record(provider_name, current);
    }
    let plan = refreshed.plan(&state);

    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        return write_state(backend, &mut state).await;
    }

    print_plan(&plan);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let schemas = resource_schema_map();
    let mut bindings = refreshed.bindings;
    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        dry_run: false,
        continue_on_error: true,
    });
    let result = interpreter.apply(&plan, &mut bindings).await;

    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(
                EffectOutcome::Created { state: new }
                | EffectOutcome::Updated { state: new }
                | EffectOutcome::Replaced { state: new },
            ) => {
                let mut new = new.clone();
                if let Some(desired) = effect_resource(effect) {
                    let resolved = bindings.resolve_resource(desired);
                    carry_write_only(
                        &mut new,
                        &resolved.attributes,
                        schemas.get(&desired.id.resource_type),
                    );
                }
                state.record(provider_name, &new);
                println!("  {} {}", "✓".green(), effect);
            }
            Ok(EffectOutcome::Deleted { id }) => {
                state.remove_resource(id);
                println!("  {} {}", "✓".green(), effect);
            }
            Ok(EffectOutcome::Read { .. } | EffectOutcome::Skipped { .. }) => {}
            Err(e) => println!("  {} {} - {}", "✗".red(), effect, e),
        }
    }

    write_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    let loaded = config::load(file)?;
    let backend = open_backend(&loaded).await?;
    with_lock(
        backend.as_ref(),
        "destroy",
        destroy(&loaded, backend.as_ref(), auto_approve),
    )
    .await
}

async fn destroy(loaded: &Loaded, backend: &dyn StateBackend, auto_approve: bool) -> Result<(), String> {
    let mut state = read_state(backend).await?;

    let mut plan = Plan::new();
    plan_orphans(&mut plan, &[], &managed_states(&state, &loaded.resources));

    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id());
    }
    println!();
    println!("Plan: {} to destroy.", plan.effects().len().to_string().red());
    println!();

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!();
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let provider = connect(loaded).await;
    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        dry_run: false,
        continue_on_error: true,
    });
    let result = interpreter.apply(&plan, &mut Bindings::new()).await;

    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(_) => {
                state.remove_resource(effect.resource_id());
                println!("  {} {}", "✓".green(), effect);
            }
            Err(e) => println!("  {} {} - {}", "✗".red(), effect, e),
        }
    }

    write_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_import(
    file: &Path,
    resource_type: &str,
    name: &str,
    identifier: &str,
) -> Result<(), String> {
    let id = ResourceId::new(qualified_type(resource_type), name);
    if !resource_schema_map().contains_key(&id.resource_type) {
        return Err(format!("Unknown resource type: {}", id.resource_type));
    }

    let loaded = config::load(file)?;
    let backend = open_backend(&loaded).await?;
    with_lock(
        backend.as_ref(),
        "import",
        import(&loaded, backend.as_ref(), id, identifier),
    )
    .await
}

async fn import(
    loaded: &Loaded,
    backend: &dyn StateBackend,
    id: ResourceId,
    identifier: &str,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    if let Some(existing) = state.find_resource(&id) {
        return Err(format!(
            "{} is already managed ({})",
            id,
            existing.identifier.as_deref().unwrap_or("no identifier")
        ));
    }

    let provider = connect(loaded).await;
    let current = provider
        .read(&id, Some(identifier))
        .await
        .map_err(|e| format!("Failed to read {}: {}", id, e))?;
    if !current.exists {
        return Err(format!("{} not found: {}", id.resource_type, identifier));
    }

    state.record(provider.name(), &current);
    write_state(backend, &mut state).await?;

    println!("{} Imported {} ({})", "✓".green(), id, identifier);
    if !loaded.managed().any(|r| r.id == id) {
        println!(
            "  {}",
            "Add it to the configuration, or the next apply will destroy it.".yellow()
        );
    }
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let loaded = config::load(file)?;
    let backend = open_backend(&loaded).await?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| format!("Failed to unlock state: {}", e))?;
    println!("{} State lock {} removed.", "✓".green(), lock_id);
    Ok(())
}

fn run_schema(filter: Option<&str>) -> Result<(), String> {
    let filter = filter.map(qualified_type);
    let groups = [
        ("resource", resource_schema_map()),
        ("data source", data_source_schema_map()),
    ];

    let mut shown = 0;
    for (kind, schemas) in &groups {
        let mut types: Vec<&String> = schemas
            .keys()
            .filter(|t| filter.as_ref().is_none_or(|f| f == *t))
            .collect();
        types.sort();
        for resource_type in types {
            print_schema(kind, &schemas[resource_type]);
            shown += 1;
        }
    }

    match filter {
        Some(t) if shown == 0 => Err(format!("Unknown type: {}", t)),
        _ => Ok(()),
    }
}

fn print_schema(kind: &str, schema: &ResourceSchema) {
    println!(
        "{} {}",
        schema.resource_type.cyan().bold(),
        format!("({})", kind).dimmed()
    );
    if let Some(description) = &schema.description {
        println!("  {}", description);
    }

    let mut attributes: Vec<_> = schema.attributes.values().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));
    for attr in attributes {
        let mut flags = Vec::new();
        if attr.required {
            flags.push("required".to_string());
        }
        if attr.computed {
            flags.push("computed".to_string());
        }
        if attr.force_new {
            flags.push("forces replacement".to_string());
        }
        if attr.write_only {
            flags.push("write-only".to_string());
        }
        if let Some(default) = &attr.default {
            flags.push(format!("default {}", format_value(default)));
        }

        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("    {}: {}{}", attr.name.bold(), attr.attr_type, flags.dimmed());
        if let Some(description) = &attr.description {
            println!("      {}", description.dimmed());
        }
    }
    println!();
}

// =============================================================================
// State and refresh
// =============================================================================

async fn open_backend(loaded: &Loaded) -> Result<Box<dyn StateBackend>, String> {
    create_backend(&loaded.backend)
        .await
        .map_err(|e| format!("Failed to open state backend: {}", e))
}

async fn read_state(backend: &dyn StateBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?
        .unwrap_or_default())
}

async fn write_state(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend
        .write_state(state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

/// Run `operation` while holding the state lock
async fn with_lock(
    backend: &dyn StateBackend,
    operation: &str,
    work: impl std::future::Future<Output = Result<(), String>>,
) -> Result<(), String> {
    let lock: LockInfo = backend
        .acquire_lock(operation)
        .await
        .map_err(|e| format!("Failed to acquire state lock: {}", e))?;

    let result = work.await;

    if let Err(e) = backend.release_lock(&lock).await {
        log::warn!("failed to release state lock {}: {}", lock.id, e);
    }
    result
}

async fn connect(loaded: &Loaded) -> Box<dyn Provider> {
    Box::new(Elbv2Provider::new(&loaded.provider).await)
}

/// Everything known before planning
struct Refreshed {
    bindings: Bindings,
    /// Current state of every configured resource
    current: HashMap<ResourceId, State>,
    /// Configured resources in dependency order, references resolved as far as known
    desired: Vec<Resource>,
}

impl Refreshed {
    fn plan(&self, state: &StateFile) -> Plan {
        let mut plan = create_plan(&self.desired, &self.current, &resource_schema_map());
        plan_orphans(&mut plan, &self.desired, &managed_states(state, &self.desired));
        plan
    }
}

/// Read data sources and the current state of every configured resource
async fn refresh(
    loaded: &Loaded,
    state: &StateFile,
    provider: &dyn Provider,
) -> Result<Refreshed, String> {
    let schemas = resource_schema_map();
    let ordered = sort_by_dependencies(&loaded.resources);
    let mut bindings = Bindings::new();
    let mut current = HashMap::new();

    for resource in &ordered {
        if resource.is_data_source() {
            let resolved = bindings.resolve_resource(resource);
            if resolved.attributes.values().any(Value::contains_ref) {
                return Err(format!(
                    "{}: data source arguments must not depend on resources that do not exist yet",
                    resource.id
                ));
            }
            log::debug!("reading data source {}", resource.id);
            let found = provider
                .read_data_source(&resolved)
                .await
                .map_err(|e| format!("Failed to read data source {}: {}", resource.id, e))?;
            bindings.record(resource, &found);
            continue;
        }

        let refreshed = match state.find_resource(&resource.id) {
            Some(stored) => {
                let stored = stored.to_state();
                log::debug!("refreshing {}", resource.id);
                let mut refreshed = provider
                    .read(&resource.id, stored.identifier.as_deref())
                    .await
                    .map_err(|e| format!("Failed to read {}: {}", resource.id, e))?;
                if refreshed.exists {
                    carry_write_only(
                        &mut refreshed,
                        &stored.attributes,
                        schemas.get(&resource.id.resource_type),
                    );
                }
                refreshed
            }
            None => State::not_found(resource.id.clone()),
        };
        bindings.insert(resource, Some(&refreshed));
        current.insert(resource.id.clone(), refreshed);
    }

    let desired = ordered
        .iter()
        .filter(|r| !r.is_data_source())
        .map(|r| bindings.resolve_resource(r))
        .collect();

    Ok(Refreshed {
        bindings,
        current,
        desired,
    })
}

/// Write-only attributes are never read back; keep the last applied values
fn carry_write_only(
    state: &mut State,
    source: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) {
    let Some(schema) = schema else { return };
    for attr in schema.attributes.values().filter(|a| a.write_only) {
        if state.attributes.contains_key(&attr.name) {
            continue;
        }
        if let Some(value) = source.get(&attr.name)
            && !value.contains_ref()
        {
            state.attributes.insert(attr.name.clone(), value.clone());
        }
    }
}

/// Recorded states, configured resources first in dependency order, then the rest as recorded
fn managed_states(state: &StateFile, configured: &[Resource]) -> Vec<State> {
    let ordered = sort_by_dependencies(configured);
    let mut seen = HashSet::new();
    let mut states = Vec::new();

    for resource in ordered.iter().filter(|r| !r.is_data_source()) {
        if let Some(stored) = state.find_resource(&resource.id) {
            seen.insert(resource.id.clone());
            states.push(stored.to_state());
        }
    }
    for stored in &state.resources {
        if !seen.contains(&stored.id()) {
            states.push(stored.to_state());
        }
    }
    states
}

fn effect_resource(effect: &Effect) -> Option<&Resource> {
    match effect {
        Effect::Create(r) | Effect::Update { to: r, .. } | Effect::Replace { to: r, .. } => Some(r),
        Effect::Read { .. } | Effect::Delete { .. } => None,
    }
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    Ok(input.trim() == "yes")
}

// =============================================================================
// Plan display
// =============================================================================

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    // Effects that depend on another effect are printed beneath it
    let mut binding_to_effect: HashMap<String, usize> = HashMap::new();
    let mut effect_deps: Vec<HashSet<String>> = Vec::new();

    for (idx, effect) in plan.effects().iter().enumerate() {
        let resource = effect_resource(effect);
        if let Some(binding) = resource.and_then(Resource::binding) {
            binding_to_effect.insert(binding.to_string(), idx);
        }
        effect_deps.push(resource.map(dependencies).unwrap_or_default());
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); plan.effects().len()];
    let mut roots = Vec::new();
    for (idx, deps) in effect_deps.iter().enumerate() {
        let mut parents: Vec<usize> = deps
            .iter()
            .filter_map(|d| binding_to_effect.get(d).copied())
            .filter(|&parent| parent != idx)
            .collect();
        parents.sort();
        parents.dedup();
        if parents.is_empty() {
            roots.push(idx);
        }
        for parent in parents {
            dependents[parent].push(idx);
        }
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    let mut printed = HashSet::new();
    for (i, &root) in roots.iter().enumerate() {
        print_effect_tree(root, plan, &dependents, &mut printed, 0, i == roots.len() - 1, "");
    }
    // Cycles have no root
    for idx in 0..plan.effects().len() {
        print_effect_tree(idx, plan, &dependents, &mut printed, 0, true, "");
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to add, {} to change, {} to replace, {} to destroy.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red()
    );
}

fn print_effect_tree(
    idx: usize,
    plan: &Plan,
    dependents: &[Vec<usize>],
    printed: &mut HashSet<usize>,
    indent: usize,
    is_last: bool,
    prefix: &str,
) {
    if !printed.insert(idx) {
        return;
    }

    let effect = &plan.effects()[idx];
    let symbol = match effect {
        Effect::Create(_) => "+".green().bold(),
        Effect::Update { .. } => "~".yellow().bold(),
        Effect::Replace { .. } => "-/+".magenta().bold(),
        Effect::Delete { .. } => "-".red().bold(),
        Effect::Read { .. } => "?".normal(),
    };

    let connector = match (indent, is_last) {
        (0, _) => String::new(),
        (_, true) => format!("{}└─ ", prefix),
        (_, false) => format!("{}├─ ", prefix),
    };
    let continuation = match (indent, is_last) {
        (0, _) => "  ".to_string(),
        (_, true) => format!("{}   ", prefix),
        (_, false) => format!("{}│  ", prefix),
    };
    let attr_prefix = format!("  {}  ", continuation);

    let id = effect.resource_id();
    println!(
        "  {}{} {} {}",
        connector,
        symbol,
        id.resource_type.cyan().bold(),
        id.name.bold()
    );

    match effect {
        Effect::Create(r) => {
            for key in sorted_keys(&r.attributes) {
                println!(
                    "{}{}: {}",
                    attr_prefix,
                    key,
                    format_value(&r.attributes[key]).green()
                );
            }
        }
        Effect::Update {
            from,
            to,
            changed_attributes,
            ..
        }
        | Effect::Replace {
            from,
            to,
            changed_attributes,
            ..
        } => {
            for key in changed_attributes {
                let old = from
                    .attributes
                    .get(key)
                    .map(format_value)
                    .unwrap_or_else(|| "(none)".to_string());
                let new = to
                    .attributes
                    .get(key)
                    .map(format_value)
                    .unwrap_or_else(|| "(none)".to_string());
                println!("{}{}: {} → {}", attr_prefix, key, old.red(), new.green());
            }
        }
        Effect::Delete { identifier, .. } => {
            println!("{}{}: {}", attr_prefix, "identifier".bold(), identifier.red());
        }
        Effect::Read { .. } => {}
    }

    let children: Vec<usize> = dependents[idx]
        .iter()
        .copied()
        .filter(|c| !printed.contains(c))
        .collect();
    for (i, &child) in children.iter().enumerate() {
        print_effect_tree(
            child,
            plan,
            dependents,
            printed,
            indent + 1,
            i == children.len() - 1,
            &continuation,
        );
    }
}

fn sorted_keys(attributes: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<_> = attributes.keys().filter(|k| !k.starts_with('_')).collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", _) => std::cmp::Ordering::Less,
        (_, "name") => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let strs: Vec<_> = keys
                .into_iter()
                .map(|k| format!("{}: {}", k, format_value(&map[k])))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => format!("(known after apply: {}.{})", binding, attr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carina_state::ResourceState;

    fn bound(resource_type: &str, name: &str) -> Resource {
        Resource::new(resource_type, name).with_attribute("_binding", Value::String(name.to_string()))
    }

    #[test]
    fn references_render_as_known_after_apply() {
        let value = Value::List(vec![
            Value::Int(80),
            Value::ResourceRef("lb".to_string(), "arn".to_string()),
        ]);
        assert_eq!(format_value(&value), "[80, (known after apply: lb.arn)]");
    }

    #[test]
    fn maps_render_in_key_order() {
        let mut map = HashMap::new();
        map.insert("type".to_string(), Value::from("forward"));
        map.insert("order".to_string(), Value::Int(1));
        assert_eq!(format_value(&Value::Map(map)), "{order: 1, type: \"forward\"}");
    }

    #[test]
    fn name_sorts_first_and_internal_keys_are_hidden() {
        let r = bound("elbv2.target_group", "web")
            .with_attribute("port", Value::Int(80))
            .with_attribute("name", Value::from("web"));
        let keys: Vec<&str> = sorted_keys(&r.attributes).into_iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "port"]);
    }

    #[test]
    fn write_only_values_survive_refresh() {
        let schema = &resource_schema_map()["elbv2.trust_store"];
        let id = ResourceId::new("elbv2.trust_store", "clients");
        let mut refreshed = State::existing(id, HashMap::new()).with_identifier("arn");
        let mut stored = HashMap::new();
        stored.insert("ca_certificates_bundle_s3_key".to_string(), Value::from("bundle.pem"));
        stored.insert(
            "ca_certificates_bundle_s3_bucket".to_string(),
            Value::ResourceRef("bucket".to_string(), "name".to_string()),
        );
        stored.insert("tags".to_string(), Value::Map(HashMap::new()));

        carry_write_only(&mut refreshed, &stored, Some(schema));

        assert_eq!(
            refreshed.attributes.get("ca_certificates_bundle_s3_key"),
            Some(&Value::from("bundle.pem"))
        );
        assert!(!refreshed.attributes.contains_key("ca_certificates_bundle_s3_bucket"));
        assert!(!refreshed.attributes.contains_key("tags"));
    }

    #[test]
    fn managed_states_follow_dependencies_then_recorded_order() {
        let mut state = StateFile::new();
        for (t, name) in [
            ("elbv2.listener", "http"),
            ("elbv2.target_group", "old"),
            ("elbv2.load_balancer", "web"),
        ] {
            state.upsert_resource(ResourceState::new(t, name, "elbv2").with_identifier(name));
        }

        let configured = vec![
            bound("elbv2.listener", "http")
                .with_attribute("load_balancer_arn", Value::ResourceRef("web".to_string(), "arn".to_string())),
            bound("elbv2.load_balancer", "web"),
        ];
        let names: Vec<String> = managed_states(&state, &configured)
            .into_iter()
            .map(|s| s.id.name)
            .collect();
        assert_eq!(names, vec!["web", "http", "old"]);
    }

    #[test]
    fn destroy_plan_deletes_dependents_first() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("elbv2.load_balancer", "web", "elbv2").with_identifier("lb-arn"),
        );
        state.upsert_resource(
            ResourceState::new("elbv2.listener", "http", "elbv2").with_identifier("listener-arn"),
        );

        let mut plan = Plan::new();
        plan_orphans(&mut plan, &[], &managed_states(&state, &[]));

        let order: Vec<String> = plan.effects().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            order,
            vec!["Delete elbv2.listener.http", "Delete elbv2.load_balancer.web"]
        );
    }
}
