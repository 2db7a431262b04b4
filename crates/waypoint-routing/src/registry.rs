//! Predicate and filter factory registry
//!
//! Factories are registered by name at startup. Building a spec looks the
//! factory up, binds its arguments and constructs the predicate or filter;
//! any failure is a configuration error attributed to the factory name.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use waypoint_core::{FilterSpec, GatewayError, GatewayFilter, PredicateSpec, Result, RoutePredicate};

use crate::args::{BoundArgs, ShortcutType};

/// Context available while building a predicate or filter
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    /// Id of the route being compiled
    pub route_id: &'a str,
}

/// Constructor for one named predicate
pub trait PredicateFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Argument names the shortcut form binds to, in order
    fn shortcut_fields(&self) -> &[&'static str] {
        &[]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::DefaultOrder
    }

    fn build(&self, args: &BoundArgs, ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>>;
}

/// Constructor for one named filter
pub trait FilterFactory: Send + Sync {
    fn name(&self) -> &str;

    fn shortcut_fields(&self) -> &[&'static str] {
        &[]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::DefaultOrder
    }

    fn build(&self, args: &BoundArgs, ctx: BuildContext<'_>) -> Result<Arc<dyn GatewayFilter>>;
}

/// Observer of the bound arguments of every successfully compiled predicate
pub trait PredicateArgsListener: Send + Sync {
    fn on_predicate_args(&self, route_id: &str, predicate: &str, args: &BTreeMap<String, String>);

    /// Called after a full compile succeeded with the ids it produced
    fn on_routes_compiled(&self, _route_ids: &HashSet<String>) {}
}

/// A predicate together with the arguments it was built from
pub struct BuiltPredicate {
    pub name: String,
    pub args: BoundArgs,
    pub predicate: Arc<dyn RoutePredicate>,
}

/// Name to constructor table for predicates and filters
#[derive(Default)]
pub struct FactoryRegistry {
    predicates: HashMap<String, Arc<dyn PredicateFactory>>,
    filters: HashMap<String, Arc<dyn FilterFactory>>,
    listeners: Vec<Arc<dyn PredicateArgsListener>>,
}

impl FactoryRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in predicates and the filters that
    /// need no collaborators
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::predicates::register_builtins(&mut registry);
        crate::filters::register_builtins(&mut registry);
        registry
    }

    pub fn register_predicate(&mut self, factory: Arc<dyn PredicateFactory>) {
        let name = factory.name().to_string();
        if self.predicates.insert(name.clone(), factory).is_some() {
            warn!(factory = %name, "Replacing previously registered predicate factory");
        } else {
            debug!(factory = %name, "Loaded predicate factory");
        }
    }

    pub fn register_filter(&mut self, factory: Arc<dyn FilterFactory>) {
        let name = factory.name().to_string();
        if self.filters.insert(name.clone(), factory).is_some() {
            warn!(factory = %name, "Replacing previously registered filter factory");
        } else {
            debug!(factory = %name, "Loaded filter factory");
        }
    }

    pub fn add_predicate_args_listener(&mut self, listener: Arc<dyn PredicateArgsListener>) {
        self.listeners.push(listener);
    }

    /// Registered predicate names, sorted
    pub fn predicate_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered filter names, sorted
    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Log the loaded factories once at startup
    pub fn log_loaded(&self) {
        info!(
            predicates = ?self.predicate_names(),
            filters = ?self.filter_names(),
            "Gateway factories loaded"
        );
    }

    pub fn build_predicate(&self, route_id: &str, spec: &PredicateSpec) -> Result<BuiltPredicate> {
        let factory = self.predicates.get(&spec.name).ok_or_else(|| {
            GatewayError::config(
                spec.name.clone(),
                format!("unable to find predicate factory with name '{}'", spec.name),
            )
        })?;

        let args = BoundArgs::bind(
            factory.name(),
            &spec.args,
            factory.shortcut_fields(),
            factory.shortcut_type(),
        )?;
        debug!(route_id, predicate = %spec.name, args = ?args.values(), "Binding predicate");

        let predicate = factory.build(&args, BuildContext { route_id })?;
        Ok(BuiltPredicate {
            name: spec.name.clone(),
            args,
            predicate,
        })
    }

    pub fn build_filter(&self, route_id: &str, spec: &FilterSpec) -> Result<Arc<dyn GatewayFilter>> {
        let factory = self.filters.get(&spec.name).ok_or_else(|| {
            GatewayError::config(
                spec.name.clone(),
                format!("unable to find filter factory with name '{}'", spec.name),
            )
        })?;

        let args = BoundArgs::bind(
            factory.name(),
            &spec.args,
            factory.shortcut_fields(),
            factory.shortcut_type(),
        )?;
        debug!(route_id, filter = %spec.name, args = ?args.values(), "Binding filter");

        factory.build(&args, BuildContext { route_id })
    }

    /// Report the arguments of a compiled route's predicates to listeners
    pub fn publish_predicate_args(&self, route_id: &str, predicates: &[BuiltPredicate]) {
        for built in predicates {
            for listener in &self.listeners {
                listener.on_predicate_args(route_id, &built.name, built.args.values());
            }
        }
    }

    pub fn publish_routes_compiled(&self, route_ids: &HashSet<String>) {
        for listener in &self.listeners {
            listener.on_routes_compiled(route_ids);
        }
    }
}
