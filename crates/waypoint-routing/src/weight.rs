//! Weighted traffic splitting
//!
//! Routes declaring `Weight=group, n` form a group. The calculator keeps one
//! [`WeightGroupConfig`] per group and, once per request, draws a random
//! number per group to pick the route that group's `Weight` predicates will
//! accept. Configs are rebuilt on every change and published by swapping the
//! `Arc`; a request only ever sees a complete config.

use dashmap::DashMap;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};
use waypoint_core::{Exchange, Result};

use crate::cache::CachingRouteLocator;
use crate::registry::PredicateArgsListener;

/// Name of the weight predicate factory
const WEIGHT_PREDICATE: &str = "Weight";
/// Key prefix used when weight args arrive in flattened form
const WEIGHT_KEY_PREFIX: &str = "weight.";

/// Source of uniform numbers in `[0, 1)`
pub trait WeightRandom: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Draws from the calling thread's generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl WeightRandom for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// One traffic-split cohort
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightGroupConfig {
    pub group: String,
    /// Raw weights in insertion order
    pub weights: Vec<(String, u32)>,
    /// `weight / sum` per route, same order as `weights`
    pub normalized: Vec<(String, f64)>,
    /// Cumulative bounds; `ranges[i]..ranges[i + 1]` belongs to `range_index[i]`
    pub ranges: Vec<f64>,
    pub range_index: Vec<String>,
}

impl WeightGroupConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }

    /// Copy of this config with `route_id` set to `weight`
    pub fn with_weight(&self, route_id: &str, weight: u32) -> Self {
        let mut weights = self.weights.clone();
        match weights.iter_mut().find(|(id, _)| id == route_id) {
            Some(entry) => entry.1 = weight,
            None => weights.push((route_id.to_string(), weight)),
        }
        Self::from_weights(self.group.clone(), weights)
    }

    /// Copy of this config keeping only routes in `live`
    pub fn retain(&self, live: &HashSet<String>) -> Self {
        let weights = self
            .weights
            .iter()
            .filter(|(id, _)| live.contains(id))
            .cloned()
            .collect();
        Self::from_weights(self.group.clone(), weights)
    }

    fn from_weights(group: String, weights: Vec<(String, u32)>) -> Self {
        let sum: u64 = weights.iter().map(|(_, weight)| u64::from(*weight)).sum();
        if sum == 0 {
            return Self {
                group,
                weights,
                ..Default::default()
            };
        }

        let normalized: Vec<(String, f64)> = weights
            .iter()
            .map(|(id, weight)| (id.clone(), f64::from(*weight) / sum as f64))
            .collect();

        let mut ranges = Vec::with_capacity(normalized.len() + 1);
        ranges.push(0.0);
        let mut upper = 0.0;
        for (_, share) in &normalized {
            upper += share;
            ranges.push(upper);
        }
        let range_index = normalized.iter().map(|(id, _)| id.clone()).collect();

        Self {
            group,
            weights,
            normalized,
            ranges,
            range_index,
        }
    }

    /// Route owning `r`; the top interval is closed so `r == 1.0` or a sum
    /// a little under 1.0 still selects the last route
    pub fn select(&self, r: f64) -> Option<&str> {
        if self.range_index.is_empty() {
            return None;
        }
        self.range_index
            .iter()
            .enumerate()
            .find(|(i, _)| self.ranges[*i] <= r && r < self.ranges[*i + 1])
            .or_else(|| self.range_index.iter().enumerate().last())
            .map(|(_, id)| id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

pub struct WeightCalculator {
    groups: DashMap<String, Arc<WeightGroupConfig>>,
    random: Arc<dyn WeightRandom>,
    routes_initialized: AtomicBool,
}

impl Default for WeightCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightCalculator {
    pub fn new() -> Self {
        Self::with_random(Arc::new(ThreadRandom))
    }

    pub fn with_random(random: Arc<dyn WeightRandom>) -> Self {
        Self {
            groups: DashMap::new(),
            random,
            routes_initialized: AtomicBool::new(false),
        }
    }

    /// Set the weight of `route_id` in `group` and republish the group
    pub fn add_weight_config(&self, group: &str, route_id: &str, weight: u32) {
        let mut entry = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| Arc::new(WeightGroupConfig::new(group)));
        let updated = entry.with_weight(route_id, weight);
        debug!(group, route_id, weight, ranges = ?updated.ranges, "Recalculated weight group");
        *entry = Arc::new(updated);
    }

    pub fn group(&self, name: &str) -> Option<Arc<WeightGroupConfig>> {
        self.groups.get(name).map(|entry| entry.value().clone())
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Pick one route per group for this request
    pub fn select(&self, exchange: &mut Exchange) {
        let configs: Vec<Arc<WeightGroupConfig>> =
            self.groups.iter().map(|entry| entry.value().clone()).collect();

        for config in configs {
            let r = self.random.next_f64();
            if let Some(route_id) = config.select(r) {
                trace!(group = %config.group, r, route_id, "Selected weighted route");
                exchange
                    .attributes
                    .weights
                    .insert(config.group.clone(), route_id.to_string());
            }
        }
    }

    /// Drop routes that no longer exist; empty groups are removed
    pub fn remove_stale(&self, live: &HashSet<String>) {
        self.groups.retain(|group, config| {
            if config.weights.iter().all(|(id, _)| live.contains(id)) {
                return true;
            }
            let pruned = config.retain(live);
            debug!(group = %group, remaining = pruned.weights.len(), "Pruned weight group");
            if pruned.is_empty() {
                return false;
            }
            *config = Arc::new(pruned);
            true
        });
    }

    /// React to a "routes changed" signal.
    ///
    /// The first signal compiles the routes and waits, so weight groups are
    /// populated before traffic is split; its failure is returned. Later
    /// signals schedule a background refresh.
    pub async fn on_routes_changed(&self, routes: &Arc<CachingRouteLocator>) -> Result<()> {
        if self
            .routes_initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("Compiling routes to initialize weight groups");
            routes.refresh_and_wait().await?;
        } else {
            routes.refresh();
        }
        Ok(())
    }
}

impl PredicateArgsListener for WeightCalculator {
    fn on_predicate_args(&self, route_id: &str, predicate: &str, args: &BTreeMap<String, String>) {
        let flattened = args.keys().any(|key| key.starts_with(WEIGHT_KEY_PREFIX));
        if predicate != WEIGHT_PREDICATE && !flattened {
            return;
        }

        let arg = |name: &str| {
            args.get(name)
                .or_else(|| args.get(&format!("{}{}", WEIGHT_KEY_PREFIX, name)))
        };
        let (Some(group), Some(weight)) = (arg("group"), arg("weight")) else {
            return;
        };
        match weight.trim().parse::<u32>() {
            Ok(weight) => self.add_weight_config(group, route_id, weight),
            Err(e) => warn!(route_id, group = %group, weight = %weight, error = %e, "Ignoring invalid weight"),
        }
    }

    fn on_routes_compiled(&self, route_ids: &HashSet<String>) {
        self.remove_stale(route_ids);
    }
}
