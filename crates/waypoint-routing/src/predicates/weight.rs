use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;
use waypoint_core::{Exchange, Result, RoutePredicate};

use crate::args::BoundArgs;
use crate::registry::{BuildContext, PredicateFactory};

/// `Weight=group, 80`
///
/// Matches when the weight calculator selected this route for `group` on
/// the current request. The selection itself happens once per request in
/// [`crate::weight::WeightCalculator::select`]; this predicate only compares.
pub struct WeightPredicateFactory;

struct WeightPredicate {
    group: String,
    route_id: String,
}

#[async_trait]
impl RoutePredicate for WeightPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        let candidate = exchange
            .attributes
            .predicate_route_id
            .as_deref()
            .unwrap_or(&self.route_id);

        let selected = exchange.attributes.weights.get(&self.group);
        trace!(
            group = %self.group,
            candidate,
            selected = ?selected,
            "Testing weight predicate"
        );
        Ok(selected.is_some_and(|chosen| chosen == candidate))
    }
}

impl PredicateFactory for WeightPredicateFactory {
    fn name(&self) -> &str {
        "Weight"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["group", "weight"]
    }

    fn build(&self, args: &BoundArgs, ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        let group = args.required("group")?.to_string();
        args.parse_required::<u32>("weight")?;
        Ok(Arc::new(WeightPredicate {
            group,
            route_id: ctx.route_id.to_string(),
        }))
    }
}
