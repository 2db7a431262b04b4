use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use crate::args::BoundArgs;
use crate::registry::{BuildContext, PredicateFactory};

fn parse_instant(args: &BoundArgs, key: &str) -> Result<DateTime<FixedOffset>> {
    let raw = args.required(key)?;
    DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|e| args.error(format!("invalid RFC 3339 instant '{}': {}", raw, e)))
}

/// Request arrives strictly within an optional lower and upper bound
struct TimeWindowPredicate {
    after: Option<DateTime<FixedOffset>>,
    before: Option<DateTime<FixedOffset>>,
}

#[async_trait]
impl RoutePredicate for TimeWindowPredicate {
    async fn test(&self, _exchange: &Exchange) -> Result<bool> {
        let now = Utc::now();
        Ok(self.after.is_none_or(|after| now > after) && self.before.is_none_or(|before| now < before))
    }
}

/// `After=2026-01-20T17:42:47+01:00`
pub struct AfterPredicateFactory;

impl PredicateFactory for AfterPredicateFactory {
    fn name(&self) -> &str {
        "After"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["datetime"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        Ok(Arc::new(TimeWindowPredicate {
            after: Some(parse_instant(args, "datetime")?),
            before: None,
        }))
    }
}

/// `Before=2026-01-20T17:42:47Z`
pub struct BeforePredicateFactory;

impl PredicateFactory for BeforePredicateFactory {
    fn name(&self) -> &str {
        "Before"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["datetime"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        Ok(Arc::new(TimeWindowPredicate {
            after: None,
            before: Some(parse_instant(args, "datetime")?),
        }))
    }
}

/// `Between=<start>, <end>`; `start` must precede `end`
pub struct BetweenPredicateFactory;

impl PredicateFactory for BetweenPredicateFactory {
    fn name(&self) -> &str {
        "Between"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["datetime1", "datetime2"]
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        let start = parse_instant(args, "datetime1")?;
        let end = parse_instant(args, "datetime2")?;
        if start >= end {
            return Err(args.error(format!("{} must be before {}", start, end)));
        }
        Ok(Arc::new(TimeWindowPredicate {
            after: Some(start),
            before: Some(end),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FactoryRegistry;
    use chrono::Duration;
    use waypoint_core::{ComponentSpec, GatewayRequest};

    async fn test_spec(spec: ComponentSpec) -> bool {
        let registry = FactoryRegistry::with_builtins();
        let built = registry.build_predicate("r1", &spec).unwrap();
        built
            .predicate
            .test(&Exchange::new(GatewayRequest::get("/")))
            .await
            .unwrap()
    }

    fn instant(offset: Duration) -> String {
        (Utc::now() + offset).to_rfc3339()
    }

    #[tokio::test]
    async fn test_after_and_before() {
        let past = instant(Duration::hours(-1));
        let future = instant(Duration::hours(1));

        assert!(test_spec(ComponentSpec::new("After").with_arg("datetime", past.clone())).await);
        assert!(!test_spec(ComponentSpec::new("After").with_arg("datetime", future.clone())).await);
        assert!(test_spec(ComponentSpec::new("Before").with_arg("datetime", future.clone())).await);
        assert!(!test_spec(ComponentSpec::new("Before").with_arg("datetime", past.clone())).await);
        assert!(
            test_spec(
                ComponentSpec::new("Between")
                    .with_arg("datetime1", past)
                    .with_arg("datetime2", future)
            )
            .await
        );
    }

    #[test]
    fn test_between_requires_ordered_bounds() {
        let registry = FactoryRegistry::with_builtins();
        let spec = ComponentSpec::new("Between")
            .with_arg("datetime1", "2030-01-01T00:00:00Z")
            .with_arg("datetime2", "2020-01-01T00:00:00Z");
        assert!(registry.build_predicate("r1", &spec).is_err());
    }

    #[test]
    fn test_invalid_instant() {
        let registry = FactoryRegistry::with_builtins();
        let spec = ComponentSpec::new("After").with_arg("datetime", "yesterday");
        assert!(registry.build_predicate("r1", &spec).is_err());
    }
}
