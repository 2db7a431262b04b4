//! Route predicates
//!
//! Built-in predicate factories plus the combinators used to compose a
//! route's predicates into one. `and` and `or` short-circuit left to right:
//! the right side is never evaluated once the left side decides the result,
//! and an error on the left is returned without evaluating the right.

mod datetime;
mod header;
mod host;
mod method;
mod path;
pub mod pattern;
mod query;
mod remote_addr;
mod weight;

use async_trait::async_trait;
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use crate::registry::FactoryRegistry;

pub use datetime::{AfterPredicateFactory, BeforePredicateFactory, BetweenPredicateFactory};
pub use header::HeaderPredicateFactory;
pub use host::HostPredicateFactory;
pub use method::MethodPredicateFactory;
pub use path::PathPredicateFactory;
pub use query::QueryPredicateFactory;
pub use remote_addr::{IpNetwork, RemoteAddrPredicateFactory};
pub use weight::WeightPredicateFactory;

pub(crate) fn register_builtins(registry: &mut FactoryRegistry) {
    registry.register_predicate(Arc::new(AfterPredicateFactory));
    registry.register_predicate(Arc::new(BeforePredicateFactory));
    registry.register_predicate(Arc::new(BetweenPredicateFactory));
    registry.register_predicate(Arc::new(HeaderPredicateFactory));
    registry.register_predicate(Arc::new(HostPredicateFactory));
    registry.register_predicate(Arc::new(MethodPredicateFactory));
    registry.register_predicate(Arc::new(PathPredicateFactory));
    registry.register_predicate(Arc::new(QueryPredicateFactory));
    registry.register_predicate(Arc::new(RemoteAddrPredicateFactory));
    registry.register_predicate(Arc::new(WeightPredicateFactory));
}

/// Matches every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPredicate;

#[async_trait]
impl RoutePredicate for AlwaysPredicate {
    async fn test(&self, _exchange: &Exchange) -> Result<bool> {
        Ok(true)
    }
}

pub struct AndPredicate {
    left: Arc<dyn RoutePredicate>,
    right: Arc<dyn RoutePredicate>,
}

#[async_trait]
impl RoutePredicate for AndPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        if !self.left.test(exchange).await? {
            return Ok(false);
        }
        self.right.test(exchange).await
    }
}

pub struct OrPredicate {
    left: Arc<dyn RoutePredicate>,
    right: Arc<dyn RoutePredicate>,
}

#[async_trait]
impl RoutePredicate for OrPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        if self.left.test(exchange).await? {
            return Ok(true);
        }
        self.right.test(exchange).await
    }
}

pub struct NegatePredicate {
    inner: Arc<dyn RoutePredicate>,
}

#[async_trait]
impl RoutePredicate for NegatePredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        Ok(!self.inner.test(exchange).await?)
    }
}

pub fn and(left: Arc<dyn RoutePredicate>, right: Arc<dyn RoutePredicate>) -> Arc<dyn RoutePredicate> {
    Arc::new(AndPredicate { left, right })
}

pub fn or(left: Arc<dyn RoutePredicate>, right: Arc<dyn RoutePredicate>) -> Arc<dyn RoutePredicate> {
    Arc::new(OrPredicate { left, right })
}

pub fn negate(inner: Arc<dyn RoutePredicate>) -> Arc<dyn RoutePredicate> {
    Arc::new(NegatePredicate { inner })
}

pub fn always() -> Arc<dyn RoutePredicate> {
    Arc::new(AlwaysPredicate)
}

/// AND-compose in order; no predicates matches everything
pub fn all_of(predicates: impl IntoIterator<Item = Arc<dyn RoutePredicate>>) -> Arc<dyn RoutePredicate> {
    predicates
        .into_iter()
        .reduce(and)
        .unwrap_or_else(always)
}


#[cfg(test)]
mod tests {
    use super::testing::CountingPredicate;
    use super::*;
    use waypoint_core::GatewayRequest;

    fn exchange() -> Exchange {
        Exchange::new(GatewayRequest::get("/"))
    }

    #[tokio::test]
    async fn test_and_short_circuits_on_false() {
        let p1 = CountingPredicate::returning(false);
        let p2 = CountingPredicate::returning(true);
        let combined = all_of([p1.clone() as Arc<dyn RoutePredicate>, p2.clone()]);

        assert!(!combined.test(&exchange()).await.unwrap());
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn test_and_short_circuits_on_error() {
        let p1 = CountingPredicate::failing();
        let p2 = CountingPredicate::returning(true);
        let combined = and(p1.clone(), p2.clone());

        assert!(combined.test(&exchange()).await.is_err());
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn test_and_evaluates_left_to_right() {
        let p1 = CountingPredicate::returning(true);
        let p2 = CountingPredicate::returning(true);
        let p3 = CountingPredicate::returning(false);
        let combined = all_of([
            p1.clone() as Arc<dyn RoutePredicate>,
            p2.clone(),
            p3.clone(),
        ]);

        assert!(!combined.test(&exchange()).await.unwrap());
        assert_eq!((p1.calls(), p2.calls(), p3.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_or_short_circuits_on_true() {
        let p1 = CountingPredicate::returning(true);
        let p2 = CountingPredicate::returning(false);
        let combined = or(p1.clone(), p2.clone());

        assert!(combined.test(&exchange()).await.unwrap());
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn test_negate_and_always() {
        assert!(always().test(&exchange()).await.unwrap());
        assert!(!negate(always()).test(&exchange()).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_predicate_list_matches_all() {
        let combined = all_of(Vec::new());
        assert!(combined.test(&exchange()).await.unwrap());
    }
}
