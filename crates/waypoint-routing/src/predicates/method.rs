use async_trait::async_trait;
use http::Method;
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use crate::args::{BoundArgs, ShortcutType};
use crate::registry::{BuildContext, PredicateFactory};

/// `Method=GET,POST`
pub struct MethodPredicateFactory;

struct MethodPredicate {
    methods: Vec<Method>,
}

#[async_trait]
impl RoutePredicate for MethodPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        Ok(self.methods.contains(&exchange.request.method))
    }
}

impl PredicateFactory for MethodPredicateFactory {
    fn name(&self) -> &str {
        "Method"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["methods"]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::GatherList
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        let methods = args
            .required_list("methods")?
            .iter()
            .map(|name| {
                Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                    .map_err(|_| args.error(format!("invalid HTTP method '{}'", name)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(MethodPredicate { methods }))
    }
}
