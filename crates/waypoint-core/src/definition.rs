//! Declarative route definitions
//!
//! A [`RouteDefinition`] is the pre-compilation form of a route as produced by
//! configuration files, service discovery or the admin repository. Predicate
//! and filter specs accept two forms:
//!
//! ```yaml
//! predicates:
//!   - Path=/orders/**,/carts/**     # shortcut
//!   - name: Header                  # expanded
//!     args: { header: X-Tenant, regexp: "acme-.*" }
//! ```
//!
//! Shortcut values are stored under generated keys (`_genkey_0`, `_genkey_1`,
//! ...) which the owning factory maps onto its named arguments at bind time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// Prefix of argument keys produced by the shortcut form
pub const GENERATED_KEY_PREFIX: &str = "_genkey_";

/// Generated key for the shortcut value at `index`
pub fn generated_key(index: usize) -> String {
    format!("{}{}", GENERATED_KEY_PREFIX, index)
}

/// One configured predicate or filter: a factory name plus its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSpec")]
pub struct ComponentSpec {
    pub name: String,
    pub args: BTreeMap<String, String>,
}

/// Predicate spec of a route definition
pub type PredicateSpec = ComponentSpec;

/// Filter spec of a route definition
pub type FilterSpec = ComponentSpec;

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
        }
    }

    /// Add a named argument
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

impl FromStr for ComponentSpec {
    type Err = GatewayError;

    /// Parse the shortcut form `Name=value1,value2`
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (name, values) = text.split_once('=').ok_or_else(|| {
            GatewayError::config(
                text.to_string(),
                format!("unable to parse '{}', must be of the form name=value", text),
            )
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::config(
                text.to_string(),
                "component name must not be empty",
            ));
        }

        let args = values
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .enumerate()
            .map(|(index, value)| (generated_key(index), value.to_string()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }
}

impl fmt::Display for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self
                .args
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

/// Wire form accepted for a spec: a shortcut string or a name/args map
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSpec {
    Shortcut(String),
    Expanded {
        name: String,
        #[serde(default)]
        args: BTreeMap<String, ArgValue>,
    },
}

/// Scalar argument values are kept as strings; lists are comma-joined
#[derive(Deserialize)]
#[serde(untagged)]
enum ArgValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    List(Vec<ArgValue>),
}

impl From<ArgValue> for String {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Text(text) => text,
            ArgValue::Integer(n) => n.to_string(),
            ArgValue::Float(n) => n.to_string(),
            ArgValue::Flag(flag) => flag.to_string(),
            ArgValue::List(items) => items
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl TryFrom<RawSpec> for ComponentSpec {
    type Error = GatewayError;

    fn try_from(raw: RawSpec) -> Result<Self, Self::Error> {
        match raw {
            RawSpec::Shortcut(text) => text.parse(),
            RawSpec::Expanded { name, args } => {
                if name.trim().is_empty() {
                    return Err(GatewayError::config(
                        String::new(),
                        "component name must not be empty",
                    ));
                }
                Ok(Self {
                    name,
                    args: args
                        .into_iter()
                        .map(|(key, value)| (key, value.into()))
                        .collect(),
                })
            }
        }
    }
}

/// Declarative, pre-compilation route specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Unique route id
    pub id: String,
    /// Destination URI (e.g. `http://orders:8080` or `lb://orders`)
    pub uri: String,
    /// Predicates, AND-combined in declaration order
    #[serde(default)]
    pub predicates: Vec<PredicateSpec>,
    /// Filters, ordered by explicit order or declaration position
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Free-form metadata carried onto the compiled route
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Route priority (lower sorts first)
    #[serde(default)]
    pub order: i32,
}

impl RouteDefinition {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            metadata: BTreeMap::new(),
            order: 0,
        }
    }

    pub fn with_predicate(mut self, predicate: PredicateSpec) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
