//! Argument binding for predicate and filter factories
//!
//! Raw spec arguments are a string map. Shortcut values arrive under
//! generated keys (`_genkey_0`, ...) and are renamed here according to the
//! factory's declared shortcut fields before any typed access.

use std::collections::BTreeMap;
use std::str::FromStr;
use waypoint_core::definition::GENERATED_KEY_PREFIX;
use waypoint_core::{GatewayError, Result};

/// How shortcut values map onto a factory's named arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortcutType {
    /// The i-th value binds to the i-th shortcut field
    #[default]
    DefaultOrder,
    /// Every value is gathered into the single shortcut field as a list
    GatherList,
}

/// Normalized, name-keyed arguments of one predicate or filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundArgs {
    factory: String,
    values: BTreeMap<String, String>,
}

fn generated_index(key: &str) -> Option<usize> {
    key.strip_prefix(GENERATED_KEY_PREFIX)?.parse().ok()
}

impl BoundArgs {
    /// Normalize `raw` for the factory `factory`
    pub fn bind(
        factory: &str,
        raw: &BTreeMap<String, String>,
        shortcut_fields: &[&str],
        shortcut_type: ShortcutType,
    ) -> Result<Self> {
        let mut values = BTreeMap::new();
        let mut shortcut: Vec<(usize, &String)> = Vec::new();

        for (key, value) in raw {
            match generated_index(key) {
                Some(index) => shortcut.push((index, value)),
                None => {
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        shortcut.sort_by_key(|(index, _)| *index);

        match shortcut_type {
            ShortcutType::DefaultOrder => {
                for (position, (_, value)) in shortcut.into_iter().enumerate() {
                    let field = shortcut_fields.get(position).ok_or_else(|| {
                        GatewayError::config(
                            factory,
                            format!(
                                "too many shortcut arguments, expected at most {} ({})",
                                shortcut_fields.len(),
                                shortcut_fields.join(", ")
                            ),
                        )
                    })?;
                    values.insert((*field).to_string(), value.clone());
                }
            }
            ShortcutType::GatherList => {
                if !shortcut.is_empty() {
                    let field = shortcut_fields.first().ok_or_else(|| {
                        GatewayError::config(factory, "factory declares no shortcut field")
                    })?;
                    let joined: Vec<&str> =
                        shortcut.iter().map(|(_, value)| value.as_str()).collect();
                    values.insert((*field).to_string(), joined.join(","));
                }
            }
        }

        Ok(Self {
            factory: factory.to_string(),
            values,
        })
    }

    /// Factory these arguments belong to
    pub fn factory(&self) -> &str {
        &self.factory
    }

    /// All normalized arguments
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Configuration error attributed to this factory
    pub fn error(&self, message: impl Into<String>) -> GatewayError {
        GatewayError::config(self.factory.clone(), message)
    }

    pub fn optional(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn required(&self, key: &str) -> Result<&str> {
        self.optional(key)
            .ok_or_else(|| self.error(format!("missing required argument '{}'", key)))
    }

    /// Parse an optional argument
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    self.error(format!("invalid value '{}' for argument '{}': {}", raw, key, e))
                })
            })
            .transpose()
    }

    /// Parse a required argument
    pub fn parse_required<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse(key)?
            .ok_or_else(|| self.error(format!("missing required argument '{}'", key)))
    }

    /// Comma separated list; a missing argument is an empty list
    pub fn list(&self, key: &str) -> Vec<String> {
        self.optional(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Non-empty comma separated list
    pub fn required_list(&self, key: &str) -> Result<Vec<String>> {
        let items = self.list(key);
        if items.is_empty() {
            return Err(self.error(format!("argument '{}' must not be empty", key)));
        }
        Ok(items)
    }

    /// Boolean flag; missing means `false`
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.optional(key).map(|raw| raw.trim().to_ascii_lowercase()) {
            None => Ok(false),
            Some(raw) => match raw.as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.error(format!("invalid boolean '{}' for argument '{}'", raw, key))),
            },
        }
    }
}
