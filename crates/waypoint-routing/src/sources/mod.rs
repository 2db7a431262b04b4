//! Route definition sources

mod composite;
mod discovery;
mod in_memory;
mod properties;

pub use composite::CompositeRouteDefinitionLocator;
pub use discovery::{
    DiscoveryClient, DiscoveryClientRouteDefinitionLocator, DiscoveryLocatorProperties,
    ServiceInstance,
};
pub use in_memory::InMemoryRouteDefinitionRepository;
pub use properties::PropertiesRouteDefinitionLocator;
