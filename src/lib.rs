// Federated personal-data search gateway - root library module.

pub mod attribute;
pub mod cache;
pub mod config;
pub mod error;
pub mod facets;
pub mod federator;
pub mod filter;
pub mod http_server;
pub mod http_types;
pub mod observability;
pub mod provider;
pub mod provider_manager;
pub mod query;
pub mod ranker;
pub mod registry;
pub mod relationships;
pub mod types;

pub use attribute::{AttributeDef, Capability, FilterConfig, FilterOp, UiHints, ValueSource};
pub use error::GatewayError;
pub use facets::{FacetEngine, FacetOption, FilterDescriptor};
pub use federator::{FederatedResponse, Federator, PerProviderResult};
pub use filter::{parse_filters, FieldError, FilterValue, MultiValidationError};
pub use provider::{FilterValueOption, Provider, ProviderConfig};
pub use provider_manager::{ProviderManager, ProviderRegistry, ProviderStatus};
pub use query::{QueryBuilder, SearchQuery};
pub use ranker::{rank_in_memory, InMemoryRanker, Ranker, RankedEntity, RankerConfig};
pub use registry::{TypeDefinition, TypeRegistry};
pub use relationships::{ExpandedEntity, RelationshipTraversal};
pub use types::{AttributeType, AttributeValue, Entity, EntityId, RelationKind, Relationship};
