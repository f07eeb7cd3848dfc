// Core machinery for the Tessera SDK: resource model, cache, execution pool

pub mod cache;
pub mod error;
pub mod pool;
pub mod resource;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::ResourceCache;
pub use error::{TesseraError, TesseraResult};
pub use pool::dispatcher::{AsyncDispatcher, CallSpec, Layer, Loggable, Preflight};
pub use pool::{AsyncGroup, ExecutionPool, RuntimeMode, Submitted};
pub use resource::{ChildLookup, Lifecycle, ParentLink, Resource};
pub use transport::{
    ApiRequest, Method, RequestLimiter, Transport, PLAYGROUND_ORGANIZATION_ID,
};
pub use types::{schema, Alias, ResourceKind, ResourceSchema};
