mod error;
mod keys;
mod lookup;
mod patterns;
mod policy;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{
    entity_type_pattern, escape_component, key_entity_type, key_family, pattern_entity_type,
    pattern_family, CacheKey, KeyParams, KeySlot, KeyTemplate, SEPARATOR,
};
pub use lookup::{Lookup, Source};
pub use patterns::{pattern_matches, validate_pattern, UNSUPPORTED_GLOB_CHARS};
pub use policy::{EntityDescriptor, InvalidationScope, TtlPolicy};
pub use serialization::{deserialize_value, serialize_value, SerializationError};
pub use traits::Cache;
