pub mod attributes;
pub mod compose;
pub mod validation;

pub use attributes::schema_fragment;
pub use compose::SchemaComposer;
pub use validation::{CompiledSchema, ValidationService};
