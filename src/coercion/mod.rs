//! # Value Coercion
//!
//! Converts loosely-typed record data (JSON values) into typed workflow parameter
//! values, following the parameter's declared [`ParameterTypeDefinition`].
//!
//! ## Rules
//!
//! - `String` accepts anything and uses its natural string form
//! - `Int` accepts integers and floats without a fractional part
//! - `Float` accepts any number
//! - `Boolean` accepts booleans only
//! - `File` accepts URI strings (scheme optional)
//! - `Optional` maps `null` to `None`
//! - `Array` accepts sequences, or a lone value as a one-element array
//! - `Map` and `Struct` accept JSON objects
//!
//! [`ParameterTypeDefinition`]: crate::models::ParameterTypeDefinition

pub mod error;
pub mod file;
pub mod parser;
pub mod value;

pub use error::CoercionError;
pub use file::CbasFile;
pub use parser::{json_type_name, parse_primitive, parse_value};
pub use value::CbasValue;
