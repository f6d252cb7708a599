//! Chain type definitions consumed by the codec.
//!
//! A static data asset: no runtime logic beyond parsing the table into a
//! typed registry and rendering it in the JSON shape the codec expects.

pub mod nft;
pub mod registry;

pub use registry::{
    EnumDef, Field, RegistryTypes, StaticDef, TypeDef, TypeDefinitions, TypeExpr, TypeParseError,
    Variant,
};
