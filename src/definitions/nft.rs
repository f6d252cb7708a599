//! NFT module type definitions.

use crate::definitions::registry::{RegistryTypes, StaticDef, TypeDefinitions, TypeParseError};

/// On-wire types of the NFT chain module, in declaration order.
pub const NFT_TYPES: &[(&str, StaticDef)] = &[
    ("Address", StaticDef::Alias("MultiAddress")),
    ("BN", StaticDef::Alias("BlockNumber")),
    ("CID", StaticDef::Alias("Vec<u8>")),
    ("ClassId", StaticDef::Alias("u32")),
    (
        "ClassData",
        StaticDef::Struct(&[
            ("properties", "Properties"),
            ("start_block", "Option<BN>"),
            ("end_block", "Option<BN>"),
            ("class_type", "ClassType<ID>"),
        ]),
    ),
    (
        "ClassInfoOf",
        StaticDef::Struct(&[
            ("metadata", "CID"),
            ("totalIssuance", "TokenId"),
            ("owner", "AccountId"),
            ("data", "ClassData"),
        ]),
    ),
    ("ClassIdOf", StaticDef::Alias("ClassId")),
    (
        "ClassType",
        StaticDef::TaggedEnum(&[
            ("Simple", "u32"),
            ("Claim", "HashByte32"),
            ("Merge", "(ClassIdOf, ClassIdOf, bool)"),
        ]),
    ),
    ("DataSource", StaticDef::Alias("u64")),
    ("EthAddress", StaticDef::Alias("[u8; 20]")),
    ("HashByte32", StaticDef::Alias("[u8; 32]")),
    ("LookupSource", StaticDef::Alias("MultiAddress")),
    (
        "Properties",
        StaticDef::Enum(&["None", "Transferable", "Burnable", "Both"]),
    ),
    ("TokenData", StaticDef::Struct(&[("used", "bool"), ("rarity", "u8")])),
    ("TokenId", StaticDef::Alias("u64")),
    ("TokenIdOf", StaticDef::Alias("TokenId")),
    (
        "TokenInfoOf",
        StaticDef::Struct(&[
            ("metadata", "CID"),
            ("owner", "AccountId"),
            ("data", "TokenData"),
        ]),
    ),
    ("QueryKey", StaticDef::Alias("u64")),
];

/// The NFT table as a registry.
pub fn types() -> Result<RegistryTypes, TypeParseError> {
    RegistryTypes::from_static(NFT_TYPES)
}

/// The NFT definitions bundle.
pub fn definitions() -> Result<TypeDefinitions, TypeParseError> {
    Ok(TypeDefinitions { types: types()? })
}
