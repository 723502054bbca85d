use serde::{Deserialize, Serialize};

/// The kind tag shared by values and type descriptors.
///
/// The declaration order is significant: it is the cross-kind ordering used
/// when values of different kinds are compared (e.g. as keys of one map).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Bool,
    Number,
    String,
    Blob,
    /// Any value (the top type).
    Value,
    List,
    Map,
    Set,
    Ref,
    Struct,
    Type,
    Package,
    /// A type descriptor not yet looked up in its package.
    Unresolved,
}

impl Kind {
    /// Kinds that take no type parameters.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Number
                | Self::String
                | Self::Blob
                | Self::Value
                | Self::Type
                | Self::Package
        )
    }

    /// Kinds parameterized by element types.
    pub fn is_compound(self) -> bool {
        matches!(self, Self::List | Self::Map | Self::Set | Self::Ref)
    }

    /// Number of element types a compound kind takes.
    pub fn arity(self) -> usize {
        match self {
            Self::List | Self::Set | Self::Ref => 1,
            Self::Map => 2,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "Bool",
            Self::Number => "Number",
            Self::String => "String",
            Self::Blob => "Blob",
            Self::Value => "Value",
            Self::List => "List",
            Self::Map => "Map",
            Self::Set => "Set",
            Self::Ref => "Ref",
            Self::Struct => "Struct",
            Self::Type => "Type",
            Self::Package => "Package",
            Self::Unresolved => "Unresolved",
        };
        f.write_str(name)
    }
}
