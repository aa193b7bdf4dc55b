//! Attribute identifiers, metadata and initializers.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use super::{AttrDomain, DataType, GArray, GVArray};

/// Prefix of names that are hidden from generic enumeration.
pub const INTERNAL_PREFIX: char = '.';
/// Prefix of generated names whose lifetime is tracked by the caller.
pub const ANONYMOUS_PREFIX: &str = ".a_";

/// Name of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(String);

impl AttributeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Fresh anonymous id built from a caller-chosen key.
    pub fn anonymous(key: impl fmt::Display) -> Self {
        Self(format!("{ANONYMOUS_PREFIX}{key}"))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Internal names start with `.` and are skipped by [`ids`](crate::attribute::AttributeAccessor::ids).
    #[inline]
    pub fn is_internal(&self) -> bool {
        self.0.starts_with(INTERNAL_PREFIX)
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with(ANONYMOUS_PREFIX)
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttributeId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for AttributeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for AttributeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for AttributeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AttributeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Where an attribute lives and what it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeMetaData {
    pub domain: AttrDomain,
    pub data_type: DataType,
}

impl AttributeMetaData {
    pub const fn new(domain: AttrDomain, data_type: DataType) -> Self {
        Self { domain, data_type }
    }
}

/// Initial values for a newly created attribute.
#[derive(Debug, Clone)]
pub enum AttributeInit<'a> {
    /// Leave every element at the type's default value.
    Default,
    /// Copy from a virtual array of the domain's size.
    VArray(GVArray<'a>),
    /// Take ownership of a buffer of the domain's size.
    MoveArray(GArray),
}

impl AttributeInit<'_> {
    /// Length of the provided values, `None` for [`AttributeInit::Default`].
    pub fn len(&self) -> Option<usize> {
        match self {
            AttributeInit::Default => None,
            AttributeInit::VArray(varray) => Some(varray.len()),
            AttributeInit::MoveArray(array) => Some(array.len()),
        }
    }
}

/// Decides which anonymous attributes survive propagation.
#[derive(Debug, Clone)]
pub struct AnonymousAttributePropagationInfo {
    /// Keep every anonymous attribute.
    pub propagate_all: bool,
    /// Anonymous names that are still referenced.
    pub names: HashSet<String>,
}

impl Default for AnonymousAttributePropagationInfo {
    fn default() -> Self {
        Self {
            propagate_all: true,
            names: HashSet::new(),
        }
    }
}

impl AnonymousAttributePropagationInfo {
    /// Only keep the listed anonymous names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            propagate_all: false,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `id` should be kept. Named attributes are always kept.
    pub fn propagate(&self, id: &AttributeId) -> bool {
        if !id.is_anonymous() || self.propagate_all {
            return true;
        }
        self.names.contains(id.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_flags() {
        let id = AttributeId::from("weight");
        assert!(!id.is_internal());
        assert!(!id.is_anonymous());

        let hidden = AttributeId::from(".select_vert");
        assert!(hidden.is_internal());
        assert!(!hidden.is_anonymous());

        let anon = AttributeId::anonymous("17");
        assert!(anon.is_internal());
        assert!(anon.is_anonymous());
        assert_eq!(anon.name(), ".a_17");
    }

    #[test]
    fn test_propagation_info() {
        let keep = AttributeId::anonymous("keep");
        let drop = AttributeId::anonymous("drop");
        let info = AnonymousAttributePropagationInfo::only([keep.name()]);
        assert!(info.propagate(&keep));
        assert!(!info.propagate(&drop));
        assert!(info.propagate(&AttributeId::from("weight")));
        assert!(AnonymousAttributePropagationInfo::default().propagate(&drop));
    }
}
