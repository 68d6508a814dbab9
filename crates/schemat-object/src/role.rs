//! Synthesizing an RPC proxy handle from `obj.$role.method` access
//! (spec §4.E point 4, §4.I).

use schemat_types::ObjectId;

/// A lightweight handle produced when a property read starts with
/// `$role`. Dispatching the eventual `.method(args)` call is the RPC
/// layer's job (`schemat-rpc`); this crate only recognizes the access
/// pattern and carries the addressing information forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleHandle {
    /// The object the call targets.
    pub target: ObjectId,
    /// Role name with the leading `$` stripped.
    pub role: String,
}

/// Whether `field` names a role proxy access (`$role`) rather than an
/// ordinary property.
pub fn is_role_access(field: &str) -> bool {
    field.starts_with('$') && field.len() > 1
}

/// Parse `field` into a [`RoleHandle`] for `target`, if it is a role
/// access.
pub fn parse_role(target: ObjectId, field: &str) -> Option<RoleHandle> {
    is_role_access(field).then(|| RoleHandle { target, role: field[1..].to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_prefixed_field_is_a_role_access() {
        let handle = parse_role(ObjectId(7), "$worker").unwrap();
        assert_eq!(handle.target, ObjectId(7));
        assert_eq!(handle.role, "worker");
    }

    #[test]
    fn plain_field_is_not_a_role_access() {
        assert!(parse_role(ObjectId(7), "name").is_none());
    }
}
