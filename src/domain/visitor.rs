use std::hash::{Hash, Hasher};
use std::net::IpAddr;

/// Who looked at a page, for view dedup within one flush window.
///
/// Authenticated traffic dedups by uid; anonymous traffic by a hash of the
/// client address. The hash only needs to be stable for the lifetime of the
/// process, so the std hasher is enough.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VisitorIdentity {
    User(i64),
    Address(u64),
}

impl VisitorIdentity {
    pub fn from_parts(uid: Option<i64>, addr: IpAddr) -> Self {
        match uid {
            Some(uid) => VisitorIdentity::User(uid),
            None => {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                addr.hash(&mut hasher);
                VisitorIdentity::Address(hasher.finish())
            }
        }
    }
}
