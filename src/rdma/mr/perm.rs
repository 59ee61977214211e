use std::ops::BitOr;

use crate::bindings::ibv_access_flags;

/// Memory region permissions.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Permission(ibv_access_flags);

impl Permission {
    pub const LOCAL_WRITE: Self = Self(ibv_access_flags::IBV_ACCESS_LOCAL_WRITE);
    pub const REMOTE_WRITE: Self = Self(ibv_access_flags::IBV_ACCESS_REMOTE_WRITE);
}

impl From<Permission> for i32 {
    fn from(p: Permission) -> Self {
        p.0 .0 as _
    }
}

impl BitOr for Permission {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(ibv_access_flags(self.0 .0 | rhs.0 .0))
    }
}
