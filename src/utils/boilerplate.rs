//! Boilerplate code for wrappers of raw `ibv_*` / `rdma_*` pointers.

macro_rules! impl_ibv_wrapper_traits {
    ($ibv_ty:ty, $wrapper_ty:ty) => {
        impl ::std::ops::Deref for $wrapper_ty {
            type Target = ::std::ptr::NonNull<$ibv_ty>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<::std::ptr::NonNull<$ibv_ty>> for $wrapper_ty {
            fn from(pointer: ::std::ptr::NonNull<$ibv_ty>) -> Self {
                Self(pointer)
            }
        }

        // SAFETY: the wrapped resources are only ever used by the single
        // transfer thread that owns them; moving them across threads is fine.
        unsafe impl Send for $wrapper_ty {}
        unsafe impl Sync for $wrapper_ty {}
    };
}
