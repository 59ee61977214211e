use std::io;

/// Converts a verbs return value (`0` or a positive `errno`) to a Rust `Result`.
#[inline(always)]
pub(crate) fn from_c_ret(ret: i32) -> io::Result<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(ret))
    }
}

/// Converts a connection manager return value (`0`, or `-1` with `errno` set)
/// to a Rust `Result`.
#[inline(always)]
pub(crate) fn from_c_ret_errno(ret: i32) -> io::Result<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Converts a verbs return value to a Rust `Result`, replacing well-known
/// error codes with a readable explanation.
#[inline(always)]
pub(crate) fn from_c_ret_explained(
    ret: i32,
    f: impl FnOnce(i32) -> Option<&'static str>,
) -> io::Result<()> {
    if ret == 0 {
        Ok(())
    } else {
        match f(ret) {
            Some(msg) => Err(io::Error::new(
                io::Error::from_raw_os_error(ret).kind(),
                msg,
            )),
            None => Err(io::Error::from_raw_os_error(ret)),
        }
    }
}
