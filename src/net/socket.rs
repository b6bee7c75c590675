//! Listener, accept and connect helpers.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use crate::error::{NetError, SetupStep};

/// Creates a listening socket with address (and on Linux, port) reuse.
///
/// Errors carry the step that failed: socket creation, option setting,
/// bind or listen.
pub fn listen(addr: SocketAddr, backlog: i32) -> Result<TcpListener, NetError> {
    let listener = open_listener(addr, backlog).map_err(|(step, source)| NetError::Setup {
        addr,
        step,
        source,
    })?;
    log::info!("Listening on {} (backlog {})", addr, backlog);
    Ok(listener)
}

#[cfg(unix)]
fn open_listener(addr: SocketAddr, backlog: i32) -> Result<TcpListener, (SetupStep, io::Error)> {
    use std::mem;
    use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};

    let family = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    // SAFETY: plain syscall; the descriptor is owned immediately below.
    let raw = unsafe { libc::socket(family, libc::SOCK_STREAM, 0) };
    if raw < 0 {
        return Err((SetupStep::Socket, io::Error::last_os_error()));
    }
    // SAFETY: `raw` is a fresh descriptor nobody else owns.
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    set_flag(&fd, libc::SO_REUSEADDR).map_err(|e| (SetupStep::SocketOption, e))?;
    #[cfg(target_os = "linux")]
    set_flag(&fd, libc::SO_REUSEPORT).map_err(|e| (SetupStep::SocketOption, e))?;

    // SAFETY: all-zero is a valid sockaddr_storage.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in.
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in6.
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_addr.s6_addr = v6.ip().octets();
            sin6.sin6_scope_id = v6.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };

    // SAFETY: `storage` holds a valid address of `len` bytes.
    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &storage as *const _ as *const libc::sockaddr,
            len as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err((SetupStep::Bind, io::Error::last_os_error()));
    }

    // SAFETY: plain syscall on a descriptor we own.
    if unsafe { libc::listen(fd.as_raw_fd(), backlog) } < 0 {
        return Err((SetupStep::Listen, io::Error::last_os_error()));
    }

    Ok(TcpListener::from(fd))
}

#[cfg(unix)]
fn set_flag(fd: &std::os::unix::io::OwnedFd, option: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let on: libc::c_int = 1;
    // SAFETY: `on` outlives the call and the length matches its type.
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            option,
            &on as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
fn open_listener(addr: SocketAddr, _backlog: i32) -> Result<TcpListener, (SetupStep, io::Error)> {
    TcpListener::bind(addr).map_err(|e| (SetupStep::Bind, e))
}

/// Accepts one connection, retrying up to `retries` failed accepts.
///
/// The listener is tried at most `retries + 1` times.
pub fn accept_with_retry(
    listener: &TcpListener,
    retries: u32,
) -> Result<(TcpStream, SocketAddr), NetError> {
    let attempts = retries.saturating_add(1);
    let mut failures = 0;

    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::info!("Accepted connection from {}", peer);
                return Ok((stream, peer));
            }
            Err(e) => {
                failures += 1;
                log::warn!("Accept attempt {}/{} failed: {}", failures, attempts, e);
                if failures >= attempts {
                    return Err(NetError::AcceptFailed {
                        attempts: failures,
                        source: e,
                    });
                }
            }
        }
    }
}

/// Connects to the first address `addr` resolves to.
pub fn connect(addr: &str) -> Result<TcpStream, NetError> {
    let resolved = addr
        .to_socket_addrs()
        .map_err(|_| NetError::BadAddress(addr.to_string()))?
        .next()
        .ok_or_else(|| NetError::BadAddress(addr.to_string()))?;

    let stream = TcpStream::connect(resolved).map_err(|source| NetError::ConnectFailed {
        addr: addr.to_string(),
        source,
    })?;
    log::info!("Connected to {}", resolved);
    Ok(stream)
}

// ============================================
// TESTS
// ============================================
