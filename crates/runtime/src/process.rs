//! Process and port lifecycle helpers for launched browsers.

use std::net::TcpListener;

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		if std::path::Path::new("/proc").join(pid.to_string()).exists() {
			return true;
		}

		// Signal 0 performs the permission/existence check without delivering anything.
		unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
	}

	#[cfg(not(unix))]
	{
		pid == std::process::id()
	}
}

/// Asks the OS for an unused localhost port.
///
/// The port is released before returning, so a racing process may still grab it.
pub fn free_port() -> std::io::Result<u16> {
	let listener = TcpListener::bind(("127.0.0.1", 0))?;
	Ok(listener.local_addr()?.port())
}

/// Sends `SIGKILL` to every process in the group led by `pgid`.
///
/// Children spawned with `process_group(0)` lead their own group, so this tears
/// down helper processes (renderers, GPU process, zygotes) along with the leader.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> std::io::Result<()> {
	if pgid == 0 {
		return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "refusing to signal process group 0"));
	}
	let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
	if rc == 0 {
		return Ok(());
	}
	let err = std::io::Error::last_os_error();
	// ESRCH: the group is already gone.
	if err.raw_os_error() == Some(libc::ESRCH) { Ok(()) } else { Err(err) }
}

#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> std::io::Result<()> {
	Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "process groups are only supported on unix"))
}
