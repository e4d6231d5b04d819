//! Joystick device identification shared by the daemon and the CLI
//!
//! Candidate device paths and the `JSIOCGNAME`/`JSIOCGBUTTONS` queries from
//! `<linux/joystick.h>`.

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::PathBuf;

/// Name reported for devices that refuse the name query
pub const FALLBACK_NAME: &str = "Unknown";

const NAME_BUFFER_LEN: usize = 128;

nix::ioctl_read_buf!(jsiocgname, b'j', 0x13, u8);
nix::ioctl_read!(jsiocgbuttons, b'j', 0x12, u8);

/// `<prefix>0` .. `<prefix><count - 1>`
pub fn candidate_paths(prefix: &str, count: u32) -> Vec<PathBuf> {
    (0..count)
        .map(|n| PathBuf::from(format!("{}{}", prefix, n)))
        .collect()
}

/// Human-readable device name via `JSIOCGNAME`
pub fn query_name(file: &File) -> Option<String> {
    let mut buf = [0u8; NAME_BUFFER_LEN];
    // SAFETY: the kernel writes at most buf.len() bytes into buf
    let len = unsafe { jsiocgname(file.as_raw_fd(), &mut buf) }.ok()?;
    decode_name(&buf, len)
}

/// Number of buttons via `JSIOCGBUTTONS`. Zero counts as unknown.
pub fn query_button_count(file: &File) -> Option<usize> {
    let mut count: u8 = 0;
    // SAFETY: JSIOCGBUTTONS writes a single byte
    unsafe { jsiocgbuttons(file.as_raw_fd(), &mut count) }.ok()?;
    (count > 0).then_some(count as usize)
}

/// NUL-terminated name in the first `len` bytes of `buf`
fn decode_name(buf: &[u8], len: i32) -> Option<String> {
    let bytes = &buf[..(len.max(0) as usize).min(buf.len())];
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let name = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
    (!name.is_empty()).then_some(name)
}
