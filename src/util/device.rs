use sha2::{Digest, Sha256};

/// Derive a stable, opaque device identifier for this machine and user.
///
/// The backend only needs something that stays constant between runs, so the
/// host and user names are hashed rather than sent as-is.
pub fn derive_device_id() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    device_id_from(&host, &user)
}

pub(crate) fn device_id_from(host: &str, user: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"gstv-feed\0");
    hasher.update(host.as_bytes());
    hasher.update(b"\0");
    hasher.update(user.as_bytes());
    let digest = hasher.finalize();

    // 16 bytes of hex is plenty for an opaque id
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}
