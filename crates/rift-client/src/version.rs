//! Protocol version compatibility between client and control plane.

/// Protocol version this client speaks.
pub const PROTOCOL_VERSION: &str = "5.15.0";

/// Response header carrying the server's version.
pub const VERSION_HEADER: &str = "version";

/// Extract the `major.minor` prefix of a version string.
///
/// `"5.3.0"` and `"5.3.0-SNAPSHOT"` both yield `"5.3"`; a version without a
/// second component is returned as is.
pub fn major_minor(version: &str) -> &str {
    let version = version.trim();
    match version.match_indices('.').nth(1) {
        Some((idx, _)) => &version[..idx],
        None => version,
    }
}

/// Check a server-advertised version against the client's.
///
/// A blank or missing server version is accepted.
pub fn matches_major_minor(client: &str, server: Option<&str>) -> bool {
    match server.map(str::trim) {
        Some(server) if !server.is_empty() => major_minor(client) == major_minor(server),
        _ => true,
    }
}
