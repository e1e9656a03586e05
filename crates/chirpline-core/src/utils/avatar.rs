/// Media files are served under this path on the backend origin
const MEDIA_PREFIX: &str = "/media/";

/// Resolve a stored avatar reference to a full URL.
///
/// The API hands back avatars in three shapes: an absolute URL, a rooted
/// media path (`/media/avatars/x.png`), or a bare file name relative to the
/// media root (`avatars/x.png`). Missing or empty references resolve to `None`.
pub fn avatar_url(avatar: Option<&str>, media_origin: &str) -> Option<String> {
    let avatar = avatar.filter(|a| !a.is_empty())?;
    let origin = media_origin.trim_end_matches('/');

    if avatar.starts_with("http") {
        Some(avatar.to_string())
    } else if avatar.starts_with(MEDIA_PREFIX) {
        Some(format!("{}{}", origin, avatar))
    } else {
        Some(format!("{}{}{}", origin, MEDIA_PREFIX, avatar))
    }
}
