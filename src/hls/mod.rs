pub mod rewriter;

/// Whether `content` is a multivariant (master) playlist.
///
/// Variant references are rewritten to `/segment` like any other
/// reference, so callers use this to flag that the player will receive
/// sub-manifests with the origin's content type.
pub fn is_variant_playlist(content: &str) -> bool {
    m3u8_rs::is_master_playlist(content.as_bytes())
}
