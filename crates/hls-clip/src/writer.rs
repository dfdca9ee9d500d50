use std::path::Path;

use m3u8_rs::MediaPlaylist;
use tracing::info;

use crate::ClipError;

/// Serializes `playlist` into m3u8 text.
pub fn render_playlist(playlist: &MediaPlaylist) -> Result<Vec<u8>, ClipError> {
    let mut buf = Vec::with_capacity(64 + playlist.segments.len() * 96);
    playlist.write_to(&mut buf)?;
    Ok(buf)
}

/// Writes `playlist` to `path`, creating missing parent directories.
pub async fn write_playlist(path: &Path, playlist: &MediaPlaylist) -> Result<(), ClipError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = render_playlist(playlist)?;
    tokio::fs::write(path, &bytes).await?;

    info!(
        segments = playlist.segments.len(),
        "New m3u8 file saved as {}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClipInterval, select_window};
    use m3u8_rs::parse_playlist_res;
    use tempfile::TempDir;
    use url::Url;

    fn trimmed() -> MediaPlaylist {
        let source = match parse_playlist_res(
            b"#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\na.ts\n#EXTINF:6.0,\nb.ts\n#EXTINF:6.0,\nc.ts\n",
        )
        .unwrap()
        {
            m3u8_rs::Playlist::MediaPlaylist(pl) => pl,
            m3u8_rs::Playlist::MasterPlaylist(_) => panic!("expected media playlist"),
        };
        let base = Url::parse("http://media.local/show/index.m3u8").unwrap();
        let interval = ClipInterval::parse("00:00:06", "00:00:12").unwrap();
        select_window(&source, &base, &interval).unwrap().playlist
    }

    #[test]
    fn test_render_playlist() {
        let text = String::from_utf8(render_playlist(&trimmed()).unwrap()).unwrap();

        assert!(text.starts_with("#EXTM3U"));
        assert!(text.contains("http://media.local/show/b.ts"));
        assert!(!text.contains("a.ts"));
        assert!(!text.contains("c.ts"));
        assert!(text.contains("#EXT-X-PLAYLIST-TYPE:VOD"));
        assert!(text.trim_end().ends_with("#EXT-X-ENDLIST"));
    }

    #[test]
    fn test_rendered_playlist_parses_back() {
        let bytes = render_playlist(&trimmed()).unwrap();
        match parse_playlist_res(&bytes).unwrap() {
            m3u8_rs::Playlist::MediaPlaylist(pl) => {
                assert_eq!(pl.segments.len(), 1);
                assert!(pl.end_list);
                assert_eq!(pl.media_sequence, 1);
            }
            m3u8_rs::Playlist::MasterPlaylist(_) => panic!("expected media playlist"),
        }
    }

    #[tokio::test]
    async fn test_write_playlist_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("clip.m3u8");

        write_playlist(&path, &trimmed()).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("#EXT-X-ENDLIST"));
    }
}
