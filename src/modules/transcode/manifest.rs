use super::ladder::LadderRung;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Width for a rung, assuming a 16:9 source and rounding down to an even number.
fn display_width(height: u32) -> u32 {
    (height * 16 / 9) & !1
}

/// Renders the multi-variant playlist for `rungs`, in the order given.
pub fn render_master_playlist(rungs: &[LadderRung]) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");

    for rung in rungs {
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n",
            rung.bandwidth_bps(),
            display_width(rung.height),
            rung.height
        ));
        out.push_str(&rung.variant_playlist_rel_path);
        out.push('\n');
    }

    out
}

/// Writes `master.m3u8` into `folder`. The document goes to a temporary
/// sibling first and is renamed into place, so readers never see a partial file.
pub async fn write_master_playlist(folder: &Path, rungs: &[LadderRung]) -> std::io::Result<PathBuf> {
    let body = render_master_playlist(rungs);
    let target = folder.join(MASTER_PLAYLIST);
    let staging = folder.join(format!("{MASTER_PLAYLIST}.tmp"));

    tokio::fs::write(&staging, body.as_bytes()).await?;
    tokio::fs::rename(&staging, &target).await?;

    info!(variants = rungs.len(), "✅ Master playlist created: {}", target.display());
    Ok(target)
}
