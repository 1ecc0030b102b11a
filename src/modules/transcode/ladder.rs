/// Target heights in ascending order. A source only gets the rungs it can fill.
pub const RESOLUTIONS: [u32; 6] = [144, 240, 360, 480, 720, 1080];

const BITRATE_STEP_KBPS: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRung {
    pub height: u32,
    /// Position within the filtered ladder, not within `RESOLUTIONS`.
    pub index: usize,
    pub bitrate_kbps: u32,
    pub segment_pattern: String,
    pub variant_playlist_rel_path: String,
}

impl LadderRung {
    fn new(height: u32, index: usize) -> Self {
        Self {
            height,
            index,
            bitrate_kbps: BITRATE_STEP_KBPS * (index as u32 + 1),
            segment_pattern: format!("{height}p/{height}p_%03d.ts"),
            variant_playlist_rel_path: format!("{height}p/{height}p.m3u8"),
        }
    }

    /// Directory (relative to the job folder) holding this rung's output.
    pub fn dir_name(&self) -> String {
        format!("{}p", self.height)
    }

    pub fn bandwidth_bps(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }
}

pub fn plan_ladder(source_height: u32) -> Vec<LadderRung> {
    RESOLUTIONS
        .iter()
        .copied()
        .filter(|&height| height <= source_height)
        .enumerate()
        .map(|(index, height)| LadderRung::new(height, index))
        .collect()
}
