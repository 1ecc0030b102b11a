use super::ladder::LadderRung;
use crate::config::settings::AppConfig;
use crate::infrastructure::process::command::{run_command, CommandError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Height assumed when the probe succeeds but reports nothing.
pub const FALLBACK_HEIGHT: u32 = 240;

const SEGMENT_SECONDS: &str = "6";
const AUDIO_BITRATE: &str = "128k";
const AUDIO_SAMPLE_RATE: &str = "48000";

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("ffprobe exited with code {0:?}")]
    Exit(Option<i32>),
    #[error("ffprobe reported an unusable height: {0:?}")]
    Unparseable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RungError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("ffmpeg exited with code {0:?}")]
    Exit(Option<i32>),
    #[error("could not prepare rung directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives the external `ffprobe` / `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    transcode_timeout: Duration,
    probe_timeout: Duration,
}

impl Transcoder {
    pub fn new(
        ffmpeg_path: impl Into<PathBuf>,
        ffprobe_path: impl Into<PathBuf>,
        transcode_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            transcode_timeout,
            probe_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.ffmpeg_path,
            &config.ffprobe_path,
            config.transcode_timeout(),
            config.probe_timeout(),
        )
    }

    /// Reads the height of the first video stream of `input`.
    pub async fn probe_height(&self, input: &Path) -> Result<u32, ProbeError> {
        let mut first_line: Option<String> = None;

        let mut args: Vec<OsString> = [
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=height",
            "-of",
            "csv=p=0",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(input.as_os_str().to_owned());

        let status = run_command(&self.ffprobe_path, args, self.probe_timeout, |line| {
            let trimmed = line.trim();
            if first_line.is_none() && !trimmed.is_empty() {
                first_line = Some(trimmed.to_string());
            }
        })
        .await?;

        if !status.success() {
            return Err(ProbeError::Exit(status.code()));
        }

        match first_line {
            Some(line) => parse_height(&line),
            None => {
                warn!(
                    "ffprobe returned no height for {}, assuming {}p",
                    input.display(),
                    FALLBACK_HEIGHT
                );
                Ok(FALLBACK_HEIGHT)
            }
        }
    }

    /// Encodes one rung into `folder`, creating `{height}p/` if needed.
    pub async fn transcode_rung(
        &self,
        input: &Path,
        folder: &Path,
        rung: &LadderRung,
    ) -> Result<(), RungError> {
        tokio::fs::create_dir_all(folder.join(rung.dir_name())).await?;

        info!(
            rung = rung.height,
            bitrate_kbps = rung.bitrate_kbps,
            "Running FFmpeg for {}p...",
            rung.height
        );

        let height = rung.height;
        let status = run_command(
            &self.ffmpeg_path,
            rung_args(input, folder, rung),
            self.transcode_timeout,
            |line| info!(rung = height, "{}", line),
        )
        .await?;

        if !status.success() {
            error!(
                rung = rung.height,
                "❌ FFmpeg exited with code {:?} for {}p",
                status.code(),
                rung.height
            );
            return Err(RungError::Exit(status.code()));
        }

        Ok(())
    }
}

fn parse_height(line: &str) -> Result<u32, ProbeError> {
    line.trim_end_matches(',')
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|&h| h > 0)
        .ok_or_else(|| ProbeError::Unparseable(line.to_string()))
}

/// Command line for a single rung. Segment and playlist paths are rooted at `folder`.
pub fn rung_args(input: &Path, folder: &Path, rung: &LadderRung) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.as_os_str().to_owned()];

    args.extend(
        [
            "-vf".to_string(),
            format!("scale=-2:{}", rung.height),
            "-c:v".into(),
            "libx264".into(),
            "-c:a".into(),
            "aac".into(),
            "-ar".into(),
            AUDIO_SAMPLE_RATE.into(),
            "-b:v".into(),
            format!("{}k", rung.bitrate_kbps),
            "-b:a".into(),
            AUDIO_BITRATE.into(),
            "-hls_time".into(),
            SEGMENT_SECONDS.into(),
            "-hls_playlist_type".into(),
            "vod".into(),
            "-hls_segment_filename".into(),
        ]
        .into_iter()
        .map(OsString::from),
    );

    args.push(folder.join(&rung.segment_pattern).into_os_string());
    args.push(folder.join(&rung.variant_playlist_rel_path).into_os_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::transcode::ladder::plan_ladder;

    #[test]
    fn rung_arguments_follow_the_ladder() {
        let rung = plan_ladder(720)[2].clone();
        let args: Vec<String> = rung_args(Path::new("/work/in.mp4"), Path::new("/work"), &rung)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let value_of = |flag: &str| {
            let pos = args.iter().position(|a| a == flag).unwrap();
            args[pos + 1].clone()
        };

        assert_eq!(value_of("-i"), "/work/in.mp4");
        assert_eq!(value_of("-vf"), "scale=-2:360");
        assert_eq!(value_of("-c:v"), "libx264");
        assert_eq!(value_of("-c:a"), "aac");
        assert_eq!(value_of("-ar"), "48000");
        assert_eq!(value_of("-b:v"), "1200k");
        assert_eq!(value_of("-b:a"), "128k");
        assert_eq!(value_of("-hls_time"), "6");
        assert_eq!(value_of("-hls_playlist_type"), "vod");
        assert_eq!(value_of("-hls_segment_filename"), "/work/360p/360p_%03d.ts");
        assert_eq!(args.last().map(String::as_str), Some("/work/360p/360p.m3u8"));
    }

    #[test]
    fn parses_probe_lines() {
        assert_eq!(parse_height("720").unwrap(), 720);
        assert_eq!(parse_height("1080,").unwrap(), 1080);
        assert!(matches!(parse_height("0"), Err(ProbeError::Unparseable(_))));
        assert!(matches!(
            parse_height("Invalid data found"),
            Err(ProbeError::Unparseable(_))
        ));
    }

    #[cfg(unix)]
    mod with_fake_binaries {
        use super::*;
        use crate::infrastructure::process::command::exec_lock;
        use crate::modules::transcode::test_support::script;

        fn transcoder(dir: &Path, probe_body: &str, ffmpeg_body: &str) -> Transcoder {
            Transcoder::new(
                script(dir, "ffmpeg", ffmpeg_body),
                script(dir, "ffprobe", probe_body),
                Duration::from_secs(10),
                Duration::from_secs(10),
            )
        }

        #[tokio::test]
        async fn probe_reads_height() {
            let _guard = exec_lock().await;
            let dir = tempfile::tempdir().unwrap();
            let t = transcoder(dir.path(), "echo 720", "exit 0");
            assert_eq!(t.probe_height(Path::new("in.mp4")).await.unwrap(), 720);
        }

        #[tokio::test]
        async fn probe_without_output_falls_back_to_240() {
            let _guard = exec_lock().await;
            let dir = tempfile::tempdir().unwrap();
            let t = transcoder(dir.path(), "exit 0", "exit 0");
            assert_eq!(
                t.probe_height(Path::new("in.mp4")).await.unwrap(),
                FALLBACK_HEIGHT
            );
        }

        #[tokio::test]
        async fn probe_failure_is_an_error() {
            let _guard = exec_lock().await;
            let dir = tempfile::tempdir().unwrap();
            let t = transcoder(dir.path(), "echo 'No such file' 1>&2; exit 1", "exit 0");
            let err = t.probe_height(Path::new("in.mp4")).await.unwrap_err();
            assert!(matches!(err, ProbeError::Exit(Some(1))));
        }

        #[tokio::test]
        async fn rung_writes_into_its_directory() {
            let _guard = exec_lock().await;
            let dir = tempfile::tempdir().unwrap();
            // last argument is the variant playlist
            let t = transcoder(
                dir.path(),
                "echo 720",
                r##"for last; do :; done; echo "#EXTM3U" > "$last""##,
            );
            let work = dir.path().join("job");
            std::fs::create_dir(&work).unwrap();
            let rung = plan_ladder(720)[1].clone();

            t.transcode_rung(&work.join("in.mp4"), &work, &rung)
                .await
                .unwrap();

            assert!(work.join("240p/240p.m3u8").is_file());
        }

        #[tokio::test]
        async fn rung_reports_non_zero_exit() {
            let _guard = exec_lock().await;
            let dir = tempfile::tempdir().unwrap();
            let t = transcoder(dir.path(), "echo 720", "echo boom 1>&2; exit 2");
            let rung = plan_ladder(720)[0].clone();

            let err = t
                .transcode_rung(Path::new("in.mp4"), dir.path(), &rung)
                .await
                .unwrap_err();

            assert!(matches!(err, RungError::Exit(Some(2))));
            assert!(dir.path().join("144p").is_dir());
        }
    }
}
