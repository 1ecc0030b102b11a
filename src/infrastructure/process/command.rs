use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error while running command: {0}")]
    Io(#[from] std::io::Error),
    #[error("command did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Runs `program` to completion, handing every line of its combined
/// stdout/stderr to `on_line` as it arrives.
///
/// The child is killed if it outlives `timeout`.
pub async fn run_command<I, S, F>(
    program: &Path,
    args: I,
    timeout: Duration,
    mut on_line: F,
) -> Result<ExitStatus, CommandError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    F: FnMut(&str),
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        let mut out = stdout.map(line_reader);
        let mut err = stderr.map(line_reader);

        while out.is_some() || err.is_some() {
            tokio::select! {
                segment = next_segment(&mut out), if out.is_some() => match segment? {
                    Some(line) => on_line(&line),
                    None => out = None,
                },
                segment = next_segment(&mut err), if err.is_some() => match segment? {
                    Some(line) => on_line(&line),
                    None => err = None,
                },
            }
        }

        child.wait().await
    };

    let result = tokio::time::timeout(timeout, run).await;
    match result {
        Ok(status) => Ok(status?),
        Err(_) => {
            let _ = child.kill().await;
            Err(CommandError::Timeout(timeout))
        }
    }
}

type LineReader<R> = tokio::io::Split<BufReader<R>>;

fn line_reader<R: AsyncRead + Unpin>(reader: R) -> LineReader<R> {
    BufReader::new(reader).split(b'\n')
}

async fn next_segment<R: AsyncRead + Unpin>(
    reader: &mut Option<LineReader<R>>,
) -> std::io::Result<Option<String>> {
    let Some(reader) = reader.as_mut() else {
        return Ok(None);
    };

    Ok(reader.next_segment().await?.map(|bytes| {
        String::from_utf8_lossy(&bytes)
            .trim_end_matches('\r')
            .to_string()
    }))
}

/// Serializes tests that spawn processes. A test that writes a fake binary
/// must not race a fork elsewhere, or exec fails with ETXTBSY.
#[cfg(test)]
pub(crate) async fn exec_lock() -> tokio::sync::MutexGuard<'static, ()> {
    static EXEC_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());
    EXEC_LOCK.lock().await
}
