//! 파일 테일러 -- 파일 끝에서부터 추가분을 따라갑니다
//!
//! `tail -f`와 유사한 동작을 폴링 방식으로 구현합니다.
//! 시작 시 현재 파일 길이로 시크하므로 기존 내용은 읽지 않습니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate 등) → 오프셋 0부터 다시 읽기
//! - 파일 크기 축소 감지 (truncation) → 오프셋 0부터 다시 읽기
//!
//! 완결된(개행으로 끝나는) 줄만 오프셋을 전진시키므로, 쓰다 만
//! 줄은 다음 폴링에서 마저 읽습니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::fs::{File, metadata};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wiregate_core::LogRecord;
use wiregate_core::metrics::{EVENTS_PROCESSED_TOTAL, LABEL_TYPE, TYPE_LOG};

use crate::batcher::LogBatcher;
use crate::error::TailError;

/// 한 번의 폴링에서 읽는 최대 줄 수
const MAX_LINES_PER_POLL: usize = 1000;

/// 파일 하나의 테일러
///
/// 취소 토큰이 발화할 때까지 실행되며, 각 줄을 앞뒤 공백을 제거한
/// [`LogRecord`]로 만들어 공유 로그 배처에 수락시킵니다.
pub struct FileTailer {
    path: PathBuf,
    poll_interval: Duration,
    batcher: Arc<LogBatcher>,
    cancel: CancellationToken,
}

impl FileTailer {
    /// 새 파일 테일러를 생성합니다.
    pub fn new(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
        batcher: Arc<LogBatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            batcher,
            cancel,
        }
    }

    /// 테일 루프를 실행합니다.
    ///
    /// 취소되면 진행 중인 읽기만 마치고 즉시 반환합니다.
    pub async fn run(self) {
        // 시작 시점의 파일 끝으로 시크 -- 기존 내용은 건너뜀
        let mut offset = match metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                info!(path = %self.path.display(), error = %e, "failed to stat file, starting at zero");
                0
            }
        };
        let mut inode = get_inode(&self.path).await.ok();

        info!(path = %self.path.display(), offset, "tailing file");

        loop {
            tokio::select! {
                _ = sleep(self.poll_interval) => {
                    self.poll_once(&mut offset, &mut inode).await;
                }
                _ = self.cancel.cancelled() => {
                    debug!(path = %self.path.display(), "tailer received shutdown signal");
                    break;
                }
            }
        }
    }

    /// 폴링 1회 -- 로테이션/절단을 확인하고 새 줄을 수락시킵니다.
    async fn poll_once(&self, offset: &mut u64, inode: &mut Option<u64>) {
        // 로테이션 확인 (inode 변경)
        if let Ok(current) = get_inode(&self.path).await {
            if let Some(last) = *inode
                && current != last
            {
                info!(path = %self.path.display(), "file rotation detected");
                *offset = 0;
            }
            *inode = Some(current);
        }

        // Truncation 감지
        if let Ok(meta) = metadata(&self.path).await
            && meta.len() < *offset
        {
            warn!(
                path = %self.path.display(),
                size = meta.len(),
                offset = *offset,
                "file truncation detected"
            );
            *offset = 0;
        }

        match read_new_lines(&self.path, *offset).await {
            Ok((lines, new_offset)) => {
                *offset = new_offset;
                for line in lines {
                    let record = LogRecord {
                        timestamp: Utc::now(),
                        file: self.path.display().to_string(),
                        message: line,
                    };
                    self.batcher.admit(record).await;
                    metrics::counter!(EVENTS_PROCESSED_TOTAL, LABEL_TYPE => TYPE_LOG)
                        .increment(1);
                }
            }
            Err(e) => {
                // 파일이 잠시 사라진 경우 등 -- 다음 폴링에서 재시도
                debug!(path = %self.path.display(), error = %e, "failed to read file");
            }
        }
    }
}

/// 주어진 오프셋부터 완결된 줄들을 읽습니다.
///
/// 각 줄은 앞뒤 공백이 제거되며, 빈 줄도 빈 문자열로 포함됩니다.
/// 반환값: (읽은 줄들, 새로운 오프셋). 개행 없이 끝난 마지막
/// 조각은 소비하지 않고 남겨 둡니다.
pub async fn read_new_lines(path: &Path, offset: u64) -> Result<(Vec<String>, u64), TailError> {
    let file = File::open(path).await.map_err(|e| TailError::Read {
        path: path.display().to_string(),
        reason: format!("failed to open: {e}"),
    })?;

    let mut reader = BufReader::new(file);
    reader
        .seek(std::io::SeekFrom::Start(offset))
        .await
        .map_err(|e| TailError::Read {
            path: path.display().to_string(),
            reason: format!("failed to seek to offset {offset}: {e}"),
        })?;

    let mut lines = Vec::new();
    let mut current_offset = offset;
    let mut line_buffer = String::new();

    loop {
        line_buffer.clear();
        let bytes_read =
            reader
                .read_line(&mut line_buffer)
                .await
                .map_err(|e| TailError::Read {
                    path: path.display().to_string(),
                    reason: format!("failed to read line: {e}"),
                })?;

        if bytes_read == 0 {
            // EOF 도달
            break;
        }

        if !line_buffer.ends_with('\n') {
            // 쓰다 만 줄 -- 오프셋을 전진시키지 않고 다음 폴링에서 재시도
            break;
        }

        current_offset = current_offset
            .checked_add(bytes_read as u64)
            .ok_or_else(|| TailError::OffsetOverflow {
                path: path.display().to_string(),
            })?;

        lines.push(line_buffer.trim().to_owned());

        // 한 번에 너무 많은 줄을 읽지 않도록 제한
        if lines.len() >= MAX_LINES_PER_POLL {
            debug!(
                path = %path.display(),
                "read batch limit reached, will continue in next poll"
            );
            break;
        }
    }

    Ok((lines, current_offset))
}

/// 파일의 inode를 가져옵니다 (Unix 전용).
#[cfg(unix)]
async fn get_inode(path: &Path) -> Result<u64, TailError> {
    use std::os::unix::fs::MetadataExt;

    let meta = metadata(path).await.map_err(|e| TailError::Read {
        path: path.display().to_string(),
        reason: format!("failed to get metadata: {e}"),
    })?;

    Ok(meta.ino())
}

#[cfg(not(unix))]
async fn get_inode(_path: &Path) -> Result<u64, TailError> {
    // inode 개념이 없는 플랫폼 -- 로테이션은 절단 감지에만 의존
    Ok(0)
}
