//! Bounded-parallelism segment encoder
//!
//! Encodes every segment with SVT-AV1 at the planned bitrate. A counting
//! semaphore caps the number of concurrent ffmpeg children; output paths are
//! indexed so completion order never affects reassembly order. The first
//! failure aborts the remaining encodes.

use crate::error::{EncoderError, Result};
use crate::tool::{path_arg, run_tool};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;
use video_core::Segment;

/// Encode all segments into `encoded_NNN.mp4` files under `encoded_dir`.
pub async fn encode_segments(
    segments: &[Segment],
    encoded_dir: &Path,
    bitrate_kbps: u32,
    max_parallel: usize,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(encoded_dir).await?;

    encode_all(segments, encoded_dir, max_parallel, move |input, output, index| async move {
        debug!(index, bitrate_kbps, "encoding segment");
        let args = build_encode_args(&input, &output, bitrate_kbps);
        run_tool("ffmpeg", &args)
            .await
            .map(|_| ())
            .map_err(|message| EncoderError::Encode { index, message })
    })
    .await
}

/// Fan segments out over at most `max_parallel` concurrent `encode_fn`
/// invocations, collecting outputs at their segment index.
async fn encode_all<F, Fut>(
    segments: &[Segment],
    encoded_dir: &Path,
    max_parallel: usize,
    encode_fn: F,
) -> Result<Vec<PathBuf>>
where
    F: Fn(PathBuf, PathBuf, usize) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut join_set = JoinSet::new();

    for segment in segments {
        let input = segment.local_path.clone();
        let output = encoded_dir.join(format!("encoded_{:03}.mp4", segment.index));
        let index = segment.index;
        let semaphore = semaphore.clone();
        let encode_fn = encode_fn.clone();

        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("encode semaphore closed");
            encode_fn(input, output.clone(), index).await?;
            Ok::<_, EncoderError>((index, output))
        });
    }

    let mut outputs: Vec<Option<PathBuf>> = vec![None; segments.len()];
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok((index, path))) => outputs[index] = Some(path),
            Ok(Err(e)) => {
                // Dropping the set kills in-flight children via kill_on_drop
                join_set.abort_all();
                return Err(e);
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                join_set.abort_all();
                return Err(EncoderError::Encode {
                    index: 0,
                    message: format!("encode task panicked: {e}"),
                });
            }
        }
    }

    outputs
        .into_iter()
        .enumerate()
        .map(|(index, path)| {
            path.ok_or_else(|| EncoderError::Encode {
                index,
                message: "no output was produced".to_string(),
            })
        })
        .collect()
}

/// AV1 encode arguments: SVT-AV1 preset 9 at CRF 32 with a capped maximum
/// bitrate, fast-decode tuning, and a 240-frame GOP; audio re-encoded to
/// 128 kbps AAC with the moov atom moved up front.
fn build_encode_args(input: &Path, output: &Path, bitrate_kbps: u32) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-c:v".to_string(),
        "libsvtav1".to_string(),
        "-preset".to_string(),
        "9".to_string(),
        "-crf".to_string(),
        "32".to_string(),
        "-g".to_string(),
        "240".to_string(),
        "-svtav1-params".to_string(),
        format!("tune=0:film-grain=0:fast-decode=1:mbr={bitrate_kbps}"),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-y".to_string(),
        path_arg(output),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fake_segments(count: usize) -> Vec<Segment> {
        (0..count)
            .map(|index| Segment {
                index,
                local_path: PathBuf::from(format!("/tmp/in/segment_{index:03}.mp4")),
                duration: 15.0,
            })
            .collect()
    }

    #[test]
    fn test_encode_args_carry_av1_parameters() {
        let args = build_encode_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            1200,
        );
        assert!(args.contains(&"libsvtav1".to_string()));
        assert!(args.contains(&"tune=0:film-grain=0:fast-decode=1:mbr=1200".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[tokio::test]
    async fn test_parallelism_never_exceeds_cap() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let dir = tempfile::tempdir().unwrap();

        let outputs = {
            let current = current.clone();
            let peak = peak.clone();
            encode_all(&fake_segments(12), dir.path(), 4, move |_, _, _| {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap()
        };

        assert_eq!(outputs.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 4, "semaphore must cap concurrency");
    }

    #[tokio::test]
    async fn test_outputs_are_index_ordered_regardless_of_completion() {
        let dir = tempfile::tempdir().unwrap();

        // Earlier segments sleep longer, so later ones finish first
        let outputs = encode_all(&fake_segments(6), dir.path(), 6, move |_, _, index| async move {
            tokio::time::sleep(Duration::from_millis((6 - index as u64) * 10)).await;
            Ok(())
        })
        .await
        .unwrap();

        for (index, path) in outputs.iter().enumerate() {
            assert!(path.ends_with(format!("encoded_{index:03}.mp4")));
        }
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let dir = tempfile::tempdir().unwrap();

        let result = encode_all(&fake_segments(8), dir.path(), 2, move |_, _, index| async move {
            if index == 3 {
                Err(EncoderError::Encode {
                    index,
                    message: "boom".to_string(),
                })
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            }
        })
        .await;

        match result {
            Err(EncoderError::Encode { index, .. }) => assert_eq!(index, 3),
            other => panic!("expected encode failure, got {other:?}"),
        }
    }
}
