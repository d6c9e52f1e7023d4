// Drive LiquidsoapInvoker with `sh -c` standing in for the real player.
#![cfg(unix)]

use std::time::Duration;

use prerec_player::{LiquidsoapInvoker, PlaybackError, PlaybackInvoker, PlaybackOutcome};

fn sh_player(script: &str, playlist: &std::path::Path) -> LiquidsoapInvoker {
    LiquidsoapInvoker::new("sh", vec!["-c".to_string(), script.to_string()], playlist)
}

#[tokio::test]
async fn playlist_is_written_before_player_starts() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = dir.path().join("prerec.m3u");
    // The player only succeeds if it can already read the selected file.
    let script = format!(
        r#"test "$(cat '{}')" = "/media/show1.mp3""#,
        playlist.display()
    );
    let invoker = sh_player(&script, &playlist);

    let outcome = invoker.invoke("/media/show1.mp3", None).await.unwrap();

    assert!(matches!(outcome, PlaybackOutcome::Completed { .. }));
    assert_eq!(
        std::fs::read_to_string(&playlist).unwrap(),
        "/media/show1.mp3"
    );
}

#[tokio::test]
async fn unbounded_playback_runs_to_natural_completion() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = sh_player("sleep 0.3", &dir.path().join("prerec.m3u"));

    let outcome = invoker.invoke("/media/jingle.mp3", None).await.unwrap();

    match outcome {
        PlaybackOutcome::Completed { elapsed } => assert!(elapsed >= Duration::from_millis(300)),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn stop_bound_kills_a_long_player() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = sh_player("exec sleep 30", &dir.path().join("prerec.m3u"));
    let limit = Duration::from_secs(1);

    let outcome = invoker.invoke("/media/show1.mp3", Some(limit)).await.unwrap();

    match outcome {
        PlaybackOutcome::TimedOut { elapsed, limit: reported } => {
            assert_eq!(reported, limit);
            assert!(elapsed >= limit, "killed early: {elapsed:?}");
            assert!(elapsed < limit + Duration::from_secs(1), "killed late: {elapsed:?}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn player_finishing_inside_bound_is_not_a_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = sh_player("exit 0", &dir.path().join("prerec.m3u"));

    let outcome = invoker
        .invoke("/media/show1.mp3", Some(Duration::from_secs(5)))
        .await
        .unwrap();

    assert!(matches!(outcome, PlaybackOutcome::Completed { .. }));
}

#[tokio::test]
async fn non_zero_exit_carries_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = sh_player(
        "echo 'Error: cannot open /media/missing.mp3' >&2; exit 3",
        &dir.path().join("prerec.m3u"),
    );

    let err = invoker.invoke("/media/missing.mp3", None).await.unwrap_err();

    match err {
        PlaybackError::Exited { code, diagnostics } => {
            assert_eq!(code, 3);
            assert_eq!(diagnostics, "Error: cannot open /media/missing.mp3");
        }
        other => panic!("expected Exited, got {other:?}"),
    }
}

#[tokio::test]
async fn stdout_is_used_when_stderr_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = sh_player("echo 'fatal: no output'; exit 1", &dir.path().join("prerec.m3u"));

    let err = invoker.invoke("/media/a.mp3", None).await.unwrap_err();

    assert!(matches!(err, PlaybackError::Exited { ref diagnostics, .. } if diagnostics == "fatal: no output"));
}

#[tokio::test]
async fn missing_player_binary_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = LiquidsoapInvoker::new(
        "/nonexistent/liquidsoap",
        vec!["prerec.liq".to_string()],
        dir.path().join("prerec.m3u"),
    );

    let err = invoker.invoke("/media/a.mp3", None).await.unwrap_err();

    assert!(matches!(err, PlaybackError::Spawn { .. }));
}

#[tokio::test]
async fn unwritable_playlist_is_reported_before_spawn() {
    let invoker = sh_player("exit 0", std::path::Path::new("/nonexistent/dir/prerec.m3u"));

    let err = invoker.invoke("/media/a.mp3", None).await.unwrap_err();

    assert!(matches!(err, PlaybackError::PlaylistWrite { .. }));
}

#[tokio::test]
async fn verbose_player_output_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    // Roughly 1 MB of log noise on stderr before the real error.
    let invoker = sh_player(
        "head -c 1000000 /dev/zero | tr '\\0' x >&2; echo; echo 'Error: stream lost' >&2; exit 2",
        &dir.path().join("prerec.m3u"),
    );

    let err = invoker.invoke("/media/show1.mp3", None).await.unwrap_err();

    match err {
        PlaybackError::Exited { code, diagnostics } => {
            assert_eq!(code, 2);
            assert!(diagnostics.ends_with("Error: stream lost"));
            assert!(diagnostics.chars().count() < 4_100, "diagnostics not bounded");
        }
        other => panic!("expected Exited, got {other:?}"),
    }
}
