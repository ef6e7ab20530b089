// Integration tests for the meeting session
//
// These run a full session against the in-memory transport: events go in
// as raw channel messages and assertions read the reconciled state back
// out through the session API. The tokio clock is paused, so the pump is
// drained deterministically by letting time advance.

use anyhow::Result;
use async_trait::async_trait;
use meeting_sentinel::{
    DriftNotice, DriftNotifier, JobStatus, LocalTransport, MeetingSession, SessionConfig, TimeBand,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[derive(Default)]
struct CountingNotifier {
    count: AtomicUsize,
}

impl CountingNotifier {
    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriftNotifier for CountingNotifier {
    async fn notify(&self, _notice: DriftNotice) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn transcript_event(index: u64, result_id: Option<&str>, text: &str) -> Vec<u8> {
    let mut payload = json!({
        "index": index,
        "speaker": "営業担当",
        "text": text,
        "timestamp": "00:10"
    });
    if let Some(id) = result_id {
        payload["result_id"] = json!(id);
    }
    serde_json::to_vec(&json!({ "type": "transcript", "action": "append", "payload": payload }))
        .unwrap()
}

fn transcript_update(index: u64, result_id: Option<&str>, text: &str) -> Vec<u8> {
    let mut payload = json!({
        "index": index,
        "speaker": "営業担当",
        "text": text,
        "timestamp": "00:10"
    });
    if let Some(id) = result_id {
        payload["result_id"] = json!(id);
    }
    serde_json::to_vec(&json!({ "type": "transcript", "action": "update", "payload": payload }))
        .unwrap()
}

fn classification_event(index: u64, text: &str, alignment: u32) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "classification",
        "action": "append",
        "payload": {
            "index": index,
            "text": text,
            "speaker": "営業担当",
            "category": "進捗確認",
            "alignment": alignment,
            "method": "heuristic"
        }
    }))
    .unwrap()
}

fn complete_event() -> Vec<u8> {
    br#"{"type":"complete"}"#.to_vec()
}

fn error_event(message: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({ "type": "error", "message": message })).unwrap()
}

/// Let the event pump absorb whatever is queued. With the clock paused,
/// a minimal sleep runs every ready task before time moves on.
async fn drain() {
    sleep(Duration::from_millis(1)).await;
}

async fn wait_terminal(session: &MeetingSession) -> Result<()> {
    let mut status = session.watch_status();
    timeout(Duration::from_secs(5), status.wait_for(|s| s.is_terminal())).await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_full_session_lifecycle() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());

    let mut config = SessionConfig::for_job("job-7");
    config.agenda_text = "定例会議 30分\n1. 進捗確認\n2. 見積もりの説明".to_string();
    let mut session = MeetingSession::new(config, transport.clone(), notifier.clone());
    assert_eq!(session.status(), JobStatus::Idle);

    session.start().await?;
    assert_eq!(session.status(), JobStatus::Streaming);

    tx.send(transcript_event(0, Some("r-0"), "本日はよろしくお願いします")).await?;
    tx.send(transcript_event(1, None, "こちらこそ、お願いします")).await?;
    tx.send(classification_event(0, "本日はよろしくお願いします", 90)).await?;
    drain().await;

    assert_eq!(session.transcript().await.len(), 2);
    assert_eq!(session.classifications().await.len(), 1);

    tx.send(complete_event()).await?;
    wait_terminal(&session).await?;
    assert_eq!(session.status(), JobStatus::Complete);

    let stats = session.stop().await?;
    assert_eq!(stats.status, JobStatus::Complete, "Stop keeps a completed job complete");
    assert_eq!(stats.job_id, "job-7");
    assert_eq!(stats.transcript_segments, 2);
    assert_eq!(stats.classifications, 1);
    assert_eq!(stats.scheduled_minutes, Some(30));
    assert_eq!(stats.dropped_messages, 0);
    assert!(!stats.alert_active);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_backlog_replay_converges() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-7"), transport.clone(), notifier);

    session.start().await?;

    // A replayed backlog: the same append twice, then a revision
    tx.send(transcript_event(0, Some("r-0"), "最初の文言")).await?;
    tx.send(transcript_event(0, Some("r-0"), "最初の文言")).await?;
    tx.send(transcript_update(0, Some("r-0"), "確定した文言")).await?;
    // An update whose append never arrived stays invisible
    tx.send(transcript_update(9, Some("r-9"), "孤児の更新")).await?;
    drain().await;

    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].text, "確定した文言");

    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_malformed_messages_count_in_stats() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-7"), transport.clone(), notifier);

    session.start().await?;
    tx.send(b"half a messa".to_vec()).await?;
    tx.send(br#"{"type":"unknown-kind"}"#.to_vec()).await?;
    tx.send(transcript_event(0, Some("r-0"), "壊れていないメッセージ")).await?;
    drain().await;

    assert_eq!(session.transcript().await.len(), 1);
    let stats = session.stats().await;
    assert_eq!(stats.dropped_messages, 2);
    assert_eq!(stats.status, JobStatus::Streaming);

    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_upstream_error_does_not_end_the_stream() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-7"), transport.clone(), notifier);

    session.start().await?;
    tx.send(error_event("classifier backend restarting")).await?;
    drain().await;

    assert_eq!(session.failure().await.as_deref(), Some("classifier backend restarting"));
    assert_eq!(session.status(), JobStatus::Streaming, "Faults do not stop the job");

    // Later events still reconcile
    tx.send(transcript_event(0, Some("r-0"), "エラー後も発言は届きます")).await?;
    drain().await;
    assert_eq!(session.transcript().await.len(), 1);

    let stats = session.stop().await?;
    assert_eq!(stats.status, JobStatus::Idle, "Manual stop returns a streaming job to idle");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_channel_death_returns_the_job_to_idle() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = SessionConfig::for_job("job-7");
    config.agenda_text = "30分".to_string();
    let mut session = MeetingSession::new(config, transport.clone(), notifier);

    session.start().await?;
    tx.send(transcript_event(0, Some("r-0"), "接続が切れる前の発言")).await?;
    drain().await;
    sleep(Duration::from_secs(3)).await;

    // The producer goes away without ever sending a completion
    drop(tx);
    let mut status = session.watch_status();
    timeout(Duration::from_secs(5), status.wait_for(|s| *s == JobStatus::Idle)).await??;

    // The timer stops with the stream
    sleep(Duration::from_secs(30)).await;
    assert_eq!(session.timer_state().await.elapsed_seconds, 3);
    assert_eq!(session.transcript().await.len(), 1);

    let stats = session.stop().await?;
    assert_eq!(stats.status, JobStatus::Idle);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_channel_death_cancels_the_drift_alert() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-7"), transport.clone(), notifier.clone());

    session.start().await?;
    for index in 0..3 {
        tx.send(classification_event(
            index,
            "週末の予定について盛り上がっている雑談です",
            30,
        ))
        .await?;
    }
    drain().await;
    assert!(session.alert_state().await.alert_active);
    assert_eq!(notifier.count(), 1);

    // The producer dies mid-drift; the alert must not outlive the job
    drop(tx);
    let mut status = session.watch_status();
    timeout(Duration::from_secs(5), status.wait_for(|s| *s == JobStatus::Idle)).await??;

    let alert = session.alert_state().await;
    assert!(!alert.alert_active);
    assert!(!alert.banner_visible);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(notifier.count(), 1, "No repeats after the channel is gone");

    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_restart_clears_state_and_replaces_the_channel() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx1 = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = SessionConfig::for_job("job-7");
    config.agenda_text = "30分".to_string();
    let mut session = MeetingSession::new(config, transport.clone(), notifier);

    session.start().await?;
    tx1.send(transcript_event(0, Some("r-0"), "一回目の実行")).await?;
    drain().await;
    sleep(Duration::from_secs(3)).await;
    assert_eq!(session.transcript().await.len(), 1);
    assert_eq!(session.timer_state().await.elapsed_seconds, 3);

    // Restart: the old channel is retired, state starts over
    let tx2 = transport.register("job-7").await;
    session.start().await?;
    assert_eq!(session.status(), JobStatus::Streaming);
    assert!(session.transcript().await.is_empty());
    assert_eq!(session.timer_state().await.elapsed_seconds, 0);

    // The old sender is detached; the new one feeds the session
    assert!(tx1.send(transcript_event(5, Some("r-5"), "古いチャネル")).await.is_err());
    tx2.send(transcript_event(0, Some("r-0"), "二回目の実行")).await?;
    drain().await;

    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].text, "二回目の実行");

    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_restart_discards_the_previous_runs_alert() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx1 = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-7"), transport.clone(), notifier.clone());

    session.start().await?;
    for index in 0..3 {
        tx1.send(classification_event(
            index,
            "週末の予定について盛り上がっている雑談です",
            30,
        ))
        .await?;
    }
    drain().await;
    assert!(session.alert_state().await.alert_active);
    assert_eq!(notifier.count(), 1);

    // Restart while the first run's alert is still ringing
    let tx2 = transport.register("job-7").await;
    session.start().await?;

    let alert = session.alert_state().await;
    assert_eq!(alert.window_average, None, "The old window does not carry over");
    assert!(!alert.banner_visible);
    assert!(!alert.alert_active);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(notifier.count(), 1, "The old run's repeats died with the restart");

    // Drift in the new run crosses the threshold on its own edge
    for index in 0..3 {
        tx2.send(classification_event(
            index,
            "週末の予定について盛り上がっている雑談です",
            25,
        ))
        .await?;
    }
    drain().await;

    let alert = session.alert_state().await;
    assert_eq!(alert.window_average, Some(25));
    assert!(alert.alert_active);
    assert_eq!(notifier.count(), 2, "A fresh crossing notifies immediately");

    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_reports_error_status() {
    let transport = Arc::new(LocalTransport::new());
    let notifier = Arc::new(CountingNotifier::default());
    // No channel registered for this job
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-x"), transport, notifier);

    assert!(session.start().await.is_err());
    assert_eq!(session.status(), JobStatus::Error);
    let failure = session.failure().await.expect("failure string recorded");
    assert!(failure.contains("job-x"));
}

#[tokio::test(start_paused = true)]
async fn test_timer_runs_while_streaming_and_freezes_after() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = SessionConfig::for_job("job-7");
    config.agenda_text = "1分の進行確認".to_string();
    let mut session = MeetingSession::new(config, transport.clone(), notifier);

    session.start().await?;
    sleep(Duration::from_millis(5200)).await;
    assert_eq!(session.timer_state().await.elapsed_seconds, 5);
    assert_eq!(session.timer_state().await.band, TimeBand::Normal);

    tx.send(complete_event()).await?;
    wait_terminal(&session).await?;

    // Frozen once the job is no longer streaming
    sleep(Duration::from_secs(30)).await;
    assert_eq!(session.timer_state().await.elapsed_seconds, 5);

    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_meeting_overrun_reaches_danger() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = SessionConfig::for_job("job-7");
    config.agenda_text = "1分".to_string();
    let mut session = MeetingSession::new(config, transport.clone(), notifier);

    session.start().await?;
    sleep(Duration::from_millis(61_500)).await;
    assert_eq!(session.timer_state().await.band, TimeBand::Danger);

    tx.send(complete_event()).await?;
    wait_terminal(&session).await?;
    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_drift_alert_rides_the_classification_stream() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-7"), transport.clone(), notifier.clone());

    session.start().await?;

    // Three substantive off-topic utterances push the average to 30
    for index in 0..3 {
        tx.send(classification_event(
            index,
            "週末の予定について盛り上がっている雑談です",
            30,
        ))
        .await?;
    }
    drain().await;

    let alert = session.alert_state().await;
    assert_eq!(alert.window_average, Some(30));
    assert!(alert.banner_visible);
    assert!(alert.alert_active);
    assert_eq!(notifier.count(), 1);

    // The alert repeats while the drift persists
    sleep(Duration::from_secs(21)).await;
    assert_eq!(notifier.count(), 2);

    // Back on topic: enough high scores to lift the window average
    for index in 3..13 {
        tx.send(classification_event(
            index,
            "見積もりの内訳を項目ごとに説明しています",
            95,
        ))
        .await?;
    }
    drain().await;

    let alert = session.alert_state().await;
    assert_eq!(alert.window_average, Some(95), "Window has rolled past the old scores");
    assert!(!alert.alert_active);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(notifier.count(), 2, "No repeats after recovery");

    tx.send(complete_event()).await?;
    wait_terminal(&session).await?;
    session.stop().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() -> Result<()> {
    let transport = Arc::new(LocalTransport::new());
    let _tx = transport.register("job-7").await;
    let notifier = Arc::new(CountingNotifier::default());
    let mut session =
        MeetingSession::new(SessionConfig::for_job("job-7"), transport.clone(), notifier);

    session.start().await?;
    let first = session.stop().await?;
    assert_eq!(first.status, JobStatus::Idle);

    let second = session.stop().await?;
    assert_eq!(second.status, JobStatus::Idle);
    Ok(())
}
