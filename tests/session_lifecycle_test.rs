//! Session lifecycle tests driving real `/bin/sh` tools
#![cfg(unix)]

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

use toolbridge::BridgeError;
use toolbridge::config::Config;
use toolbridge::notify::{Markup, Notifier, OutboundMessage};
use toolbridge::session::{InputSource, SessionContext, SessionRegistry, StopOutcome};

struct Harness {
    dir: TempDir,
    registry: Arc<SessionRegistry>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Harness {
    /// Registry whose tool is `/bin/sh <script>` with fast flushing
    fn with_script(script: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        let script_path = dir.path().join("tool.sh");
        fs::write(&script_path, script)?;

        let mut config = Config::default();
        config.tool.program = "/bin/sh".to_string();
        config.tool.entry_point = Some(script_path);
        config.tool.env.clear();
        config.tool.stop_grace_ms = 1000;
        config.buffer.flush_idle_ms = 200;
        config.buffer.poll_interval_ms = 50;
        config.journal.dir = dir.path().join("journal");

        Self::with_config(dir, config)
    }

    fn with_config(dir: TempDir, config: Config) -> Result<Self> {
        let (notifier, outbound) = Notifier::channel(config.buffer.max_message_chars);
        let registry = SessionRegistry::new(SessionContext::from_config(config, notifier)?);

        Ok(Self {
            dir,
            registry: Arc::new(registry),
            outbound,
        })
    }

    async fn next_message(&mut self) -> OutboundMessage {
        timeout(Duration::from_secs(10), self.outbound.recv())
            .await
            .expect("no outbound message within 10 seconds")
            .expect("notification channel closed")
    }

    /// Collect messages until the completion notice arrives
    async fn messages_until_finished(&mut self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        loop {
            let message = self.next_message().await;
            let finished = message.text.starts_with("🔚");
            messages.push(message);
            if finished {
                return messages;
            }
        }
    }

    fn journal(&self, user_id: i64) -> String {
        let path: PathBuf = self.dir.path().join("journal").join(format!("{}.log", user_id));
        fs::read_to_string(path).unwrap_or_default()
    }
}

const ECHO_TOOL: &str = r#"
while read line; do
  echo "got $line"
done
"#;

#[tokio::test]
async fn test_menu_is_flushed_with_buttons_and_choice_is_routed() -> Result<()> {
    let mut harness = Harness::with_script(
        r#"
echo "Welcome"
echo "1. Login"
echo "2. Exit"
printf "Pilih menu: "
read choice
echo "You chose $choice"
read again
"#,
    )?;
    let session = harness.registry.get_or_create(1, 10).await;

    assert_ok!(session.start().await);

    let message = harness.next_message().await;
    assert_eq!(message.chat_id, 10);
    assert_eq!(
        message.text,
        "Welcome\nPilih menu:\n\n📋 Menu:\n1. Login\n2. Exit"
    );
    match &message.markup {
        Some(Markup::Menu(menu)) => {
            let codes: Vec<_> = menu.buttons().map(|b| b.code.as_str()).collect();
            assert_eq!(codes, vec!["1", "2"]);
        }
        other => panic!("expected menu markup, got {:?}", other),
    }
    assert_eq!(session.input_state().await.prompt(), Some("Pilih menu:"));

    assert_ok!(session.route_input("01", InputSource::MenuChoice).await);
    let message = harness.next_message().await;
    assert_eq!(message.text, "You chose 1");
    assert!(message.markup.is_none());

    assert_eq!(session.stop().await, StopOutcome::Stopped);
    assert!(harness.journal(1).contains("[IN] choice -> 1"));
    Ok(())
}

#[tokio::test]
async fn test_press_enter_is_answered_automatically() -> Result<()> {
    let mut harness = Harness::with_script(
        r#"
echo "Step one"
echo "Press ENTER to continue..."
read dummy
echo "after enter"
"#,
    )?;
    let session = harness.registry.get_or_create(1, 10).await;

    assert_ok!(session.start().await);
    let messages = harness.messages_until_finished().await;

    let text: String = messages
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("Step one"));
    assert!(text.contains("after enter"));
    assert!(!text.to_lowercase().contains("press enter"));

    let finished = messages.last().unwrap();
    assert_eq!(finished.markup, Some(Markup::Controls));

    let status = session.status().await;
    assert_eq!(status.counters.auto_continues, 1);
    assert!(!status.running);
    assert!(harness.journal(1).contains("[AUTO]"));
    Ok(())
}

#[tokio::test]
async fn test_start_stop_lifecycle() -> Result<()> {
    let harness = Harness::with_script(ECHO_TOOL)?;
    let session = harness.registry.get_or_create(1, 10).await;

    assert_eq!(session.stop().await, StopOutcome::NotRunning);

    let pid = assert_ok!(session.start().await);
    assert!(pid > 0);
    assert!(session.is_running().await);
    assert_eq!(session.status().await.pid, Some(pid));

    let err = assert_err!(session.start().await);
    assert!(matches!(err, BridgeError::AlreadyRunning));

    assert_eq!(session.stop().await, StopOutcome::Stopped);
    assert!(!session.is_running().await);
    assert_eq!(session.status().await.pid, None);
    assert_eq!(session.stop().await, StopOutcome::NotRunning);

    let err = assert_err!(
        session
            .route_input("hello", InputSource::Text)
            .await
    );
    assert!(matches!(err, BridgeError::NotRunning));
    Ok(())
}

#[tokio::test]
async fn test_free_text_round_trip_and_restart() -> Result<()> {
    let mut harness = Harness::with_script(ECHO_TOOL)?;
    let session = harness.registry.get_or_create(1, 10).await;

    assert_ok!(session.start().await);
    assert_ok!(session.route_input("  hello  ", InputSource::Text).await);
    assert_eq!(harness.next_message().await.text, "got hello");

    assert_eq!(session.reset().await, StopOutcome::Stopped);
    assert!(session.buffered_lines().await.is_empty());

    assert_ok!(session.start().await);
    assert_ok!(session.route_input("again", InputSource::Text).await);
    assert_eq!(harness.next_message().await.text, "got again");

    assert_eq!(harness.registry.shutdown_all().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_sessions_are_isolated() -> Result<()> {
    let mut harness = Harness::with_script(ECHO_TOOL)?;
    let alice = harness.registry.get_or_create(1, 10).await;
    let bob = harness.registry.get_or_create(2, 20).await;

    let alice_pid = assert_ok!(alice.start().await);
    let bob_pid = assert_ok!(bob.start().await);
    assert_ne!(alice_pid, bob_pid);

    assert_ok!(alice.route_input("from alice", InputSource::Text).await);
    assert_ok!(bob.route_input("from bob", InputSource::Text).await);

    let mut received = vec![
        harness.next_message().await,
        harness.next_message().await,
    ];
    received.sort_by_key(|m| m.chat_id);
    assert_eq!(received[0].chat_id, 10);
    assert_eq!(received[0].text, "got from alice");
    assert_eq!(received[1].chat_id, 20);
    assert_eq!(received[1].text, "got from bob");

    assert_eq!(alice.stop().await, StopOutcome::Stopped);
    assert!(bob.is_running().await);

    let summaries = harness.registry.list().await;
    assert_eq!(summaries.len(), 2);
    assert!(!summaries[0].running);
    assert!(summaries[1].running);

    assert_eq!(harness.registry.shutdown_all().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_unterminated_output_is_flushed_at_exit() -> Result<()> {
    let mut harness = Harness::with_script("printf 'goodbye'\n")?;
    let session = harness.registry.get_or_create(1, 10).await;

    assert_ok!(session.start().await);
    let messages = harness.messages_until_finished().await;

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "goodbye");
    assert!(!session.is_running().await);

    // a finished tool can be started again
    assert_ok!(session.start().await);
    harness.messages_until_finished().await;
    Ok(())
}

#[tokio::test]
async fn test_stderr_keeps_its_place_in_the_output() -> Result<()> {
    let mut harness = Harness::with_script(
        r#"
i=1
while [ $i -le 20 ]; do
  echo "o$i"
  echo "e$i" >&2
  i=$((i+1))
done
"#,
    )?;
    let session = harness.registry.get_or_create(1, 10).await;

    assert_ok!(session.start().await);
    let messages = harness.messages_until_finished().await;

    let received: Vec<String> = messages[..messages.len() - 1]
        .iter()
        .flat_map(|m| m.text.lines())
        .map(str::to_string)
        .collect();
    let expected: Vec<String> = (1..=20)
        .flat_map(|i| [format!("o{}", i), format!("e{}", i)])
        .collect();
    assert_eq!(received, expected);
    Ok(())
}

#[tokio::test]
async fn test_stuck_input_write_times_out() -> Result<()> {
    let harness = Harness::with_script("sleep 30\n")?;
    let session = harness.registry.get_or_create(1, 10).await;

    assert_ok!(session.start().await);

    // far more than a pipe holds, to a tool that never reads
    let paste = "x".repeat(1 << 20);
    let err = assert_err!(
        timeout(
            Duration::from_secs(10),
            session.route_input(&paste, InputSource::Text)
        )
        .await?
    );
    assert!(matches!(err, BridgeError::InputWrite(_)));
    assert_eq!(session.status().await.counters.inputs_routed, 0);

    assert_eq!(session.stop().await, StopOutcome::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_missing_executable_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = Config::default();
    config.tool.program = dir.path().join("no-such-tool").display().to_string();
    config.tool.entry_point = None;
    config.journal.enabled = false;

    let harness = Harness::with_config(dir, config)?;
    let session = harness.registry.get_or_create(1, 10).await;

    let err = assert_err!(session.start().await);
    assert!(matches!(err, BridgeError::ToolNotFound(_)));
    assert!(!session.is_running().await);
    Ok(())
}
