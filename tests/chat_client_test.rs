//! End to end tests of the stream consumer against a running relay

mod test_utils;

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use chatrelay::chat::store::TRANSCRIPT_KEY;
    use chatrelay::chat::{KvStore, MemoryStore, Settings, StreamConsumer, TranscriptState};
    use chatrelay::openai::Role;
    use mockito::Matcher;
    use serde_json::json;

    use crate::test_utils::{spawn_app, sse_body, test_config};

    fn settings() -> Settings {
        Settings {
            system_prompt: "Be terse.".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            base_url: None,
        }
    }

    /// Tests every published draft is a prefix of the final reply
    #[tokio::test]
    async fn it_streams_the_reply_into_the_draft() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(sse_body(&["He", "llo"]))
            .create_async()
            .await;
        let relay_url = spawn_app(test_config(&server.url(), Some("test-api-key"))).await;

        let store = Arc::new(MemoryStore::new());
        let transcript = Arc::new(TranscriptState::restore(store.clone()));
        let consumer = StreamConsumer::new(
            &format!("{}/api/chat", relay_url),
            settings(),
            Arc::clone(&transcript),
        );
        let mut updates = transcript.subscribe();

        consumer.send("Hi").await.unwrap();

        let mut snapshots = Vec::new();
        while let Ok(snapshot) = updates.try_recv() {
            snapshots.push(snapshot);
        }

        // The user turn and empty draft show up before any reply text
        let first = &snapshots[0];
        assert!(first.is_streaming);
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].content, "Hi");
        assert_eq!(first.messages[1].content, "");

        for snapshot in &snapshots {
            assert!("Hello".starts_with(snapshot.messages[1].content.as_str()));
        }

        let last = snapshots.last().unwrap();
        assert!(!last.is_streaming);
        assert_eq!(last.messages[1].role, Role::Assistant);
        assert_eq!(last.messages[1].content, "Hello");
        assert!(!consumer.is_streaming());

        // The finished turn is saved
        let saved = store.get(TRANSCRIPT_KEY).unwrap();
        assert_eq!(saved[1]["content"], "Hello");
    }

    /// Tests the transcript is saved while the reply is still streaming
    #[tokio::test]
    async fn it_saves_the_draft_mid_stream() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_chunked_body(|w| {
                let body = sse_body(&["He", "llo"]);
                let (first, rest) = body.split_at(body.find("\n\n").unwrap() + 2);
                w.write_all(first.as_bytes())?;
                w.flush()?;
                std::thread::sleep(Duration::from_millis(1500));
                w.write_all(rest.as_bytes())
            })
            .create_async()
            .await;
        let relay_url = spawn_app(test_config(&server.url(), Some("test-api-key"))).await;

        let store = Arc::new(MemoryStore::new());
        let transcript = Arc::new(TranscriptState::restore(store.clone()));
        let consumer = Arc::new(StreamConsumer::new(
            &format!("{}/api/chat", relay_url),
            settings(),
            Arc::clone(&transcript),
        ));
        let send = tokio::spawn({
            let consumer = Arc::clone(&consumer);
            async move { consumer.send("Hi").await }
        });

        // Wait for the first delta to land in the saved draft
        let mut saved = None;
        for _ in 0..100 {
            if let Some(value) = store.get(TRANSCRIPT_KEY) {
                if value[1]["content"] == "He" {
                    saved = Some(value);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let saved = saved.expect("draft was not saved while streaming");
        assert_eq!(saved[0]["content"], "Hi");
        assert!(consumer.is_streaming());

        send.await.unwrap().unwrap();

        let saved = store.get(TRANSCRIPT_KEY).unwrap();
        assert_eq!(saved[1]["content"], "Hello");
        assert!(!consumer.is_streaming());
    }

    /// Tests the conversation sent upstream starts with a fresh system prompt
    #[tokio::test]
    async fn it_sends_system_prompt_and_history() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Json(json!({
                "model": "gpt-4o",
                "temperature": 0.7,
                "stream": true,
                "messages": [
                    {"role": "system", "content": "Be terse."},
                    {"role": "user", "content": "one"}
                ]
            })))
            .with_status(200)
            .with_body(sse_body(&["reply"]))
            .create_async()
            .await;
        let second = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Json(json!({
                "model": "gpt-4o",
                "temperature": 0.7,
                "stream": true,
                "messages": [
                    {"role": "system", "content": "Be terse."},
                    {"role": "user", "content": "one"},
                    {"role": "assistant", "content": "reply"},
                    {"role": "user", "content": "two"}
                ]
            })))
            .with_status(200)
            .with_body(sse_body(&["again"]))
            .create_async()
            .await;
        let relay_url = spawn_app(test_config(&server.url(), Some("test-api-key"))).await;

        let transcript = Arc::new(TranscriptState::new());
        let consumer = StreamConsumer::new(
            &format!("{}/api/chat", relay_url),
            settings(),
            Arc::clone(&transcript),
        );

        consumer.send("one").await.unwrap();
        consumer.send("two").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let contents: Vec<String> = transcript
            .messages()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "reply", "two", "again"]);
    }

    /// Tests an upstream failure ends up inline in the assistant's turn
    #[tokio::test]
    async fn it_reports_upstream_errors_in_the_draft() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;
        let relay_url = spawn_app(test_config(&server.url(), Some("test-api-key"))).await;

        let transcript = Arc::new(TranscriptState::new());
        let consumer = StreamConsumer::new(
            &format!("{}/api/chat", relay_url),
            settings(),
            Arc::clone(&transcript),
        );

        consumer.send("Hi").await.unwrap();

        let messages = transcript.messages();
        assert_eq!(messages[0].content, "Hi");
        let reply = &messages[1].content;
        assert!(reply.starts_with("Error:"));
        assert!(reply.contains("429"));
        assert!(reply.contains("rate limited"));
        assert!(!consumer.is_streaming());
    }

    /// Tests a missing credential is reported without touching earlier turns
    #[tokio::test]
    async fn it_reports_a_missing_api_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;
        let relay_url = spawn_app(test_config(&server.url(), None)).await;

        let transcript = Arc::new(TranscriptState::new());
        transcript
            .append(chatrelay::chat::ChatMessage::new(Role::User, "earlier"))
            .unwrap();
        let consumer = StreamConsumer::new(
            &format!("{}/api/chat", relay_url),
            settings(),
            Arc::clone(&transcript),
        );

        consumer.send("Hi").await.unwrap();

        let messages = transcript.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "earlier");
        assert!(messages[2].content.starts_with("Error:"));
        assert!(messages[2].content.contains("Missing API key"));
        mock.assert_async().await;
    }
}
