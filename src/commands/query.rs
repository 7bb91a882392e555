//! Ask and chat commands
//!
//! `ask` is one stateless round trip. `chat` keeps a strictly alternating
//! user/assistant transcript in memory only; every round sends the full
//! transcript plus the new user turn, and a failed round leaves the
//! transcript unchanged.

use crate::config::{Config, MAX_NUM_RESULTS};
use crate::error::{Error, Result};
use crate::remote::{AnswerInput, AnswerRequest, ChatMessage, VectorStoreClient};
use std::io::{BufRead, Write};
use tracing::error;

/// Single-shot retrieval-augmented answer against one store.
pub fn cmd_ask(
    remote: &dyn VectorStoreClient,
    config: &Config,
    store_id: &str,
    question: &str,
) -> Result<String> {
    let req = AnswerRequest {
        model: config.model.clone(),
        system_prompt: config.system_prompt.clone(),
        input: AnswerInput::Question(question.to_string()),
        store_ids: vec![store_id.to_string()],
        max_results: MAX_NUM_RESULTS,
    };

    remote.answer(&req).map_err(|e| {
        match &e {
            Error::RemoteRequest(msg) => error!("The remote service rejected the request: {}", msg),
            other => error!("Remote call failed: {}", other),
        }
        e
    })
}

/// What one line of chat input means.
#[derive(Debug, PartialEq, Eq)]
enum ChatControl {
    Exit,
    Clear,
    Say,
}

fn parse_chat_line(line: &str) -> ChatControl {
    match line.to_lowercase().as_str() {
        "/exit" | "/quit" => ChatControl::Exit,
        "/clear" => ChatControl::Clear,
        _ => ChatControl::Say,
    }
}

/// Interactive chat loop over stdin/stdout.
pub fn cmd_chat(remote: &dyn VectorStoreClient, config: &Config, store_id: &str) -> Result<()> {
    println!("Starting chat against vector store {store_id}");
    println!("Type your question. Commands: /exit, /quit, /clear\n");

    let stdin = std::io::stdin();
    let mut history: Vec<ChatMessage> = Vec::new();

    loop {
        print!("you: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("\nLeaving chat.");
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match parse_chat_line(input) {
            ChatControl::Exit => {
                println!("Leaving chat.");
                break;
            }
            ChatControl::Clear => {
                history.clear();
                println!("(History cleared.)");
                continue;
            }
            ChatControl::Say => {}
        }

        let mut transcript = history.clone();
        transcript.push(ChatMessage::user(input));

        let req = AnswerRequest {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            input: AnswerInput::Transcript(transcript),
            store_ids: vec![store_id.to_string()],
            max_results: MAX_NUM_RESULTS,
        };

        match remote.answer(&req) {
            Ok(answer) => {
                println!("\nassistant: {answer}\n");
                history.push(ChatMessage::user(input));
                history.push(ChatMessage::assistant(answer));
            }
            Err(Error::RemoteRequest(msg)) => {
                // failed exchange is not appended; the loop continues
                error!("The remote service rejected the request: {}", msg);
            }
            Err(other) => {
                error!("Remote call failed: {}", other);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Role;
    use std::cell::RefCell;
    use std::path::Path;

    struct ScriptedRemote {
        requests: RefCell<Vec<AnswerRequest>>,
        reply: Result<String>,
    }

    impl ScriptedRemote {
        fn answering(text: &str) -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                reply: Ok(text.to_string()),
            }
        }
    }

    impl VectorStoreClient for ScriptedRemote {
        fn create_store(&self, _name: &str) -> Result<String> {
            unreachable!("query commands never create stores")
        }

        fn upload_file(&self, _store_id: &str, _path: &Path) -> Result<String> {
            unreachable!("query commands never upload")
        }

        fn answer(&self, req: &AnswerRequest) -> Result<String> {
            self.requests.borrow_mut().push(req.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(Error::RemoteRequest(msg)) => Err(Error::RemoteRequest(msg.clone())),
                Err(_) => Err(Error::RemoteTransport("scripted".to_string())),
            }
        }
    }

    fn test_config() -> Config {
        Config {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost".to_string(),
            model: "test-model".to_string(),
            system_prompt: Some("be terse".to_string()),
            cache_path: std::env::temp_dir().join("ragdex-test.json"),
        }
    }

    #[test]
    fn test_ask_scopes_request_to_the_store() {
        let remote = ScriptedRemote::answering("42");
        let answer = cmd_ask(&remote, &test_config(), "vs_q", "what?").unwrap();
        assert_eq!(answer, "42");

        let requests = remote.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].store_ids, vec!["vs_q".to_string()]);
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].system_prompt.as_deref(), Some("be terse"));
        assert_eq!(requests[0].max_results, MAX_NUM_RESULTS);
        match &requests[0].input {
            AnswerInput::Question(q) => assert_eq!(q, "what?"),
            AnswerInput::Transcript(_) => panic!("ask sends a bare question"),
        }
    }

    #[test]
    fn test_ask_propagates_remote_rejection() {
        let remote = ScriptedRemote {
            requests: RefCell::new(Vec::new()),
            reply: Err(Error::RemoteRequest("400: bad".to_string())),
        };
        assert!(matches!(
            cmd_ask(&remote, &test_config(), "vs_q", "what?"),
            Err(Error::RemoteRequest(_))
        ));
    }

    #[test]
    fn test_parse_chat_line() {
        assert_eq!(parse_chat_line("/exit"), ChatControl::Exit);
        assert_eq!(parse_chat_line("/QUIT"), ChatControl::Exit);
        assert_eq!(parse_chat_line("/clear"), ChatControl::Clear);
        assert_eq!(parse_chat_line("why?"), ChatControl::Say);
    }

    #[test]
    fn test_transcript_alternates_roles() {
        let mut history = vec![
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
        ];
        history.push(ChatMessage::user("q2"));
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }
}
