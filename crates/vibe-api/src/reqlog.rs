use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::error;

/// Append-only JSONL request logging: one file per day per record kind.
///
/// Logging failures are themselves only logged; they never propagate into
/// the request path.
pub struct RequestLog {
    logs_dir: PathBuf,
}

impl RequestLog {
    pub fn new(logs_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&logs_dir) {
            error!("Failed to create logs directory {}: {}", logs_dir.display(), e);
        }
        Self { logs_dir }
    }

    fn append(&self, kind: &str, entry: &Value) {
        let file_name = format!("{}_{}.log", kind, Utc::now().format("%Y%m%d"));
        let path = self.logs_dir.join(file_name);

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", entry));

        if let Err(e) = result {
            error!("Failed to write {} log entry: {}", kind, e);
        }
    }

    pub fn log_api_request(
        &self,
        endpoint: &str,
        request_data: Value,
        response_data: Option<Value>,
        error_message: Option<&str>,
    ) {
        self.append(
            "api_requests",
            &json!({
                "timestamp": Utc::now().to_rfc3339(),
                "type": "api_request",
                "endpoint": endpoint,
                "request_data": request_data,
                "response_data": response_data,
                "error": error_message,
                "success": error_message.is_none(),
            }),
        );
    }

    /// One composite record for a finished stream: the chunks plus their
    /// concatenation.
    pub fn log_streaming_response(&self, prompt: &str, chunks: &[String], metadata: Value) {
        let full_response = chunks.concat();
        self.append(
            "streaming_responses",
            &json!({
                "timestamp": Utc::now().to_rfc3339(),
                "type": "streaming_response",
                "prompt": prompt,
                "response_chunks": chunks,
                "full_response": full_response,
                "chunk_count": chunks.len(),
                "total_length": full_response.len(),
                "metadata": metadata,
            }),
        );
    }

    pub fn log_error(&self, error_type: &str, message: &str, context: Value) {
        self.append(
            "errors",
            &json!({
                "timestamp": Utc::now().to_rfc3339(),
                "type": "error",
                "error_type": error_type,
                "error_message": message,
                "context": context,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_entries(dir: &std::path::Path, kind: &str) -> Vec<Value> {
        let file_name = format!("{}_{}.log", kind, Utc::now().format("%Y%m%d"));
        let raw = fs::read_to_string(dir.join(file_name)).unwrap();
        raw.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn api_requests_append_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let log = RequestLog::new(dir.path().to_path_buf());

        log.log_api_request("/api/enhance-prompt", json!({"prompt": "x"}), None, None);
        log.log_api_request("/api/enhance-prompt", json!({"prompt": "y"}), None, Some("boom"));

        let entries = read_entries(dir.path(), "api_requests");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["success"], true);
        assert_eq!(entries[1]["success"], false);
        assert_eq!(entries[1]["error"], "boom");
    }

    #[test]
    fn streaming_record_is_composite() {
        let dir = tempfile::tempdir().unwrap();
        let log = RequestLog::new(dir.path().to_path_buf());

        let chunks = vec!["hel".to_string(), "lo".to_string()];
        log.log_streaming_response("prompt", &chunks, json!({"max_tokens": 100}));

        let entries = read_entries(dir.path(), "streaming_responses");
        assert_eq!(entries[0]["full_response"], "hello");
        assert_eq!(entries[0]["chunk_count"], 2);
        assert_eq!(entries[0]["total_length"], 5);
    }

    #[test]
    fn error_records_carry_context() {
        let dir = tempfile::tempdir().unwrap();
        let log = RequestLog::new(dir.path().to_path_buf());

        log.log_error("frontend_error", "TypeError", json!({"url": "/app"}));
        let entries = read_entries(dir.path(), "errors");
        assert_eq!(entries[0]["error_type"], "frontend_error");
        assert_eq!(entries[0]["context"]["url"], "/app");
    }
}
