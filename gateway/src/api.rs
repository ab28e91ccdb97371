use opsgate_core::CallOutcome;
use serde::{Deserialize, Serialize};

// Input: POST /run?task=...
#[derive(Debug, Deserialize)]
pub struct RunParams {
    pub task: String,
}

// Input: GET /read?path=...
#[derive(Debug, Deserialize)]
pub struct ReadParams {
    pub path: String,
}

// Output: fixed acknowledgement plus one outcome per tool call
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub task: &'static str,
    pub calls: Vec<CallOutcome>,
}

impl RunResponse {
    pub fn completed(calls: Vec<CallOutcome>) -> Self {
        Self {
            task: "completed",
            calls,
        }
    }
}
