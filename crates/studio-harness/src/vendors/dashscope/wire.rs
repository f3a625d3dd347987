//! DashScope request/response envelopes.

use serde::{Deserialize, Serialize};

use crate::content::{Artifact, ChatMessage, MessageRole};
use crate::provider::{JobSnapshot, JobStatus};

#[derive(Debug, Serialize)]
pub(crate) struct GenerationRequest<'a> {
    pub model: &'a str,
    pub input: GenerationInput<'a>,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum GenerationInput<'a> {
    Messages { messages: Vec<WireMessage<'a>> },
    Prompt { prompt: &'a str },
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationParameters {
    pub result_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_output: Option<bool>,
}

impl<'a> WireMessage<'a> {
    /// `model` turns become `assistant`; everything else is sent as `user`.
    pub fn from_history(message: &'a ChatMessage) -> Option<Self> {
        if message.text.is_empty() {
            return None;
        }
        let role = match message.role {
            MessageRole::Model => "assistant",
            MessageRole::User | MessageRole::System => "user",
        };
        Some(Self {
            role,
            content: &message.text,
        })
    }
}

/// Body of a text-generation response, and of every frame of its stream.
#[derive(Debug, Deserialize)]
pub(crate) struct GenerationResponse {
    pub output: Option<GenerationOutput>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerationOutput {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageSynthesisRequest<'a> {
    pub model: &'a str,
    pub input: ImageInput<'a>,
    pub parameters: ImageParameters,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageInput<'a> {
    pub prompt: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageParameters {
    pub size: &'static str,
    pub n: u32,
}

/// Response of both the async submit call and `GET /api/v1/tasks/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct TaskResponse {
    pub output: Option<TaskOutput>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskOutput {
    pub task_id: Option<String>,
    pub task_status: Option<String>,
    /// DashScope sends `null` as well as omitting the field.
    pub results: Option<Vec<TaskResult>>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskResult {
    pub url: Option<String>,
}

impl TaskResponse {
    /// Maps the task envelope onto the provider-neutral snapshot.
    ///
    /// Returns `None` when the envelope carries no recognisable status.
    pub fn snapshot(self) -> Option<JobSnapshot> {
        let output = self.output?;
        let status = output.task_status.as_deref()?;
        Some(match status {
            "PENDING" => JobSnapshot::pending(),
            "RUNNING" | "SUSPENDED" | "UNKNOWN" => JobSnapshot::running(),
            "SUCCEEDED" => JobSnapshot::succeeded(
                output
                    .results
                    .into_iter()
                    .flatten()
                    .find_map(|r| r.url.filter(|u| !u.trim().is_empty()))
                    .map(Artifact::Url),
            ),
            "FAILED" | "CANCELED" => match output.message.or(self.message) {
                Some(message) => JobSnapshot::failed(message),
                None => JobSnapshot {
                    status: JobStatus::Failed,
                    artifact: None,
                    message: output.code.or(self.code),
                },
            },
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(json: serde_json::Value) -> Option<JobSnapshot> {
        serde_json::from_value::<TaskResponse>(json)
            .expect("task envelope")
            .snapshot()
    }

    #[test]
    fn task_statuses_map_onto_lifecycle() {
        assert_eq!(
            task(serde_json::json!({"output": {"task_id": "t", "task_status": "PENDING"}})),
            Some(JobSnapshot::pending())
        );
        assert_eq!(
            task(serde_json::json!({"output": {"task_status": "SUSPENDED"}})),
            Some(JobSnapshot::running())
        );
        assert_eq!(
            task(serde_json::json!({"output": {
                "task_status": "SUCCEEDED",
                "results": [{"url": "https://oss/x.png"}]
            }})),
            Some(JobSnapshot::succeeded(Some(Artifact::Url("https://oss/x.png".into()))))
        );
        assert_eq!(
            task(serde_json::json!({"output": {
                "task_status": "FAILED",
                "code": "DataInspectionFailed",
                "message": "Input data may contain inappropriate content."
            }})),
            Some(JobSnapshot::failed("Input data may contain inappropriate content."))
        );
        assert_eq!(task(serde_json::json!({"output": {"task_status": "WEIRD"}})), None);
        assert_eq!(task(serde_json::json!({"code": "Throttling"})), None);
    }

    #[test]
    fn succeeded_without_results_has_no_artifact() {
        let snapshot = task(serde_json::json!({"output": {"task_status": "SUCCEEDED", "results": []}}))
            .expect("snapshot");
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.artifact, None);
    }

    #[test]
    fn null_or_missing_results_still_report_success() {
        for output in [
            serde_json::json!({"task_status": "SUCCEEDED", "results": null}),
            serde_json::json!({"task_status": "SUCCEEDED"}),
            serde_json::json!({"task_status": "SUCCEEDED", "results": [{"url": null}, {"url": ""}]}),
        ] {
            let snapshot = task(serde_json::json!({ "output": output })).expect("snapshot");
            assert_eq!(snapshot, JobSnapshot::succeeded(None));
        }
    }

    #[test]
    fn history_roles_are_mapped_and_empty_texts_dropped() {
        let history = [
            ChatMessage::user("hi"),
            ChatMessage::model("hello"),
            ChatMessage::model(""),
            ChatMessage::system("note"),
        ];
        let wire: Vec<_> = history.iter().filter_map(WireMessage::from_history).collect();
        assert_eq!(
            wire,
            vec![
                WireMessage { role: "user", content: "hi" },
                WireMessage { role: "assistant", content: "hello" },
                WireMessage { role: "user", content: "note" },
            ]
        );
    }
}
