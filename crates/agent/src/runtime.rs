use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::extract::{extract, ActionRequest};
use crate::llm::{ConversationTurn, LlmClient};
use crate::prompt::SYSTEM_PROMPT;
use crate::tools::{ActionRegistry, DispatchError};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("completion request failed: {0:#}")]
    Completion(anyhow::Error),
}

/// Progress callbacks for whoever is driving the loop. All methods default to no-ops.
pub trait LoopObserver: Send + Sync {
    fn turn_started(&self, _turn: u32) {}
    fn model_replied(&self, _reply: &str) {}
    fn action_started(&self, _request: &ActionRequest) {}
    fn action_completed(&self, _response: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl LoopObserver for NoopObserver {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The model replied without requesting an action.
    Answered,
    /// The turn budget ran out; the last reply may still carry an unactioned request.
    BudgetExhausted,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub answer: String,
    pub turns: u32,
    pub termination: Termination,
    pub transcript: Vec<ConversationTurn>,
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    actions: ActionRegistry,
    max_turns: u32,
    observer: Arc<dyn LoopObserver>,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, actions: ActionRegistry, max_turns: u32) -> Self {
        Self { llm, actions, max_turns, observer: Arc::new(NoopObserver) }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs one command to completion. Only an unknown action, a broken parameter contract or a
    /// failed completion request stop the run early.
    pub async fn run(&self, command: &str) -> Result<RunReport, RuntimeError> {
        let mut transcript =
            vec![ConversationTurn::system(SYSTEM_PROMPT), ConversationTurn::user(command)];
        let mut answer = String::new();
        let mut turns = 0;

        while turns < self.max_turns {
            turns += 1;
            self.observer.turn_started(turns);

            let reply = self.llm.complete(&transcript).await.map_err(RuntimeError::Completion)?;
            self.observer.model_replied(&reply);
            transcript.push(ConversationTurn::assistant(reply.clone()));
            answer = reply;

            let response = match extract(&answer) {
                Ok(requests) => {
                    let Some(request) = requests.first() else {
                        info!(
                            event_name = "agent.loop.answered",
                            turns,
                            "model produced an answer"
                        );
                        return Ok(RunReport {
                            answer,
                            turns,
                            termination: Termination::Answered,
                            transcript,
                        });
                    };
                    if requests.len() > 1 {
                        warn!(
                            event_name = "agent.extract.extra_requests",
                            ignored = requests.len() - 1,
                            "only the first action request per reply is dispatched"
                        );
                    }

                    self.observer.action_started(request);
                    self.actions.dispatch(request).await?
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.extract.malformed",
                        error = %error,
                        "model produced a malformed action payload"
                    );
                    format!("Error: could not parse the action payload: {error}")
                }
            };

            self.observer.action_completed(&response);
            transcript.push(ConversationTurn::user(format!("Action_Response: {response}")));
        }

        warn!(
            event_name = "agent.loop.budget_exhausted",
            turns,
            max_turns = self.max_turns,
            "turn budget exhausted before a final answer"
        );
        Ok(RunReport { answer, turns, termination: Termination::BudgetExhausted, transcript })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use relaunch_core::restart::RestartError;
    use relaunch_core::workflow::WorkflowOutcome;

    use super::{AgentRuntime, LoopObserver, RuntimeError, Termination};
    use crate::extract::ActionRequest;
    use crate::llm::{ConversationTurn, LlmClient, Role};
    use crate::tools::{ActionRegistry, DispatchError, RestartHandler};

    const RESTART_REPLY: &str = r#"Thought: restart it.
Action:
{"function_name": "restart_application", "function_parms": {"customer_name": "Acme Corporation", "environment": "dv01", "application": "cbp"}}
PAUSE"#;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        seen: Mutex<Vec<Vec<ConversationTurn>>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().expect("seen lock").len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, turns: &[ConversationTurn]) -> Result<String> {
            self.seen.lock().expect("seen lock").push(turns.to_vec());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }
    }

    /// Always asks for another restart.
    struct InsistentLlm {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl LlmClient for InsistentLlm {
        async fn complete(&self, _turns: &[ConversationTurn]) -> Result<String> {
            *self.calls.lock().expect("calls lock") += 1;
            Ok(RESTART_REPLY.to_string())
        }
    }

    #[derive(Default)]
    struct CountingRestart {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl RestartHandler for CountingRestart {
        async fn restart(
            &self,
            customer_name: &str,
            environment: &str,
            application: &str,
        ) -> Result<WorkflowOutcome, RestartError> {
            *self.calls.lock().expect("calls lock") += 1;
            Ok(WorkflowOutcome::Success(format!(
                "Restarted {application} for {customer_name} and code AC15 in {environment} environment."
            )))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl LoopObserver for RecordingObserver {
        fn turn_started(&self, turn: u32) {
            self.events.lock().expect("events lock").push(format!("turn {turn}"));
        }

        fn action_started(&self, request: &ActionRequest) {
            self.events.lock().expect("events lock").push(format!("run {}", request.function_name));
        }
    }

    #[tokio::test]
    async fn action_then_answer_terminates_with_the_answer() {
        let llm = Arc::new(ScriptedLlm::new(&[
            RESTART_REPLY,
            "Answer: Successfully Triggered the restart of cbp application for Acme Corporation in dv01 environment.",
        ]));
        let restart = Arc::new(CountingRestart::default());
        let observer = Arc::new(RecordingObserver::default());
        let runtime = AgentRuntime::new(llm.clone(), ActionRegistry::new(restart.clone()), 4)
            .with_observer(observer.clone());

        let report = runtime.run("Restart Acme Corporation dv01 cbp").await.expect("run completes");

        assert_eq!(report.termination, Termination::Answered);
        assert_eq!(report.turns, 2);
        assert!(report.answer.starts_with("Answer: Successfully Triggered"));
        assert_eq!(*restart.calls.lock().expect("calls lock"), 1);

        let second_call = llm.seen.lock().expect("seen lock")[1].clone();
        let roles = second_call.iter().map(|turn| turn.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(
            second_call[3].content,
            "Action_Response: Restarted cbp for Acme Corporation and code AC15 in dv01 environment."
        );
        assert_eq!(
            observer.events.lock().expect("events lock").clone(),
            vec!["turn 1", "run restart_application", "turn 2"]
        );
    }

    #[tokio::test]
    async fn insistent_model_is_cut_off_at_the_turn_budget() {
        let llm = Arc::new(InsistentLlm { calls: Mutex::new(0) });
        let restart = Arc::new(CountingRestart::default());
        let runtime = AgentRuntime::new(llm.clone(), ActionRegistry::new(restart.clone()), 3);

        let report = runtime.run("Restart forever").await.expect("budget is not an error");

        assert_eq!(report.termination, Termination::BudgetExhausted);
        assert_eq!(report.turns, 3);
        assert_eq!(*llm.calls.lock().expect("calls lock"), 3);
        assert_eq!(*restart.calls.lock().expect("calls lock"), 3);
        assert_eq!(report.answer, RESTART_REPLY);
    }

    #[tokio::test]
    async fn unknown_action_aborts_the_run() {
        let llm = Arc::new(ScriptedLlm::new(&[
            r#"{"function_name": "drop_database", "function_parms": {}}"#,
            "Answer: never reached",
        ]));
        let actions = ActionRegistry::new(Arc::new(CountingRestart::default()));
        let runtime = AgentRuntime::new(llm.clone(), actions, 4);

        let error = runtime.run("do something").await.expect_err("unknown action is fatal");

        assert!(matches!(
            error,
            RuntimeError::Dispatch(DispatchError::UnknownAction { ref name, .. })
                if name == "drop_database"
        ));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_fed_back_to_the_model() {
        let llm = Arc::new(ScriptedLlm::new(&[
            r#"Action: {"function_name": "restart_application", "function_parms": {"customer_name": }}"#,
            "Answer: I could not form a valid request.",
        ]));
        let restart = Arc::new(CountingRestart::default());
        let runtime = AgentRuntime::new(llm.clone(), ActionRegistry::new(restart.clone()), 4);

        let report = runtime.run("Restart Acme").await.expect("run completes");

        assert_eq!(report.termination, Termination::Answered);
        assert_eq!(*restart.calls.lock().expect("calls lock"), 0);
        let feedback = &llm.seen.lock().expect("seen lock")[1][3];
        assert_eq!(feedback.role, Role::User);
        assert!(feedback
            .content
            .starts_with("Action_Response: Error: could not parse the action payload"));
    }

    #[tokio::test]
    async fn completion_failure_is_reported() {
        let llm = Arc::new(ScriptedLlm::new(&[]));
        let runtime =
            AgentRuntime::new(llm, ActionRegistry::new(Arc::new(CountingRestart::default())), 4);

        let error = runtime.run("hello").await.expect_err("no replies scripted");
        assert!(matches!(error, RuntimeError::Completion(_)));
        assert!(error.to_string().contains("script exhausted"));
    }
}
