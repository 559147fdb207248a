use async_trait::async_trait;

use super::{CompletenessJudge, JudgeError, JudgeRequest, Judgement};
use crate::types::Completeness;

/// Deterministic judge.
///
/// Complete when every step succeeded and every tool whose intent keywords
/// appear in the task has at least one successful output.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    pub fn evaluate(&self, request: JudgeRequest<'_>) -> Judgement {
        let results = request.results;
        let total = results.len();
        let succeeded = results.successful().count();

        if total == 0 || succeeded == 0 {
            let mut judgement = Judgement::new(
                Completeness::Failed,
                format!("None of the {} planned steps produced a result.", total),
            );
            judgement.limitations = step_errors(request);
            return judgement;
        }

        let failures = step_errors(request);
        let uncovered: Vec<&str> = request
            .catalog
            .iter()
            .filter(|meta| meta.matches_intent(request.task))
            .filter(|meta| !results.successful().any(|r| r.tool == meta.name))
            .map(|meta| meta.name.as_str())
            .collect();

        if failures.is_empty() && uncovered.is_empty() {
            return Judgement::new(
                Completeness::Complete,
                format!(
                    "All {} steps succeeded and every requested capability is covered.",
                    total
                ),
            );
        }

        let mut reasons = Vec::new();
        if !failures.is_empty() {
            reasons.push(format!("failed steps: {}", failures.join("; ")));
        }
        if !uncovered.is_empty() {
            reasons.push(format!(
                "no successful output for requested {}",
                uncovered.join(", ")
            ));
        }
        let mut judgement = Judgement::new(
            Completeness::Partial,
            format!(
                "{} of {} steps succeeded; {}.",
                succeeded,
                total,
                reasons.join("; ")
            ),
        );
        if !uncovered.is_empty() {
            judgement.suggested_refinement =
                Some(format!("Add or fix steps using: {}", uncovered.join(", ")));
        }
        judgement
    }
}

fn step_errors(request: JudgeRequest<'_>) -> Vec<String> {
    request
        .results
        .failed()
        .map(|r| {
            format!(
                "{}: {}",
                r.tool,
                r.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect()
}

#[async_trait]
impl CompletenessJudge for HeuristicJudge {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn judge(&self, request: JudgeRequest<'_>) -> Result<Judgement, JudgeError> {
        Ok(self.evaluate(request))
    }
}
