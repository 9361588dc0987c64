//! Builds default execution plans per request type.

use tracing::debug;

use super::models::{AgentSpec, ExecutionPlan, PlanStage, RequestType, RetrievalMode};

pub struct Planner;

impl Planner {
    /// Fixed plan shapes; a dynamic planner can replace this without
    /// touching the executor.
    pub fn build_plan(
        request_id: &str,
        request_type: RequestType,
        retrieval_mode: RetrievalMode,
    ) -> ExecutionPlan {
        let plan_id = format!("plan_{request_id}");

        let stages = match request_type {
            RequestType::Draft => {
                let mut first_stage = vec![AgentSpec::new("summarizer")
                    .with_reason("Condense the selected contents")];
                if matches!(retrieval_mode, RetrievalMode::WebOnly | RetrievalMode::Both) {
                    first_stage
                        .push(AgentSpec::new("researcher").with_reason("Gather web context"));
                }
                let parallel = first_stage.len() > 1;

                vec![
                    PlanStage {
                        index: 1,
                        parallel,
                        agents: first_stage,
                    },
                    PlanStage {
                        index: 2,
                        parallel: false,
                        agents: vec![AgentSpec::new("writer").with_reason("Produce the draft")],
                    },
                ]
            }
            RequestType::Ask => vec![PlanStage {
                index: 1,
                parallel: false,
                agents: vec![AgentSpec::new("writer").with_reason("Answer the question")],
            }],
        };

        debug!(%plan_id, stages = stages.len(), "Execution plan created");

        ExecutionPlan {
            plan_id,
            request_type,
            retrieval_mode,
            stages,
            metadata: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_plan_shape() {
        let plan = Planner::build_plan("r1", RequestType::Draft, RetrievalMode::Auto);
        assert_eq!(plan.plan_id, "plan_r1");
        assert_eq!(plan.stages.len(), 2);
        assert_eq!(plan.stages[0].agents[0].agent, "summarizer");
        assert!(!plan.stages[0].parallel);
        assert_eq!(plan.stages[1].agents[0].agent, "writer");
    }

    #[test]
    fn test_draft_plan_with_web_retrieval_fans_out() {
        let plan = Planner::build_plan("r2", RequestType::Draft, RetrievalMode::Both);
        assert!(plan.stages[0].parallel);
        let agents: Vec<_> = plan.stages[0].agents.iter().map(|a| a.agent.clone()).collect();
        assert_eq!(agents, vec!["summarizer", "researcher"]);
    }

    #[test]
    fn test_ask_plan_is_writer_only() {
        let plan = Planner::build_plan("r3", RequestType::Ask, RetrievalMode::RagOnly);
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.stages[0].agents[0].agent, "writer");
    }
}
