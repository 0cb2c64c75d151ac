use trellis_core::types::{FailurePolicy, GraphRunStatus, NodeState};

use crate::run::NodeRun;

/// Derive the terminal status of a run from its node records.
///
/// Pure and order-independent: the same set of outcomes always yields the
/// same status.
pub fn aggregate_status(policy: FailurePolicy, runs: &[NodeRun]) -> GraphRunStatus {
    if runs.iter().all(|r| r.state == NodeState::Completed) {
        return GraphRunStatus::Success;
    }
    if runs.iter().any(|r| !r.state.is_terminal()) {
        return GraphRunStatus::Failure;
    }

    let skipped = runs.iter().any(|r| r.state == NodeState::Skipped);
    let failed = runs.iter().filter(|r| r.state == NodeState::Failed).count();

    match policy {
        // A skip means a failure blocked required downstream work.
        FailurePolicy::SkipDescendants if skipped => GraphRunStatus::Failure,
        FailurePolicy::SkipDescendants => GraphRunStatus::PartialFailure,
        FailurePolicy::BestEffort if skipped || failed == runs.len() => GraphRunStatus::Failure,
        FailurePolicy::BestEffort => GraphRunStatus::PartialFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::types::NodeId;

    fn run(name: &str, state: NodeState) -> NodeRun {
        let mut r = NodeRun::new(NodeId::new(name));
        r.state = state;
        r
    }

    #[test]
    fn test_all_completed_is_success() {
        let runs = vec![run("a", NodeState::Completed), run("b", NodeState::Completed)];
        assert_eq!(aggregate_status(FailurePolicy::SkipDescendants, &runs), GraphRunStatus::Success);
        assert_eq!(aggregate_status(FailurePolicy::BestEffort, &runs), GraphRunStatus::Success);
    }

    #[test]
    fn test_empty_graph_is_success() {
        assert_eq!(aggregate_status(FailurePolicy::SkipDescendants, &[]), GraphRunStatus::Success);
    }

    #[test]
    fn test_failed_leaf_is_partial_failure() {
        let runs = vec![run("a", NodeState::Completed), run("leaf", NodeState::Failed)];
        assert_eq!(
            aggregate_status(FailurePolicy::SkipDescendants, &runs),
            GraphRunStatus::PartialFailure
        );
    }

    #[test]
    fn test_skip_is_failure() {
        let runs = vec![
            run("a", NodeState::Failed),
            run("b", NodeState::Completed),
            run("c", NodeState::Skipped),
        ];
        assert_eq!(aggregate_status(FailurePolicy::SkipDescendants, &runs), GraphRunStatus::Failure);
    }

    #[test]
    fn test_best_effort() {
        let some_failed = vec![run("a", NodeState::Failed), run("b", NodeState::Completed)];
        assert_eq!(
            aggregate_status(FailurePolicy::BestEffort, &some_failed),
            GraphRunStatus::PartialFailure
        );

        let all_failed = vec![run("a", NodeState::Failed), run("b", NodeState::Failed)];
        assert_eq!(aggregate_status(FailurePolicy::BestEffort, &all_failed), GraphRunStatus::Failure);
    }

    #[test]
    fn test_order_independent() {
        let mut runs = vec![
            run("a", NodeState::Completed),
            run("b", NodeState::Failed),
            run("c", NodeState::Skipped),
        ];
        let forward = aggregate_status(FailurePolicy::SkipDescendants, &runs);
        runs.reverse();
        assert_eq!(aggregate_status(FailurePolicy::SkipDescendants, &runs), forward);
    }
}
