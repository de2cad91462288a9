use serde::{Deserialize, Serialize};

/// The lifecycle state of a job.
///
/// A job moves through these states in one direction only:
/// `Waiting -> Running -> (Finished | Canceling -> Canceled)`, or `Waiting -> Canceled` when it is
/// canceled before it starts. [Observer](crate::Observer)s may also go straight from `Running` to
/// `Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created but not started yet.
    Waiting,
    Running,
    /// Cancellation was requested while running, and the task has not returned yet.
    Canceling,
    Canceled,
    Finished,
}

impl JobState {
    /// Finished and Canceled jobs never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Canceled)
    }

    pub(crate) fn can_become(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Waiting, Running)
                | (Waiting, Canceled)
                | (Running, Finished)
                | (Running, Canceling)
                | (Running, Canceled)
                | (Canceling, Canceled)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Waiting => "waiting",
            JobState::Running => "running",
            JobState::Canceling => "canceling",
            JobState::Canceled => "canceled",
            JobState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Which kind of job a value is. Mostly useful for serialized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Job,
    Observer,
    Aggregator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_transitions() {
        use JobState::*;
        let all = [Waiting, Running, Canceling, Canceled, Finished];
        let allowed = [
            (Waiting, Running),
            (Waiting, Canceled),
            (Running, Finished),
            (Running, Canceling),
            (Running, Canceled),
            (Canceling, Canceled),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_become(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_are_final() {
        use JobState::*;
        for state in [Canceled, Finished] {
            assert!(state.is_terminal());
            for next in [Waiting, Running, Canceling, Canceled, Finished] {
                assert!(!state.can_become(next));
            }
        }
    }

    #[test]
    fn serialized_names() {
        assert_eq!(
            serde_json::to_string(&JobState::Canceling).unwrap(),
            r#""canceling""#
        );
        assert_eq!(
            serde_json::to_string(&JobKind::Aggregator).unwrap(),
            r#""aggregator""#
        );
    }
}
