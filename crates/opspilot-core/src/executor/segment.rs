use crate::types::Plan;

/// A unit of scheduling: either a run of steps dispatched together, or one
/// step that must see every earlier step finished before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Concurrent(Vec<usize>),
    Sequential(usize),
}

impl Segment {
    pub fn step_ids(&self) -> Vec<usize> {
        match self {
            Self::Concurrent(ids) => ids.clone(),
            Self::Sequential(id) => vec![*id],
        }
    }

    /// Keep only ids accepted by `keep`; `None` when nothing is left.
    pub fn retain(&self, keep: impl Fn(usize) -> bool) -> Option<Segment> {
        match self {
            Self::Concurrent(ids) => {
                let kept: Vec<usize> = ids.iter().copied().filter(|id| keep(*id)).collect();
                (!kept.is_empty()).then_some(Self::Concurrent(kept))
            }
            Self::Sequential(id) => keep(*id).then_some(Self::Sequential(*id)),
        }
    }
}

/// Split a plan into maximal runs of consecutive parallel-eligible steps,
/// with each non-eligible step as its own barrier segment.
pub fn partition_segments(plan: &Plan) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut run: Vec<usize> = Vec::new();
    for (idx, step) in plan.steps.iter().enumerate() {
        if step.parallel {
            run.push(idx);
            continue;
        }
        if !run.is_empty() {
            segments.push(Segment::Concurrent(std::mem::take(&mut run)));
        }
        segments.push(Segment::Sequential(idx));
    }
    if !run.is_empty() {
        segments.push(Segment::Concurrent(run));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Step;

    #[test]
    fn test_partition_groups_consecutive_parallel_steps() {
        let plan = Plan::new(
            "g",
            vec![
                Step::new(0, "a"),
                Step::new(1, "b"),
                Step::new(2, "c").sequential(),
                Step::new(3, "d"),
                Step::new(4, "e").sequential(),
                Step::new(5, "f").sequential(),
            ],
        );
        assert_eq!(
            partition_segments(&plan),
            vec![
                Segment::Concurrent(vec![0, 1]),
                Segment::Sequential(2),
                Segment::Concurrent(vec![3]),
                Segment::Sequential(4),
                Segment::Sequential(5),
            ]
        );
        assert!(partition_segments(&Plan::default()).is_empty());
    }

    #[test]
    fn test_segment_retain() {
        let seg = Segment::Concurrent(vec![0, 1, 2]);
        assert_eq!(seg.retain(|id| id != 1), Some(Segment::Concurrent(vec![0, 2])));
        assert_eq!(seg.retain(|_| false), None);
        assert_eq!(Segment::Sequential(3).retain(|id| id == 3), Some(Segment::Sequential(3)));
    }
}
