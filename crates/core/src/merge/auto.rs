use rand::seq::SliceRandom;
use rand::Rng;

/// Pairing plan for auto mode, expressed as indices into the clip list the
/// plan was computed from.
///
/// The largest-area clip is the spine and is never paired. The rest are
/// shuffled and popped two at a time; randomized grouping is the point of
/// this strategy, so the rng is injected rather than hidden, which is all
/// that makes a grouping reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoPlan {
    pub spine: usize,
    pub pairs: Vec<(usize, usize)>,
    pub leftover: Option<usize>,
}

/// Computes the pairing plan for clips with the given raw frame areas.
/// `areas` must be non-empty.
pub fn plan(areas: &[u64], rng: &mut impl Rng) -> AutoPlan {
    let mut order: Vec<usize> = (0..areas.len()).collect();
    // Descending by area; stable, so equal areas keep input order.
    order.sort_by(|&a, &b| areas[b].cmp(&areas[a]));

    let spine = order[0];
    let mut rest: Vec<usize> = order[1..].to_vec();
    rest.shuffle(rng);

    let mut pairs = Vec::new();
    let mut iter = rest.into_iter();
    let mut leftover = None;
    loop {
        match (iter.next(), iter.next()) {
            (Some(a), Some(b)) => pairs.push((a, b)),
            (Some(a), None) => {
                leftover = Some(a);
                break;
            }
            (None, _) => break,
        }
    }

    AutoPlan {
        spine,
        pairs,
        leftover,
    }
}
