use std::collections::BTreeMap;

/// True iff any known distance is strictly inside `threshold_miles`.
///
/// There is no hysteresis: a user hovering around the threshold flips the
/// result on every evaluation.
pub fn evaluate(distances: &BTreeMap<String, Option<f64>>, threshold_miles: f64) -> bool {
    distances
        .values()
        .flatten()
        .any(|distance| *distance < threshold_miles)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    InRange(f64),
    OutOfRange(f64),
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceReport {
    verdicts: Vec<(String, Verdict)>,
    in_range: bool,
}

impl PresenceReport {
    pub fn new(distances: &BTreeMap<String, Option<f64>>, threshold_miles: f64) -> Self {
        let verdicts = distances
            .iter()
            .map(|(user, distance)| {
                let verdict = match distance {
                    Some(d) if *d < threshold_miles => Verdict::InRange(*d),
                    Some(d) => Verdict::OutOfRange(*d),
                    None => Verdict::Unknown,
                };
                (user.clone(), verdict)
            })
            .collect();

        Self {
            verdicts,
            in_range: evaluate(distances, threshold_miles),
        }
    }

    pub fn in_range(&self) -> bool {
        self.in_range
    }

    pub fn verdicts(&self) -> impl Iterator<Item = (&str, Verdict)> {
        self.verdicts
            .iter()
            .map(|(user, verdict)| (user.as_str(), *verdict))
    }
}
