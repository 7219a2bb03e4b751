use serde::Serialize;
use std::fmt;

use crate::tmux::Responsiveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Healthy,
    Degraded,
    Critical,
}

impl HealthTier {
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => HealthTier::Healthy,
            50..=79 => HealthTier::Degraded,
            _ => HealthTier::Critical,
        }
    }
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthTier::Healthy => "healthy",
            HealthTier::Degraded => "degraded",
            HealthTier::Critical => "critical",
        })
    }
}

/// Team-level summary of agent responsiveness
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub total: usize,
    pub responsive: usize,
    /// `responsive * 100 / total`, or `None` with no agents
    pub score: Option<u32>,
    pub tier: HealthTier,
}

impl HealthReport {
    pub fn from_buckets<I>(buckets: I) -> Self
    where
        I: IntoIterator<Item = Responsiveness>,
    {
        let (mut total, mut responsive) = (0usize, 0usize);
        for bucket in buckets {
            total += 1;
            if bucket.is_responsive() {
                responsive += 1;
            }
        }

        let score = (total > 0).then(|| (responsive * 100 / total) as u32);
        let tier = score.map(HealthTier::from_score).unwrap_or(HealthTier::Critical);

        Self {
            total,
            responsive,
            score,
            tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Responsiveness::*;

    #[test]
    fn test_integer_division() {
        let report = HealthReport::from_buckets([Yes, Waiting, No]);
        assert_eq!(report.total, 3);
        assert_eq!(report.responsive, 2);
        assert_eq!(report.score, Some(66));
        assert_eq!(report.tier, HealthTier::Degraded);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(HealthTier::from_score(100), HealthTier::Healthy);
        assert_eq!(HealthTier::from_score(80), HealthTier::Healthy);
        assert_eq!(HealthTier::from_score(79), HealthTier::Degraded);
        assert_eq!(HealthTier::from_score(50), HealthTier::Degraded);
        assert_eq!(HealthTier::from_score(49), HealthTier::Critical);
        assert_eq!(HealthTier::from_score(0), HealthTier::Critical);
    }

    #[test]
    fn test_all_responsive() {
        let report = HealthReport::from_buckets([Yes, Yes, Waiting, Yes]);
        assert_eq!(report.score, Some(100));
        assert_eq!(report.tier, HealthTier::Healthy);
    }

    #[test]
    fn test_no_agents() {
        let report = HealthReport::from_buckets(std::iter::empty());
        assert_eq!(report.total, 0);
        assert_eq!(report.score, None);
        assert_eq!(report.tier, HealthTier::Critical);
    }
}
