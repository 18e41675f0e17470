use serde::{Deserialize, Serialize};

/// Job priority (higher values dispatch first).
///
/// Any integer is accepted; the named tiers are the values the platform
/// uses for its own jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPriority(pub i32);

impl JobPriority {
    pub const LOW: Self = Self(1);
    pub const NORMAL: Self = Self(5);
    pub const HIGH: Self = Self(10);
    pub const CRITICAL: Self = Self(20);

    /// Named tiers in order (low to high)
    pub fn tiers() -> &'static [JobPriority] {
        &[Self::LOW, Self::NORMAL, Self::HIGH, Self::CRITICAL]
    }

    /// Get the numeric value for ordering
    pub fn value(self) -> i32 {
        self.0
    }

    /// Get the tier name, if this is one of the named tiers
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::LOW => Some("low"),
            Self::NORMAL => Some("normal"),
            Self::HIGH => Some("high"),
            Self::CRITICAL => Some("critical"),
            _ => None,
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<i32> for JobPriority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl std::str::FromStr for JobPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::LOW),
            "normal" => Ok(Self::NORMAL),
            "high" => Ok(Self::HIGH),
            "critical" => Ok(Self::CRITICAL),
            other => other
                .parse::<i32>()
                .map(Self)
                .map_err(|_| format!("Invalid priority: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_are_ordered() {
        let tiers = JobPriority::tiers();
        assert!(tiers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(JobPriority::default(), JobPriority::NORMAL);
    }

    #[test]
    fn test_parse_names_and_numbers() {
        assert_eq!("High".parse::<JobPriority>().unwrap(), JobPriority::HIGH);
        assert_eq!("7".parse::<JobPriority>().unwrap(), JobPriority(7));
        assert!("urgent".parse::<JobPriority>().is_err());
        assert_eq!(JobPriority(7).to_string(), "7");
        assert_eq!(JobPriority::CRITICAL.to_string(), "critical");
    }
}
