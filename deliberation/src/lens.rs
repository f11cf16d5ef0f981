//! Specialist lenses: the three mutually exclusive framings a council member
//! is restricted to.
//!
//! A lens is pure data: an identity, a display name and the vocabulary it may
//! use. Every specialist in the council shares one behaviour and differs only
//! in the lens it was built with.

use serde::{Deserialize, Serialize};

/// Framework a specialist analyst argues from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lens {
    /// Binary-trait classification (the 15 Reinin dichotomies).
    Dichotomies,
    /// Value/group-affinity scoring (quadra values).
    QuadraValues,
    /// Positional/stack classification (Model A function positions).
    Functions,
}

impl Lens {
    /// All lenses in council order. The order is also the order specialists
    /// are listed in prompts and reports.
    pub const ALL: [Lens; 3] = [Lens::Dichotomies, Lens::QuadraValues, Lens::Functions];

    /// Display identity of the specialist bound to this lens.
    pub fn agent_name(self) -> &'static str {
        match self {
            Self::Dichotomies => "Agent Reinin",
            Self::QuadraValues => "Agent Quadra",
            Self::Functions => "Agent Functions",
        }
    }

    /// Short label for the framework, used in prompt section headers.
    pub fn framework(self) -> &'static str {
        match self {
            Self::Dichotomies => "Reinin Dichotomies",
            Self::QuadraValues => "Quadra Values",
            Self::Functions => "Model A Functions",
        }
    }

    /// One-line description of what the lens is allowed to talk about.
    pub fn vocabulary(self) -> &'static str {
        match self {
            Self::Dichotomies => "dichotomies ONLY (which pole of each trait pair)",
            Self::QuadraValues => "quadra values ONLY (which elements are valued or avoided)",
            Self::Functions => "function positions ONLY (Leading, Creative, Role, PoLR, ...)",
        }
    }

    /// Resolve a lens from its agent name or snake_case key.
    pub fn from_agent_name(name: &str) -> Option<Self> {
        let needle = name.trim();
        Self::ALL.into_iter().find(|lens| {
            lens.agent_name().eq_ignore_ascii_case(needle) || lens.key() == needle
        })
    }

    /// Stable snake_case key, identical to the serde representation.
    pub fn key(self) -> &'static str {
        match self {
            Self::Dichotomies => "dichotomies",
            Self::QuadraValues => "quadra_values",
            Self::Functions => "functions",
        }
    }

    /// The two lenses this one must not cross into.
    pub fn others(self) -> [Lens; 2] {
        match self {
            Self::Dichotomies => [Self::QuadraValues, Self::Functions],
            Self::QuadraValues => [Self::Dichotomies, Self::Functions],
            Self::Functions => [Self::Dichotomies, Self::QuadraValues],
        }
    }
}

impl std::fmt::Display for Lens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.agent_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lens_display_is_agent_name() {
        assert_eq!(Lens::Dichotomies.to_string(), "Agent Reinin");
        assert_eq!(Lens::QuadraValues.to_string(), "Agent Quadra");
        assert_eq!(Lens::Functions.to_string(), "Agent Functions");
    }

    #[test]
    fn test_others_excludes_self() {
        for lens in Lens::ALL {
            assert!(!lens.others().contains(&lens));
        }
    }

    #[test]
    fn test_from_agent_name_roundtrip() {
        for lens in Lens::ALL {
            assert_eq!(Lens::from_agent_name(lens.agent_name()), Some(lens));
            assert_eq!(Lens::from_agent_name(lens.key()), Some(lens));
        }
        assert_eq!(Lens::from_agent_name("agent quadra"), Some(Lens::QuadraValues));
        assert_eq!(Lens::from_agent_name("The Validator"), None);
    }

    #[test]
    fn test_serde_key_matches() {
        let json = serde_json::to_string(&Lens::QuadraValues).unwrap();
        assert_eq!(json, "\"quadra_values\"");
    }
}
