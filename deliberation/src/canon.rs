//! Canonical type table.
//!
//! The 16 category codes with their function stacks, quadra and derived
//! dichotomy poles. This is the lookup table the validator cross-references
//! specialist claims against; it is rendered into prompts rather than
//! re-implemented as an inference engine.

use serde::{Deserialize, Serialize};

/// Information element occupying one of the eight Model A positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Ne,
    Ni,
    Se,
    Si,
    Te,
    Ti,
    Fe,
    Fi,
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ne => "Ne",
            Self::Ni => "Ni",
            Self::Se => "Se",
            Self::Si => "Si",
            Self::Te => "Te",
            Self::Ti => "Ti",
            Self::Fe => "Fe",
            Self::Fi => "Fi",
        };
        f.write_str(s)
    }
}

/// Higher-order grouping of four types sharing valued elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadra {
    Alpha,
    Beta,
    Gamma,
    Delta,
}

impl Quadra {
    pub const ALL: [Quadra; 4] = [Quadra::Alpha, Quadra::Beta, Quadra::Gamma, Quadra::Delta];

    pub fn valued_elements(self) -> [Element; 4] {
        use Element::*;
        match self {
            Self::Alpha => [Si, Ne, Fe, Ti],
            Self::Beta => [Se, Ni, Fe, Ti],
            Self::Gamma => [Se, Ni, Te, Fi],
            Self::Delta => [Si, Ne, Te, Fi],
        }
    }

    /// Short atmosphere description used in the quadra lens prompt.
    pub fn atmosphere(self) -> &'static str {
        match self {
            Self::Alpha => {
                "comfort, harmony and intellectual play; egalitarian brainstorming. \
                 Avoids power games, harshness and forced action"
            }
            Self::Beta => {
                "passion, decisive action and vision; hierarchy with clear leadership. \
                 Avoids boredom, weakness and lack of conviction"
            }
            Self::Gamma => {
                "achievement, results and personal integrity; pragmatic individualism. \
                 Avoids inefficiency, emotional manipulation and group-think"
            }
            Self::Delta => {
                "helpfulness, sincerity and practical solutions; quiet competence. \
                 Avoids force, manipulation and hierarchy for its own sake"
            }
        }
    }

    /// Type codes belonging to this quadra, in table order.
    pub fn members(self) -> Vec<&'static str> {
        TYPES
            .iter()
            .filter(|t| t.quadra == self)
            .map(|t| t.code)
            .collect()
    }
}

impl std::fmt::Display for Quadra {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alpha => write!(f, "Alpha"),
            Self::Beta => write!(f, "Beta"),
            Self::Gamma => write!(f, "Gamma"),
            Self::Delta => write!(f, "Delta"),
        }
    }
}

/// Names of the eight Model A positions, 1-indexed by array offset + 1.
pub const POSITIONS: [&str; 8] = [
    "Leading",
    "Creative",
    "Role",
    "PoLR",
    "Suggestive",
    "Mobilizing",
    "Ignoring",
    "Demonstrative",
];

/// The eleven derived dichotomies, in the column order of `TypeProfile::derived`.
pub const DERIVED_DICHOTOMIES: [(&str, &str); 11] = [
    ("Judicious", "Decisive"),
    ("Subjectivist", "Objectivist"),
    ("Democratic", "Aristocratic"),
    ("Process", "Result"),
    ("Carefree", "Farsighted"),
    ("Yielding", "Obstinate"),
    ("Static", "Dynamic"),
    ("Tactical", "Strategic"),
    ("Constructivist", "Emotivist"),
    ("Positivist", "Negativist"),
    ("Asking", "Declaring"),
];

/// One row of the canonical table.
#[derive(Debug, Clone, Serialize)]
pub struct TypeProfile {
    /// Three-letter category code (e.g. `LIE`).
    pub code: &'static str,
    /// Jungian-style code with socionics j/p semantics (e.g. `ENTj`).
    pub jungian: &'static str,
    pub name: &'static str,
    pub nickname: &'static str,
    pub quadra: Quadra,
    /// Elements in positions 1..=8.
    pub stack: [Element; 8],
    /// Pole for each entry of [`DERIVED_DICHOTOMIES`], lowercase.
    pub derived: [&'static str; 11],
}

impl TypeProfile {
    pub fn lead(&self) -> Element {
        self.stack[0]
    }

    pub fn creative(&self) -> Element {
        self.stack[1]
    }

    pub fn polr(&self) -> Element {
        self.stack[3]
    }

    /// `Te-Ni-Fe-Si-Fi-Se-Ti-Ne` form.
    pub fn stack_string(&self) -> String {
        self.stack
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

macro_rules! profile {
    ($code:literal, $jung:literal, $name:literal, $nick:literal, $quadra:ident,
     [$($el:ident),*], [$($pole:literal),*]) => {
        TypeProfile {
            code: $code,
            jungian: $jung,
            name: $name,
            nickname: $nick,
            quadra: Quadra::$quadra,
            stack: [$(Element::$el),*],
            derived: [$($pole),*],
        }
    };
}

/// The sixteen types, grouped by quadra.
pub static TYPES: [TypeProfile; 16] = [
    profile!("ILE", "ENTp", "Intuitive-Logical Extravert", "Don Quixote", Alpha,
        [Ne, Ti, Se, Fi, Si, Fe, Ni, Te],
        ["judicious", "subjectivist", "democratic", "process", "carefree", "yielding", "static", "tactical", "constructivist", "positivist", "asking"]),
    profile!("SEI", "ISFp", "Sensory-Ethical Introvert", "Dumas", Alpha,
        [Si, Fe, Ni, Te, Ne, Ti, Se, Fi],
        ["judicious", "subjectivist", "democratic", "process", "carefree", "yielding", "dynamic", "strategic", "emotivist", "negativist", "declaring"]),
    profile!("ESE", "ESFj", "Ethical-Sensory Extravert", "Hugo", Alpha,
        [Fe, Si, Te, Ni, Ti, Ne, Fi, Se],
        ["judicious", "subjectivist", "democratic", "result", "farsighted", "obstinate", "dynamic", "tactical", "constructivist", "positivist", "declaring"]),
    profile!("LII", "INTj", "Logical-Intuitive Introvert", "Robespierre", Alpha,
        [Ti, Ne, Fi, Se, Fe, Si, Te, Ni],
        ["judicious", "subjectivist", "democratic", "result", "farsighted", "obstinate", "static", "strategic", "emotivist", "negativist", "asking"]),
    profile!("EIE", "ENFj", "Ethical-Intuitive Extravert", "Hamlet", Beta,
        [Fe, Ni, Te, Si, Ti, Se, Fi, Ne],
        ["decisive", "subjectivist", "aristocratic", "process", "carefree", "obstinate", "dynamic", "strategic", "constructivist", "negativist", "asking"]),
    profile!("LSI", "ISTj", "Logical-Sensory Introvert", "Maxim Gorky", Beta,
        [Ti, Se, Fi, Ne, Fe, Ni, Te, Si],
        ["decisive", "subjectivist", "aristocratic", "process", "carefree", "obstinate", "static", "tactical", "emotivist", "positivist", "declaring"]),
    profile!("SLE", "ESTp", "Sensory-Logical Extravert", "Zhukov", Beta,
        [Se, Ti, Ne, Fi, Ni, Fe, Si, Te],
        ["decisive", "subjectivist", "aristocratic", "result", "farsighted", "yielding", "static", "strategic", "constructivist", "negativist", "declaring"]),
    profile!("IEI", "INFp", "Intuitive-Ethical Introvert", "Yesenin", Beta,
        [Ni, Fe, Si, Te, Se, Ti, Ne, Fi],
        ["decisive", "subjectivist", "aristocratic", "result", "farsighted", "yielding", "dynamic", "tactical", "emotivist", "positivist", "asking"]),
    profile!("SEE", "ESFp", "Sensory-Ethical Extravert", "Napoleon", Gamma,
        [Se, Fi, Ne, Ti, Ni, Te, Si, Fe],
        ["decisive", "objectivist", "democratic", "process", "farsighted", "obstinate", "static", "strategic", "emotivist", "positivist", "asking"]),
    profile!("ILI", "INTp", "Intuitive-Logical Introvert", "Balzac", Gamma,
        [Ni, Te, Si, Fe, Se, Fi, Ne, Ti],
        ["decisive", "objectivist", "democratic", "process", "farsighted", "obstinate", "dynamic", "tactical", "constructivist", "negativist", "declaring"]),
    profile!("LIE", "ENTj", "Logical-Intuitive Extravert", "Jack London", Gamma,
        [Te, Ni, Fe, Si, Fi, Se, Ti, Ne],
        ["decisive", "objectivist", "democratic", "result", "carefree", "yielding", "dynamic", "strategic", "emotivist", "positivist", "declaring"]),
    profile!("ESI", "ISFj", "Ethical-Sensory Introvert", "Dreiser", Gamma,
        [Fi, Se, Ti, Ne, Te, Ni, Fe, Si],
        ["decisive", "objectivist", "democratic", "result", "carefree", "yielding", "static", "tactical", "constructivist", "negativist", "asking"]),
    profile!("IEE", "ENFp", "Intuitive-Ethical Extravert", "Huxley", Delta,
        [Ne, Fi, Se, Ti, Si, Te, Ni, Fe],
        ["judicious", "objectivist", "aristocratic", "result", "carefree", "obstinate", "static", "tactical", "emotivist", "negativist", "declaring"]),
    profile!("SLI", "ISTp", "Sensory-Logical Introvert", "Gabin", Delta,
        [Si, Te, Ni, Fe, Ne, Fi, Se, Ti],
        ["judicious", "objectivist", "aristocratic", "result", "carefree", "obstinate", "dynamic", "strategic", "constructivist", "positivist", "asking"]),
    profile!("LSE", "ESTj", "Logical-Sensory Extravert", "Stirlitz", Delta,
        [Te, Si, Fe, Ni, Fi, Ne, Ti, Se],
        ["judicious", "objectivist", "aristocratic", "process", "farsighted", "yielding", "dynamic", "tactical", "emotivist", "negativist", "asking"]),
    profile!("EII", "INFj", "Ethical-Intuitive Introvert", "Dostoevsky", Delta,
        [Fi, Ne, Ti, Se, Te, Si, Fe, Ni],
        ["judicious", "objectivist", "aristocratic", "process", "farsighted", "yielding", "static", "strategic", "constructivist", "positivist", "declaring"]),
];

/// Look up a type by its three-letter code (case-insensitive, trimmed).
pub fn profile(code: &str) -> Option<&'static TypeProfile> {
    let code = code.trim();
    TYPES.iter().find(|t| t.code.eq_ignore_ascii_case(code))
}

/// The quadra a category code belongs to, if the code is canonical.
pub fn quadra_of(code: &str) -> Option<Quadra> {
    profile(code).map(|t| t.quadra)
}

/// Render the 8-position lookup table, one row per type.
pub fn function_position_table() -> String {
    let mut out = String::from("FUNCTION POSITION LOOKUP (canonical):\n");
    out.push_str(&format!("TYPE | {}\n", POSITIONS.join(" | ")));
    for t in &TYPES {
        let cells: Vec<String> = t.stack.iter().map(|e| e.to_string()).collect();
        out.push_str(&format!("{}  | {}\n", t.code, cells.join(" | ")));
    }
    out
}

/// Render the quick Lead/Creative/PoLR reference.
pub fn lead_creative_polr_table() -> String {
    let mut out = String::new();
    for t in &TYPES {
        out.push_str(&format!(
            "- {}: Lead={}, Creative={}, PoLR={}\n",
            t.code,
            t.lead(),
            t.creative(),
            t.polr(),
        ));
    }
    out
}

/// Render the derived dichotomy row for every type.
pub fn dichotomy_table() -> String {
    let mut out = String::from("DERIVED DICHOTOMY ASSIGNMENTS (canonical):\n");
    for t in &TYPES {
        out.push_str(&format!("{} ({}): {}\n", t.code, t.jungian, t.derived.join(", ")));
    }
    out.push_str("Merry: Alpha and Beta types. Serious: Gamma and Delta types.\n");
    out
}

/// Render quadra membership, valued elements and atmosphere.
pub fn quadra_reference() -> String {
    let mut out = String::from("QUADRA REFERENCE:\n");
    for q in Quadra::ALL {
        let valued: Vec<String> = q.valued_elements().iter().map(|e| e.to_string()).collect();
        out.push_str(&format!(
            "{} ({}): values {}. Atmosphere: {}.\n",
            q,
            q.members().join(", "),
            valued.join("+"),
            q.atmosphere(),
        ));
    }
    out
}
