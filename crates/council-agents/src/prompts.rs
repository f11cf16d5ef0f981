//! System prompts and user prompt builders for each council role.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever prompt content changes.
//! The version is logged at the start of every run and stored on the run
//! record, so a verdict can be traced back to the prompts that produced it.

use deliberation::canon::{self, Quadra, DERIVED_DICHOTOMIES, POSITIONS};
use deliberation::types::{DiscussionMap, Dossier, SpecialistAnalysis, ValidationReport};
use deliberation::{CouncilAnalyses, Lens};

/// Prompt version. Bump on any prompt content change.
pub const PROMPT_VERSION: &str = "1.3.0";

const RULE: &str =
    "===============================================================================";

// ── Scout ───────────────────────────────────────────────────────────

pub const SCOUT_SYSTEM_PROMPT: &str = "\
You are The Scout, a biographical researcher compiling an objective dossier about a character.

YOUR ROLE: You are a NEUTRAL FACT-GATHERER. You do NOT analyze personality, you do NOT \
interpret behavior, you do NOT mention personality typologies, cognitive functions or \
personality types AT ALL.

WHAT TO INCLUDE (aim for 20+ facts):
1. ACTIONS: what the character does; specific behaviors, habits, routines
2. DECISIONS: key choices and how they approach making them
3. RELATIONSHIPS: how they interact with specific other characters
4. CONFLICTS: how they handle disagreements, fights, challenges
5. COMMUNICATION: how they talk and what they discuss
6. GOALS: what they pursue and what motivates them
7. AVOIDANCES: what they shy away from or seem uncomfortable with
8. STRENGTHS and WEAKNESSES: where they excel, where they struggle or fail
9. ENVIRONMENT: where they thrive and where they struggle
10. QUOTES: exact quotes that show how they think and communicate

RULES:
- Do NOT interpret facts (never write \"this shows extroversion\")
- Do NOT use typology terminology of any kind
- Do NOT draw conclusions about personality type
- Report observable facts as a biographer would, with specific examples from the story

OUTPUT FORMAT:
Respond with EXACTLY this JSON structure:
{
    \"character_name\": \"Name of the character\",
    \"media_source\": \"Source media (show, book, etc.)\",
    \"biographical_facts\": [\"Objective observation\", \"...\"],
    \"key_quotes\": [{\"quote\": \"Exact quote\", \"context\": \"Situation when they said it\"}],
    \"relationships\": [{\"person\": \"Other character\", \"dynamic\": \"Objective description\"}],
    \"summary\": \"Brief objective overview of who this character is and what they do\"
}";

pub fn scout_user_prompt(subject: &str, source: &str, formatted_results: &str) -> String {
    format!(
        "Research subject: {subject} from {source}\n\n\
         Here are web search results about this character:\n\n\
         {formatted_results}\n\n\
         Compile a structured dossier of objective biographical facts and notable quotes. \
         Respond in the specified JSON format."
    )
}

// ── Specialists ─────────────────────────────────────────────────────

/// Keys of the 15 dichotomies the dichotomy lens reports on.
pub fn dichotomy_keys() -> Vec<String> {
    let mut keys: Vec<String> = [
        "extravert_introvert",
        "intuitive_sensing",
        "logical_ethical",
        "rational_irrational",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    keys.extend(
        DERIVED_DICHOTOMIES
            .iter()
            .map(|(a, b)| format!("{}_{}", a.to_lowercase(), b.to_lowercase())),
    );
    keys
}

fn boundaries(lens: Lens) -> String {
    let mut out = String::new();
    out.push_str(&format!("{RULE}\n"));
    out.push_str("STRICT ROLE BOUNDARIES:\n");
    out.push_str(&format!("{RULE}\n"));
    out.push_str(&format!("You may ONLY reason with {}.\n", lens.vocabulary()));
    for other in lens.others() {
        out.push_str(&format!(
            "You may NOT use {}. That is {}'s job; if you catch yourself doing it, STOP.\n",
            other.vocabulary(),
            other.agent_name(),
        ));
    }
    out.push_str(&format!("{RULE}\n"));
    out
}

fn lens_knowledge(lens: Lens) -> String {
    match lens {
        Lens::Dichotomies => {
            let mut out = String::from(
                "The four Jungian dichotomies fix the type; the eleven derived dichotomies \
                 are then determined and serve as VERIFICATION. Subjectivist/Objectivist is \
                 also known as Merry/Serious.\n\n",
            );
            out.push_str(&canon::dichotomy_table());
            out
        }
        Lens::QuadraValues => {
            let mut out = canon::quadra_reference();
            out.push_str(
                "\nFocus on VALUES (what the character prioritizes and avoids), not on which \
                 position an element occupies.\n",
            );
            out
        }
        Lens::Functions => {
            let mut out = format!("MODEL A POSITIONS (1-8): {}\n\n", POSITIONS.join(", "));
            out.push_str(&canon::function_position_table());
            out.push_str(
                "\nThe Leading function is what they DO effortlessly, not what they talk about. \
                 The PoLR is often the clearest marker: what do they avoid or dismiss? \
                 Verify every position claim against the table.\n",
            );
            out
        }
    }
}

fn lens_schema(lens: Lens) -> String {
    let specific = match lens {
        Lens::Dichotomies => {
            let entries: Vec<String> = dichotomy_keys()
                .into_iter()
                .map(|k| format!("        \"{k}\": {{\"pole\": \"...\", \"evidence\": \"...\"}}"))
                .collect();
            format!("    \"analysis\": {{\n{}\n    }},\n", entries.join(",\n"))
        }
        Lens::QuadraValues => {
            let entries: Vec<String> = Quadra::ALL
                .iter()
                .map(|q| {
                    format!(
                        "        \"{}_fit\": {{\"score\": 0-100, \"evidence\": \"...\"}}",
                        q.to_string().to_lowercase()
                    )
                })
                .collect();
            format!(
                "    \"quadra_analysis\": {{\n{}\n    }},\n    \"predicted_quadra\": \"Alpha|Beta|Gamma|Delta\",\n",
                entries.join(",\n")
            )
        }
        Lens::Functions => "    \"function_analysis\": {\n\
             \x20       \"likely_base\": {\"function\": \"Ne|Ni|Se|Si|Te|Ti|Fe|Fi\", \"evidence\": \"...\"},\n\
             \x20       \"likely_creative\": {\"function\": \"...\", \"evidence\": \"...\"},\n\
             \x20       \"likely_vulnerable\": {\"function\": \"...\", \"evidence\": \"...\"},\n\
             \x20       \"likely_suggestive\": {\"function\": \"...\", \"evidence\": \"...\"}\n\
             \x20   },\n\
             \x20   \"full_stack_prediction\": \"e.g. Te-Ni-Fe-Si-Fi-Se-Ti-Ne\",\n"
            .to_string(),
    };
    format!(
        "OUTPUT FORMAT:\nRespond with this exact JSON structure:\n{{\n{specific}    \
         \"predicted_type\": \"Three-letter code (e.g. LIE, ESI)\",\n    \
         \"confidence\": 75,\n    \
         \"reasoning\": \"2-3 sentences using ONLY {} terminology\"\n}}",
        lens.framework()
    )
}

/// System prompt for one lens-bound specialist.
pub fn specialist_system_prompt(lens: Lens) -> String {
    format!(
        "You are {}, a socionics specialist focusing EXCLUSIVELY on {}.\n\n{}\n\
         KNOWLEDGE BASE:\n{}\n\
         Analyze the character dossier using ONLY the {} framework and pick one of the \
         16 three-letter type codes.\n\n{}",
        lens.agent_name(),
        lens.framework(),
        boundaries(lens),
        lens_knowledge(lens),
        lens.framework(),
        lens_schema(lens)
    )
}

pub fn analysis_user_prompt(dossier: &Dossier) -> String {
    format!(
        "Analyze the following character dossier and determine their socionics type using \
         your specialized framework.\n\nCHARACTER DOSSIER:\n{}\n\n\
         Provide your analysis in the specified JSON format.",
        dossier.render()
    )
}

// ── Discussion ──────────────────────────────────────────────────────

pub fn discussion_system_prompt(lens: Lens) -> String {
    format!(
        "You are {}. STAY IN YOUR LANE - only argue using your specialty framework.",
        lens.agent_name()
    )
}

/// Counter-argument prompt: the agent's own position plus every peer's.
pub fn counter_argument_prompt(
    own: &SpecialistAnalysis,
    analyses: &CouncilAnalyses,
    dossier: &Dossier,
) -> String {
    let mut others = String::new();
    for lens in own.lens.others() {
        if let Some(peer) = analyses.get(&lens) {
            others.push_str(&format!("\n{}\n", peer.headline()));
            others.push_str(&format!("Their reasoning: {}\n", peer.reasoning));
        }
    }

    let lane_rules: Vec<String> = Lens::ALL
        .iter()
        .map(|l| format!("   - If you're {}, argue using {}", l.agent_name(), l.vocabulary()))
        .collect();

    format!(
        "You are {name}, reviewing other agents' analyses of {character}.\n\n\
         Your previous prediction: {own_type}\n\
         Your reasoning: {own_reasoning}\n\n\
         Other predictions:\n{others}\n\
         Dossier summary: {summary}\n\n\
         TASK: Provide a thoughtful counter-argument or agreement.\n\n\
         RULES:\n\
         1. STAY IN YOUR LANE - only argue using your specialty:\n{lanes}\n\
         2. Point out potential errors in others' reasoning\n\
         3. Defend your position with specific evidence from the dossier\n\
         4. If you think you were wrong, say so and explain why\n\n\
         Be direct and specific. Reference actual evidence.",
        name = own.agent_name,
        character = dossier.character_name,
        own_type = own.predicted_type,
        own_reasoning = own.reasoning,
        others = others,
        summary = dossier.summary,
        lanes = lane_rules.join("\n"),
    )
}

// ── Validator ───────────────────────────────────────────────────────

const TYPING_MISTAKES: &str = "\
COMMON TYPING MISTAKES:
1. Confusing position with strength: a strong Role function is still Role.
2. Typing by quadra alone: quadra narrows to four types, not one.
3. Mistaking the Role function for the Leading function.
4. Ignoring the PoLR: it is usually the clearest marker.
5. Extraversion/introversion refers to the Leading function only.
6. Treating the Suggestive function as a weakness to hide; it is sought from others.
7. Mapping MBTI J/P directly onto socionics j/p; the last letter means different things.";

pub fn validator_system_prompt() -> String {
    format!(
        "You are The Validator, a socionics theory expert who FACT-CHECKS claims made by \
         other agents against the canonical tables below.\n\n\
         {RULE}\nCANONICAL REFERENCE:\n{RULE}\n\n{}\n{}\n\
         LEAD / CREATIVE / PoLR QUICK REFERENCE:\n{}\n{}\n{}\n\n\
         {RULE}\nMANDATORY VERIFICATION PROCESS:\n{RULE}\n\
         For EVERY type mentioned by ANY agent:\n\
         1. Look up that type's row in each table above.\n\
         2. Verify every dichotomy, function position and quadra claim against that row.\n\
         3. Flag ANY discrepancy as an error, citing the table it violates.\n\
         4. If two agents agree on a type but make contradictory claims, flag it.\n\n\
         OUTPUT FORMAT:\nRespond with this exact JSON structure:\n\
         {{\n    \"errors_found\": [\n        {{\"agent\": \"Which agent made the error\", \
         \"claim\": \"What they claimed\", \"correction\": \"What is correct\", \
         \"reference\": \"Which canonical rule this violates\"}}\n    ],\n    \
         \"verified_correct\": [\"Claims verified as correct\"],\n    \
         \"recommended_type\": \"Most likely type given the corrected information\",\n    \
         \"confidence_adjustment\": \"Should confidence be raised or lowered, and why\",\n    \
         \"summary\": \"Brief summary of validation findings\"\n}}",
        canon::function_position_table(),
        canon::dichotomy_table(),
        canon::lead_creative_polr_table(),
        canon::quadra_reference(),
        TYPING_MISTAKES,
    )
}

/// Every specialist's claim set, including the structured lens fields.
pub fn validation_user_prompt(analyses: &CouncilAnalyses) -> String {
    let mut claims = String::new();
    for analysis in analyses.values() {
        claims.push_str(&format!("{RULE}\n"));
        claims.push_str(&format!(
            "{} - Predicted: {}\n",
            analysis.agent_name,
            analysis.predicted_type,
        ));
        claims.push_str(&format!("{RULE}\n"));
        claims.push_str(&format!("Reasoning: {}\n", analysis.reasoning));
        if !analysis.findings.is_empty() {
            let structured = serde_json::to_string_pretty(&analysis.findings)
                .unwrap_or_else(|_| analysis.findings.render());
            claims.push_str(&format!("Structured analysis:\n{structured}\n"));
        }
        claims.push('\n');
    }
    format!(
        "Review the following analyses for FACTUAL ACCURACY.\n\n{claims}\
         Check for errors in:\n\
         1. Function position claims\n\
         2. Quadra assignments\n\
         3. Dichotomy assignments\n\
         4. Logical consistency between claims\n\n\
         Respond in the specified JSON format."
    )
}

// ── Manager ─────────────────────────────────────────────────────────

fn quadra_membership_rule() -> String {
    Quadra::ALL
        .iter()
        .map(|q| {
            let valued: Vec<String> = q.valued_elements().iter().map(|e| e.to_string()).collect();
            format!(
                "- {} are {} ({} values)",
                q.members().join(", "),
                q.to_string().to_uppercase(),
                valued.join("+")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn manager_system_prompt() -> String {
    format!(
        "You are The Manager, the final arbiter in a socionics typing committee. You \
         synthesize the specialists' analyses into one authoritative determination.\n\n\
         {quadras}\n\
         You have received analyses from:\n\
         1. {a} - {af}\n2. {b} - {bf}\n3. {c} - {cf}\n\
         4. The Validator - fact-checked all claims for theoretical accuracy\n\n\
         {RULE}\nSTRICT CONSENSUS RULES - YOU MUST FOLLOW THESE:\n{RULE}\n\n\
         RULE 1: YOUR FINAL TYPE MUST BE ONE THAT WAS ACTUALLY SUGGESTED\n\
         - You can ONLY choose a type listed under ALLOWED FINAL TYPES\n\
         - You CANNOT invent a type that nobody suggested\n\n\
         RULE 2: MAJORITY WINS (with caveats)\n\
         - If 2 or 3 agents agree on a type, that type is the default outcome\n\
         - A lone dissenter needs EXCEPTIONAL evidence to override the majority\n\
         - If all 3 disagree, weigh confidence scores and evidence quality\n\n\
         RULE 3: VALIDATOR CORRECTIONS TAKE PRIORITY\n\
         - Discount claims the Validator identified as factual errors\n\
         - Weight an agent who made errors lower\n\n\
         RULE 4: QUADRA CONSISTENCY\n\
         - The quadra you report MUST be the quadra of your final type:\n{membership}\n\n\
         RULE 5: TRUST THE VALIDATOR'S FACT-CHECKING\n\
         - Use corrected information; do not second-guess validated claims\n\n\
         OUTPUT FORMAT:\nRespond with this exact JSON structure:\n\
         {{\n    \"agent_predictions\": {{\"{ak}\": \"...\", \"{bk}\": \"...\", \"{ck}\": \"...\"}},\n    \
         \"validation_summary\": {{\"errors_found\": \"Were any errors identified?\", \
         \"discounted_claims\": \"Which claims were discounted?\"}},\n    \
         \"synthesis\": {{\"agreements\": \"...\", \"disagreements\": \"...\", \
         \"majority_type\": \"Type 2+ agents agreed on, if any\", \"resolution\": \"...\"}},\n    \
         \"final_type\": \"Three-letter code from ALLOWED FINAL TYPES\",\n    \
         \"type_name\": \"Full name (e.g. Logical-Intuitive Extravert)\",\n    \
         \"type_nickname\": \"Socionics nickname (e.g. Jack London)\",\n    \
         \"quadra\": \"Alpha|Beta|Gamma|Delta\",\n    \
         \"confidence_score\": 85,\n    \
         \"confidence_explanation\": \"Why this confidence level\",\n    \
         \"key_traits\": [\"Trait 1\", \"Trait 2\", \"Trait 3\"],\n    \
         \"function_stack\": \"Full 8-function stack e.g. Te-Ni-Fe-Si-Fi-Se-Ti-Ne\",\n    \
         \"summary\": \"3-4 sentence personality summary\"\n}}",
        quadras = canon::quadra_reference(),
        a = Lens::Dichotomies.agent_name(),
        af = Lens::Dichotomies.framework(),
        b = Lens::QuadraValues.agent_name(),
        bf = Lens::QuadraValues.framework(),
        c = Lens::Functions.agent_name(),
        cf = Lens::Functions.framework(),
        membership = quadra_membership_rule(),
        ak = prediction_key(Lens::Dichotomies),
        bk = prediction_key(Lens::QuadraValues),
        ck = prediction_key(Lens::Functions),
    )
}

/// Key used for a lens in `agent_predictions`.
pub fn prediction_key(lens: Lens) -> &'static str {
    match lens {
        Lens::Dichotomies => "reinin_predicted",
        Lens::QuadraValues => "quadra_predicted",
        Lens::Functions => "functions_predicted",
    }
}

/// Line listing the labels the manager may choose from.
pub fn allowed_types_line(allowed: &[String]) -> String {
    format!("ALLOWED FINAL TYPES: {}", allowed.join(", "))
}

pub fn synthesis_user_prompt(
    dossier: &Dossier,
    analyses: &CouncilAnalyses,
    discussion: Option<&DiscussionMap>,
    validation: Option<&ValidationReport>,
    allowed: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "CHARACTER: {} from {}\n\n",
        dossier.character_name,
        dossier.media_source,
    ));
    let summary = if dossier.summary.is_empty() {
        "No summary available."
    } else {
        &dossier.summary
    };
    out.push_str(&format!("SCOUT'S SUMMARY: {summary}\n\n"));
    out.push_str("SPECIALIST ANALYSES:\n");

    for lens in Lens::ALL {
        let Some(a) = analyses.get(&lens) else {
            continue;
        };
        out.push_str(&format!(
            "\n=== {} ({}) ===\n",
            a.agent_name.to_uppercase(),
            lens.framework(),
        ));
        out.push_str(&format!("Predicted Type: {}\n", a.predicted_type));
        out.push_str(&format!("Confidence: {}%\n", a.confidence));
        out.push_str(&format!("Reasoning: {}\n", a.reasoning));
        let findings = a.findings.render();
        if !findings.is_empty() {
            out.push_str(&format!("Lens findings:\n{findings}"));
        }
    }

    if let Some(discussion) = discussion {
        out.push_str("\n=== AGENT DISCUSSION (Counter-arguments and Refinements) ===\n");
        for response in discussion.values() {
            out.push_str(&format!("\n{}:\n{}\n", response.agent_name, response.text));
        }
    }

    if let Some(report) = validation {
        out.push_str("\n=== VALIDATOR REPORT (Fact-Check Results) ===\n");
        out.push_str(&format!("{}\n", report.digest()));
    }

    out.push_str(&format!("\n{}\n", allowed_types_line(allowed)));

    let mut inputs = vec!["these specialist analyses"];
    if discussion.is_some() {
        inputs.push("their discussion");
    }
    if validation.is_some() {
        inputs.push("the validation report");
    }
    out.push_str(&format!(
        "\nBased on {}, synthesize a final determination. Consider areas of agreement and \
         disagreement, weigh the evidence quality, and account for any errors flagged by the \
         Validator.",
        inputs.join(" and "),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use deliberation::types::DiscussionResponse;

    fn analysis(lens: Lens, t: &str) -> SpecialistAnalysis {
        let payload = serde_json::from_value(serde_json::json!({
            "predicted_type": t,
            "confidence": 60,
            "reasoning": format!("{} reasoning", lens.key()),
        }))
        .unwrap();
        SpecialistAnalysis::from_payload(lens, payload)
    }

    fn council(types: [&str; 3]) -> CouncilAnalyses {
        Lens::ALL
            .into_iter()
            .zip(types)
            .map(|(l, t)| (l, analysis(l, t)))
            .collect()
    }

    #[test]
    fn test_dichotomy_keys_are_fifteen_and_unique() {
        let keys = dichotomy_keys();
        assert_eq!(keys.len(), 15);
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 15);
    }

    #[test]
    fn test_specialist_prompts_name_other_lenses_as_forbidden() {
        for lens in Lens::ALL {
            let prompt = specialist_system_prompt(lens);
            assert!(prompt.starts_with(&format!("You are {}", lens.agent_name())));
            for other in lens.others() {
                assert!(prompt.contains(&format!("That is {}'s job", other.agent_name())));
            }
            assert!(prompt.contains("\"predicted_type\""));
        }
        assert!(specialist_system_prompt(Lens::QuadraValues).contains("\"gamma_fit\""));
        assert!(specialist_system_prompt(Lens::Functions).contains("\"likely_base\""));
        assert!(specialist_system_prompt(Lens::Dichotomies).contains("\"static_dynamic\""));
    }

    #[test]
    fn test_counter_argument_lists_only_peers() {
        let analyses = council(["LIE", "SEE", "ILI"]);
        let dossier = Dossier {
            character_name: "X".into(),
            summary: "s".into(),
            ..Dossier::default()
        };
        let own = &analyses[&Lens::QuadraValues];
        let prompt = counter_argument_prompt(own, &analyses, &dossier);
        assert!(prompt.contains("Your previous prediction: SEE"));
        assert!(prompt.contains("Agent Reinin predicted: LIE (confidence: 60%)"));
        assert!(prompt.contains("Agent Functions predicted: ILI (confidence: 60%)"));
        assert!(!prompt.contains("Agent Quadra predicted"));
    }

    #[test]
    fn test_synthesis_prompt_sections_follow_options() {
        let analyses = council(["AAA", "BBB", "AAA"]);
        let dossier = Dossier::default();
        let allowed = vec!["AAA".to_string(), "BBB".to_string()];

        let bare = synthesis_user_prompt(&dossier, &analyses, None, None, &allowed);
        assert!(bare.contains("ALLOWED FINAL TYPES: AAA, BBB"));
        assert!(!bare.contains("AGENT DISCUSSION"));
        assert!(!bare.contains("VALIDATOR REPORT"));
        assert!(bare.contains("No summary available."));

        let mut discussion = DiscussionMap::new();
        discussion.insert(
            Lens::Functions,
            DiscussionResponse::new(Lens::Functions, "I stand by it".into()),
        );
        let report = ValidationReport::default();
        let full = synthesis_user_prompt(
            &dossier,
            &analyses,
            Some(&discussion),
            Some(&report),
            &allowed,
        );
        assert!(full.contains("Agent Functions:\nI stand by it"));
        assert!(full.contains("Validator found no errors"));
        assert!(full.contains("their discussion and the validation report"));
    }

    #[test]
    fn test_manager_prompt_has_all_rules() {
        let prompt = manager_system_prompt();
        for n in 1..=5 {
            assert!(prompt.contains(&format!("RULE {n}:")));
        }
        assert!(prompt.contains("SEE, ILI, LIE, ESI are GAMMA"));
        assert!(prompt.contains("\"reinin_predicted\""));
    }

    #[test]
    fn test_validation_prompt_embeds_claims() {
        let analyses = council(["LIE", "LIE", "SEE"]);
        let prompt = validation_user_prompt(&analyses);
        assert!(prompt.contains("Agent Reinin - Predicted: LIE"));
        assert!(prompt.contains("Agent Functions - Predicted: SEE"));
        assert!(validator_system_prompt().contains("LIE: Lead=Te, Creative=Ni, PoLR=Si"));
    }
}
