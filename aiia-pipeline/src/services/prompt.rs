//! Analysis prompt construction
//!
//! A prompt is a pure function of persona, vocabulary, score scale and
//! critique settings, so it is rendered once per run and reused for every
//! image and backend.

use aiia_common::models::ScoreScale;
use aiia_common::taxonomy::{PersonaProfile, Taxonomy};

/// Inputs for prompt rendering
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder<'a> {
    pub persona: &'a PersonaProfile,
    pub taxonomy: &'a Taxonomy,
    pub scale: ScoreScale,
    /// Ask for a critique on every image
    pub gallery_critique: bool,
    /// With gallery critique off, invite a critique only at or below this score
    pub critique_threshold: u8,
}

impl PromptBuilder<'_> {
    pub fn build(&self) -> String {
        let persona = self.persona;
        let mut lines = vec![persona.framing.to_string(), String::new(), "ANALYSIS CRITERIA:".to_string()];
        lines.extend(
            persona
                .criteria
                .iter()
                .enumerate()
                .map(|(i, criterion)| format!("{}. {}", i + 1, criterion)),
        );
        lines.push(String::new());

        let categories: Vec<&str> = self.taxonomy.categories().iter().map(|c| c.as_str()).collect();
        lines.push("CLASSIFICATION (select ONE from each category):".to_string());
        lines.push(format!("CATEGORIES: {}", categories.join(", ")));
        lines.push(format!("SUB_CATEGORIES: {}", self.taxonomy.subcategories.join(", ")));
        lines.push(format!(
            "TAGS: {} (select 2-4 most relevant, only from this list)",
            self.taxonomy.all_tags().join(", ")
        ));
        lines.push(String::new());

        lines.extend(self.scoring_guide());
        lines.extend(self.critique_section());

        lines.push("RESPOND WITH VALID JSON ONLY:".to_string());
        lines.push(self.json_template());

        let mut prompt = lines.join("\n");
        prompt.push('\n');
        prompt
    }

    fn scoring_guide(&self) -> Vec<String> {
        let name = self.persona.name;
        let (heading, bands): (String, &[&str]) = match self.scale {
            ScoreScale::TenPoint => (
                format!("SCORING GUIDE (1-10 scale from {} perspective):", name),
                &[
                    "1-2: Poor (fails to meet basic standards for this evaluation type)",
                    "3-4: Below Average (basic competence, limited value for intended purpose)",
                    "5-6: Average (meets standard expectations for this type of image)",
                    "7-8: Above Average (strong quality and purpose alignment)",
                    "9-10: Exceptional (outstanding example that excels in all criteria)",
                ],
            ),
            ScoreScale::FivePoint => (
                format!("SCORING GUIDE (1-5 stars from {} perspective):", name),
                &[
                    "1: Poor quality, cull",
                    "2: Below average, low priority",
                    "3: Average, good for archive",
                    "4: Above average, notable quality",
                    "5: Exceptional, gallery-worthy",
                ],
            ),
        };

        let mut lines = vec![heading];
        lines.extend(bands.iter().map(|band| band.to_string()));
        lines.push("The score must be a whole number.".to_string());
        lines.push(String::new());
        lines
    }

    fn critique_section(&self) -> Vec<String> {
        let heading = if self.gallery_critique {
            "CRITIQUE REQUIREMENTS:".to_string()
        } else {
            format!(
                "CRITIQUE (only if score is {} or lower, otherwise omit the field):",
                self.critique_threshold
            )
        };
        vec![
            heading,
            "- 2-3 sentences maximum".to_string(),
            "- Focus on what makes the image succeed or fail".to_string(),
            "- Mention specific technical or artistic elements".to_string(),
            "- Be constructive but honest".to_string(),
            String::new(),
        ]
    }

    fn json_template(&self) -> String {
        let mut template = serde_json::json!({
            "category": "chosen_category",
            "subcategory": "chosen_subcategory",
            "tags": ["tag1", "tag2", "tag3"],
            "score": self.scale.midpoint() + 1,
        });
        if self.gallery_critique {
            template["critique"] = serde_json::Value::String(format!(
                "Professional critique from {} perspective.",
                self.persona.name
            ));
        }
        serde_json::to_string_pretty(&template).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiia_common::taxonomy::{find_persona, DEFAULT_PERSONA};

    fn builder(gallery_critique: bool, scale: ScoreScale) -> PromptBuilder<'static> {
        PromptBuilder {
            persona: find_persona(DEFAULT_PERSONA).unwrap(),
            taxonomy: &Taxonomy::PHOTOGRAPHY,
            scale,
            gallery_critique,
            critique_threshold: 5,
        }
    }

    #[test]
    fn test_prompt_contains_persona_and_vocabulary() {
        let prompt = builder(false, ScoreScale::TenPoint).build();
        assert!(prompt.starts_with("You are a professional art critic"));
        assert!(prompt.contains("1. Technical Excellence"));
        assert!(prompt.contains("CATEGORIES: People, Place, Thing"));
        assert!(prompt.contains("Senior-Citizen"));
        assert!(prompt.contains("Golden-Hour"));
        assert!(prompt.contains("1-10 scale from Professional Art Critic perspective"));
        assert!(prompt.contains("RESPOND WITH VALID JSON ONLY"));
    }

    #[test]
    fn test_gallery_critique_requests_field() {
        let prompt = builder(true, ScoreScale::TenPoint).build();
        assert!(prompt.contains("CRITIQUE REQUIREMENTS"));
        assert!(prompt.contains("\"critique\""));
    }

    #[test]
    fn test_selective_critique_mentions_threshold() {
        let prompt = builder(false, ScoreScale::TenPoint).build();
        assert!(prompt.contains("only if score is 5 or lower"));
        assert!(!prompt.contains("\"critique\""));
    }

    #[test]
    fn test_five_point_guide() {
        let prompt = builder(false, ScoreScale::FivePoint).build();
        assert!(prompt.contains("1-5 stars"));
        assert!(!prompt.contains("9-10"));
    }

    #[test]
    fn test_sections_separated_by_single_blank_line() {
        let prompt = builder(true, ScoreScale::FivePoint).build();
        assert!(prompt.contains("\n\nCLASSIFICATION (select ONE"));
        assert!(prompt.contains("whole number.\n\nCRITIQUE REQUIREMENTS:"));
        assert!(prompt.contains("honest\n\nRESPOND WITH VALID JSON ONLY:\n{"));
        assert!(!prompt.contains("\n\n\n"));
        assert!(prompt.ends_with("}\n"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = builder(true, ScoreScale::TenPoint).build();
        let b = builder(true, ScoreScale::TenPoint).build();
        assert_eq!(a, b);
    }
}
