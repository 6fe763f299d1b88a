//! Personas and controlled vocabularies
//!
//! Personas are plain table rows: adding one means appending to [`PERSONAS`].
//! Two vocabularies exist, `photography` (default) and `classic`; backend
//! output is matched against the active one.

use crate::models::Category;
use serde::Serialize;

/// Named evaluation viewpoint used to frame the analysis prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersonaProfile {
    /// Lookup key (e.g. `professional_art_critic`)
    pub key: &'static str,
    /// Display name
    pub name: &'static str,
    /// First-person framing sentence
    pub framing: &'static str,
    /// Ordered evaluation criteria
    pub criteria: &'static [&'static str],
}

pub const DEFAULT_PERSONA: &str = "professional_art_critic";

pub static PERSONAS: &[PersonaProfile] = &[
    PersonaProfile {
        key: "professional_art_critic",
        name: "Professional Art Critic",
        framing: "You are a professional art critic and gallery curator with 25 years of experience, evaluating photographs for potential inclusion in a fine art exhibition.",
        criteria: &[
            "Technical Excellence: Focus, exposure, composition, color/lighting",
            "Artistic Merit: Creativity, emotional impact, visual storytelling",
            "Commercial Appeal: Marketability, broad audience appeal",
            "Uniqueness: What sets this image apart from typical photography",
        ],
    },
    PersonaProfile {
        key: "street_photographer",
        name: "Street Photographer",
        framing: "You are a seasoned street photographer with a keen eye for capturing authentic, spontaneous moments in urban environments.",
        criteria: &[
            "Authenticity: Genuine, unposed moments and natural expressions",
            "Composition: Use of leading lines, framing, and urban geometry",
            "Human Connection: Emotional connection with subjects and environment",
            "Decisive Moment: Capturing fleeting, significant instants",
        ],
    },
    PersonaProfile {
        key: "commercial_photographer",
        name: "Commercial Photographer",
        framing: "You are a commercial photographer specializing in creating images that sell products, services, and build brand identity.",
        criteria: &[
            "Brand Alignment: Does the image fit the intended brand aesthetic?",
            "Product Showcase: How effectively is the subject presented?",
            "Marketing Appeal: Does the image drive consumer interest?",
            "Professional Quality: Technical excellence for commercial use",
        ],
    },
    PersonaProfile {
        key: "photojournalist",
        name: "Photojournalist",
        framing: "You are an experienced photojournalist dedicated to documenting events and telling compelling stories through powerful imagery.",
        criteria: &[
            "Newsworthiness: Does the image capture a significant moment or event?",
            "Objectivity: Fair and accurate representation without bias",
            "Emotional Impact: Strong emotional response that supports the story",
            "Narrative Clarity: Does the image tell a clear, compelling story?",
        ],
    },
    PersonaProfile {
        key: "social_media_influencer",
        name: "Social Media Influencer",
        framing: "You are a social media expert with expertise in creating viral content and understanding what engages modern digital audiences.",
        criteria: &[
            "Scroll-Stopping Power: Immediately captivating and attention-grabbing",
            "Shareability: Relatable content that encourages sharing",
            "Trend Awareness: Taps into current visual trends and aesthetics",
            "Engagement Potential: Likely to generate likes, comments, and interaction",
        ],
    },
];

/// Look up a persona by key
pub fn find_persona(key: &str) -> Option<&'static PersonaProfile> {
    PERSONAS.iter().find(|p| p.key == key)
}

/// Controlled vocabulary for subcategories and tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Taxonomy {
    pub name: &'static str,
    pub subcategories: &'static [&'static str],
    /// Tag groups in prompt order: (group label, tags)
    pub tag_groups: &'static [(&'static str, &'static [&'static str])],
}

const PHOTOGRAPHY_SUBCATEGORIES: &[&str] = &[
    "Portrait", "Group-Shot", "Couple", "Family", "Children", "Baby", "Senior-Citizen",
    "Pet", "Wildlife", "Bird", "Automotive", "Architecture", "Interior", "Product",
    "Food", "Flowers", "Macro", "Landscape", "Urban", "Beach", "Forest", "Event",
];

const SUBJECT_TAGS: &[&str] = &[
    "Portrait", "Group-Shot", "Couple", "Family", "Children", "Baby", "Senior-Citizen",
    "Pet", "Wildlife", "Bird", "Automotive", "Architecture", "Interior", "Product",
    "Food", "Flowers", "Macro",
];

const LIGHTING_TAGS: &[&str] = &[
    "Golden-Hour", "Blue-Hour", "Overcast", "Direct-Sun", "Window-Light",
    "Studio-Strobe", "Speedlight", "Natural-Light", "Low-Light", "Backlit",
    "Side-Lit", "Dramatic-Lighting",
];

const STYLE_TAGS: &[&str] = &[
    "Black-White", "Color-Graded", "High-Contrast", "Soft-Focus", "Sharp-Detail",
    "Shallow-DOF", "Wide-Angle", "Telephoto", "Candid", "Posed", "Action-Shot", "Still-Life",
];

const EVENT_LOCATION_TAGS: &[&str] = &[
    "Wedding", "Engagement", "Corporate", "Real-Estate", "Landscape",
    "Urban", "Beach", "Forest", "Indoor", "Outdoor", "Studio", "Event",
    "Concert", "Sports",
];

const MOOD_TAGS: &[&str] = &[
    "Bright-Cheerful", "Moody-Dark", "Romantic", "Professional", "Casual",
    "Energetic", "Peaceful", "Dramatic",
];

const CLASSIC_SUBCATEGORIES: &[&str] = &[
    "Candid", "Posed", "Automotive", "Real Estate", "Landscape", "Events", "Animal",
    "Product", "Food",
];

const CLASSIC_TAGS: &[&str] = &[
    "Strobist", "Available Light", "Natural Light", "Beautiful", "Black & White",
    "Timeless", "Low Quality", "Sentimental", "Action", "Minimalist", "Out of Focus",
    "Other", "Evocative", "Disturbing", "Boring", "Wedding", "Bride", "Groom", "Family",
    "Love", "Calm", "Busy",
];

impl Taxonomy {
    pub const PHOTOGRAPHY: Taxonomy = Taxonomy {
        name: "photography",
        subcategories: PHOTOGRAPHY_SUBCATEGORIES,
        tag_groups: &[
            ("SUBJECTS", SUBJECT_TAGS),
            ("LIGHTING", LIGHTING_TAGS),
            ("STYLE", STYLE_TAGS),
            ("EVENT/LOCATION", EVENT_LOCATION_TAGS),
            ("MOOD", MOOD_TAGS),
        ],
    };

    pub const CLASSIC: Taxonomy = Taxonomy {
        name: "classic",
        subcategories: CLASSIC_SUBCATEGORIES,
        tag_groups: &[("TAGS", CLASSIC_TAGS)],
    };

    pub fn by_name(name: &str) -> Option<Taxonomy> {
        match name.trim().to_ascii_lowercase().as_str() {
            "photography" => Some(Self::PHOTOGRAPHY),
            "classic" => Some(Self::CLASSIC),
            _ => None,
        }
    }

    pub fn categories(&self) -> &'static [Category] {
        &Category::ALL
    }

    /// All tags in prompt order, first occurrence wins for shared entries
    pub fn all_tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = Vec::new();
        for (_, group) in self.tag_groups {
            for tag in group.iter() {
                if !tags.contains(tag) {
                    tags.push(tag);
                }
            }
        }
        tags
    }

    /// Canonical spelling of a subcategory, if it belongs to this vocabulary
    pub fn match_subcategory(&self, label: &str) -> Option<&'static str> {
        let wanted = vocabulary_key(label);
        self.subcategories
            .iter()
            .copied()
            .find(|s| vocabulary_key(s) == wanted)
    }

    /// Canonical spelling of a tag, if it belongs to this vocabulary
    pub fn match_tag(&self, label: &str) -> Option<&'static str> {
        let wanted = vocabulary_key(label);
        self.tag_groups
            .iter()
            .flat_map(|(_, group)| group.iter().copied())
            .find(|t| vocabulary_key(t) == wanted)
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::PHOTOGRAPHY
    }
}

/// Comparison key: lowercase, with space/underscore/hyphen treated alike
fn vocabulary_key(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '_' => '-',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
