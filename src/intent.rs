//! Intent classification: picks a persona for a turn and its instructions
//!
//! Classification is a single pass over an ordered routing table. Rows are
//! checked top to bottom and the first row with any keyword contained in the
//! lowercased turn text wins, so overlapping keyword sets resolve by position.

use crate::chat::{joined_text, ChatItem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification outcome for a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Recipe,
    Bill,
    Notes,
    Repair,
    Healthcare,
    Teacher,
    Travel,
    Weather,
    Lawyer,
    Coder,
    Shopping,
    Finance,
    Therapist,
    General,
}

/// Ordered routing table. Position is priority.
pub const ROUTES: &[(Persona, &[&str])] = &[
    (Persona::Recipe, &["recipe", "cook", "dish", "fridge", "ingredients"]),
    (Persona::Bill, &["bill", "invoice", "receipt", "payment"]),
    (Persona::Notes, &["note", "summary", "summarize", "highlight"]),
    (Persona::Repair, &["fix", "repair", "broken", "not working"]),
    (
        Persona::Healthcare,
        &["symptom", "medicine", "doctor", "health", "pain", "fever"],
    ),
    (
        Persona::Teacher,
        &["explain", "teach", "study", "lesson", "homework", "exam"],
    ),
    (
        Persona::Travel,
        &["trip", "flight", "hotel", "vacation", "places", "travel"],
    ),
    (
        Persona::Weather,
        &["weather", "forecast", "temperature", "humidity", "umbrella"],
    ),
    (Persona::Lawyer, &["law", "legal", "contract", "case", "court"]),
    (
        Persona::Coder,
        &["code", "bug", "program", "debug", "compile", "script"],
    ),
    (
        Persona::Shopping,
        &["buy", "price", "shopping", "cart", "amazon", "meesho"],
    ),
    (
        Persona::Finance,
        &[
            "stock",
            "investment",
            "crypto",
            "loan",
            "mutual fund",
            "forex",
            "exchange rate",
            "currency",
        ],
    ),
    (
        Persona::Therapist,
        &["stress", "anxiety", "sad", "happy", "feelings"],
    ),
];

/// Appended after the persona prompt on every turn
pub const STYLE_DIRECTIVE: &str =
    "Respond concisely but naturally. Keep answers short and relevant.";

impl Persona {
    /// Capitalized name used in progress messages ("Recipe", "General")
    pub fn display_name(self) -> &'static str {
        match self {
            Persona::Recipe => "Recipe",
            Persona::Bill => "Bill",
            Persona::Notes => "Notes",
            Persona::Repair => "Repair",
            Persona::Healthcare => "Healthcare",
            Persona::Teacher => "Teacher",
            Persona::Travel => "Travel",
            Persona::Weather => "Weather",
            Persona::Lawyer => "Lawyer",
            Persona::Coder => "Coder",
            Persona::Shopping => "Shopping",
            Persona::Finance => "Finance",
            Persona::Therapist => "Therapist",
            Persona::General => "General",
        }
    }

    /// Inverse of [`Persona::display_name`]
    pub fn from_display_name(name: &str) -> Option<Persona> {
        ROUTES
            .iter()
            .map(|(p, _)| *p)
            .chain(std::iter::once(Persona::General))
            .find(|p| p.display_name() == name)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Classify a turn. Total: a turn without text, or without any keyword, is `General`.
pub fn classify(items: &[ChatItem]) -> Persona {
    classify_text(&joined_text(items))
}

/// Classify raw text against the routing table
pub fn classify_text(text: &str) -> Persona {
    let text = text.to_lowercase();
    ROUTES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map_or(Persona::General, |(persona, _)| *persona)
}

/// Role instructions for a persona; `General` runs without an override
pub fn system_prompt(persona: Persona) -> Option<&'static str> {
    let prompt = match persona {
        Persona::Recipe => "You are a master chef. Suggest creative recipes based on text or fridge images. Rely on your own culinary knowledge; call a tool only when the user needs live information such as nearby stores. Keep each recipe under 150 words.",
        Persona::Bill => "You are a finance assistant. Summarize bills and invoices with clear totals. Read amounts directly from the attached documents instead of calling tools. Keep the summary to a few lines.",
        Persona::Notes => "You are a study helper. Summarize and highlight main points from notes or PDFs. Work from the provided material; use web search only if the user asks for outside sources. Prefer short bullet points.",
        Persona::Repair => "You are a repair expert. Give step-by-step fixes with safety tips. Diagnose from the description and images yourself; search the web only for model-specific manuals or recalls. Keep it to at most eight steps.",
        Persona::Healthcare => "You are a health advisor. Provide general wellness info, but remind user to consult a doctor. Answer from general medical knowledge and never call tools for diagnosis. Keep answers under 120 words.",
        Persona::Teacher => "You are a patient teacher. Explain concepts in simple words with examples. Reason through the explanation yourself; use web search only for recent facts. Keep explanations under 200 words.",
        Persona::Travel => "You are a travel guide. Suggest itineraries, hotels, and cultural tips. Use the coordinates, places, flight and weather tools for live details and your own knowledge for everything else. Keep plans brief and scannable.",
        Persona::Weather => "You are a weather reporter. Always fetch live conditions: geocode the place with getCoordinates, then call fetchWeather; never guess current weather from memory. Report in two or three sentences.",
        Persona::Lawyer => "You are a legal assistant. Provide general legal information (not legal advice). Answer from general legal knowledge; search the web only for recent rulings or statutes. Keep it under 150 words.",
        Persona::Coder => "You are a coding tutor. Help debug, explain, and write code in any language. Reason about code yourself rather than calling tools. Keep prose short and let code speak.",
        Persona::Shopping => "You are a shopping assistant. Compare products, suggest best deals, and recommend brands. Use web search for current prices and availability. Limit recommendations to three options.",
        Persona::Finance => "You are a finance planner. Provide stock, crypto, and investment strategies. Call fetchStockData or fetchExchangeRate for any live price or rate instead of quoting from memory. Keep answers under 120 words.",
        Persona::Therapist => "You are a friendly therapist. Listen empathetically and give coping strategies. Never call tools; respond from empathy and general knowledge. Keep replies warm and under 100 words.",
        Persona::General => return None,
    };
    Some(prompt)
}

/// First content part of every turn: persona instructions followed by the style directive
pub fn instruction_part(persona: Persona) -> String {
    match system_prompt(persona) {
        Some(prompt) => format!("{prompt}\n\n{STYLE_DIRECTIVE}"),
        None => STYLE_DIRECTIVE.to_string(),
    }
}
