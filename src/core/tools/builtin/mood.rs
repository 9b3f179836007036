use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::tools::base::{Tool, ToolKind, input_str};
use crate::core::tools::progress::ProgressReporter;
use crate::errors::ToolResult;

/// Mood category, suggestions per intensity (mild, moderate, intense), general advice
type MoodEntry = (&'static str, [[&'static str; 3]; 3], &'static str);

const MOODS: [MoodEntry; 6] = [
    (
        "sad",
        [
            ["Listen to uplifting music", "Take a short walk outside", "Call a friend for a quick chat"],
            ["Practice mindfulness meditation for 10 minutes", "Watch a comedy show or funny videos", "Write down three things you're grateful for"],
            ["Reach out to a close friend or family member", "Consider talking to a professional counselor", "Practice deep breathing exercises and self-compassion"],
        ],
        "Remember that emotions are temporary and will pass with time.",
    ),
    (
        "anxious",
        [
            ["Take five deep breaths", "Step outside for fresh air", "Make a cup of calming tea"],
            ["Try a guided meditation for anxiety", "Write down your worries and challenge negative thoughts", "Do a brief physical activity like stretching"],
            ["Use the 5-4-3-2-1 grounding technique", "Practice progressive muscle relaxation", "Consider talking to a mental health professional"],
        ],
        "Focus on what you can control in the present moment.",
    ),
    (
        "angry",
        [
            ["Count to ten slowly", "Take a short break from the situation", "Drink a glass of cold water"],
            ["Do physical exercise to release tension", "Write down your feelings without judgment", "Listen to calming music"],
            ["Remove yourself from the triggering situation", "Practice deep breathing until you feel calmer", "Use visualization to imagine a peaceful scene"],
        ],
        "Try to understand the root cause of your anger before reacting.",
    ),
    (
        "stressed",
        [
            ["Take a short break and stretch", "Make a to-do list to organize tasks", "Listen to calming music"],
            ["Go for a walk outside", "Practice progressive muscle relaxation", "Set boundaries and learn to say no"],
            ["Prioritize self-care activities", "Break large tasks into smaller steps", "Consider talking to someone about your stress"],
        ],
        "Taking small breaks can significantly reduce overall stress levels.",
    ),
    (
        "tired",
        [
            ["Take a short 10-minute power nap", "Have a healthy snack for energy", "Do some light stretching"],
            ["Step outside for fresh air and sunlight", "Drink water as dehydration can cause fatigue", "Take short breaks between tasks"],
            ["Evaluate your sleep schedule and quality", "Consider reducing caffeine and screen time before bed", "Make time for proper rest and recovery"],
        ],
        "Listen to your body's needs for rest and recovery.",
    ),
    (
        "happy",
        [
            ["Share your happiness with someone else", "Express gratitude for the moment", "Take a photo to remember this feeling"],
            ["Channel your positive energy into a creative activity", "Do something kind for someone else", "Journal about what made you happy"],
            ["Celebrate your joy fully without holding back", "Use this positive state to tackle something challenging", "Reflect on what led to this happiness to recreate it later"],
        ],
        "Savor this positive emotion and remember what contributed to it.",
    ),
];

const SYNONYMS: [(&str, [&str; 4]); 5] = [
    ("sad", ["depressed", "down", "blue", "gloomy"]),
    ("anxious", ["worried", "nervous", "tense", "uneasy"]),
    ("angry", ["mad", "frustrated", "irritated", "annoyed"]),
    ("tired", ["exhausted", "sleepy", "fatigued", "drained"]),
    ("happy", ["joyful", "excited", "pleased", "content"]),
];

/// Suggestions for improving the user's current mood.
pub struct MoodSuggestionTool;

/// Map free-form mood text to a known category, defaulting to `stressed`.
fn categorize(mood: &str) -> &'static MoodEntry {
    let direct = MOODS
        .iter()
        .find(|(category, _, _)| mood.contains(category) || category.contains(mood));
    if let Some(entry) = direct {
        return entry;
    }
    let category = SYNONYMS
        .iter()
        .find(|(_, words)| words.iter().any(|w| mood.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or("stressed");
    MOODS
        .iter()
        .find(|(c, _, _)| *c == category)
        .unwrap_or(&MOODS[3])
}

pub(super) fn suggest(mood: &str, intensity: &str) -> Value {
    let (category, levels, advice) = categorize(mood);
    let (intensity, level) = match intensity {
        "mild" => ("mild", 0),
        "intense" => ("intense", 2),
        _ => ("moderate", 1),
    };
    json!({
        "mood": category,
        "intensity": intensity,
        "suggestions": levels[level],
        "generalAdvice": advice,
    })
}

#[async_trait]
impl Tool for MoodSuggestionTool {
    fn name(&self) -> &str {
        "getMoodSuggestionTool"
    }

    fn description(&self) -> &str {
        "Get personalized suggestions to improve mood or emotional state"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "currentMood": {
                    "type": "string",
                    "description": "The user's current mood or emotional state"
                },
                "intensity": {
                    "type": "string",
                    "description": "The intensity of the mood (mild, moderate, intense)",
                    "enum": ["mild", "moderate", "intense"],
                    "default": "moderate"
                }
            },
            "required": ["currentMood"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Fast
    }

    async fn execute(&self, input: Value, _progress: ProgressReporter) -> ToolResult<Value> {
        let mood = input_str(&input, "currentMood")
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if mood.is_empty() {
            return Ok(json!({ "error": "Current mood is required" }));
        }
        let intensity = input_str(&input, "intensity")
            .unwrap_or("moderate")
            .to_lowercase();
        Ok(suggest(&mood, &intensity))
    }
}
