use serde::{Deserialize, Serialize};

/// A user profile as sent by the client. Everything but `id` is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: String,
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub university: Option<String>,
    pub nationality: Option<String>,
    pub current_city: Option<String>,
    pub move_in_city: Option<String>,
    pub about_me: Option<String>,
    pub avatar_url: Option<String>,
    pub relocation_status: Option<String>,
    pub relocation_timeframe: Option<String>,
    pub relocation_interests: Vec<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Unknown")
    }

    pub fn first_name(&self) -> &str {
        self.full_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
            .unwrap_or("the user")
    }

    /// `Label: value` lines for the fields shown to the similarity model.
    /// Nationality is never included.
    pub fn format_for_llm(&self) -> String {
        let mut parts = vec![format!("Id: {}", self.id)];
        let mut push = |label: &str, value: Option<String>| {
            if let Some(value) = value {
                parts.push(format!("{}: {}", label, value));
            }
        };
        push("Full name", self.full_name.clone());
        push("Age", self.age.map(|a| a.to_string()));
        push("University", self.university.clone());
        push("Current city", self.current_city.clone());
        push("Move in city", self.move_in_city.clone());
        push("About me", self.about_me.clone());
        push("Avatar url", self.avatar_url.clone());
        push("Relocation status", self.relocation_status.clone());
        push("Relocation timeframe", self.relocation_timeframe.clone());
        if !self.relocation_interests.is_empty() {
            push("Relocation interests", Some(self.relocation_interests.join(", ")));
        }
        parts.join("\n")
    }
}
