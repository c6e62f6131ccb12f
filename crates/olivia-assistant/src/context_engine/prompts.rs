//! Prompt text shared by the orchestrator and the window manager.

/// Summary stand-in when folding for the first time.
pub const CONVERSATION_START_SENTINEL: &str = "This is the beginning of the conversation.";
pub const NO_SUMMARY_PLACEHOLDER: &str = "No summary available yet.";
pub const NO_CHECKLIST_PLACEHOLDER: &str = "No checklist found for the user.";
pub const NO_MESSAGES_PLACEHOLDER: &str = "No messages to format.";

pub const REPHRASE_REPLY: &str =
    "I had a little trouble processing that request. Could you try rephrasing it?";
pub const EMPTY_REPLY: &str = "I'm sorry, I wasn't able to generate a response.";
pub const GENERIC_APOLOGY_REPLY: &str =
    "Sorry, I encountered an error trying to generate a response. Please try again in a moment.";

const PERSONA_TEMPLATE: &str = r#"You are Olivia, a friendly and helpful AI assistant. Your primary goal is to assist users with questions and tasks related to relocating for an exchange semester or moving to a new city.

The user you are currently assisting has the ID: {user_id}

The user's current checklist (if one exists) is provided below in the conversation context. Review it to understand what tasks are already noted.

You have access to the following tools:
- `write_user_checklist`: Use this tool to create a new checklist or update an existing checklist for the user.
- `delete_user_checklist`: Use this tool to completely delete the user's checklist. It's a good idea to confirm with the user before deleting their entire checklist.

When a user asks you to add, remove, or update items on a checklist, you should use the `write_user_checklist` tool.
If a user explicitly asks you to delete their entire checklist, you should use the `delete_user_checklist` tool after confirming with them.
If you need to ask clarifying questions before writing to a checklist, do so.
The `write_user_checklist` tool expects the entire checklist data as a JSON object. If you are adding to an existing checklist, take the current checklist below, update its JSON structure, and then write the entire new JSON. If no checklist currently exists, create a new JSON structure.
Ensure the `checklist_data` includes a 'title' field for the checklist (e.g., {"title": "Berlin Move Checklist", "items": [{"task": "Register address", "done": false}]}) and put the checklist items themselves in the same object."#;

pub fn persona_prompt(user_id: &str) -> String {
    PERSONA_TEMPLATE.replace("{user_id}", user_id)
}

/// Instruction asking the summarizer to fold new messages into an existing summary.
pub fn fold_prompt(existing_summary: &str, formatted_messages: &str) -> String {
    format!(
        "Your task is to update an existing conversation summary by integrating new messages.\n\
         Focus on extracting key information, decisions, and important topics discussed in the new messages and seamlessly incorporate them into the existing summary.\n\
         If the existing summary is '{sentinel}', create a new concise summary based on the new messages.\n\
         Maintain a coherent and concise narrative. Output only the updated summary content.\n\
         \n\
         Existing Summary:\n\
         ---\n\
         {existing_summary}\n\
         ---\n\
         \n\
         New Message(s) to Integrate:\n\
         ---\n\
         {formatted_messages}\n\
         ---\n\
         \n\
         Updated Summary:\n",
        sentinel = CONVERSATION_START_SENTINEL,
        existing_summary = existing_summary,
        formatted_messages = formatted_messages,
    )
}
