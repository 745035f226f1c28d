//! Guided website brief and canned assistant replies.
//!
//! [`GuidedWorkflow`] walks a user through six questions and turns the answers into a
//! generation prompt.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

pub const TOTAL_QUESTIONS: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    #[default]
    Initial,
    BusinessType,
    BusinessName,
    TargetAudience,
    Features,
    Style,
    ContactInfo,
    Generating,
    Complete,
}

impl WorkflowStep {
    /// Position among the questions, if this step asks one
    pub fn question_number(&self) -> Option<usize> {
        match self {
            WorkflowStep::BusinessType => Some(1),
            WorkflowStep::BusinessName => Some(2),
            WorkflowStep::TargetAudience => Some(3),
            WorkflowStep::Features => Some(4),
            WorkflowStep::Style => Some(5),
            WorkflowStep::ContactInfo => Some(6),
            _ => None,
        }
    }

    fn question(&self) -> Option<(&'static str, &'static str)> {
        let question = match self {
            WorkflowStep::BusinessType => (
                "Business Type",
                "What kind of business or activity do you want to promote?\n\nFor example: restaurant, coffee shop, personal portfolio, online store, consulting.",
            ),
            WorkflowStep::BusinessName => ("Business Name", "What is the name of your business?"),
            WorkflowStep::TargetAudience => ("Target Audience", "Who are your customers or visitors?"),
            WorkflowStep::Features => (
                "Features",
                "Which features should the website have? Separate them with commas.\n\nFor example: menu, gallery, booking, contact form.",
            ),
            WorkflowStep::Style => (
                "Design Style",
                "What look are you after?\n\nFor example: modern, minimalist, playful, elegant.",
            ),
            WorkflowStep::ContactInfo => (
                "Contact Information",
                "How can visitors reach you? Phone, email or address all work.",
            ),
            _ => return None,
        };
        Some(question)
    }

    fn next(&self) -> WorkflowStep {
        match self {
            WorkflowStep::Initial => WorkflowStep::BusinessType,
            WorkflowStep::BusinessType => WorkflowStep::BusinessName,
            WorkflowStep::BusinessName => WorkflowStep::TargetAudience,
            WorkflowStep::TargetAudience => WorkflowStep::Features,
            WorkflowStep::Features => WorkflowStep::Style,
            WorkflowStep::Style => WorkflowStep::ContactInfo,
            WorkflowStep::ContactInfo => WorkflowStep::Generating,
            WorkflowStep::Generating | WorkflowStep::Complete => WorkflowStep::Complete,
        }
    }
}

/// Answers collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowData {
    pub business_type: Option<String>,
    pub business_name: Option<String>,
    pub target_audience: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub style: Option<String>,
    pub contact_info: Option<String>,
    pub color_preference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidedWorkflow {
    pub step: WorkflowStep,
    pub data: WorkflowData,
}

fn render_question(step: WorkflowStep) -> String {
    match (step.question_number(), step.question()) {
        (Some(n), Some((title, body))) => format!("**Step {n} of {TOTAL_QUESTIONS}: {title}**\n{body}"),
        _ => String::new(),
    }
}

impl GuidedWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Greeting plus the first question. Moves the workflow to the first step.
    pub fn welcome(&mut self) -> String {
        self.step = WorkflowStep::BusinessType;
        format!(
            "Hi! I'm the SiteSpark AI builder.\n\nI'll help you build the website you have in mind. Let's start with a few simple questions.\n\n{}",
            render_question(self.step)
        )
    }

    /// Record the answer to the current question and return the next assistant message.
    pub fn answer(&mut self, text: &str) -> Result<String> {
        if self.step == WorkflowStep::Initial {
            return Ok(self.welcome());
        }

        let text = text.trim();
        if self.step.question_number().is_none() {
            return Err(Error::bad_request("All questions have already been answered"));
        }
        if text.is_empty() {
            return Err(Error::bad_request("Please provide an answer"));
        }

        let data = &mut self.data;
        match self.step {
            WorkflowStep::BusinessType => data.business_type = Some(text.to_string()),
            WorkflowStep::BusinessName => data.business_name = Some(text.to_string()),
            WorkflowStep::TargetAudience => data.target_audience = Some(text.to_string()),
            WorkflowStep::Features => {
                data.features = text
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect();
            }
            WorkflowStep::Style => data.style = Some(text.to_string()),
            WorkflowStep::ContactInfo => data.contact_info = Some(text.to_string()),
            _ => {}
        }

        self.step = self.step.next();
        if self.step == WorkflowStep::Generating {
            let name = self.data.business_name.as_deref().unwrap_or("your website");
            return Ok(format!("Thanks! I have everything I need. Building {name} now..."));
        }
        Ok(render_question(self.step))
    }

    pub fn set_color_preference(&mut self, color: impl Into<String>) {
        self.data.color_preference = Some(color.into());
    }

    /// Move from generating to complete once the site exists
    pub fn complete(&mut self) {
        if self.step == WorkflowStep::Generating {
            self.step = WorkflowStep::Complete;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prompt for the website generator built from the collected answers
    pub fn generation_prompt(&self) -> String {
        let data = &self.data;
        let or = |value: &Option<String>, fallback: &'static str| value.clone().unwrap_or_else(|| fallback.to_string());

        format!(
            "Create a {business_type} website named \"{business_name}\".\n\n\
             Target audience: {audience}\n\n\
             Desired features: {features}\n\n\
             Design style: {style}\n\n\
             Color preference: {color}\n\n\
             Contact information: {contact}\n\n\
             Build a complete website with:\n\
             - An engaging hero section\n\
             - About section\n\
             - Services/Products section\n\
             - Contact section\n\
             - Footer with full information",
            business_type = or(&data.business_type, ""),
            business_name = or(&data.business_name, ""),
            audience = or(&data.target_audience, ""),
            features = data.features.join(", "),
            style = or(&data.style, "modern and professional"),
            color = or(&data.color_preference, "matching the brand"),
            contact = or(&data.contact_info, "to be added later"),
        )
    }
}

/// Keyword-matched reply for free-form chat messages.
pub fn assistant_reply(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    let has_word = |word: &str| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == word);

    if lower.contains("hello") || has_word("hi") {
        "Hello! I'm your AI assistant. How can I help you with your website today?"
    } else if lower.contains("help") {
        "I can help you:\n- Generate new websites\n- Modify existing content\n- Answer questions about your site\n- Suggest improvements\n\nWhat would you like to do?"
    } else if lower.contains("color") || lower.contains("design") {
        "I can help you customize your website's design! You can change colors, fonts, and layouts. Would you like me to suggest some color schemes?"
    } else if lower.contains("content") || lower.contains("text") {
        "I can help you generate or edit content for your website. Just tell me what section you'd like to modify and what changes you want to make."
    } else {
        "I understand. To help you better, could you provide more details about what you'd like to do with your website?"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed() -> GuidedWorkflow {
        let mut workflow = GuidedWorkflow::new();
        workflow.welcome();
        for answer in [
            "Coffee shop",
            "Bean There",
            "Students and remote workers",
            "menu, , opening hours,gallery",
            "cosy",
            "hello@beanthere.example",
        ] {
            workflow.answer(answer).unwrap();
        }
        workflow
    }

    #[test]
    fn test_walks_all_steps() {
        let mut workflow = GuidedWorkflow::new();
        assert_eq!(workflow.step, WorkflowStep::Initial);

        let welcome = workflow.answer("").unwrap();
        assert!(welcome.contains("**Step 1 of 6: Business Type**"));
        assert_eq!(workflow.step, WorkflowStep::BusinessType);

        let next = workflow.answer("Coffee shop").unwrap();
        assert!(next.starts_with("**Step 2 of 6: Business Name**"));

        let workflow = completed();
        assert_eq!(workflow.step, WorkflowStep::Generating);
        assert_eq!(workflow.data.features, vec!["menu", "opening hours", "gallery"]);
        assert_eq!(workflow.data.contact_info.as_deref(), Some("hello@beanthere.example"));
    }

    #[test]
    fn test_rejects_blank_and_extra_answers() {
        let mut workflow = GuidedWorkflow::new();
        workflow.welcome();
        assert!(workflow.answer("   ").is_err());
        assert_eq!(workflow.step, WorkflowStep::BusinessType);

        let mut workflow = completed();
        assert!(workflow.answer("one more thing").is_err());
        workflow.complete();
        assert_eq!(workflow.step, WorkflowStep::Complete);

        workflow.reset();
        assert_eq!(workflow, GuidedWorkflow::default());
    }

    #[test]
    fn test_generation_prompt() {
        let mut workflow = completed();
        let prompt = workflow.generation_prompt();
        assert!(prompt.starts_with("Create a Coffee shop website named \"Bean There\"."));
        assert!(prompt.contains("Desired features: menu, opening hours, gallery"));
        assert!(prompt.contains("Design style: cosy"));
        assert!(prompt.contains("Color preference: matching the brand"));

        workflow.set_color_preference("earthy browns");
        assert!(workflow.generation_prompt().contains("Color preference: earthy browns"));
    }

    #[test]
    fn test_workflow_state_wire_format() {
        let json = serde_json::to_value(completed()).unwrap();
        assert_eq!(json["step"], "generating");
        assert_eq!(json["data"]["businessName"], "Bean There");
    }

    #[test]
    fn test_assistant_reply() {
        assert!(assistant_reply("Hi there").starts_with("Hello!"));
        assert!(assistant_reply("Can you help me?").starts_with("I can help you:"));
        assert!(assistant_reply("Change the colour scheme? no, the color").contains("design"));
        assert!(assistant_reply("Rewrite this text").contains("generate or edit content"));
        // "this" is not a greeting
        assert!(assistant_reply("what is this").starts_with("I understand."));
    }
}
