//! Scripted messages, fallbacks and the generator system prompt.

use super::assessment::{AssessmentKey, ConsentDecision};
use super::generator::GenerationContext;
use super::phase::Phase;

pub fn greeting(user_name: &str) -> String {
    format!("Hi {user_name}! 👋 How are you doing today?")
}

pub const PRIVACY_NOTICE: &str = "\
Before we begin, I'd like to share some important information about your privacy and how we handle your data.

This wellness assistant is designed to support you and your team's well-being. We take your privacy seriously and want to be transparent about our data practices.

Your responses will be used to understand team wellness trends and improve our support systems. All data is encrypted and stored securely. You have control over what you share and can stop at any time.";

pub const CONSENT_PROMPT: &str = "\
Now, I need your consent to proceed. Please choose one of the following options:
- full: I agree and consent (full participation with data collection)
- anonymous: I agree as anonymous (no personal data saved)
- declined: I don't wish to proceed at this time";

/// Acknowledgment for a consent decision.
pub fn consent_acknowledgment(
    decision: ConsentDecision,
    user_name: &str,
    contact_email: &str,
) -> String {
    match decision {
        ConsentDecision::Full => format!(
            "Great, thank you for your consent, {user_name}! We will save your full name and email ID \
             with the feedback you share. This helps us provide personalized support and follow up on \
             your wellness journey."
        ),
        ConsentDecision::Anonymous => "\
Thank you for participating anonymously. We will not save your personal information, but your \
responses will be used for team-level feedback to improve our wellness programs."
            .to_string(),
        ConsentDecision::Declined => format!(
            "Thank you for letting me know. If you want to discuss more about the wellness assistant, \
             you can reach out to {contact_email} for more information."
        ),
        ConsentDecision::Pending => String::new(),
    }
}

/// The fixed question asked in a phase.
pub fn question_text(phase: Phase) -> &'static str {
    match phase {
        Phase::Question1 => {
            "Now let's begin! I'm here to have a friendly chat and learn a bit about your work experience. \
             How satisfied are you feeling with your current work and the learning opportunities you have? \
             On a scale where 1 is really dissatisfied and 5 is very satisfied."
        }
        Phase::Question2 => {
            "I want to make sure you're doing well overall. Do you have any personal concerns that might be \
             affecting how you feel at work? It's completely okay if you'd rather not share details."
        }
        Phase::Question3 => {
            "How supported do you feel in achieving your career growth and development goals? \
             Again, thinking 1 to 5, where 1 is not supported at all and 5 is fully supported."
        }
        Phase::Question4 => "Are your one-on-one meetings with your manager happening regularly?",
        Phase::Question5 => {
            "How helpful do you find your one-on-one meetings with your manager? \
             On a scale of 1 to 5, where 1 is not helpful at all and 5 is extremely helpful."
        }
        _ => "",
    }
}

/// Canned follow-up used when the user seems unsatisfied and the generated
/// reply did not already ask something.
pub fn canned_follow_up(phase: Phase) -> &'static str {
    match phase {
        Phase::Question1 => "That must be challenging. What do you think would help improve things?",
        Phase::Question2 => {
            "Is there anything specific that might help, or would you prefer we focus on work-related topics?"
        }
        Phase::Question3 => "Growth support is so important. What would ideal support look like for you?",
        Phase::Question4 => "What do you think gets in the way of meeting regularly?",
        Phase::Question5 => "What would make your one-on-ones more helpful for you?",
        _ => "Could you tell me a little more about that?",
    }
}

pub const CONFIRMATION_PROMPT: &str = "Would you like to move on to the next question?";

pub const REPEAT_CONFIRMATION_PROMPT: &str =
    "Is there anything else you'd like to add, or shall we move on to the next question?";

pub const TRANSITION_MESSAGE: &str = "Great, let's move on.";

pub fn closing_message(user_name: &str) -> String {
    format!(
        "Thank you so much for sharing all of that with me, {user_name}. Your insights are really valuable."
    )
}

pub const WRAP_UP_PROMPT: &str = "\
Before we wrap up, is there anything else on your mind that you'd like to share? It could be anything - \
suggestions, concerns, positive feedback, or just thoughts about your work experience.";

pub const FEEDBACK_THANKS: &str =
    "Thank you for sharing your thoughts. Your feedback helps us improve workplace wellness.";

/// Phase tag suffix asking the generator for a follow-up acknowledgment.
pub const FOLLOW_UP_SUFFIX: &str = "-followup";

pub fn follow_up_tag(phase: Phase) -> String {
    format!("{phase}{FOLLOW_UP_SUFFIX}")
}

/// Static reply used when the generator fails for `phase_tag`.
pub fn fallback_response(phase_tag: &str) -> &'static str {
    if phase_tag.ends_with(FOLLOW_UP_SUFFIX) {
        return "Thank you for sharing that. I really appreciate your openness.";
    }
    match phase_tag {
        "question_1" => {
            "Thank you for sharing that with me. Could you tell me more about what aspects of your work experience are most important to you?"
        }
        "question_2" => {
            "I appreciate you being open about that. It's important to consider all aspects of wellbeing."
        }
        "question_3" => {
            "That's helpful to know. Support for growth is such an important part of job satisfaction."
        }
        "question_4" => "Thank you for that insight about your one-on-ones.",
        "question_5" => "I really appreciate all the feedback you've shared with me today.",
        _ => "Thank you for sharing that. I'd love to hear more about your experience.",
    }
}

/// System prompt for LLM-backed generation.
pub fn generator_system_prompt(context: &GenerationContext, phase_tag: &str) -> String {
    let base = "\
You are a caring, empathetic wellness assistant conducting a workplace wellbeing assessment.

ASSESSMENT STRUCTURE:
The wellness assessment consists of 5 main questions:
1. Work satisfaction and learning opportunities (scale 1-5)
2. Personal concerns affecting work (yes/no)
3. Career growth and development support (scale 1-5)
4. One-on-one meeting frequency with manager (yes/no)
5. One-on-one meeting helpfulness (scale 1-5)";

    let answers = AssessmentKey::ALL
        .iter()
        .map(|key| {
            let value = context.question_responses.get(*key);
            format!("  - {key}: {}", if value.is_empty() { "(not yet answered)" } else { value })
        })
        .collect::<Vec<_>>()
        .join("\n");

    let feedback = context
        .additional_feedback
        .as_deref()
        .map(|f| format!("\n- Additional feedback: {f}"))
        .unwrap_or_default();

    let guidance = if phase_tag.ends_with(FOLLOW_UP_SUFFIX) {
        "\
- The user just elaborated on their answer. Acknowledge it warmly in 1-2 sentences.
- Do NOT ask another question and do NOT suggest moving on."
    } else {
        "\
- Acknowledge their specific response with empathy and understanding.
- For scale responses: 1-2 = supportive/concerned tone, 3 = balanced/curious, 4-5 = positive/celebratory.
- You may ask ONE thoughtful follow-up question that encourages them to share more.
- Never announce the next question or suggest moving on; the survey handles that."
    };

    format!(
        "{base}

CURRENT CONTEXT:
- User name: {name}
- Current phase: {phase_tag}
- Consent status: {consent}
- Previous responses:
{answers}{feedback}

RESPONSE GUIDELINES:
- Be warm, genuine, and conversational, like a trusted colleague.
- Keep responses to 1-2 sentences.
- Use their name occasionally. Avoid clinical or HR-speak.
{guidance}",
        name = context.user_name,
        consent = context.consent_given,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::assessment::Assessment;
    use crate::survey::classifier::has_navigation_cue;

    #[test]
    fn full_consent_is_personalized() {
        let text = consent_acknowledgment(ConsentDecision::Full, "Rahul", "help@example.com");
        assert!(text.contains("Rahul"));
        assert!(text.contains("full name"));
    }

    #[test]
    fn declined_mentions_contact() {
        let text = consent_acknowledgment(ConsentDecision::Declined, "Rahul", "help@example.com");
        assert!(text.contains("help@example.com"));
    }

    #[test]
    fn every_question_has_text() {
        for phase in Phase::QUESTIONS {
            assert!(!question_text(phase).is_empty(), "{phase} has no question");
            assert!(canned_follow_up(phase).ends_with('?'));
        }
        assert!(question_text(Phase::Consent).is_empty());
    }

    #[test]
    fn fallbacks_are_phase_keyed() {
        assert!(fallback_response("question_3").starts_with("That's helpful to know."));
        assert_ne!(fallback_response("question_2"), fallback_response("question_4"));
        assert_eq!(
            fallback_response("question_2-followup"),
            fallback_response("question_5-followup")
        );
        assert!(fallback_response("unknown").contains("I'd love to hear more"));
    }

    #[test]
    fn fallbacks_carry_no_navigation_cue() {
        for phase in Phase::QUESTIONS {
            assert!(!has_navigation_cue(fallback_response(phase.as_str())));
            assert!(!has_navigation_cue(fallback_response(&follow_up_tag(phase))));
        }
    }

    #[test]
    fn follow_up_tag_format() {
        assert_eq!(follow_up_tag(Phase::Question2), "question_2-followup");
    }

    #[test]
    fn system_prompt_includes_context() {
        let mut assessment = Assessment::new();
        assessment.record(Phase::Question1, "2").unwrap();
        let context = GenerationContext::new(
            "Alice",
            &assessment,
            Phase::Question1,
            ConsentDecision::Anonymous,
            None,
        );
        let prompt = generator_system_prompt(&context, "question_1");
        assert!(prompt.contains("User name: Alice"));
        assert!(prompt.contains("Consent status: anonymous"));
        assert!(prompt.contains("work_satisfaction: 2"));
        assert!(prompt.contains("growth_support: (not yet answered)"));
        assert!(prompt.contains("ONE thoughtful follow-up"));

        let follow_up = generator_system_prompt(&context, "question_1-followup");
        assert!(follow_up.contains("Do NOT ask another question"));
    }
}
