//! Prompt text sent to the hosted models.

use crate::model::SessionConfig;

/// Instruction for the live interviewer, built from the session setup and
/// an optional candidate profile.
pub fn system_instruction(config: &SessionConfig, profile: Option<&str>) -> String {
    let mut out = format!(
        "You are an expert interviewer for a {} position.\nThe difficulty level is {}.\n\n",
        config.role, config.difficulty
    );
    if let Some(jd) = &config.job_description {
        out.push_str(&format!("Job Description Context:\n{jd}\n\n"));
    }
    if let Some(resume) = &config.resume {
        out.push_str(&format!("Candidate Resume Context:\n{resume}\n\n"));
    }
    if let Some(profile) = profile {
        out.push_str(profile);
        out.push('\n');
    }
    out.push_str(
        "Conduct a professional technical interview.\n\
         Start by welcoming the candidate and asking a relevant opening question based on the role/JD/Resume.\n\
         Keep your responses concise and conversational.",
    );
    out
}

pub const EXTRACTION_PROMPT: &str = r#"You are an expert Resume Parser and Knowledge Graph Engineer.
Your task is to extract technical skills from the provided resume and job description text.

For each skill, determine:
1. Standardized Name (e.g., "React.js" -> "React", "Amazon Web Services" -> "AWS")
2. Category (Frontend, Backend, Database, DevOps, Language, Mobile, AI/ML, Other)
3. Proficiency Level (Expert, Intermediate, Beginner) based on context clues (years of experience, words like "proficient", "familiar"). Default to "Intermediate" if unsure.
4. A one-sentence description of the skill.
5. Up to three closely related skills the candidate did not mention, as standardized names.

Return ONLY a raw JSON array of objects. Do not include markdown formatting.
Example:
[
  {"name": "React", "category": "Frontend", "level": "Expert", "description": "Component-based UI library.", "related": ["Redux", "Next.js"]},
  {"name": "Python", "category": "Language", "level": "Intermediate", "description": "General-purpose language.", "related": ["FastAPI"]}
]"#;

pub const RESUME_PROMPT: &str = "You are a resume parser. Extract the candidate's name, key skills, and most recent experience summary from this resume. Return a concise summary text that can be used as context for an interviewer.";

/// The debrief request text for one session.
pub fn debrief_prompt(config: &SessionConfig, transcript: &str, language: &str) -> String {
    let transcript = if transcript.trim().is_empty() {
        "(No audible conversation recorded)"
    } else {
        transcript
    };
    let role = if config.role.trim().is_empty() {
        "General"
    } else {
        config.role.as_str()
    };
    format!(
        "You are an expert Interview Coach. Analyze the following interview transcript and generate a debrief JSON.

Context:
Role: {role}
Difficulty: {difficulty}
Job Description: {jd}

Transcript:
{transcript}

Requirements:
- LANGUAGE: ALL TEXT OUTPUT MUST BE IN {language}.
- `conversation_summary`: A comprehensive paragraph recounting what was discussed in the interview.
- `improvements`: Provide at least 3 to 5 specific improvement items.
- For `evidence.quote`: keep the speaker's original speech patterns, interruptions, filler words and stammers. Do not correct grammar or fluency.
- `question_recap`: one entry per interviewer question with a short summary of the answer and an assessment.
- `skill_updates`: for each technical skill that was actually tested, its standardized name and a 0-100 mastery score.
- CRITICAL: ALL SCORES MUST BE ON A SCALE OF 0-100 (e.g. 75, 88, 92). Do not use 0-5 or 0-10.
- If the transcript is short (< 2 turns) or empty, give low scores (e.g. 10) and explain in notes_if_low_data that the session had no audio.",
        difficulty = config.difficulty,
        jd = config.job_description.as_deref().unwrap_or("Not provided"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;

    #[test]
    fn instruction_includes_setup_and_profile() {
        let config = SessionConfig::new("Backend Engineer", Difficulty::Hard)
            .with_job_description("Owns the billing API");
        let text = system_instruction(&config, Some("Candidate Profile based on Knowledge Graph:\n[Strengths]: Go."));

        assert!(text.starts_with("You are an expert interviewer for a Backend Engineer position."));
        assert!(text.contains("The difficulty level is hard."));
        assert!(text.contains("Job Description Context:\nOwns the billing API"));
        assert!(!text.contains("Candidate Resume Context"));
        assert!(text.contains("[Strengths]: Go."));
    }

    #[test]
    fn empty_transcript_is_called_out() {
        let config = SessionConfig::new("", Difficulty::Medium);
        let text = debrief_prompt(&config, "  ", "English");
        assert!(text.contains("Role: General"));
        assert!(text.contains("Job Description: Not provided"));
        assert!(text.contains("(No audible conversation recorded)"));
        assert!(text.contains("MUST BE IN English"));
    }
}
