// All LLM prompt constants for the section generators.
//
// Placeholders shared by every template:
//   {grounding_instruction}, {facts_json}, {job_json}

/// Prepended to every generation prompt.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim you generate must be traceable to the candidate facts \
    provided below. Do NOT infer or invent employers, titles, dates, metrics or \
    technologies. If the facts do not support a claim, leave it out.";

/// System prompt for every section; enforces JSON-only output.
pub const SECTION_SYSTEM: &str = "You are an expert resume writer tailoring a candidate's \
    verified facts to one specific job. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT invent facts not present in the candidate facts.";

/// Summary prompt. Also replace: {min_chars}, {max_chars}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

CANDIDATE FACTS:
{facts_json}

TARGET JOB:
{job_json}

Write a professional summary for this candidate, tailored to the target job.
Return a JSON object:
{
  "summary": "Backend engineer with six years building ..."
}

HARD RULES:
1. Between {min_chars} and {max_chars} characters (count carefully)
2. Third person implied, no "I", no candidate name
3. Lead with the experience most relevant to the target job"#;

/// Skills prompt. Also replace: {count}, {max_item_chars}
pub const SKILLS_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

CANDIDATE FACTS:
{facts_json}

TARGET JOB:
{job_json}

Select and order the candidate's skills for the target job.
Return a JSON object:
{
  "skills": ["Rust", "PostgreSQL", "Distributed systems"]
}

HARD RULES:
1. EXACTLY {count} skills, no more and no fewer
2. Each skill at most {max_item_chars} characters
3. No duplicates, no skills the candidate facts do not support
4. Most relevant to the target job first"#;

/// Experience prompt. Also replace: {entry_count}, {min_bullets}, {max_bullets}, {max_bullet_chars}
pub const EXPERIENCE_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

CANDIDATE FACTS:
{facts_json}

TARGET JOB:
{job_json}

Rewrite the bullets of every experience entry to emphasize what matters for the target job.
Return a JSON object:
{
  "entries": [
    {
      "company": "exact company name from the facts",
      "title": "exact title from the facts",
      "bullets": ["Architected ...", "Reduced ..."]
    }
  ]
}

HARD RULES:
1. EXACTLY {entry_count} entries, in the same order as the facts
2. `company` and `title` copied verbatim from the facts
3. Between {min_bullets} and {max_bullets} bullets per entry
4. Each bullet at most {max_bullet_chars} characters
5. Only facts from the entry's own highlights; never move achievements between roles"#;

/// Cover letter prompt. Also replace: {min_paragraphs}, {max_paragraphs}, {min_chars}, {max_chars}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

CANDIDATE FACTS:
{facts_json}

TARGET JOB:
{job_json}

Write the body of a cover letter from the candidate for the target job.
Return a JSON object:
{
  "paragraphs": ["I am writing to ...", "At ...", "I would welcome ..."]
}

HARD RULES:
1. Between {min_paragraphs} and {max_paragraphs} paragraphs
2. Between {min_chars} and {max_chars} characters in total
3. No salutation and no sign-off, only the body paragraphs
4. Reference the company and role by name at least once"#;
