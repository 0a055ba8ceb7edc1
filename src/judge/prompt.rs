use crate::paper::Paper;
use crate::profile::UserProfile;

const RUBRIC: [&str; 11] = [
    "Completely irrelevant, no connection to the user's research interests.",
    "Marginal relevance, only a passing mention of a related topic or term.",
    "Very weak match, some relevant keywords but minimal applicability to user interests.",
    "Weak relevance, touches on similar areas but diverges in focus or application.",
    "Low relevance, shares a few broad themes with user research but lacks depth in key topics.",
    "Moderate relevance, overlaps with at least one research topic but lacks alignment with others.",
    "Fair relevance, aligns with at least one research topic, but not a precise fit.",
    "Good relevance, several overlapping topics. While some topics are peripheral, the paper is worth reading.",
    "Very high relevance, the paper strongly aligns with multiple research topics and matches user interests well.",
    "Excellent relevance, the paper is highly aligned with the user's research interests and offers valuable insights.",
    "Must read, this paper is directly applicable to the user's research and addresses core questions or problems in their field.",
];

const REPAIR_REMINDER: &str = "Your previous answer could not be parsed. Please ensure the response is in valid JSON format: \
a single object with exactly the keys \"relevance_score\", \"thoughts\", \"summary\" and \"relevant_topics\", \
with no markdown fences and no text before or after it.";

/// The evaluation request for one paper.
pub fn evaluation_prompt(paper: &Paper, profile: &UserProfile, threshold: u8) -> String {
    let rubric = RUBRIC
        .iter()
        .enumerate()
        .map(|(score, line)| format!("- {score}: {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a professional research assistant. Read the title and abstract of the paper below and summarize it in 1-2 sentences.\n\
        Next, evaluate the relevance of the paper given the user's research topics and interests.\n\
        A paper is worth returning if it is relevant to multiple research topics or aligns closely with the user's research interests.\n\n\
        **Score Scale**\n\
        {rubric}\n\n\
        Papers with a score of {threshold} or higher will be returned to the user.\n\n\
        Paper Title: {title}\n\
        Paper Abstract: {abstract_text}\n\n\
        User's Research Topics:\n\
        {topics}\n\n\
        User's Research Interests:\n\
        {interests}\n\n\
        Respond with a single JSON object and nothing else, exactly in this shape:\n\
        {{\n  \
        \"relevance_score\": 0,\n  \
        \"thoughts\": \"step-by-step reasoning for the score\",\n  \
        \"summary\": \"the paper's main contribution in 1-2 sentences\",\n  \
        \"relevant_topics\": [\"research topics from the list above that the paper touches\"]\n\
        }}\n\
        relevance_score must be an integer from 0 to 10. Do not wrap the object in markdown fences.",
        title = paper.title.trim(),
        abstract_text = paper.abstract_text.trim(),
        topics = profile.research_topics.join(", "),
        interests = profile.research_interests,
    )
}

/// The original request plus an explicit demand for valid JSON.
pub fn repair_prompt(original: &str) -> String {
    format!("{original}\n\n{REPAIR_REMINDER}")
}
