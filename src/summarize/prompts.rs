//! Prompt templates for the three-call summarization pipeline.

pub fn webpage_summary(content: &str) -> String {
    format!(
        "Summarize the following web page content in 3-5 sentences. \
         Focus on the main topic and key takeaways. Respond in plain text.\n\n\
         Content:\n{content}"
    )
}

pub fn youtube_summary(transcript: &str) -> String {
    format!(
        "Summarize the following video transcript in 3-5 sentences. \
         Focus on what the video teaches or argues. Respond in plain text.\n\n\
         Transcript:\n{transcript}"
    )
}

pub fn pdf_summary(content: &str) -> String {
    format!(
        "Summarize the following document in 4-6 sentences. \
         Preserve the document's structure of claims and conclusions. \
         Respond in plain text.\n\n\
         Document:\n{content}"
    )
}

pub fn tag_extraction(summary: &str) -> String {
    format!(
        "Extract up to 8 short topical tags from the summary below. \
         Order them from most to least relevant. \
         Respond with a JSON array of strings only, e.g. [\"python\", \"web\"].\n\n\
         Summary:\n{summary}"
    )
}

pub fn category_prediction(summary: &str) -> String {
    format!(
        "Suggest up to 3 broad categories for the content summarized below, \
         ordered from best to worst fit. \
         Respond with a JSON array of strings only, e.g. [\"Development\"].\n\n\
         Summary:\n{summary}"
    )
}
