//! Prompt construction for the news curator.

/// The user query sent for `country`.
pub fn user_query(country: &str) -> String {
    format!(
        "What are the top 10 most discussed news items right now for {country}? \
         For each item, provide a concise summary. The summary MUST include links to at least \
         one primary source in the required 'sources' array field."
    )
}

/// The system instruction pinning output format and language.
pub fn system_instruction(language: &str) -> String {
    format!(
        "You are a helpful news curator. Your task is to provide the requested information. \
         **Your entire response MUST be a single valid JSON structure (with fields title, summary, \
         and sources(link_title, url)) wrapped in ```json ... ``` code fences.** \
         Ensure all output text is in the {language} language. \
         Use the search tool to find authoritative and up-to-date sources and include them in the \
         'sources' array. \
         Make sure to link to the original news article that is being referenced on its website. \
         Do not include news that is over 1 week old. If that means there are not 10 total news \
         headlines, that is OK."
    )
}
