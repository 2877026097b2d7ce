//! Prompt text for relevance scoring.

use researchkit_shared::SearchCandidate;

/// Build the scoring prompt for `topic` over every candidate.
pub fn relevance_prompt(topic: &str, candidates: &[SearchCandidate]) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. URL: {}\n   Title: {}\n   Summary: {}",
                i + 1,
                c.url,
                c.title,
                c.summary()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\
You are screening web search results before they are scraped for research.

Topic: {topic}

Rate how relevant each result is to the topic on a scale from 0 (unrelated) \
to 10 (essential reading). Judge from the URL, title and summary only.

Results:
{listing}

Respond with a JSON array containing exactly one object per result above, \
using the URL exactly as given:
```json
[
  {{\"url\": \"<url>\", \"relevance\": <0-10>, \"rationale\": \"<one sentence>\"}}
]
```"
    )
}
