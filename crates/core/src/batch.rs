//! Batch prompt input: one job per non-blank line.

/// Split `text` into prompts, trimming each line and dropping blank ones.
pub fn parse_batch_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
