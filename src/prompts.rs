//! Prompt template for the single-shot concept explainer.

/// Builds the fixed four-section instruction for one concept.
///
/// The model is trusted to follow the structure; the answer is rendered
/// verbatim.
pub fn concept_prompt(concept: &str) -> String {
    format!(
        "You are a psychology tutor. Explain the concept \"{concept}\" to an \
undergraduate student using exactly these four sections:\n\
\n\
1. **Formal definition**: the textbook definition of the concept.\n\
2. **Plain-language analogy**: an everyday analogy that makes it intuitive.\n\
3. **Practical example**: a concrete situation where it shows up.\n\
4. **Associated theorist**: the researcher most associated with it and why.\n"
    )
}
