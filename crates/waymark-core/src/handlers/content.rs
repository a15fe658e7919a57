//! Prompts for file generation and post-processing of generated text.

use crate::{
    error::{Result, WaymarkError},
    generation::GenerationRequest,
    text::strip_code_fence,
};

const CREATE_FILE_SYSTEM: &str = "You write the complete content of one file in a software project. \
Respond with the file content only: no explanations and no Markdown code fences.";

const MODIFY_FILE_SYSTEM: &str = "You edit one file in a software project. \
Respond with the complete updated file content only: no explanations and no Markdown code fences. \
Keep everything the instruction does not ask you to change exactly as it is.";

/// Request producing the content of a new file at `path`.
pub fn create_file_request(path: &str, prompt: &str) -> GenerationRequest {
    GenerationRequest::new(format!("File: {path}\n\nInstructions:\n{prompt}"))
        .with_system(CREATE_FILE_SYSTEM)
}

/// Request producing the updated content of `path`.
pub fn modify_file_request(path: &str, instruction: &str, current: &str) -> GenerationRequest {
    GenerationRequest::new(format!(
        "File: {path}\n\nInstructions:\n{instruction}\n\nCurrent content:\n```\n{current}\n```"
    ))
    .with_system(MODIFY_FILE_SYSTEM)
}

/// Turns a raw generation response into file content.
///
/// A surrounding code fence is removed, and the result ends with a newline
/// whenever `template` (the content being replaced, or empty for new files)
/// does or is empty.
///
/// # Errors
///
/// Returns `WaymarkError::MalformedOutput` when nothing but whitespace is
/// left.
pub fn normalize_generated(path: &str, raw: &str, template: &str) -> Result<String> {
    let body = strip_code_fence(raw);
    if body.trim().is_empty() {
        return Err(WaymarkError::MalformedOutput {
            path: path.to_string(),
            reason: "the generated content is empty".to_string(),
        });
    }

    let mut content = body.to_string();
    if (template.is_empty() || template.ends_with('\n')) && !content.ends_with('\n') {
        content.push('\n');
    }
    Ok(content)
}
