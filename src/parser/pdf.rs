use tracing::debug;

/// Extract the text layer of a PDF; malformed or image-only files give `None`.
///
/// The PDF parser can panic on hostile input, so callers in async code should
/// go through [`extract_text_blocking`].
pub fn extract_text(bytes: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            debug!(error = ?e, "PDF text extraction failed");
            None
        }
    }
}

/// Run [`extract_text`] on the blocking pool; a parser panic counts as no text.
pub async fn extract_text_blocking(bytes: Vec<u8>) -> Option<String> {
    match tokio::task::spawn_blocking(move || extract_text(&bytes)).await {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "PDF extraction task aborted");
            None
        }
    }
}

/// Non-blank trimmed lines; each stands in for an HTML block.
pub fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}
