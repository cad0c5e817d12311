use crate::caption::CaptionInput;

/// Default prompt for generating a page caption
pub const DEFAULT_PROMPT: &str = r#"You are describing a web page for someone who cannot see it.

Write 2-4 sentences covering what the page is, who it is for, and the most important information on it. Do not describe navigation menus or boilerplate.

URL: {url}
Title: {title}
Description: {description}

Visible text:
{text}
{html}{css}
Respond with ONLY the description. No formatting or preamble."#;

/// Maximum characters of visible text sent to a provider
const MAX_TEXT_CHARS: usize = 8000;
const MAX_HTML_CHARS: usize = 10000;
const MAX_CSS_CHARS: usize = 4000;

/// Truncates to at most `max` bytes on a UTF-8 boundary
pub fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Renders a prompt template for a page
///
/// Supported placeholders are `{url}`, `{title}`, `{description}`, `{text}`,
/// `{html}` and `{css}`. `{html}` and `{css}` expand to a labelled excerpt
/// when included and to nothing otherwise. Missing title or description
/// render as `(none)`.
///
/// # Arguments
///
/// * `template` - The prompt template
/// * `input` - The page to describe
/// * `include_html` - Whether `{html}` expands to an HTML excerpt
/// * `include_css` - Whether `{css}` expands to the inline CSS
pub fn render_prompt(
    template: &str,
    input: &CaptionInput,
    include_html: bool,
    include_css: bool,
) -> String {
    let html = match (&input.html, include_html) {
        (Some(html), true) if !html.is_empty() => {
            format!("\nHTML excerpt:\n{}\n", truncate(html, MAX_HTML_CHARS))
        }
        _ => String::new(),
    };

    let css = match (&input.css, include_css) {
        (Some(css), true) if !css.is_empty() => {
            format!("\nInline CSS:\n{}\n", truncate(css, MAX_CSS_CHARS))
        }
        _ => String::new(),
    };

    template
        .replace("{url}", &input.url)
        .replace("{title}", input.title.as_deref().unwrap_or("(none)"))
        .replace(
            "{description}",
            input.description.as_deref().unwrap_or("(none)"),
        )
        .replace("{html}", &html)
        .replace("{css}", &css)
        .replace("{text}", truncate(&input.text, MAX_TEXT_CHARS))
}
