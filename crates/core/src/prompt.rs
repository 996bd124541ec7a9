//! Prompts sent to the visual description capability.

/// Rules shared by every prompt: keep the slide's language, report meaning
/// rather than appearance, and invent nothing.
const CONTENT_RULES: &str = "\
LANGUAGE: Keep every piece of text in the language and script it appears in on the slide. \
Never translate. If the slide mixes languages, keep each one as written.

Extract only the business information on the slide:
- Processes and workflows: each step in order, its status (planned, in progress, completed, blocked), \
owners, dates, dependencies, inputs and outputs.
- Data and facts: titles, labels, numbers, percentages, metrics, dates, milestones, names of people, \
roles, departments, projects and phases, exactly as written.
- Status and progress: current state of tasks, completion indicators, risks, issues and achievements.

Do not describe colors, shapes, layout or positioning. Translate visual indicators into their meaning \
(a checkmark is \"completed\"). Do not add anything that is not on the slide, especially project names \
or titles.

Return structured business information suitable for storing in a database.";

/// Prompt for a visually complex slide.
///
/// When `slide_text` is non-empty the extracted text is given as the primary
/// source and the image only supplements it.
pub fn complex_slide_prompt(doc_name: &str, slide: usize, slide_text: &str) -> String {
    let slide_text = slide_text.trim();
    if slide_text.is_empty() {
        return format!(
            "Analyze this presentation slide image from \"{doc_name}\" (slide {slide}).\n\n{CONTENT_RULES}"
        );
    }
    format!(
        "Analyze this presentation slide image from \"{doc_name}\" (slide {slide}).\n\n\
EXTRACTED TEXT FROM SLIDE:\n{slide_text}\n\n\
INSTRUCTIONS:\n\
1. The extracted text above is the primary source. Include all of it; omit nothing.\n\
2. Use the image only to add structure and context to that text, never to replace it.\n\n\
{CONTENT_RULES}"
    )
}

/// Prompt for a table slide.
///
/// The extracted text is authoritative for every value; the image may only
/// explain structure (merged cells, headers) and legends.
pub fn table_slide_prompt(doc_name: &str, slide: usize, slide_text: &str) -> String {
    format!(
        "Analyze this table slide from \"{doc_name}\" (slide {slide}).\n\n\
EXTRACTED TEXT FROM SLIDE (rows are separated by new lines, cells by \" | \"):\n{}\n\n\
INSTRUCTIONS:\n\
1. The extracted text is authoritative. Every value you report must come from it, unchanged.\n\
2. Use the image only for structure: merged cells, header rows, grouping and legends.\n\
3. Where the slide has a legend, replace symbols with the legend text they stand for.\n\
4. Present each table row as a record with its column headers.\n\n\
{CONTENT_RULES}",
        slide_text.trim()
    )
}
