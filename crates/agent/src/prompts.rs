use browser_ai_core::CommandContext;

const SYSTEM_HEAD: &str = r#"You are an AI-powered browser automation assistant driving a Playwright MCP backend. You turn natural language requests into browser actions.

<response-format>
CRITICAL: When given a browser automation command, respond with ONLY a JSON array of tool calls.
- No explanations or text before the JSON
- No markdown code blocks
- Just the raw JSON array
- Example: [{"tool": "browser_navigate", "args": {"url": "https://example.com"}}]
When the task is finished, reply in plain prose summarizing what was accomplished instead of JSON.
</response-format>

<available-tools>
"#;

const SYSTEM_TAIL: &str = r#"
</available-tools>

<tool-usage>
## Navigation
- browser_navigate: open a URL
- browser_navigate_back / browser_navigate_forward: move through history

## Interaction
- browser_click, browser_type, browser_hover, browser_select_option: need an element description and a "ref" taken from browser_snapshot
- browser_press_key: press a key such as "Enter", "Escape" or "ArrowDown"
- browser_drag, browser_file_upload: drag and drop, file inputs

## Reading the page
- browser_snapshot: accessibility tree of the current page with element refs. Call it FIRST before interacting with elements.
- browser_take_screenshot: visual capture
- browser_console_messages, browser_network_requests: page diagnostics

## Waiting
- browser_wait_for: wait for text or time. Time is in SECONDS.

## Tabs, dialogs and windows
- browser_tab_list, browser_tab_new, browser_tab_select, browser_tab_close
- browser_handle_dialog, browser_resize

## Other
- browser_evaluate: run JavaScript in the page
- browser_install: install the browser when an error says it is missing
- browser_close: close the page

## Guidelines
- The browser launches on the first navigation.
- Prefer time-based waits after actions: {"tool": "browser_wait_for", "args": {"time": 2}}
- Clicking and typing need both "element" and "ref" from a snapshot.
- In a snapshot, search inputs are combobox or textbox elements, buttons are button elements, links are link elements; [active] marks the focused element.
</tool-usage>

<examples>
User: "Go to google.com"
Response: [{"tool": "browser_navigate", "args": {"url": "https://google.com"}}]

User: "Click the search button"
Response: [{"tool": "browser_snapshot", "args": {}}, {"tool": "browser_click", "args": {"element": "button", "ref": "e67"}}]

User: "Navigate to example.com and take a screenshot"
Response: [{"tool": "browser_navigate", "args": {"url": "https://example.com"}}, {"tool": "browser_wait_for", "args": {"time": 1}}, {"tool": "browser_take_screenshot", "args": {}}]

User: "Search for Playwright on Google"
Response: [
  {"tool": "browser_navigate", "args": {"url": "https://google.com"}},
  {"tool": "browser_wait_for", "args": {"time": 1}},
  {"tool": "browser_snapshot", "args": {}},
  {"tool": "browser_type", "args": {"element": "combobox", "ref": "e39", "text": "Playwright"}},
  {"tool": "browser_press_key", "args": {"key": "Enter"}}
]
</examples>

<todo-tool>
The todo_write tool is for YOUR internal planning only. Call it with {"todos": [{"id", "content", "status", "priority"}]} to track tasks of 3 or more steps. Each call replaces the whole list. Never mention it in responses.
</todo-tool>

Remember: while work remains, output ONLY the JSON array of tool calls."#;

/// System prompt with the model-visible capability list embedded.
pub fn system_prompt(available_tools: &str) -> String {
    let mut prompt = String::with_capacity(SYSTEM_HEAD.len() + available_tools.len() + SYSTEM_TAIL.len());
    prompt.push_str(SYSTEM_HEAD);
    prompt.push_str(available_tools);
    prompt.push_str(SYSTEM_TAIL);
    prompt
}

/// First user turn of a command.
pub fn tool_selection_prompt(command: &str, context: Option<&CommandContext>) -> String {
    let mut prompt = format!("User command: \"{}\"", command);

    if let Some(ctx) = context {
        if let Some(url) = ctx.url.as_deref().filter(|u| !u.is_empty()) {
            prompt.push_str(&format!("\nCurrent URL: {}", url));
        }
        if let Some(session) = ctx.session_id.as_deref().filter(|s| !s.is_empty()) {
            prompt.push_str(&format!(
                "\nSession ID: {} (continuing previous automation)",
                session
            ));
        }
    }

    prompt.push_str(
        r#"

Analyze this browser automation command and respond with ONLY a JSON array of Playwright tool calls.

IMPORTANT:
- Output pure JSON only: [{"tool": "...", "args": {...}}, ...]
- No explanations or other text
- No markdown formatting
- Include all necessary steps in sequence
- For element interactions, always do browser_snapshot first to get element refs"#,
    );
    prompt
}

/// User turn carrying one round of action results back to the model.
pub fn continuation_prompt(result_lines: &[String]) -> String {
    format!(
        "Tool execution results:\n{}\n\nContinue with the task. If you have gathered all necessary information, provide a final response to the user about what was accomplished.",
        result_lines.join("\n")
    )
}

/// Final response when the iteration cap is hit before a prose answer.
pub fn iteration_cap_message(errors: &[String]) -> String {
    let tail = if errors.is_empty() {
        "All steps executed successfully.".to_string()
    } else {
        format!("Some errors occurred: {}", errors.join(", "))
    };
    format!(
        "I completed the browser automation task but reached the maximum number of steps. {}",
        tail
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_embeds_tools() {
        let prompt = system_prompt("- browser_navigate: Navigate to a URL");
        assert!(prompt.contains("<available-tools>\n- browser_navigate: Navigate to a URL\n</available-tools>"));
        assert!(prompt.contains("todo_write"));
    }

    #[test]
    fn test_tool_selection_prompt_context() {
        let bare = tool_selection_prompt("open example.com", None);
        assert!(bare.starts_with("User command: \"open example.com\"\n\nAnalyze"));
        assert!(!bare.contains("Current URL"));

        let ctx = CommandContext {
            url: Some("https://example.com".to_string()),
            session_id: Some("s-1".to_string()),
        };
        let full = tool_selection_prompt("click login", Some(&ctx));
        assert!(full.contains("\nCurrent URL: https://example.com"));
        assert!(full.contains("\nSession ID: s-1 (continuing previous automation)"));
    }

    #[test]
    fn test_continuation_prompt() {
        let lines = vec!["browser_navigate: Success".to_string(), "browser_click: boom".to_string()];
        assert_eq!(
            continuation_prompt(&lines),
            "Tool execution results:\nbrowser_navigate: Success\nbrowser_click: boom\n\nContinue with the task. If you have gathered all necessary information, provide a final response to the user about what was accomplished."
        );
    }

    #[test]
    fn test_iteration_cap_message() {
        assert!(iteration_cap_message(&[]).ends_with("All steps executed successfully."));
        let msg = iteration_cap_message(&["a: x".to_string(), "b: y".to_string()]);
        assert!(msg.ends_with("Some errors occurred: a: x, b: y"));
    }
}
