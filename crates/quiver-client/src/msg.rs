//! Prompt texts injected into conversations by the thread and agent loops.

use crate::adapter::Tool;

pub fn render_summarize_message() -> String {
    "Summarize the conversation so far in a compact form. Preserve every \
     fact, decision and open question that later messages may depend on, \
     and keep the summary shorter than the conversation it replaces."
        .to_string()
}

pub fn render_summary_message(summary: &str) -> String {
    format!("Here is a summary of the conversation so far:\n\n{summary}")
}

pub fn render_tool_error_message(error: &str) -> String {
    format!("The tool call failed with an error:\n\n{error}")
}

pub fn render_tool_previous_error_message() -> String {
    "Ignored because one of the previous calls ended with an error.".to_string()
}

pub fn render_agent_error_message() -> String {
    "Your reply did not contain any of the expected tags. Respond using \
     <thought>, <action> with <action_input>, or <answer> tags only."
        .to_string()
}

pub fn render_agent_fatal_error_message() -> String {
    "The agent repeatedly failed to produce a response in the expected format.".to_string()
}

pub fn render_agent_system_message(description: &str, tools: &[Tool]) -> String {
    let mut out = String::new();

    if description.is_empty() {
        out.push_str("You are an agent that solves tasks step by step.");
    } else {
        out.push_str(description);
    }

    out.push_str(
        "\n\nWork in steps. In each step, reply with one or more of the \
         following tags and nothing else:\n\
         <thought>your reasoning</thought>\n\
         <action>tool name</action>\n\
         <action_input>tool arguments as JSON</action_input>\n\
         <answer>the final answer, once no more actions are needed</answer>\n\n\
         After an action, the result is returned to you inside an \
         <observation> tag.",
    );

    if !tools.is_empty() {
        out.push_str("\n\nAvailable tools:");
        for tool in tools {
            out.push_str("\n- ");
            out.push_str(&tool.function.name);
            if let Some(description) = &tool.function.description {
                out.push_str(": ");
                out.push_str(description);
            }
            let parameters = serde_json::Value::Object(tool.function.parameters.clone());
            out.push_str("\n  parameters: ");
            out.push_str(&parameters.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ToolFunction;

    #[test]
    fn agent_system_message_lists_tools() {
        let tools = vec![Tool {
            function: ToolFunction {
                name: "get_weather".to_string(),
                description: Some("Current weather for a city".to_string()),
                parameters: serde_json::Map::new(),
                strict: None,
            },
        }];

        let message = render_agent_system_message("Weather helper.", &tools);

        assert!(message.starts_with("Weather helper."));
        assert!(message.contains("get_weather"));
        assert!(message.contains("<action_input>"));
    }

    #[test]
    fn summary_message_embeds_the_summary() {
        let message = render_summary_message("we agreed on plan B");
        assert!(message.contains("we agreed on plan B"));
    }
}
