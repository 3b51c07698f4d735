//! System prompt builder for the repository agent

use std::path::Path;

/// Build the system prompt for a question about the repository at `root`.
///
/// `custom` replaces the built-in instructions; the tool and root sections
/// are always appended so the model knows what it can call.
pub fn build_system_prompt(root: &Path, tool_names: &[&str], custom: Option<&str>) -> String {
    let mut lines = Vec::new();

    match custom.map(str::trim).filter(|c| !c.is_empty()) {
        Some(custom) => {
            lines.push(custom.to_string());
        }
        None => {
            lines.push(
                "You answer questions about a source repository by exploring it with tools."
                    .to_string(),
            );
            lines.push(
                "Ground every claim in file contents you have read. Cite files as \
                 `path:line` when you can."
                    .to_string(),
            );
            lines.push(
                "If the repository does not contain the answer, say so instead of guessing."
                    .to_string(),
            );
        }
    }
    lines.push(String::new());

    lines.push("## Repository".to_string());
    lines.push(format!("Root: {}", root.display()));
    lines.push(
        "All paths you pass to tools are relative to this root. Paths outside it, \
         VCS metadata, dependency trees and secret files are refused."
            .to_string(),
    );
    lines.push(String::new());

    if !tool_names.is_empty() {
        lines.push("## Tools".to_string());
        for tool in tool_names {
            lines.push(format!("- {}: {}", tool, tool_summary(tool)));
        }
        lines.push(String::new());

        lines.push("## Tool Call Style".to_string());
        lines.push(
            "Start broad (list_files), narrow with search_text, then read_file only what \
             you need. Prefer a small maxBytes when skimming."
                .to_string(),
        );
        lines.push(
            "A tool error comes back as JSON with a `_tag` field; adjust the call rather \
             than retrying it unchanged."
                .to_string(),
        );
        lines.push(String::new());
    }

    lines.join("\n")
}

fn tool_summary(name: &str) -> &'static str {
    match name {
        "list_files" => "List repository files as sorted relative paths",
        "search_text" => "Find lines containing a literal, case-sensitive substring",
        "read_file" => "Read a file's contents, truncated past maxBytes",
        _ => "",
    }
}
