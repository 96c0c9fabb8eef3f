//! Reading hand-written input documents, which may carry `#` comments.

use crate::domain::{CaseError, ConfigProblem};
use serde_json::Value;

/// Removes everything from an unquoted `#` to the end of its line.
pub fn strip_comments(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let mut in_string = false;
        let mut escaped = false;
        let mut cut = None;
        for (index, ch) in line.char_indices() {
            match ch {
                _ if escaped => escaped = false,
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '#' if !in_string => {
                    cut = Some(index);
                    break;
                }
                _ => {}
            }
        }
        match cut {
            Some(index) => {
                output.push_str(&line[..index]);
                if line.ends_with('\n') {
                    output.push('\n');
                }
            }
            None => output.push_str(line),
        }
    }
    output
}

pub fn parse_document(text: &str, strip: bool) -> Result<Value, CaseError> {
    let source = if strip {
        strip_comments(text)
    } else {
        text.to_string()
    };
    serde_json::from_str(&source).map_err(|error| CaseError::InvalidConfig {
        problems: vec![ConfigProblem::new(
            "<document>",
            format!("invalid JSON at line {} column {}: {error}", error.line(), error.column()),
        )],
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_document, strip_comments};
    use serde_json::json;

    #[test]
    fn comments_outside_strings_are_removed() {
        let text = "{\n  \"NAME\": \"a#b\", # trailing\n  # whole line\n  \"DV\": 1.0\n}\n";
        let stripped = strip_comments(text);
        assert_eq!(stripped, "{\n  \"NAME\": \"a#b\", \n  \n  \"DV\": 1.0\n}\n");

        let value = parse_document(text, true).expect("commented document should parse");
        assert_eq!(value, json!({"NAME": "a#b", "DV": 1.0}));
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let stripped = strip_comments(r##"{"A": "x\"#y"} # note"##);
        assert_eq!(stripped, r##"{"A": "x\"#y"} "##);
    }

    #[test]
    fn invalid_json_is_an_input_error() {
        let error = parse_document("{ # open", true).expect_err("truncated document should fail");
        assert_eq!(error.placeholder(), "INPUT.INVALID_CONFIG");
    }
}
