use serde::{Deserialize, Serialize};

pub const FINAL_ANSWER_DELIMITER: &str = "### Final Answer:";

/// Reasoning recorded when the generator answered without the delimiter.
pub const DIRECT_RESPONSE: &str = "Direct response provided.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResponse {
    pub reasoning: String,
    pub answer: String,
}

/// Splits at the first delimiter occurrence; later occurrences stay in the
/// answer. Without a delimiter the whole (trimmed) text is the answer.
pub fn split_response(raw: &str) -> SplitResponse {
    match raw.split_once(FINAL_ANSWER_DELIMITER) {
        Some((reasoning, answer)) => SplitResponse {
            reasoning: reasoning.trim().to_string(),
            answer: answer.trim().to_string(),
        },
        None => SplitResponse {
            reasoning: DIRECT_RESPONSE.to_string(),
            answer: raw.trim().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_reasoning_from_answer() {
        let split = split_response(
            "Section 2 sets the speed.\n### Final Answer: A minimum of 50 Mbps.\n",
        );
        assert_eq!(split.reasoning, "Section 2 sets the speed.");
        assert_eq!(split.answer, "A minimum of 50 Mbps.");
    }

    #[test]
    fn missing_delimiter_is_a_direct_response() {
        let split = split_response("  I can only assist with official policy queries.  ");
        assert_eq!(split.reasoning, DIRECT_RESPONSE);
        assert_eq!(split.answer, "I can only assist with official policy queries.");
    }

    #[test]
    fn only_the_first_delimiter_splits() {
        let split = split_response("r ### Final Answer: a ### Final Answer: b");
        assert_eq!(split.reasoning, "r");
        assert_eq!(split.answer, "a ### Final Answer: b");
    }

    #[test]
    fn empty_parts_are_allowed() {
        let split = split_response("### Final Answer:");
        assert_eq!(split.reasoning, "");
        assert_eq!(split.answer, "");
    }
}
