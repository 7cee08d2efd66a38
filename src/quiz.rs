use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Arrays,
    LinkedLists,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Cost of a question in the knapsack selection.
    pub fn weight(self) -> usize {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

pub const OPTION_COUNT: usize = 4;

/// A multiple-choice question as delivered by the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub options: [String; OPTION_COUNT],
    /// Index into `options`.
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub created_by: String,
    /// Creation timestamp as stored by the bank, usually RFC 3339.
    #[serde(default)]
    pub created_at: String,
}

impl Question {
    pub fn is_correct(&self, answer: usize) -> bool {
        answer == self.correct_answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_from_bank_json() {
        let question: Question = serde_json::from_str(
            r#"{
                "id": "q1",
                "topic": "linkedlists",
                "difficulty": "medium",
                "title": "Reverse a list",
                "options": ["O(1)", "O(n)", "O(n log n)", "O(n^2)"],
                "correctAnswer": 1,
                "createdBy": "admin",
                "createdAt": "2024-03-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(question.created_by, "admin");
        assert_eq!(question.topic, Topic::LinkedLists);
        assert_eq!(question.difficulty.weight(), 2);
        assert!(question.is_correct(1));
        assert!(!question.is_correct(0));
        assert!(question.explanation.is_empty());
    }

    #[test]
    fn question_needs_four_options() {
        let parsed = serde_json::from_str::<Question>(
            r#"{
                "id": "q2",
                "topic": "arrays",
                "difficulty": "easy",
                "title": "Index of the first element",
                "options": ["0", "1", "-1"],
                "correctAnswer": 0
            }"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn difficulty_names() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(Topic::Arrays.to_string(), "arrays");
        assert!(Difficulty::Easy < Difficulty::Hard);
    }
}
