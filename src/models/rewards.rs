use serde::{Deserialize, Deserializer, Serialize};

/// An entry of the task catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(rename = "points", default, deserialize_with = "nullable")]
    pub points_reward: f64,
    #[serde(rename = "chances", default, deserialize_with = "nullable")]
    pub chances_reward: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "point", default, deserialize_with = "nullable")]
    pub points: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub chances: u32,
    #[serde(default)]
    pub rank: Option<u64>,
    #[serde(rename = "monthPoint", default, deserialize_with = "nullable")]
    pub month_points: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub correct: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub wrong: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub daily_task_list: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub task_list: Vec<String>,
}

impl Profile {
    /// Union of daily and one-off task types already completed.
    pub fn completed_tasks(&self) -> std::collections::HashSet<&str> {
        self.daily_task_list
            .iter()
            .chain(self.task_list.iter())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    #[serde(rename = "question")]
    pub text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizResult {
    /// Absent or null means the answer was wrong
    #[serde(default, deserialize_with = "flag")]
    pub correct: bool,
    #[serde(rename = "points", default, deserialize_with = "nullable")]
    pub points_awarded: f64,
}

/// Snapshot of an account's task progress and stats.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskSummary {
    pub daily_tasks: Vec<String>,
    pub regular_tasks: Vec<String>,
    pub stats: ProfileStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileStats {
    pub points: f64,
    pub chances: u32,
    pub rank: Option<u64>,
    pub month_points: f64,
    pub correct: u32,
    pub wrong: u32,
}

impl From<Profile> for TaskSummary {
    fn from(profile: Profile) -> Self {
        Self {
            stats: ProfileStats {
                points: profile.points,
                chances: profile.chances,
                rank: profile.rank,
                month_points: profile.month_points,
                correct: profile.correct,
                wrong: profile.wrong,
            },
            daily_tasks: profile.daily_task_list,
            regular_tasks: profile.task_list,
        }
    }
}

// The service sends `null` for empty lists and zero counters.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The service encodes flags as 1/0; accept real booleans too.
pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::Number(n) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        serde_json::Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid flag value: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_wire_format() {
        let profile: Profile = serde_json::from_value(json!({
            "point": 1200,
            "chances": 3,
            "rank": 15,
            "monthPoint": 300,
            "correct": 4,
            "wrong": 1,
            "dailyTaskList": ["login"],
            "taskList": null
        }))
        .unwrap();

        assert_eq!(profile.points, 1200.0);
        assert_eq!(profile.chances, 3);
        assert_eq!(profile.month_points, 300.0);
        assert!(profile.task_list.is_empty());
        assert!(profile.completed_tasks().contains("login"));
    }

    #[test]
    fn test_quiz_result_numeric_flag() {
        let right: QuizResult = serde_json::from_value(json!({"correct": 1, "points": 50})).unwrap();
        let wrong: QuizResult = serde_json::from_value(json!({"correct": 0})).unwrap();
        assert!(right.correct);
        assert_eq!(right.points_awarded, 50.0);
        assert!(!wrong.correct);
        assert_eq!(wrong.points_awarded, 0.0);
    }

    #[test]
    fn test_task_descriptor_wire_format() {
        let task: TaskDescriptor =
            serde_json::from_value(json!({"type": "share", "points": 100, "chances": 2})).unwrap();
        assert_eq!(task.task_type, "share");
        assert_eq!(task.points_reward, 100.0);
        assert_eq!(task.chances_reward, 2);
    }

    #[test]
    fn test_task_descriptor_null_rewards_default_to_zero() {
        let task: TaskDescriptor =
            serde_json::from_value(json!({"type": "x", "points": 10, "chances": null})).unwrap();
        assert_eq!(task.points_reward, 10.0);
        assert_eq!(task.chances_reward, 0);

        let task: TaskDescriptor =
            serde_json::from_value(json!({"type": "y", "points": null})).unwrap();
        assert_eq!(task.points_reward, 0.0);
        assert_eq!(task.chances_reward, 0);
    }

    #[test]
    fn test_question_with_null_options() {
        let question: QuizQuestion =
            serde_json::from_value(json!({"question": "q", "options": null})).unwrap();
        assert_eq!(question.text, "q");
        assert!(question.options.is_empty());
    }

    #[test]
    fn test_quiz_result_without_correct_flag_counts_as_wrong() {
        let result: QuizResult = serde_json::from_value(json!({"points": 0})).unwrap();
        assert!(!result.correct);
        assert_eq!(result.points_awarded, 0.0);

        let result: QuizResult = serde_json::from_value(json!({"correct": null, "points": null})).unwrap();
        assert!(!result.correct);
        assert_eq!(result.points_awarded, 0.0);
    }

    #[test]
    fn test_profile_null_counters() {
        let profile: Profile =
            serde_json::from_value(json!({"point": null, "chances": null, "correct": null})).unwrap();
        assert_eq!(profile, Profile::default());
    }
}
