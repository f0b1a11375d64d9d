//! Tasks as seen by the focus timer.
//!
//! Task CRUD lives with the backend; the timer only needs a stable
//! identifier to bind to, the set of tasks a user may pick from, and the
//! accumulated `actual_min` counter that work sessions credit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown task status '{other}'"),
            }),
        }
    }
}

/// Ordered from least to most pressing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            other => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("unknown priority '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub estimated_min: Option<u32>,
    /// Minutes credited by completed work sessions.
    #[serde(default)]
    pub actual_min: u32,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::default(),
            parent_id: None,
            estimated_min: None,
            actual_min: 0,
            created_at: Utc::now(),
        }
    }

    /// Whether the task may be picked for a work session.
    pub fn is_selectable(&self) -> bool {
        self.status != TaskStatus::Done && self.parent_id.is_none()
    }
}

/// Tasks offered for binding: open, top-level, most pressing first,
/// newest first among equal priority.
pub fn selectable_tasks(tasks: impl IntoIterator<Item = Task>) -> Vec<Task> {
    let mut selectable: Vec<Task> = tasks.into_iter().filter(Task::is_selectable).collect();
    selectable.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    selectable
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(title: &str, priority: TaskPriority, age_min: i64) -> Task {
        let mut t = Task::new(title);
        t.priority = priority;
        t.created_at = Utc::now() - Duration::minutes(age_min);
        t
    }

    #[test]
    fn done_and_subtasks_are_not_selectable() {
        let open = task("open", TaskPriority::Low, 0);
        let mut done = task("done", TaskPriority::Urgent, 0);
        done.status = TaskStatus::Done;
        let mut child = task("child", TaskPriority::Urgent, 0);
        child.parent_id = Some(open.id.clone());

        let picked = selectable_tasks(vec![open, done, child]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].title, "open");
    }

    #[test]
    fn ordered_by_priority_then_newest() {
        let picked = selectable_tasks(vec![
            task("old-high", TaskPriority::High, 30),
            task("low", TaskPriority::Low, 1),
            task("new-high", TaskPriority::High, 5),
            task("urgent", TaskPriority::Urgent, 60),
        ]);
        let titles: Vec<_> = picked.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["urgent", "new-high", "old-high", "low"]);
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert_eq!(Task::new("t").priority, TaskPriority::Medium);
        assert_eq!("URGENT".parse::<TaskPriority>().unwrap(), TaskPriority::Urgent);
    }

    #[test]
    fn status_parses_from_storage_form() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("archived".parse::<TaskStatus>().is_err());
    }
}
