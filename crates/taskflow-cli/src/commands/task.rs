use clap::Subcommand;
use taskflow_core::storage::Database;
use taskflow_core::{Task, TaskId, TaskPriority, TaskStatus};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a task
    Add {
        /// Task title
        title: String,
        /// Priority: low, medium, high or urgent
        #[arg(long, default_value = "medium")]
        priority: TaskPriority,
        /// Estimated minutes
        #[arg(long)]
        estimate: Option<u32>,
        /// Parent task ID (makes this a subtask)
        #[arg(long)]
        parent: Option<String>,
        /// Longer description
        #[arg(long)]
        description: Option<String>,
    },
    /// List tasks a work session can be bound to
    List {
        /// Include finished tasks and subtasks
        #[arg(long)]
        all: bool,
    },
    /// Mark a task as done
    Done {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    let db = Database::open()?;

    match action {
        TaskAction::Add {
            title,
            priority,
            estimate,
            parent,
            description,
        } => {
            if title.trim().is_empty() {
                return Err("task title must not be empty".into());
            }
            let parent_id = parent.map(TaskId::from);
            if let Some(parent_id) = &parent_id {
                if db.get_task(parent_id)?.is_none() {
                    return Err(format!("parent task not found: {parent_id}").into());
                }
            }

            let mut task = Task::new(title.trim());
            task.priority = priority;
            task.estimated_min = estimate;
            task.parent_id = parent_id;
            task.description = description;
            db.insert_task(&task)?;
            print_json(&task)?;
        }
        TaskAction::List { all } => {
            let tasks = if all {
                db.list_tasks()?
            } else {
                db.selectable_tasks()?
            };
            print_json(&tasks)?;
        }
        TaskAction::Done { id } => {
            let id = TaskId::from(id);
            if !db.set_task_status(&id, TaskStatus::Done)? {
                return Err(format!("task not found: {id}").into());
            }
            println!("ok");
        }
    }
    Ok(())
}
