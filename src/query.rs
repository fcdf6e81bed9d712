use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::models::{Priority, Task};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Active => "Active",
            StatusFilter::Completed => "Completed",
        }
    }

    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Completed,
            StatusFilter::Completed => StatusFilter::All,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    DueDate,
    Priority,
    #[default]
    CreatedAt,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::DueDate => "Due date",
            SortKey::Priority => "Priority",
            SortKey::CreatedAt => "Date created",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

// Client-side view parameters for one task collection. Immutable: every
// change goes through a reducer that returns a fresh value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub status: StatusFilter,
    pub priority: Option<Priority>,
    pub search: String,
    pub sort_key: SortKey,
    pub direction: SortDirection,
}

impl Query {
    pub fn with_status(self, status: StatusFilter) -> Self {
        Query { status, ..self }
    }

    pub fn with_priority(self, priority: Option<Priority>) -> Self {
        Query { priority, ..self }
    }

    pub fn with_search(self, search: impl Into<String>) -> Self {
        Query {
            search: search.into(),
            ..self
        }
    }

    // Selecting the active key flips the direction; selecting a new key
    // resets the direction to descending.
    pub fn toggle_sort(self, key: SortKey) -> Self {
        if self.sort_key == key {
            Query {
                direction: self.direction.flipped(),
                ..self
            }
        } else {
            Query {
                sort_key: key,
                direction: SortDirection::Desc,
                ..self
            }
        }
    }

    // Resets status/priority/search. Sort order is presentation, not a
    // filter, so it survives.
    pub fn clear_filters(self) -> Self {
        Query {
            status: StatusFilter::All,
            priority: None,
            search: String::new(),
            ..self
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        };
        let priority_ok = self.priority.map_or(true, |p| task.priority == p);
        let search_ok = self.search.is_empty() || {
            let needle = self.search.to_lowercase();
            task.title.to_lowercase().contains(&needle)
                || task.description.to_lowercase().contains(&needle)
        };
        status_ok && priority_ok && search_ok
    }

    // The ordered visible subset. Filter first, then a stable sort, so
    // equal-key tasks keep their relative order from the input.
    pub fn visible(&self, tasks: &[Task]) -> Vec<Task> {
        let mut out: Vec<Task> = tasks.iter().filter(|t| self.matches(t)).cloned().collect();
        out.sort_by(|a, b| self.compare(a, b));
        out
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        match self.sort_key {
            SortKey::CreatedAt => self.directed(a.created_at.cmp(&b.created_at)),
            SortKey::Priority => self.directed(a.priority.cmp(&b.priority)),
            // A task without a due date ranks after every dated task in
            // both directions; only dated pairs honor the direction.
            SortKey::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => self.directed(x.cmp(&y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }

    fn directed(&self, ord: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

// Progress counters for the list header. Always computed over the full
// collection so the numbers hold still while filters change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

impl Progress {
    pub fn percent(self) -> u16 {
        if self.total == 0 {
            0
        } else {
            (self.completed * 100 / self.total) as u16
        }
    }
}

pub fn progress(tasks: &[Task]) -> Progress {
    Progress {
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.completed).count(),
    }
}

// Calendar-date comparison, matching what the list view shows: a task due
// earlier today is not overdue yet. `now` is passed in, never read from a
// clock here.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.due_date
        .map_or(false, |due| due.date_naive() < now.date_naive())
}
