use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::models::Priority;

#[derive(Debug, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

// Pulls inline `!priority` (named or 1-4) and `due:YYYY-MM-DD` tokens out
// of a quick-add line. First valid occurrence of each wins; every token is
// stripped from the title either way.
pub fn parse_task_input(input: &str) -> ParsedTask {
    let priority_re = Regex::new(r"(?i)!(urgent|medium|med|high|low|\d+)\s*").unwrap();
    let due_re = Regex::new(r"due:(\S+)\s*").unwrap();

    let mut priority = None;

    // Priority
    for caps in priority_re.captures_iter(input) {
        if let Some(priority_match) = caps.get(1) {
            if let Ok(p) = priority_match.as_str().parse::<Priority>() {
                if priority.is_none() {
                    priority = Some(p);
                }
            }
        }
    }

    // Due date, midnight UTC
    let mut due_date = None;
    for caps in due_re.captures_iter(input) {
        if let Some(date_match) = caps.get(1) {
            if let Ok(date) = date_match.as_str().parse::<NaiveDate>() {
                if due_date.is_none() {
                    due_date = date.and_hms_opt(0, 0, 0).map(|at| at.and_utc());
                }
            }
        }
    }

    let title = priority_re.replace_all(input, "").to_string();
    let title = due_re.replace_all(&title, "").to_string();

    let title = Regex::new(r"\s+")
        .unwrap()
        .replace_all(&title, " ")
        .trim()
        .to_string();

    ParsedTask {
        title,
        priority,
        due_date,
    }
}
